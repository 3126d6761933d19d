//! Storefront order lifecycle, stock and balance services.

pub mod config;
pub mod context;
pub mod database;
pub mod domain;
pub mod observability;
pub mod shutdown;
pub mod sweeper;

#[cfg(test)]
mod test;

pub mod uuids;
