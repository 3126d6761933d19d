//! Users

pub mod balance;
pub mod data;
pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use balance::{BalanceChange, PgBalanceLedger};
pub use errors::UsersServiceError;
pub use service::*;
