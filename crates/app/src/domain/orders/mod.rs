//! Orders
//!
//! Order lifecycle: stock reservation on create, `Pending -> Paid` on payment, and reversal of
//! stock and balance effects on deletion.

pub mod cancellation;
pub mod data;
pub mod errors;
pub mod planning;
pub mod records;
mod repositories;
pub mod service;

pub use cancellation::until_cancelled;
pub use errors::{ErrorCategory, OrdersServiceError};
pub use service::*;
