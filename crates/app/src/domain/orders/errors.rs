//! Orders service errors.

use std::fmt;

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::{orders::records::ProductAvailability, products::records::ProductUuid};

#[derive(Debug, Error)]
pub enum OrdersServiceError {
    #[error("user not found")]
    UserNotFound,

    #[error("order not found")]
    OrderNotFound,

    #[error("products not found: {}", join(.0))]
    ProductsNotFound(Vec<ProductUuid>),

    #[error("products unavailable: {}", join(.0))]
    Unavailable(Vec<ProductAvailability>),

    #[error("order already paid")]
    AlreadyPaid,

    #[error("order belongs to another user")]
    AccessDenied,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("refund failed: user no longer exists")]
    RefundFailed,

    #[error("order must contain at least one product")]
    EmptyOrder,

    /// The caller gave up. If the commit had already been sent, it may still have applied.
    #[error("operation cancelled")]
    Cancelled,

    #[error("storage error")]
    Sql(#[source] Error),
}

/// Coarse grouping of [`OrdersServiceError`] for callers that only need to know what kind of
/// failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Cancelled,
    Storage,
}

impl OrdersServiceError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UserNotFound | Self::OrderNotFound | Self::ProductsNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::Unavailable(_)
            | Self::AlreadyPaid
            | Self::AccessDenied
            | Self::InsufficientBalance
            | Self::RefundFailed => ErrorCategory::Conflict,
            Self::EmptyOrder => ErrorCategory::Validation,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Sql(_) => ErrorCategory::Storage,
        }
    }
}

impl From<Error> for OrdersServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::OrderNotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::ForeignKeyViolation) => Self::UserNotFound,
            _ => Self::Sql(error),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
