//! Stock Ledger
//!
//! Per-product available-quantity counter. Both operations run on the caller's transaction,
//! so a multi-line reservation commits or rolls back as a whole.

use sqlx::{Postgres, Transaction, query_scalar};
use tracing::debug;

use crate::{
    database::encode_quantity,
    domain::products::records::ProductUuid,
};

const RESERVE_STOCK_SQL: &str = include_str!("sql/reserve_stock.sql");
const RELEASE_STOCK_SQL: &str = include_str!("sql/release_stock.sql");
const GET_AVAILABLE_QUANTITY_SQL: &str = include_str!("sql/get_available_quantity.sql");

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockReservation {
    /// Stock was decremented; carries the quantity left available.
    Reserved { remaining: u32 },

    /// Not enough stock (or no such product). Nothing was changed.
    Insufficient { available: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct PgStockLedger;

impl PgStockLedger {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decrement the product's available quantity by `quantity` if enough is available.
    ///
    /// The check and the decrement are one guarded `UPDATE`, so two concurrent reservations
    /// of the last unit cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns an error when a statement fails to execute.
    #[tracing::instrument(
        name = "products.stock.reserve",
        skip(self, tx),
        fields(product_uuid = %product),
        err
    )]
    pub async fn reserve(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<StockReservation, sqlx::Error> {
        let remaining: Option<i32> = query_scalar(RESERVE_STOCK_SQL)
            .bind(product.into_uuid())
            .bind(encode_quantity(quantity, "available_quantity")?)
            .fetch_optional(&mut **tx)
            .await?;

        if let Some(remaining) = remaining {
            let remaining = u32::try_from(remaining).unwrap_or_default();

            debug!(remaining, "reserved stock");

            return Ok(StockReservation::Reserved { remaining });
        }

        let available: Option<i32> = query_scalar(GET_AVAILABLE_QUANTITY_SQL)
            .bind(product.into_uuid())
            .fetch_optional(&mut **tx)
            .await?;

        let available = available
            .and_then(|available| u32::try_from(available).ok())
            .unwrap_or_default();

        debug!(available, "insufficient stock");

        Ok(StockReservation::Insufficient { available })
    }

    /// Return `quantity` previously reserved units to the product.
    ///
    /// # Errors
    ///
    /// Returns an error when the statement fails or the product no longer exists.
    #[tracing::instrument(
        name = "products.stock.release",
        skip(self, tx),
        fields(product_uuid = %product),
        err
    )]
    pub async fn release(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        quantity: u32,
    ) -> Result<u32, sqlx::Error> {
        let available: i32 = query_scalar(RELEASE_STOCK_SQL)
            .bind(product.into_uuid())
            .bind(encode_quantity(quantity, "available_quantity")?)
            .fetch_one(&mut **tx)
            .await?;

        let available = u32::try_from(available).unwrap_or_default();

        debug!(available, "released stock");

        Ok(available)
    }
}
