//! Order Lines Repository

use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::{
    database::{encode_quantity, try_get_quantity},
    domain::{
        orders::{
            data::NewOrderLine,
            records::{OrderLineRecord, OrderUuid},
        },
        products::records::ProductUuid,
    },
    uuids::into_uuids,
};

const CREATE_ORDER_LINE_SQL: &str = include_str!("../sql/create_order_line.sql");
const GET_ORDER_LINES_SQL: &str = include_str!("../sql/get_order_lines.sql");
const DELETE_ORDER_LINES_SQL: &str = include_str!("../sql/delete_order_lines.sql");

/// A line together with the order it belongs to.
#[derive(Debug, Clone)]
pub(crate) struct StoredOrderLine {
    pub order_uuid: OrderUuid,
    pub line: OrderLineRecord,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOrderLinesRepository;

impl PgOrderLinesRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Append a line to the end of the order.
    pub(crate) async fn create_order_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        line: NewOrderLine,
    ) -> Result<OrderLineRecord, sqlx::Error> {
        let quantity = encode_quantity(line.quantity, "quantity")?;

        let stored = query_as::<Postgres, StoredOrderLine>(CREATE_ORDER_LINE_SQL)
            .bind(order.into_uuid())
            .bind(line.product_uuid.into_uuid())
            .bind(quantity)
            .bind(line.unit_price)
            .bind(line.name)
            .bind(line.description)
            .fetch_one(&mut **tx)
            .await?;

        Ok(stored.line)
    }

    /// Lines of every given order, in insertion order within each order.
    pub(crate) async fn get_order_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        orders: &[OrderUuid],
    ) -> Result<Vec<StoredOrderLine>, sqlx::Error> {
        query_as::<Postgres, StoredOrderLine>(GET_ORDER_LINES_SQL)
            .bind(into_uuids(orders))
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn delete_order_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        products: &[ProductUuid],
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_ORDER_LINES_SQL)
            .bind(order.into_uuid())
            .bind(into_uuids(products))
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for StoredOrderLine {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            order_uuid: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            line: OrderLineRecord {
                product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
                quantity: try_get_quantity(row, "quantity")?,
                unit_price: row.try_get("unit_price")?,
                name: row.try_get("product_name")?,
                description: row.try_get("product_description")?,
            },
        })
    }
}
