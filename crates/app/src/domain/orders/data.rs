//! Orders Data

use crate::domain::{
    orders::records::OrderUuid, products::records::ProductUuid, users::records::UserUuid,
};

/// New Order Data
///
/// Repeated product ids collapse into one line whose quantity is the number of occurrences.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub uuid: OrderUuid,
    pub user_uuid: UserUuid,
    pub product_uuids: Vec<ProductUuid>,
}

/// Order Update Data
///
/// The requested set of products. Lines for products outside the set are removed; products
/// not yet on the order are added with a quantity of one.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub product_uuids: Vec<ProductUuid>,
}

/// Snapshot of a product captured when a line is added to an order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewOrderLine {
    pub product_uuid: ProductUuid,
    pub quantity: u32,
    pub unit_price: rust_decimal::Decimal,
    pub name: String,
    pub description: String,
}
