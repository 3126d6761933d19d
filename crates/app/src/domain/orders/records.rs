//! Order Records

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    domain::{products::records::ProductUuid, users::records::UserUuid},
    uuids::TypedUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<OrderRecord>;

/// Payment state of an order. `Pending -> Paid` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Paid,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown order status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}

/// Order Line Record
///
/// Price, name and description are snapshots taken when the line was added; later product
/// edits do not change them.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineRecord {
    pub product_uuid: ProductUuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub name: String,
    pub description: String,
}

impl OrderLineRecord {
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order Record
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub uuid: OrderUuid,
    pub user_uuid: UserUuid,
    pub status: OrderStatus,
    pub lines: Vec<OrderLineRecord>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub paid_at: Option<Timestamp>,
}

impl OrderRecord {
    /// Sum of snapshot price times quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(OrderLineRecord::subtotal).sum()
    }

    /// Total number of units held by this order.
    #[must_use]
    pub fn reserved_units(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }

    /// Still pending and created strictly before `cutoff`.
    #[must_use]
    pub fn is_expired(&self, cutoff: Timestamp) -> bool {
        !self.is_paid() && self.created_at < cutoff
    }
}

/// Why a requested product could not be placed on an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductAvailability {
    pub product_uuid: ProductUuid,

    /// `None` when the product does not exist.
    pub name: Option<String>,

    pub requested_quantity: u32,
    pub available_quantity: u32,
}

impl fmt::Display for ProductAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(
                f,
                "{name} ({}): requested {}, available {}",
                self.product_uuid, self.requested_quantity, self.available_quantity
            ),
            None => write!(f, "{}: no such product", self.product_uuid),
        }
    }
}
