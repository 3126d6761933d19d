//! User Records

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::uuids::TypedUuid;

/// User UUID
pub type UserUuid = TypedUuid<UserRecord>;

/// User Record
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Unique user identifier.
    pub uuid: UserUuid,

    /// Unique, non-blank display name.
    pub name: String,

    /// Spendable balance; never negative.
    pub balance: Decimal,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
