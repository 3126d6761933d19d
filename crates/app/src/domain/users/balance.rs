//! Balance Ledger
//!
//! Guarded balance mutations applied on the caller's transaction. Callers validate that
//! amounts are strictly positive before invoking the ledger.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction, query_scalar};
use tracing::debug;

use crate::domain::users::records::UserUuid;

const GET_BALANCE_SQL: &str = include_str!("sql/get_balance.sql");
const INCREASE_BALANCE_SQL: &str = include_str!("sql/increase_balance.sql");
const DECREASE_BALANCE_SQL: &str = include_str!("sql/decrease_balance.sql");

/// Outcome of a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    /// The mutation was applied; carries the resulting balance.
    Applied(Decimal),

    /// No user with the given id exists. Nothing was changed.
    UserNotFound,

    /// The user's balance is lower than the requested debit. Nothing was changed.
    InsufficientFunds,
}

#[derive(Debug, Clone, Default)]
pub struct PgBalanceLedger;

impl PgBalanceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Credit `amount` to the user.
    ///
    /// # Errors
    ///
    /// Returns an error when the statement fails to execute.
    #[tracing::instrument(
        name = "users.balance.increase",
        skip(self, tx),
        fields(user_uuid = %user, amount = %amount),
        err
    )]
    pub async fn increase(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        amount: Decimal,
    ) -> Result<BalanceChange, sqlx::Error> {
        let balance: Option<Decimal> = query_scalar(INCREASE_BALANCE_SQL)
            .bind(user.into_uuid())
            .bind(amount)
            .fetch_optional(&mut **tx)
            .await?;

        let change = balance.map_or(BalanceChange::UserNotFound, BalanceChange::Applied);

        debug!(?change, "increased balance");

        Ok(change)
    }

    /// Debit `amount` from the user when the balance covers it.
    ///
    /// # Errors
    ///
    /// Returns an error when a statement fails to execute.
    #[tracing::instrument(
        name = "users.balance.decrease",
        skip(self, tx),
        fields(user_uuid = %user, amount = %amount),
        err
    )]
    pub async fn decrease(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        amount: Decimal,
    ) -> Result<BalanceChange, sqlx::Error> {
        let balance: Option<Decimal> = query_scalar(DECREASE_BALANCE_SQL)
            .bind(user.into_uuid())
            .bind(amount)
            .fetch_optional(&mut **tx)
            .await?;

        if let Some(balance) = balance {
            debug!(%balance, "decreased balance");

            return Ok(BalanceChange::Applied(balance));
        }

        // The guarded update matched nothing: tell a missing user apart from a short balance.
        let current: Option<Decimal> = query_scalar(GET_BALANCE_SQL)
            .bind(user.into_uuid())
            .fetch_optional(&mut **tx)
            .await?;

        Ok(match current {
            Some(_) => BalanceChange::InsufficientFunds,
            None => BalanceChange::UserNotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        domain::users::{UsersService, data::NewUser},
        test::{TestContext, helpers::money},
    };

    use super::*;

    async fn funded_user(ctx: &TestContext, amount: Decimal) -> TestResult<UserUuid> {
        let uuid = UserUuid::new();

        ctx.users
            .create_user(NewUser {
                uuid,
                name: format!("ledger-{uuid}"),
            })
            .await?;

        ctx.users.increase_balance(uuid, amount).await?;

        Ok(uuid)
    }

    #[tokio::test]
    async fn decrease_applies_when_balance_covers_amount() -> TestResult {
        let ctx = TestContext::new().await;
        let user = funded_user(&ctx, money(5000)).await?;

        let mut tx = ctx.db.begin_test_transaction().await;
        let change = PgBalanceLedger::new()
            .decrease(&mut tx, user, money(3000))
            .await?;

        assert_eq!(change, BalanceChange::Applied(money(2000)));

        Ok(())
    }

    #[tokio::test]
    async fn decrease_reports_insufficient_funds_without_mutation() -> TestResult {
        let ctx = TestContext::new().await;
        let user = funded_user(&ctx, money(1000)).await?;
        let ledger = PgBalanceLedger::new();

        let mut tx = ctx.db.begin_test_transaction().await;
        let change = ledger.decrease(&mut tx, user, money(1001)).await?;

        assert_eq!(change, BalanceChange::InsufficientFunds);

        // Exact balance is still spendable, so nothing was taken by the failed attempt.
        let change = ledger.decrease(&mut tx, user, money(1000)).await?;

        assert_eq!(change, BalanceChange::Applied(Decimal::ZERO));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_user_is_reported_for_both_directions() -> TestResult {
        let ctx = TestContext::new().await;
        let ledger = PgBalanceLedger::new();

        let mut tx = ctx.db.begin_test_transaction().await;

        let increase = ledger.increase(&mut tx, UserUuid::new(), money(100)).await?;
        let decrease = ledger.decrease(&mut tx, UserUuid::new(), money(100)).await?;

        assert_eq!(increase, BalanceChange::UserNotFound);
        assert_eq!(decrease, BalanceChange::UserNotFound);

        Ok(())
    }
}
