//! Users service.

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    database::Db,
    domain::users::{
        balance::{BalanceChange, PgBalanceLedger},
        data::NewUser,
        errors::UsersServiceError,
        records::{UserRecord, UserUuid},
        repository::PgUsersRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgUsersService {
    db: Db,
    repository: PgUsersRepository,
    ledger: PgBalanceLedger,
}

impl PgUsersService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgUsersRepository::new(),
            ledger: PgBalanceLedger::new(),
        }
    }
}

#[async_trait]
impl UsersService for PgUsersService {
    #[tracing::instrument(
        name = "users.service.create_user",
        skip(self, user),
        fields(user_uuid = %user.uuid),
        err
    )]
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, UsersServiceError> {
        if user.name.trim().is_empty() {
            return Err(UsersServiceError::EmptyName);
        }

        let mut tx = self.db.begin_transaction().await?;

        let created = self.repository.create_user(&mut tx, user).await?;

        tx.commit().await?;

        info!(user_uuid = %created.uuid, "created user");

        Ok(created)
    }

    async fn get_user(&self, user: UserUuid) -> Result<UserRecord, UsersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self
            .repository
            .find_user(&mut tx, user)
            .await?
            .ok_or(UsersServiceError::NotFound)?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, UsersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let users = self.repository.list_users(&mut tx).await?;

        tx.commit().await?;

        Ok(users)
    }

    #[tracing::instrument(
        name = "users.service.increase_balance",
        skip(self),
        fields(user_uuid = %user, amount = %amount),
        err
    )]
    async fn increase_balance(
        &self,
        user: UserUuid,
        amount: Decimal,
    ) -> Result<UserRecord, UsersServiceError> {
        if amount <= Decimal::ZERO {
            return Err(UsersServiceError::InvalidAmount);
        }

        let mut tx = self.db.begin_transaction().await?;

        match self.ledger.increase(&mut tx, user, amount).await? {
            BalanceChange::Applied(_) => {}
            BalanceChange::UserNotFound | BalanceChange::InsufficientFunds => {
                return Err(UsersServiceError::NotFound);
            }
        }

        let record = self
            .repository
            .find_user(&mut tx, user)
            .await?
            .ok_or(UsersServiceError::NotFound)?;

        tx.commit().await?;

        info!(user_uuid = %user, balance = %record.balance, "increased user balance");

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait UsersService: Send + Sync {
    /// Registers a new user with a zero balance.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, UsersServiceError>;

    /// Retrieve a single user.
    async fn get_user(&self, user: UserUuid) -> Result<UserRecord, UsersServiceError>;

    /// Retrieves all users.
    async fn list_users(&self) -> Result<Vec<UserRecord>, UsersServiceError>;

    /// Adds a strictly positive amount to the user's balance.
    async fn increase_balance(
        &self,
        user: UserUuid,
        amount: Decimal,
    ) -> Result<UserRecord, UsersServiceError>;
}
