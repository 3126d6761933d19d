//! Orders service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};

use crate::{
    database::Db,
    domain::{
        orders::{
            data::{NewOrder, OrderUpdate},
            errors::OrdersServiceError,
            planning::{
                LineChanges, RequestedQuantity, group_quantities, index_products,
                missing_products, snapshot_line, unavailable_products,
            },
            records::{OrderRecord, OrderUuid, ProductAvailability},
            repositories::{PgOrderLinesRepository, PgOrdersRepository},
        },
        products::{
            records::{ProductRecord, ProductUuid},
            repository::PgProductsRepository,
            stock::{PgStockLedger, StockReservation},
        },
        users::{
            balance::{BalanceChange, PgBalanceLedger},
            records::UserUuid,
            repository::PgUsersRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgOrdersService {
    db: Db,
    orders_repository: PgOrdersRepository,
    lines_repository: PgOrderLinesRepository,
    products_repository: PgProductsRepository,
    users_repository: PgUsersRepository,
    stock: PgStockLedger,
    ledger: PgBalanceLedger,
}

impl PgOrdersService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            orders_repository: PgOrdersRepository::new(),
            lines_repository: PgOrderLinesRepository::new(),
            products_repository: PgProductsRepository::new(),
            users_repository: PgUsersRepository::new(),
            stock: PgStockLedger::new(),
            ledger: PgBalanceLedger::new(),
        }
    }

    /// Load the lines of every given order and attach them.
    async fn attach_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut orders: Vec<OrderRecord>,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let uuids: Vec<OrderUuid> = orders.iter().map(|order| order.uuid).collect();

        let mut lines_by_order: FxHashMap<OrderUuid, Vec<_>> = FxHashMap::default();

        for stored in self.lines_repository.get_order_lines(tx, &uuids).await? {
            lines_by_order
                .entry(stored.order_uuid)
                .or_default()
                .push(stored.line);
        }

        for order in &mut orders {
            if let Some(lines) = lines_by_order.remove(&order.uuid) {
                order.lines = lines;
            }
        }

        Ok(orders)
    }

    async fn with_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderRecord,
    ) -> Result<OrderRecord, sqlx::Error> {
        let mut orders = self.attach_lines(tx, vec![order]).await?;

        orders.pop().ok_or(sqlx::Error::RowNotFound)
    }

    /// Reserve every requested quantity and snapshot a line for each.
    ///
    /// `products` must already be locked by the caller. A reservation that comes up short
    /// aborts with that product's diagnostic.
    async fn reserve_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        requested: &[RequestedQuantity],
        products: &FxHashMap<ProductUuid, &ProductRecord>,
    ) -> Result<(), OrdersServiceError> {
        for entry in requested {
            let product = products
                .get(&entry.product_uuid)
                .ok_or_else(|| OrdersServiceError::ProductsNotFound(vec![entry.product_uuid]))?;

            match self
                .stock
                .reserve(tx, entry.product_uuid, entry.quantity)
                .await?
            {
                StockReservation::Reserved { .. } => {}
                StockReservation::Insufficient { available } => {
                    return Err(OrdersServiceError::Unavailable(vec![ProductAvailability {
                        product_uuid: entry.product_uuid,
                        name: Some(product.name.clone()),
                        requested_quantity: entry.quantity,
                        available_quantity: available,
                    }]));
                }
            }

            self.lines_repository
                .create_order_line(tx, order, snapshot_line(product, entry.quantity))
                .await?;
        }

        Ok(())
    }

    /// Lock the products an existing order holds before releasing stock.
    async fn lock_line_products(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        products: &[ProductUuid],
    ) -> Result<(), sqlx::Error> {
        if products.is_empty() {
            return Ok(());
        }

        self.products_repository.lock_products(tx, products).await?;

        Ok(())
    }

    /// Refund a paid order, release its stock and delete it.
    ///
    /// `locked` must be held `FOR UPDATE` by `tx`. Returns the order as it was.
    async fn remove_locked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        locked: OrderRecord,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let locked = self.with_lines(tx, locked).await?;

        let total = locked.total();

        if locked.is_paid() && total > Decimal::ZERO {
            match self.ledger.increase(tx, locked.user_uuid, total).await? {
                BalanceChange::Applied(balance) => {
                    debug!(balance = %balance, "refunded order total");
                }
                BalanceChange::UserNotFound | BalanceChange::InsufficientFunds => {
                    return Err(OrdersServiceError::RefundFailed);
                }
            }
        }

        let products: Vec<ProductUuid> =
            locked.lines.iter().map(|line| line.product_uuid).collect();

        self.lock_line_products(tx, &products).await?;

        for line in &locked.lines {
            self.stock
                .release(tx, line.product_uuid, line.quantity)
                .await?;
        }

        let rows_affected = self.orders_repository.delete_order(tx, locked.uuid).await?;

        if rows_affected == 0 {
            return Err(OrdersServiceError::OrderNotFound);
        }

        Ok(locked)
    }
}

#[async_trait]
impl OrdersService for PgOrdersService {
    async fn list_orders(&self) -> Result<Vec<OrderRecord>, OrdersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let orders = self.orders_repository.list_orders(&mut tx).await?;
        let orders = self.attach_lines(&mut tx, orders).await?;

        tx.commit().await?;

        Ok(orders)
    }

    async fn get_order(&self, order: OrderUuid) -> Result<OrderRecord, OrdersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let order = self.orders_repository.get_order(&mut tx, order).await?;
        let order = self.with_lines(&mut tx, order).await?;

        tx.commit().await?;

        Ok(order)
    }

    #[tracing::instrument(
        name = "orders.service.create_order",
        skip(self, order),
        fields(order_uuid = %order.uuid, user_uuid = %order.user_uuid),
        err
    )]
    async fn create_order(&self, order: NewOrder) -> Result<OrderRecord, OrdersServiceError> {
        if order.product_uuids.is_empty() {
            return Err(OrdersServiceError::EmptyOrder);
        }

        let mut tx = self.db.begin_transaction().await?;

        if self
            .users_repository
            .find_user(&mut tx, order.user_uuid)
            .await?
            .is_none()
        {
            return Err(OrdersServiceError::UserNotFound);
        }

        let requested = group_quantities(&order.product_uuids);
        let product_uuids: Vec<ProductUuid> =
            requested.iter().map(|entry| entry.product_uuid).collect();

        let products = self
            .products_repository
            .lock_products(&mut tx, &product_uuids)
            .await?;

        let index = index_products(&products);

        let unavailable = unavailable_products(&requested, &index);

        if !unavailable.is_empty() {
            debug!(count = unavailable.len(), "rejecting order with unavailable products");

            return Err(OrdersServiceError::Unavailable(unavailable));
        }

        let created = self
            .orders_repository
            .create_order(&mut tx, order.uuid, order.user_uuid)
            .await?;

        self.reserve_lines(&mut tx, created.uuid, &requested, &index)
            .await?;

        let created = self.with_lines(&mut tx, created).await?;

        tx.commit().await?;

        info!(
            order_uuid = %created.uuid,
            lines = created.lines.len(),
            total = %created.total(),
            "created order"
        );

        Ok(created)
    }

    #[tracing::instrument(
        name = "orders.service.pay_order",
        skip(self),
        fields(user_uuid = %user, order_uuid = %order),
        err
    )]
    async fn pay_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let locked = self.orders_repository.lock_order(&mut tx, order).await?;

        if locked.is_paid() {
            return Err(OrdersServiceError::AlreadyPaid);
        }

        if locked.user_uuid != user {
            return Err(OrdersServiceError::AccessDenied);
        }

        let locked = self.with_lines(&mut tx, locked).await?;
        let total = locked.total();

        if total > Decimal::ZERO {
            match self.ledger.decrease(&mut tx, locked.user_uuid, total).await? {
                BalanceChange::Applied(balance) => {
                    debug!(balance = %balance, "charged order total");
                }
                BalanceChange::InsufficientFunds => {
                    return Err(OrdersServiceError::InsufficientBalance);
                }
                BalanceChange::UserNotFound => return Err(OrdersServiceError::UserNotFound),
            }
        }

        let paid = self
            .orders_repository
            .mark_order_paid(&mut tx, order)
            .await?
            .ok_or(OrdersServiceError::AlreadyPaid)?;

        tx.commit().await?;

        info!(order_uuid = %order, total = %total, "paid order");

        Ok(OrderRecord {
            lines: locked.lines,
            ..paid
        })
    }

    #[tracing::instrument(
        name = "orders.service.update_order",
        skip(self, update),
        fields(order_uuid = %order),
        err
    )]
    async fn update_order(
        &self,
        order: OrderUuid,
        update: OrderUpdate,
    ) -> Result<OrderRecord, OrdersServiceError> {
        if update.product_uuids.is_empty() {
            return Err(OrdersServiceError::EmptyOrder);
        }

        let mut tx = self.db.begin_transaction().await?;

        let locked = self.orders_repository.lock_order(&mut tx, order).await?;

        if locked.is_paid() {
            return Err(OrdersServiceError::AlreadyPaid);
        }

        let locked = self.with_lines(&mut tx, locked).await?;

        let changes = LineChanges::between(&locked.lines, &update.product_uuids);

        if changes.is_empty() {
            tx.commit().await?;

            return Ok(locked);
        }

        let mut touched = changes.removed_products();
        touched.extend(changes.added.iter().copied());

        let products = self
            .products_repository
            .lock_products(&mut tx, &touched)
            .await?;

        let index = index_products(&products);

        let missing = missing_products(&changes.added, &index);

        if !missing.is_empty() {
            return Err(OrdersServiceError::ProductsNotFound(missing));
        }

        let added = changes.added_quantities();

        let unavailable = unavailable_products(&added, &index);

        if !unavailable.is_empty() {
            return Err(OrdersServiceError::Unavailable(unavailable));
        }

        for line in &changes.removed {
            self.stock
                .release(&mut tx, line.product_uuid, line.quantity)
                .await?;
        }

        if !changes.removed.is_empty() {
            self.lines_repository
                .delete_order_lines(&mut tx, order, &changes.removed_products())
                .await?;
        }

        self.reserve_lines(&mut tx, order, &added, &index).await?;

        let updated = self.orders_repository.touch_order(&mut tx, order).await?;
        let updated = self.with_lines(&mut tx, updated).await?;

        tx.commit().await?;

        info!(
            order_uuid = %order,
            removed = changes.removed.len(),
            added = changes.added.len(),
            "updated order"
        );

        Ok(updated)
    }

    #[tracing::instrument(
        name = "orders.service.delete_order",
        skip(self),
        fields(order_uuid = %order),
        err
    )]
    async fn delete_order(&self, order: OrderUuid) -> Result<OrderRecord, OrdersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let locked = self.orders_repository.lock_order(&mut tx, order).await?;
        let locked = self.remove_locked(&mut tx, locked).await?;

        tx.commit().await?;

        info!(
            order_uuid = %order,
            refunded = locked.is_paid(),
            released_units = locked.reserved_units(),
            "deleted order"
        );

        Ok(locked)
    }

    #[tracing::instrument(
        name = "orders.service.expire_order",
        skip(self),
        fields(order_uuid = %order, cutoff = %cutoff),
        err
    )]
    async fn expire_order(
        &self,
        order: OrderUuid,
        cutoff: Timestamp,
    ) -> Result<Option<OrderRecord>, OrdersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let locked = self.orders_repository.lock_order(&mut tx, order).await?;

        if !locked.is_expired(cutoff) {
            debug!(status = %locked.status, "order no longer expired, skipping");

            return Ok(None);
        }

        let expired = self.remove_locked(&mut tx, locked).await?;

        tx.commit().await?;

        info!(
            order_uuid = %order,
            released_units = expired.reserved_units(),
            "expired order"
        );

        Ok(Some(expired))
    }

    async fn unpaid_orders_older_than(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<OrderUuid>, OrdersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let orders = self
            .orders_repository
            .list_unpaid_orders(&mut tx, cutoff)
            .await?;

        tx.commit().await?;

        Ok(orders)
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Retrieves all orders with their lines, oldest first.
    async fn list_orders(&self) -> Result<Vec<OrderRecord>, OrdersServiceError>;

    /// Retrieve a single order with its lines.
    async fn get_order(&self, order: OrderUuid) -> Result<OrderRecord, OrdersServiceError>;

    /// Creates a pending order, reserving stock for every requested product.
    ///
    /// Fails without touching stock when any product is missing or short.
    async fn create_order(&self, order: NewOrder) -> Result<OrderRecord, OrdersServiceError>;

    /// Charges the order total to its owner and marks it paid.
    async fn pay_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Replaces the set of products on a pending order.
    async fn update_order(
        &self,
        order: OrderUuid,
        update: OrderUpdate,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Deletes an order, refunding it when paid and releasing its stock.
    ///
    /// Returns the order as it was before deletion.
    async fn delete_order(&self, order: OrderUuid) -> Result<OrderRecord, OrdersServiceError>;

    /// Deletes an order only if it is still pending and was created before `cutoff`.
    ///
    /// The check runs under the order lock, so an order paid after it was listed is left
    /// alone. Returns `None` when the order was skipped.
    async fn expire_order(
        &self,
        order: OrderUuid,
        cutoff: Timestamp,
    ) -> Result<Option<OrderRecord>, OrdersServiceError>;

    /// Ids of pending orders created before `cutoff`.
    async fn unpaid_orders_older_than(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<OrderUuid>, OrdersServiceError>;
}
