//! Unpaid-Order Sweeper
//!
//! Background task that periodically deletes pending orders older than the configured
//! lifetime, returning their stock through the regular delete path.

use std::{fmt, sync::Arc, time::Duration};

use jiff::{SignedDuration, Timestamp};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::orders::{OrdersService, OrdersServiceError, until_cancelled};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(3 * 60);
const DEFAULT_ORDER_LIFETIME: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperSettings {
    /// Delay between the end of one sweep and the start of the next.
    pub interval: Duration,

    /// How long an order may stay pending before it is swept.
    pub order_lifetime: Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            order_lifetime: DEFAULT_ORDER_LIFETIME,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: usize,

    /// Listed orders that were paid or gone by the time they were locked.
    pub skipped: usize,

    pub failed: usize,
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("order lifetime cannot be subtracted from {now}")]
    Cutoff {
        now: Timestamp,
        #[source]
        source: jiff::Error,
    },

    #[error("failed to list unpaid orders")]
    Orders(#[source] OrdersServiceError),
}

pub struct UnpaidOrdersSweeper {
    orders: Arc<dyn OrdersService>,
    settings: SweeperSettings,
    shutdown: CancellationToken,
}

impl fmt::Debug for UnpaidOrdersSweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnpaidOrdersSweeper")
            .field("settings", &self.settings)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl UnpaidOrdersSweeper {
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrdersService>,
        settings: SweeperSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orders,
            settings,
            shutdown,
        }
    }

    /// Sweep immediately, then once per interval until the shutdown token is cancelled.
    ///
    /// A failed sweep is logged and the loop carries on with the next tick.
    pub async fn run(&self) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            order_lifetime_secs = self.settings.order_lifetime.as_secs(),
            "unpaid order sweeper started"
        );

        while !self.shutdown.is_cancelled() {
            if let Err(error) = self.sweep_once(Timestamp::now()).await {
                warn!(error = %error, "unpaid order sweep failed");
            }

            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        info!("unpaid order sweeper stopped");
    }

    /// Delete every pending order created before `now` minus the order lifetime.
    ///
    /// Each deletion is independent: a failure is logged and counted, and the sweep moves
    /// on. An order paid after it was listed is skipped. Cancellation stops the sweep before
    /// the next deletion starts.
    ///
    /// # Errors
    ///
    /// Returns an error when the cutoff cannot be computed or the unpaid orders cannot be
    /// listed.
    #[tracing::instrument(name = "sweeper.sweep_once", skip(self, now), fields(now = %now), err)]
    pub async fn sweep_once(&self, now: Timestamp) -> Result<SweepReport, SweepError> {
        let cutoff = self.cutoff(now)?;

        let expired = self
            .orders
            .unpaid_orders_older_than(cutoff)
            .await
            .map_err(SweepError::Orders)?;

        debug!(cutoff = %cutoff, count = expired.len(), "found unpaid orders");

        let mut report = SweepReport::default();

        for order in expired {
            if self.shutdown.is_cancelled() {
                break;
            }

            match until_cancelled(&self.shutdown, self.orders.expire_order(order, cutoff)).await
            {
                Ok(Some(deleted)) => {
                    report.deleted += 1;

                    info!(
                        order_uuid = %order,
                        created_at = %deleted.created_at,
                        "deleted unpaid order"
                    );
                }
                Ok(None) | Err(OrdersServiceError::OrderNotFound) => {
                    report.skipped += 1;

                    debug!(order_uuid = %order, "order no longer unpaid, skipped");
                }
                Err(OrdersServiceError::Cancelled) => break,
                Err(error) => {
                    report.failed += 1;

                    warn!(order_uuid = %order, error = %error, "failed to delete unpaid order");
                }
            }
        }

        info!(
            deleted = report.deleted,
            skipped = report.skipped,
            failed = report.failed,
            "unpaid order sweep finished"
        );

        Ok(report)
    }

    fn cutoff(&self, now: Timestamp) -> Result<Timestamp, SweepError> {
        SignedDuration::try_from(self.settings.order_lifetime)
            .and_then(|lifetime| now.checked_sub(lifetime))
            .map_err(|source| SweepError::Cutoff { now, source })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use testresult::TestResult;

    use crate::{
        domain::{
            orders::{
                MockOrdersService, OrdersService, PgOrdersService,
                data::{NewOrder, OrderUpdate},
                records::{OrderRecord, OrderStatus, OrderUuid},
            },
            users::records::UserUuid,
        },
        test::{
            TestContext,
            helpers::{available_quantity, balance, create_product, create_user, money},
        },
    };

    use super::*;

    fn pending(order: OrderUuid) -> OrderRecord {
        OrderRecord {
            uuid: order,
            user_uuid: UserUuid::new(),
            status: OrderStatus::Pending,
            lines: Vec::new(),
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
            paid_at: None,
        }
    }

    fn sweeper(orders: MockOrdersService, shutdown: CancellationToken) -> UnpaidOrdersSweeper {
        UnpaidOrdersSweeper::new(Arc::new(orders), SweeperSettings::default(), shutdown)
    }

    #[test]
    fn default_settings_sweep_every_three_minutes_for_twenty_minute_orders() {
        let settings = SweeperSettings::default();

        assert_eq!(settings.interval, Duration::from_secs(180));
        assert_eq!(settings.order_lifetime, Duration::from_secs(1200));
    }

    #[tokio::test]
    async fn sweep_once_queries_with_lifetime_cutoff() -> TestResult {
        let now = Timestamp::from_second(1_700_000_000)?;
        let expected = Timestamp::from_second(1_700_000_000 - 1200)?;

        let mut orders = MockOrdersService::new();

        orders
            .expect_unpaid_orders_older_than()
            .withf(move |cutoff| *cutoff == expected)
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let report = sweeper(orders, CancellationToken::new())
            .sweep_once(now)
            .await?;

        assert_eq!(report, SweepReport::default());

        Ok(())
    }

    #[tokio::test]
    async fn failed_deletion_does_not_stop_the_sweep() -> TestResult {
        let first = OrderUuid::new();
        let broken = OrderUuid::new();
        let last = OrderUuid::new();

        let mut orders = MockOrdersService::new();

        orders
            .expect_unpaid_orders_older_than()
            .returning(move |_| Ok(vec![first, broken, last]));

        orders
            .expect_expire_order()
            .times(3)
            .returning(move |order, _| {
                if order == broken {
                    Err(OrdersServiceError::RefundFailed)
                } else {
                    Ok(Some(pending(order)))
                }
            });

        let report = sweeper(orders, CancellationToken::new())
            .sweep_once(Timestamp::now())
            .await?;

        assert_eq!(
            report,
            SweepReport {
                deleted: 2,
                skipped: 0,
                failed: 1
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn orders_no_longer_expired_are_counted_as_skipped() -> TestResult {
        let stale = OrderUuid::new();
        let paid = OrderUuid::new();
        let gone = OrderUuid::new();

        let mut orders = MockOrdersService::new();

        orders
            .expect_unpaid_orders_older_than()
            .returning(move |_| Ok(vec![stale, paid, gone]));

        orders
            .expect_expire_order()
            .times(3)
            .returning(move |order, _| {
                if order == stale {
                    Ok(Some(pending(order)))
                } else if order == paid {
                    Ok(None)
                } else {
                    Err(OrdersServiceError::OrderNotFound)
                }
            });

        let report = sweeper(orders, CancellationToken::new())
            .sweep_once(Timestamp::now())
            .await?;

        assert_eq!(
            report,
            SweepReport {
                deleted: 1,
                skipped: 2,
                failed: 0
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn listing_failure_is_reported() {
        let mut orders = MockOrdersService::new();

        orders
            .expect_unpaid_orders_older_than()
            .returning(|_| Err(OrdersServiceError::Sql(sqlx::Error::PoolTimedOut)));

        orders.expect_expire_order().never();

        let result = sweeper(orders, CancellationToken::new())
            .sweep_once(Timestamp::now())
            .await;

        assert!(
            matches!(result, Err(SweepError::Orders(_))),
            "expected Orders error, got {result:?}"
        );
    }

    #[tokio::test]
    async fn cancelled_sweep_skips_remaining_deletions() -> TestResult {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let mut orders = MockOrdersService::new();

        orders
            .expect_unpaid_orders_older_than()
            .returning(|_| Ok(vec![OrderUuid::new(), OrderUuid::new()]));

        orders.expect_expire_order().never();

        let report = sweeper(orders, shutdown).sweep_once(Timestamp::now()).await?;

        assert_eq!(report, SweepReport::default());

        Ok(())
    }

    #[tokio::test]
    async fn run_does_not_start_a_cycle_after_shutdown() -> TestResult {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let mut orders = MockOrdersService::new();

        orders.expect_unpaid_orders_older_than().never();

        tokio::time::timeout(Duration::from_secs(1), sweeper(orders, shutdown).run()).await?;

        Ok(())
    }

    #[tokio::test]
    async fn run_ticks_immediately_and_stops_without_waiting_out_the_interval() -> TestResult {
        let shutdown = CancellationToken::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let mut orders = MockOrdersService::new();

        let counter = Arc::clone(&ticks);
        let cancel = shutdown.clone();

        orders
            .expect_unpaid_orders_older_than()
            .returning(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                Ok(Vec::new())
            });

        tokio::time::timeout(Duration::from_secs(1), sweeper(orders, shutdown).run()).await?;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[tokio::test]
    async fn sweep_deletes_only_orders_past_their_lifetime() -> TestResult {
        let ctx = TestContext::new().await;
        let product = create_product(&ctx, 100, 2).await?;
        let user = create_user(&ctx, 0).await?;

        let order = ctx
            .orders
            .create_order(NewOrder {
                uuid: OrderUuid::new(),
                user_uuid: user,
                product_uuids: vec![product],
            })
            .await?;

        let orders: Arc<dyn OrdersService> = Arc::new(ctx.orders.clone());
        let sweeper = UnpaidOrdersSweeper::new(
            orders,
            SweeperSettings::default(),
            CancellationToken::new(),
        );

        let early = sweeper
            .sweep_once(order.created_at + SignedDuration::from_mins(19))
            .await?;

        assert_eq!(early.deleted, 0);
        assert!(ctx.orders.get_order(order.uuid).await.is_ok());

        let late = sweeper
            .sweep_once(order.created_at + SignedDuration::from_mins(21))
            .await?;

        assert_eq!(late.deleted, 1);
        assert!(ctx.orders.get_order(order.uuid).await.is_err());
        assert_eq!(available_quantity(&ctx, product).await?, 2);

        Ok(())
    }

    #[tokio::test]
    async fn sweep_leaves_paid_orders_alone() -> TestResult {
        let ctx = TestContext::new().await;
        let product = create_product(&ctx, 100, 1).await?;
        let user = create_user(&ctx, 100).await?;

        let order = ctx
            .orders
            .create_order(NewOrder {
                uuid: OrderUuid::new(),
                user_uuid: user,
                product_uuids: vec![product],
            })
            .await?;

        ctx.orders.pay_order(user, order.uuid).await?;

        let sweeper = UnpaidOrdersSweeper::new(
            Arc::new(PgOrdersService::clone(&ctx.orders)),
            SweeperSettings::default(),
            CancellationToken::new(),
        );

        let report = sweeper
            .sweep_once(order.created_at + SignedDuration::from_hours(1))
            .await?;

        assert_eq!(report.deleted, 0);
        assert!(ctx.orders.get_order(order.uuid).await?.is_paid());

        Ok(())
    }

    /// Pays every listed order right after listing it, as a customer racing the sweep would.
    struct PaidAfterListing {
        inner: PgOrdersService,
        user: UserUuid,
    }

    #[async_trait]
    impl OrdersService for PaidAfterListing {
        async fn list_orders(&self) -> Result<Vec<OrderRecord>, OrdersServiceError> {
            self.inner.list_orders().await
        }

        async fn get_order(&self, order: OrderUuid) -> Result<OrderRecord, OrdersServiceError> {
            self.inner.get_order(order).await
        }

        async fn create_order(&self, order: NewOrder) -> Result<OrderRecord, OrdersServiceError> {
            self.inner.create_order(order).await
        }

        async fn pay_order(
            &self,
            user: UserUuid,
            order: OrderUuid,
        ) -> Result<OrderRecord, OrdersServiceError> {
            self.inner.pay_order(user, order).await
        }

        async fn update_order(
            &self,
            order: OrderUuid,
            update: OrderUpdate,
        ) -> Result<OrderRecord, OrdersServiceError> {
            self.inner.update_order(order, update).await
        }

        async fn delete_order(&self, order: OrderUuid) -> Result<OrderRecord, OrdersServiceError> {
            self.inner.delete_order(order).await
        }

        async fn expire_order(
            &self,
            order: OrderUuid,
            cutoff: Timestamp,
        ) -> Result<Option<OrderRecord>, OrdersServiceError> {
            self.inner.expire_order(order, cutoff).await
        }

        async fn unpaid_orders_older_than(
            &self,
            cutoff: Timestamp,
        ) -> Result<Vec<OrderUuid>, OrdersServiceError> {
            let listed = self.inner.unpaid_orders_older_than(cutoff).await?;

            for order in &listed {
                self.inner.pay_order(self.user, *order).await?;
            }

            Ok(listed)
        }
    }

    #[tokio::test]
    async fn order_paid_after_listing_survives_the_sweep() -> TestResult {
        let ctx = TestContext::new().await;
        let product = create_product(&ctx, 100, 1).await?;
        let user = create_user(&ctx, 100).await?;

        let order = ctx
            .orders
            .create_order(NewOrder {
                uuid: OrderUuid::new(),
                user_uuid: user,
                product_uuids: vec![product],
            })
            .await?;

        let sweeper = UnpaidOrdersSweeper::new(
            Arc::new(PaidAfterListing {
                inner: ctx.orders.clone(),
                user,
            }),
            SweeperSettings::default(),
            CancellationToken::new(),
        );

        let report = sweeper
            .sweep_once(order.created_at + SignedDuration::from_hours(1))
            .await?;

        assert_eq!(
            report,
            SweepReport {
                deleted: 0,
                skipped: 1,
                failed: 0
            }
        );
        assert!(ctx.orders.get_order(order.uuid).await?.is_paid());
        assert_eq!(balance(&ctx, user).await?, money(0));
        assert_eq!(available_quantity(&ctx, product).await?, 0);

        Ok(())
    }
}
