//! Cancellation of in-flight order operations.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::domain::orders::errors::OrdersServiceError;

/// Drive `operation` until it completes or `token` is cancelled.
///
/// When cancellation wins, the operation future is dropped. A transaction that has not yet
/// sent `COMMIT` is rolled back on drop, so no partial effect is committed. Once `COMMIT` is in
/// flight the server may still apply it, so `Cancelled` then means the outcome is unknown and
/// the caller should re-read the order.
///
/// # Errors
///
/// Returns [`OrdersServiceError::Cancelled`] when the token fires first, otherwise whatever
/// the operation returns.
pub async fn until_cancelled<T, F>(
    token: &CancellationToken,
    operation: F,
) -> Result<T, OrdersServiceError>
where
    F: Future<Output = Result<T, OrdersServiceError>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(OrdersServiceError::Cancelled),
        result = operation => result,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    };

    use super::*;

    #[tokio::test]
    async fn completed_operation_returns_its_result() {
        let token = CancellationToken::new();

        let result = until_cancelled(&token, async { Ok::<_, OrdersServiceError>(7) }).await;

        assert!(matches!(result, Ok(7)));
    }

    #[tokio::test]
    async fn cancelled_token_wins_over_pending_operation() {
        let token = CancellationToken::new();
        token.cancel();

        let result = until_cancelled(&token, future::pending::<Result<(), OrdersServiceError>>()).await;

        assert!(matches!(result, Err(OrdersServiceError::Cancelled)));
    }

    #[tokio::test]
    async fn operation_errors_pass_through() {
        let token = CancellationToken::new();

        let result = until_cancelled(&token, async {
            Err::<(), _>(OrdersServiceError::AlreadyPaid)
        })
        .await;

        assert!(matches!(result, Err(OrdersServiceError::AlreadyPaid)));
    }

    #[tokio::test]
    async fn cancellation_mid_operation_does_not_undo_completed_steps() {
        let token = CancellationToken::new();
        let committed = Arc::new(AtomicBool::new(false));

        let operation = {
            let token = token.clone();
            let committed = Arc::clone(&committed);

            async move {
                committed.store(true, Ordering::SeqCst);
                token.cancel();
                future::pending::<Result<(), OrdersServiceError>>().await
            }
        };

        let result = until_cancelled(&token, operation).await;

        assert!(matches!(result, Err(OrdersServiceError::Cancelled)));
        assert!(committed.load(Ordering::SeqCst));
    }
}
