//! # Deposit Refunds
//!
//! ```text
//!   order (deposit, paid)
//!        │ claim: paid → refunding        (loser: AlreadyFinalized)
//!        ▼
//!   RefundGateway::refund(payment intent, total)
//!        ├── ok   → refunding → refunded
//!        └── err  → refunding → paid
//! ```
//! A deposit that is missing, not a deposit, or no longer `paid` fails
//! before the gateway is called. Concurrent requests for one deposit reach
//! the gateway at most once.

use std::future::Future;
use tracing::{error, info, warn};

use modkit_core::{Order, OrderStatus};

use crate::error::{DbError, DbResult};
use crate::repository::OrderRepository;

/// Processor-side refund result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    pub refund_id: String,
}

/// The payment processor's refund call.
///
/// Implementations map processor failures to [`DbError::External`].
pub trait RefundGateway: Send + Sync {
    fn refund(
        &self,
        payment_intent_id: &str,
        amount_cents: i64,
    ) -> impl Future<Output = DbResult<RefundReceipt>> + Send;
}

/// Refunds a deposit order by id and marks it `refunded`.
///
/// ## Errors
/// - `NotFound` when no deposit order has this id
/// - `AlreadyFinalized` when it was already applied or refunded, or
///   another refund of it is in flight
/// - `External` when the order has no payment intent or the gateway fails
pub async fn refund_deposit_order<G: RefundGateway>(
    orders: &OrderRepository,
    gateway: &G,
    order_id: &str,
) -> DbResult<(Order, RefundReceipt)> {
    let order = orders
        .get_by_id(order_id)
        .await?
        .filter(Order::is_deposit)
        .ok_or_else(|| DbError::not_found("Deposit order", order_id))?;

    if order.status != OrderStatus::Paid {
        return Err(DbError::already_finalized("Deposit order", order_id, order.status));
    }

    let payment_intent_id = order.payment_intent_id.as_deref().ok_or_else(|| {
        DbError::External(format!("deposit order {} has no payment intent", order_id))
    })?;

    orders.claim_deposit_refund(order_id).await?;

    let receipt = match gateway.refund(payment_intent_id, order.total_cents).await {
        Ok(receipt) => receipt,
        Err(e) => {
            warn!(order_id = %order_id, error = %e, "Processor refused refund");
            if let Err(release) = orders.release_deposit_refund(order_id).await {
                error!(
                    order_id = %order_id,
                    error = %release,
                    "Refund claim could not be released; deposit stays refunding"
                );
            }
            return Err(e);
        }
    };

    info!(
        order_id = %order_id,
        refund_id = %receipt.refund_id,
        amount_cents = order.total_cents,
        "Deposit refunded at processor"
    );

    let order = orders
        .complete_deposit_refund(order_id)
        .await
        .inspect_err(|e| {
            warn!(
                order_id = %order_id,
                refund_id = %receipt.refund_id,
                error = %e,
                "Refund issued but order could not be marked refunded"
            )
        })?;

    Ok((order, receipt))
}

/// Refunds the active deposit `email` holds for `product_id`.
pub async fn refund_active_deposit<G: RefundGateway>(
    orders: &OrderRepository,
    gateway: &G,
    email: &str,
    product_id: &str,
) -> DbResult<(Order, RefundReceipt)> {
    let deposit = orders
        .get_deposit_order(email, product_id)
        .await?
        .ok_or_else(|| DbError::not_found("Deposit order", format!("{}/{}", email, product_id)))?;

    refund_deposit_order(orders, gateway, &deposit.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::testing::{deposit_order, product, purchase_order};
    use crate::testing::TempDb;
    use std::sync::Mutex;

    /// Gateway that records calls and can be told to fail.
    #[derive(Default)]
    struct FakeGateway {
        calls: Mutex<Vec<(String, i64)>>,
        fail: bool,
    }

    impl RefundGateway for FakeGateway {
        async fn refund(&self, payment_intent_id: &str, amount_cents: i64) -> DbResult<RefundReceipt> {
            // Give a concurrent caller room to interleave
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            if self.fail {
                return Err(DbError::External("card_declined".to_string()));
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push((payment_intent_id.to_string(), amount_cents));
            Ok(RefundReceipt {
                refund_id: format!("re_{}", calls.len()),
            })
        }
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db).await;
        db
    }

    async fn seed(db: &Database) {
        db.catalog().upsert_product(&product("ctrl")).await.unwrap();
        db.orders()
            .create_order(&deposit_order("cs_dep", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refund_active_deposit() {
        let db = setup().await;
        let orders = db.orders();
        let gateway = FakeGateway::default();

        let (order, receipt) = refund_active_deposit(&orders, &gateway, "ada@example.com", "modkit-one")
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(receipt.refund_id, "re_1");
        assert_eq!(
            gateway.calls.lock().unwrap().as_slice(),
            &[("pi_cs_dep".to_string(), 25000)]
        );
        assert!(!orders
            .user_has_paid_deposit("ada@example.com", "modkit-one")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_second_refund_is_already_finalized() {
        let db = setup().await;
        let orders = db.orders();
        let gateway = FakeGateway::default();

        refund_deposit_order(&orders, &gateway, "cs_dep").await.unwrap();
        let err = refund_deposit_order(&orders, &gateway, "cs_dep")
            .await
            .unwrap_err();

        assert!(err.is_already_finalized());
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_active_deposit_is_not_found() {
        let db = setup().await;
        let orders = db.orders();
        let gateway = FakeGateway::default();

        let err = refund_active_deposit(&orders, &gateway, "bob@example.com", "modkit-one")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // Purchases are not refundable through this path
        orders
            .create_order(&purchase_order("cs_buy", "ctrl", None, 1))
            .await
            .unwrap();
        let err = refund_deposit_order(&orders, &gateway, "cs_buy")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(gateway.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_deposit_paid() {
        let db = setup().await;
        let orders = db.orders();
        let gateway = FakeGateway {
            fail: true,
            ..Default::default()
        };

        let err = refund_deposit_order(&orders, &gateway, "cs_dep")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::External(_)));

        let deposit = orders.get_by_id("cs_dep").await.unwrap().unwrap();
        assert_eq!(deposit.status, OrderStatus::Paid);
        assert!(orders
            .user_has_paid_deposit("ada@example.com", "modkit-one")
            .await
            .unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refunds_reach_gateway_once() {
        let temp = TempDb::new(4).await;
        seed(&temp.db).await;
        let orders = temp.db.orders();
        let gateway = FakeGateway::default();

        let (a, b) = tokio::join!(
            refund_deposit_order(&orders, &gateway, "cs_dep"),
            refund_deposit_order(&orders, &gateway, "cs_dep")
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(DbError::is_already_finalized));
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);

        let deposit = orders.get_by_id("cs_dep").await.unwrap().unwrap();
        assert_eq!(deposit.status, OrderStatus::Refunded);
    }
}
