//! # Order Repository
//!
//! The order ledger: order creation with its counter increments, status
//! changes, and the deposit lookups the pricing path depends on.
//!
//! ## Order Creation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      create_order (one transaction)                     │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ├── INSERT orders            ← PK = checkout session id              │
//! │    │                              (2nd delivery fails here, rollback)   │
//! │    ├── for each line:                                                   │
//! │    │     INSERT order_items     ← name/price snapshot                   │
//! │    │     UPDATE products  SET sold_quantity = sold_quantity + q         │
//! │    │     UPDATE variants  SET sold_quantity = sold_quantity + q         │
//! │    │                                                                    │
//! │    └── purchase with deposit_order_id:                                  │
//! │          UPDATE orders SET status = 'applied' WHERE status = 'paid'     │
//! │          (no row → flag deposit_reconciliation in metadata)             │
//! │    │                                                                    │
//! │  COMMIT  ← all of it, or none of it                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A deposit that can no longer be consumed never blocks the purchase: the
//! money has moved, so the order is recorded and the mismatch is left in
//! its metadata for an operator.
//!
//! ## Refund Claim
//! ```text
//!   paid ──claim──► refunding ──complete──► refunded
//!                       └──────release─────► paid
//! ```
//! Each arrow is one guarded `UPDATE ... WHERE status = <from>`, so only
//! one caller can hold the claim.
//!
//! ## Deposit Predicate
//! A customer holds an active deposit for a product when an order exists
//! with the deposit sentinel item, their email, that target product, and
//! status `paid`. `applied` and `refunded` deposits no longer count.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use modkit_core::validation::normalize_email;
use modkit_core::{
    CoreError, DepositReconciliation, NewOrder, Order, OrderItem, OrderMetadata, OrderStatus,
    ShippingAddress, DEPOSIT_PRODUCT_ID,
};

use crate::error::{DbError, DbResult};

const ORDER_COLUMNS: &str = "id, payment_intent_id, customer_email, status, subtotal_cents, \
     tax_cents, shipping_cents, total_cents, shipping_address, order_type, metadata, \
     tracking_number, created_at, updated_at, applied_at, shipped_at";

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw `orders` row. JSON columns are parsed in [`TryFrom`].
#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    payment_intent_id: Option<String>,
    customer_email: String,
    status: OrderStatus,
    subtotal_cents: i64,
    tax_cents: i64,
    shipping_cents: i64,
    total_cents: i64,
    shipping_address: Option<String>,
    order_type: String,
    metadata: String,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    applied_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let metadata = OrderMetadata::from_json(&row.metadata)?;

        if metadata.order_type() != row.order_type {
            return Err(DbError::Domain(CoreError::InvalidMetadata {
                reason: format!(
                    "order {} has order_type '{}' but metadata of type '{}'",
                    row.id,
                    row.order_type,
                    metadata.order_type()
                ),
            }));
        }

        let shipping_address = row
            .shipping_address
            .as_deref()
            .map(serde_json::from_str::<ShippingAddress>)
            .transpose()?;

        Ok(Order {
            id: row.id,
            payment_intent_id: row.payment_intent_id,
            customer_email: row.customer_email,
            status: row.status,
            subtotal_cents: row.subtotal_cents,
            tax_cents: row.tax_cents,
            shipping_cents: row.shipping_cents,
            total_cents: row.total_cents,
            shipping_address,
            metadata,
            tracking_number: row.tracking_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
            applied_at: row.applied_at,
            shipped_at: row.shipped_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the order ledger.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Records a completed checkout.
    ///
    /// ## Errors
    /// - `UniqueViolation` when the session id (or payment intent) was
    ///   already recorded. Nothing is written.
    /// - `NotFound` when a line references a product or variant that does
    ///   not exist.
    ///
    /// A referenced deposit that is missing, belongs to someone else, or is
    /// no longer `paid` does not fail the call; the returned order carries
    /// [`OrderMetadata::deposit_reconciliation`] instead.
    pub async fn create_order(&self, params: &NewOrder) -> DbResult<Order> {
        params.validate()?;

        let now = Utc::now();
        let email = normalize_email(&params.customer_email);
        let address_json = params
            .shipping_address
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        debug!(
            order_id = %params.id,
            order_type = params.metadata.order_type(),
            items = params.items.len(),
            "Creating order"
        );

        let mut tx = self.pool.begin().await?;

        let metadata_json = params.metadata.to_json()?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, payment_intent_id, customer_email, status,
                subtotal_cents, tax_cents, shipping_cents, total_cents,
                shipping_address, order_type, metadata,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            "#,
        )
        .bind(&params.id)
        .bind(&params.payment_intent_id)
        .bind(&email)
        .bind(OrderStatus::Paid)
        .bind(params.subtotal_cents)
        .bind(params.tax_cents)
        .bind(params.shipping_cents)
        .bind(params.total_cents)
        .bind(&address_json)
        .bind(params.metadata.order_type())
        .bind(&metadata_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &params.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, variant_id,
                    product_name, variant_name, unit_price_cents, quantity, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&params.id)
            .bind(&item.product_id)
            .bind(&item.variant_id)
            .bind(&item.product_name)
            .bind(&item.variant_name)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // The deposit sentinel is not a catalog row
            if item.is_deposit() {
                continue;
            }

            increment_sold(&mut tx, &item.product_id, item.variant_id.as_deref(), item.quantity)
                .await?;
        }

        let mut metadata = params.metadata.clone();
        if let Some(deposit_id) = params.metadata.applied_deposit() {
            let applied = transition_deposit(
                &mut tx,
                deposit_id,
                Some(&email),
                OrderStatus::Paid,
                OrderStatus::Applied,
                now,
            )
            .await;

            let reconciliation = match applied {
                Ok(()) => None,
                Err(DbError::AlreadyFinalized { status, .. }) => {
                    Some(DepositReconciliation::NotActive { status })
                }
                Err(DbError::NotFound { .. }) => Some(DepositReconciliation::UnknownDeposit),
                Err(e) => return Err(e),
            };

            match reconciliation {
                None => {
                    info!(order_id = %params.id, deposit_order_id = %deposit_id, "Deposit applied")
                }
                Some(reason) => {
                    warn!(
                        order_id = %params.id,
                        deposit_order_id = %deposit_id,
                        reason = %reason,
                        "Deposit not applied; purchase recorded for reconciliation"
                    );
                    metadata.flag_deposit(reason);

                    sqlx::query("UPDATE orders SET metadata = ?1 WHERE id = ?2")
                        .bind(metadata.to_json()?)
                        .bind(&params.id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;

        info!(
            order_id = %params.id,
            order_type = params.metadata.order_type(),
            total_cents = params.total_cents,
            "Order created"
        );

        Ok(Order {
            id: params.id.clone(),
            payment_intent_id: params.payment_intent_id.clone(),
            customer_email: email,
            status: OrderStatus::Paid,
            subtotal_cents: params.subtotal_cents,
            tax_cents: params.tax_cents,
            shipping_cents: params.shipping_cents,
            total_cents: params.total_cents,
            shipping_address: params.shipping_address.clone(),
            metadata,
            tracking_number: None,
            created_at: now,
            updated_at: now,
            applied_at: None,
            shipped_at: None,
        })
    }

    /// Sets an order's status.
    ///
    /// `shipped` stamps `shipped_at` once and stores `tracking_number` when
    /// given; `applied` stamps `applied_at`. The prior status is not
    /// checked; use [`OrderStatus::can_transition_to`] or
    /// [`Self::finalize_deposit`] when legality matters.
    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> DbResult<Order> {
        debug!(order_id = %order_id, status = %status, "Updating order status");

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?1,
                shipped_at = CASE WHEN ?1 = 'shipped' THEN COALESCE(shipped_at, ?2) ELSE shipped_at END,
                tracking_number = CASE WHEN ?1 = 'shipped' THEN COALESCE(?3, tracking_number) ELSE tracking_number END,
                applied_at = CASE WHEN ?1 = 'applied' THEN ?2 ELSE applied_at END,
                updated_at = ?2
            WHERE id = ?4
            "#,
        )
        .bind(status)
        .bind(Utc::now())
        .bind(tracking_number)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        info!(order_id = %order_id, status = %status, "Order status updated");

        self.get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))
    }

    /// Moves a paid deposit to `applied` or `refunded`, exactly once.
    ///
    /// ## Errors
    /// - `NotFound` when no deposit order has this id
    /// - `AlreadyFinalized` when it is no longer `paid`
    /// - `Domain(IllegalTransition)` for any other target status
    pub async fn finalize_deposit(&self, order_id: &str, to: OrderStatus) -> DbResult<Order> {
        if !matches!(to, OrderStatus::Applied | OrderStatus::Refunded) {
            return Err(CoreError::IllegalTransition {
                from: OrderStatus::Paid,
                to,
            }
            .into());
        }

        self.move_deposit(order_id, OrderStatus::Paid, to).await?;
        info!(order_id = %order_id, status = %to, "Deposit finalized");

        self.get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))
    }

    /// Claims a paid deposit for refunding (`paid → refunding`).
    ///
    /// Only one caller can win the claim; the others get `AlreadyFinalized`
    /// with the status they found.
    pub async fn claim_deposit_refund(&self, order_id: &str) -> DbResult<()> {
        self.move_deposit(order_id, OrderStatus::Paid, OrderStatus::Refunding)
            .await?;
        debug!(order_id = %order_id, "Deposit claimed for refund");
        Ok(())
    }

    /// Returns a claimed deposit to `paid` after the processor refused the refund.
    pub async fn release_deposit_refund(&self, order_id: &str) -> DbResult<()> {
        self.move_deposit(order_id, OrderStatus::Refunding, OrderStatus::Paid)
            .await?;
        info!(order_id = %order_id, "Deposit refund claim released");
        Ok(())
    }

    /// Marks a claimed deposit `refunded`.
    pub async fn complete_deposit_refund(&self, order_id: &str) -> DbResult<Order> {
        self.move_deposit(order_id, OrderStatus::Refunding, OrderStatus::Refunded)
            .await?;
        info!(order_id = %order_id, "Deposit refunded");

        self.get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))
    }

    async fn move_deposit(&self, order_id: &str, from: OrderStatus, to: OrderStatus) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        transition_deposit(&mut conn, order_id, None, from, to, Utc::now()).await
    }

    pub async fn get_by_id(&self, order_id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    /// The order recorded for a processor payment intent.
    pub async fn get_by_payment_intent(&self, payment_intent_id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE payment_intent_id = ?1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, variant_id, product_name, variant_name,
                   unit_price_cents, quantity, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// The active (`paid`) deposit of `email` for `product_id`.
    ///
    /// Should several exist, the earliest created one is returned.
    pub async fn get_deposit_order(&self, email: &str, product_id: &str) -> DbResult<Option<Order>> {
        let sql = format!(
            r#"
            SELECT {} FROM orders o
            WHERE o.customer_email = ?1
              AND o.order_type = 'deposit'
              AND o.status = 'paid'
              AND json_extract(o.metadata, '$.target_product_id') = ?2
              AND EXISTS (
                  SELECT 1 FROM order_items i
                  WHERE i.order_id = o.id AND i.product_id = ?3
              )
            ORDER BY o.created_at, o.rowid
            LIMIT 1
            "#,
            ORDER_COLUMNS
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(normalize_email(email))
            .bind(product_id)
            .bind(DEPOSIT_PRODUCT_ID)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    /// Whether `email` holds an active deposit for `product_id`.
    ///
    /// Evaluated against storage on every call.
    pub async fn user_has_paid_deposit(&self, email: &str, product_id: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM orders o
                WHERE o.customer_email = ?1
                  AND o.order_type = 'deposit'
                  AND o.status = 'paid'
                  AND json_extract(o.metadata, '$.target_product_id') = ?2
                  AND EXISTS (
                      SELECT 1 FROM order_items i
                      WHERE i.order_id = o.id AND i.product_id = ?3
                  )
            )
            "#,
        )
        .bind(normalize_email(email))
        .bind(product_id)
        .bind(DEPOSIT_PRODUCT_ID)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Adds `quantity` to the product counter and, when given, the variant counter.
async fn increment_sold(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_id: Option<&str>,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE products SET sold_quantity = sold_quantity + ?1 WHERE id = ?2")
        .bind(quantity)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        warn!(product_id = %product_id, "Order line references unknown product");
        return Err(DbError::not_found("Product", product_id));
    }

    if let Some(variant_id) = variant_id {
        let result = sqlx::query(
            "UPDATE variants SET sold_quantity = sold_quantity + ?1 WHERE id = ?2 AND product_id = ?3",
        )
        .bind(quantity)
        .bind(variant_id)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            warn!(variant_id = %variant_id, product_id = %product_id, "Order line references unknown variant");
            return Err(DbError::not_found("Variant", variant_id));
        }
    }

    debug!(product_id = %product_id, variant_id = ?variant_id, quantity, "Sold counters incremented");
    Ok(())
}

/// Guarded `from → to` update of a deposit order.
///
/// When the update touches no row, a second read tells a missing deposit
/// apart from one that is in some other state.
async fn transition_deposit(
    conn: &mut SqliteConnection,
    order_id: &str,
    customer_email: Option<&str>,
    from: OrderStatus,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = ?1,
            applied_at = CASE WHEN ?1 = 'applied' THEN ?2 ELSE applied_at END,
            updated_at = ?2
        WHERE id = ?3
          AND order_type = 'deposit'
          AND status = ?5
          AND (?4 IS NULL OR customer_email = ?4)
        "#,
    )
    .bind(to)
    .bind(now)
    .bind(order_id)
    .bind(customer_email)
    .bind(from)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let current: Option<(OrderStatus, String, String)> = sqlx::query_as(
        "SELECT status, order_type, customer_email FROM orders WHERE id = ?1",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    match current {
        Some((status, order_type, email))
            if order_type == "deposit" && customer_email.map_or(true, |e| e == email) =>
        {
            debug!(order_id = %order_id, status = %status, expected = %from, "Deposit not in expected state");
            Err(DbError::already_finalized("Deposit order", order_id, status))
        }
        _ => Err(DbError::not_found("Deposit order", order_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::testing::{deposit_order, limited_variant, product, purchase_order, TempDb};
    use modkit_core::{NewOrderItem, SellStatus};

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_catalog(&db).await;
        db
    }

    async fn seed_catalog(db: &Database) {
        let catalog = db.catalog();

        let mut modkit = product("modkit-one");
        modkit.sell_status = SellStatus::PreSale;
        modkit.presale_deposit_price_cents = Some(25000);
        catalog.upsert_product(&modkit).await.unwrap();

        let mut strip = product("strip");
        strip.has_variants = true;
        catalog.upsert_product(&strip).await.unwrap();
        catalog
            .upsert_variant(&limited_variant("strip-gold", "strip", 10))
            .await
            .unwrap();
    }

    async fn sold(db: &Database, product_id: &str) -> i64 {
        db.catalog()
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .sold_quantity
    }

    #[tokio::test]
    async fn test_create_order_increments_counters() {
        let db = setup().await;
        let orders = db.orders();

        let order = orders
            .create_order(&purchase_order("cs_1", "strip", Some("strip-gold"), 3))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);

        assert_eq!(sold(&db, "strip").await, 3);
        let variant = db.catalog().get_variant("strip-gold").await.unwrap().unwrap();
        assert_eq!(variant.sold_quantity, 3);

        let items = orders.get_items("cs_1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Module strip");
    }

    #[tokio::test]
    async fn test_second_delivery_is_rejected_without_side_effects() {
        let db = setup().await;
        let orders = db.orders();
        let params = purchase_order("cs_dup", "strip", Some("strip-gold"), 2);

        orders.create_order(&params).await.unwrap();
        let err = orders.create_order(&params).await.unwrap_err();
        assert!(err.is_unique_violation());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(sold(&db, "strip").await, 2);
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back_everything() {
        let db = setup().await;
        let orders = db.orders();

        let mut params = purchase_order("cs_bad", "strip", None, 1);
        params.items.push(NewOrderItem {
            product_id: "ghost".to_string(),
            variant_id: None,
            product_name: "Ghost".to_string(),
            variant_name: None,
            unit_price_cents: 100,
            quantity: 1,
        });

        let err = orders.create_order(&params).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(orders.get_by_id("cs_bad").await.unwrap().is_none());
        assert_eq!(sold(&db, "strip").await, 0);
    }

    #[tokio::test]
    async fn test_deposit_lifecycle() {
        let db = setup().await;
        let orders = db.orders();

        orders
            .create_order(&deposit_order("cs_dep", "Ada@Example.com", "modkit-one", 25000))
            .await
            .unwrap();

        assert!(orders
            .user_has_paid_deposit("ada@example.com", "modkit-one")
            .await
            .unwrap());
        assert!(!orders
            .user_has_paid_deposit("ada@example.com", "strip")
            .await
            .unwrap());
        assert!(!orders
            .user_has_paid_deposit("bob@example.com", "modkit-one")
            .await
            .unwrap());

        // Deposits do not touch catalog counters
        assert_eq!(sold(&db, "modkit-one").await, 0);

        let applied = orders
            .update_order_status("cs_dep", OrderStatus::Applied, None)
            .await
            .unwrap();
        assert!(applied.applied_at.is_some());
        assert!(!orders
            .user_has_paid_deposit("ada@example.com", "modkit-one")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_refunded_deposit_is_no_longer_active() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&deposit_order("cs_dep", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();

        orders
            .update_order_status("cs_dep", OrderStatus::Refunded, None)
            .await
            .unwrap();
        assert!(orders
            .get_deposit_order("ada@example.com", "modkit-one")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_deposit_order_returns_earliest() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&deposit_order("cs_first", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();
        orders
            .create_order(&deposit_order("cs_second", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();

        let found = orders
            .get_deposit_order("ada@example.com", "modkit-one")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "cs_first");
        assert_eq!(found.deposit_target(), Some("modkit-one"));
    }

    #[tokio::test]
    async fn test_shipped_stamps_once() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&purchase_order("cs_ship", "strip", None, 1))
            .await
            .unwrap();

        let shipped = orders
            .update_order_status("cs_ship", OrderStatus::Shipped, Some("1Z999"))
            .await
            .unwrap();
        let first_stamp = shipped.shipped_at.unwrap();
        assert_eq!(shipped.tracking_number.as_deref(), Some("1Z999"));

        let again = orders
            .update_order_status("cs_ship", OrderStatus::Shipped, None)
            .await
            .unwrap();
        assert_eq!(again.shipped_at, Some(first_stamp));
        assert_eq!(again.tracking_number.as_deref(), Some("1Z999"));
        assert!(again.applied_at.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let db = setup().await;
        let err = db
            .orders()
            .update_order_status("nope", OrderStatus::Paid, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_finalize_deposit_exactly_once() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&deposit_order("cs_dep", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();

        let refunded = orders
            .finalize_deposit("cs_dep", OrderStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);

        let err = orders
            .finalize_deposit("cs_dep", OrderStatus::Applied)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::AlreadyFinalized {
                status: OrderStatus::Refunded,
                ..
            }
        ));

        let err = orders
            .finalize_deposit("missing", OrderStatus::Refunded)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = orders
            .finalize_deposit("cs_dep", OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::IllegalTransition { .. })));
    }

    #[tokio::test]
    async fn test_purchase_applies_deposit_in_same_transaction() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&deposit_order("cs_dep", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();

        let mut purchase = purchase_order("cs_final", "strip", None, 1);
        purchase.metadata = OrderMetadata::purchase_with_deposit("cs_dep", 25000);
        let order = orders.create_order(&purchase).await.unwrap();
        assert!(order.metadata.deposit_reconciliation().is_none());

        let deposit = orders.get_by_id("cs_dep").await.unwrap().unwrap();
        assert_eq!(deposit.status, OrderStatus::Applied);
        assert!(deposit.applied_at.is_some());

        // A second purchase cannot consume the same deposit, but is still recorded
        let mut again = purchase_order("cs_final_2", "strip", None, 1);
        again.metadata = purchase.metadata.clone();
        let order = orders.create_order(&again).await.unwrap();
        assert_eq!(
            order.metadata.deposit_reconciliation(),
            Some(&DepositReconciliation::NotActive {
                status: OrderStatus::Applied
            })
        );
        assert_eq!(sold(&db, "strip").await, 2);
    }

    #[tokio::test]
    async fn test_refunded_deposit_does_not_block_final_purchase() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&deposit_order("cs_dep", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();
        orders
            .finalize_deposit("cs_dep", OrderStatus::Refunded)
            .await
            .unwrap();

        let mut purchase = purchase_order("cs_final", "strip", Some("strip-gold"), 1);
        purchase.metadata = OrderMetadata::purchase_with_deposit("cs_dep", 25000);
        orders.create_order(&purchase).await.unwrap();

        let stored = orders.get_by_id("cs_final").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(
            stored.metadata.deposit_reconciliation(),
            Some(&DepositReconciliation::NotActive {
                status: OrderStatus::Refunded
            })
        );
        assert_eq!(sold(&db, "strip").await, 1);

        let deposit = orders.get_by_id("cs_dep").await.unwrap().unwrap();
        assert_eq!(deposit.status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn test_deposit_of_another_customer_is_not_applied() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&deposit_order("cs_dep", "bob@example.com", "modkit-one", 25000))
            .await
            .unwrap();

        let mut purchase = purchase_order("cs_final", "strip", None, 1);
        purchase.metadata = OrderMetadata::purchase_with_deposit("cs_dep", 25000);
        let order = orders.create_order(&purchase).await.unwrap();
        assert_eq!(
            order.metadata.deposit_reconciliation(),
            Some(&DepositReconciliation::UnknownDeposit)
        );
        assert!(orders.get_by_id("cs_final").await.unwrap().is_some());

        let deposit = orders.get_by_id("cs_dep").await.unwrap().unwrap();
        assert_eq!(deposit.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_stored_metadata_round_trips() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&deposit_order("cs_dep", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();

        let stored = orders.get_by_id("cs_dep").await.unwrap().unwrap();
        assert_eq!(
            stored.metadata,
            OrderMetadata::deposit("modkit-one", None)
        );
        assert_eq!(stored.customer_email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_refund_claim_is_exclusive() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&deposit_order("cs_dep", "ada@example.com", "modkit-one", 25000))
            .await
            .unwrap();

        orders.claim_deposit_refund("cs_dep").await.unwrap();
        let err = orders.claim_deposit_refund("cs_dep").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::AlreadyFinalized {
                status: OrderStatus::Refunding,
                ..
            }
        ));

        // A claimed deposit no longer prices as active
        assert!(!orders
            .user_has_paid_deposit("ada@example.com", "modkit-one")
            .await
            .unwrap());

        orders.release_deposit_refund("cs_dep").await.unwrap();
        assert!(orders
            .user_has_paid_deposit("ada@example.com", "modkit-one")
            .await
            .unwrap());

        orders.claim_deposit_refund("cs_dep").await.unwrap();
        let refunded = orders.complete_deposit_refund("cs_dep").await.unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);
        assert!(orders.release_deposit_refund("cs_dep").await.unwrap_err().is_already_finalized());
    }

    #[tokio::test]
    async fn test_get_by_payment_intent() {
        let db = setup().await;
        let orders = db.orders();
        orders
            .create_order(&purchase_order("cs_1", "strip", None, 1))
            .await
            .unwrap();

        let found = orders.get_by_payment_intent("pi_cs_1").await.unwrap().unwrap();
        assert_eq!(found.id, "cs_1");
        assert!(orders.get_by_payment_intent("pi_none").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deliveries_record_one_order() {
        let temp = TempDb::new(4).await;
        seed_catalog(&temp.db).await;
        let orders = temp.db.orders();
        let params = purchase_order("cs_race", "strip", Some("strip-gold"), 1);

        let (a, b) = tokio::join!(orders.create_order(&params), orders.create_order(&params));

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(DbError::is_unique_violation));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(temp.db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(sold(&temp.db, "strip").await, 1);
        let variant = temp.db.catalog().get_variant("strip-gold").await.unwrap().unwrap();
        assert_eq!(variant.sold_quantity, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_for_last_unit_both_count() {
        let temp = TempDb::new(4).await;
        seed_catalog(&temp.db).await;
        let catalog = temp.db.catalog();
        catalog
            .upsert_variant(&limited_variant("strip-gold", "strip", 1))
            .await
            .unwrap();
        let orders = temp.db.orders();

        let first = purchase_order("cs_a", "strip", Some("strip-gold"), 1);
        let second = purchase_order("cs_b", "strip", Some("strip-gold"), 1);
        let (a, b) = tokio::join!(orders.create_order(&first), orders.create_order(&second));
        a.unwrap();
        b.unwrap();

        // Both payments went through; neither increment is lost
        let variant = catalog.get_variant("strip-gold").await.unwrap().unwrap();
        assert_eq!(variant.sold_quantity, 2);
        assert_eq!(sold(&temp.db, "strip").await, 2);
    }
}
