//! # Checkout Webhook Processing
//!
//! Turns a payment-completed event into exactly one order.
//!
//! ## Delivery Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Processor delivers at least once                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  metadata ──► OrderMetadata::from_processor   (reject bad shapes here) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  create_order(session id = primary key)                                │
//! │       ├── Ok                      → WebhookOutcome::Created            │
//! │       ├── Ok, deposit not applied → WebhookOutcome::NeedsReconciliation│
//! │       └── UniqueViolation         → WebhookOutcome::AlreadyProcessed   │
//! │                                     (acknowledge, do not retry)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An earlier order is found by session id first, then by payment intent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use modkit_core::{
    DepositReconciliation, NewOrder, NewOrderItem, Order, OrderMetadata, ShippingAddress,
};

use crate::error::DbResult;
use crate::repository::OrderRepository;

/// One purchased line as echoed back by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub product_name: String,
    #[serde(default)]
    pub variant_name: Option<String>,
    pub unit_amount_cents: i64,
    pub quantity: i64,
}

/// Payment-completed event for one checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutCompleted {
    pub session_id: String,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    pub customer_email: String,
    pub amount_subtotal: i64,
    #[serde(default)]
    pub amount_tax: i64,
    #[serde(default)]
    pub amount_shipping: i64,
    pub amount_total: i64,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub line_items: Vec<CheckoutLineItem>,
    /// Flat string map written when the session was created.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Created(Order),
    /// The order was recorded but its deposit could not be consumed.
    NeedsReconciliation {
        order: Order,
        reason: DepositReconciliation,
    },
    /// The session (or its payment intent) was recorded by an earlier delivery.
    AlreadyProcessed { order_id: String },
}

impl CheckoutCompleted {
    /// Builds the ledger parameters for this event.
    ///
    /// A deposit becomes a single sentinel line charged at the session total.
    pub fn to_new_order(&self) -> DbResult<NewOrder> {
        let metadata = OrderMetadata::from_processor(&self.metadata)?;

        let items = match &metadata {
            OrderMetadata::Deposit {
                target_product_id, ..
            } => {
                let name = self
                    .line_items
                    .first()
                    .map(|line| line.product_name.as_str())
                    .unwrap_or(target_product_id.as_str());
                vec![NewOrderItem::deposit(name, self.amount_total)]
            }
            OrderMetadata::Purchase { .. } => self
                .line_items
                .iter()
                .map(|line| NewOrderItem {
                    product_id: line.product_id.clone(),
                    variant_id: line.variant_id.clone(),
                    product_name: line.product_name.clone(),
                    variant_name: line.variant_name.clone(),
                    unit_price_cents: line.unit_amount_cents,
                    quantity: line.quantity,
                })
                .collect(),
        };

        let order = NewOrder {
            id: self.session_id.clone(),
            payment_intent_id: self.payment_intent_id.clone(),
            customer_email: self.customer_email.clone(),
            subtotal_cents: self.amount_subtotal,
            tax_cents: self.amount_tax,
            shipping_cents: self.amount_shipping,
            total_cents: self.amount_total,
            shipping_address: self.shipping_address.clone(),
            metadata,
            items,
        };
        order.validate()?;

        Ok(order)
    }
}

/// Records a completed checkout, once.
///
/// A repeated delivery of the same session yields
/// [`WebhookOutcome::AlreadyProcessed`] and changes nothing.
pub async fn handle_checkout_completed(
    orders: &OrderRepository,
    event: &CheckoutCompleted,
) -> DbResult<WebhookOutcome> {
    debug!(session_id = %event.session_id, "Processing checkout.completed");

    if let Some(order_id) = existing_order_id(orders, event).await? {
        info!(session_id = %event.session_id, order_id = %order_id, "Duplicate webhook delivery ignored");
        return Ok(WebhookOutcome::AlreadyProcessed { order_id });
    }

    let params = event.to_new_order()?;

    match orders.create_order(&params).await {
        Ok(order) => {
            let reconciliation = order.metadata.deposit_reconciliation().cloned();
            match reconciliation {
                None => Ok(WebhookOutcome::Created(order)),
                Some(reason) => {
                    warn!(
                        order_id = %order.id,
                        reason = %reason,
                        "Paid order recorded; deposit needs reconciliation"
                    );
                    Ok(WebhookOutcome::NeedsReconciliation { order, reason })
                }
            }
        }
        // Lost a race with a concurrent delivery
        Err(e) if e.is_unique_violation() => match existing_order_id(orders, event).await? {
            Some(order_id) => {
                info!(
                    session_id = %event.session_id,
                    order_id = %order_id,
                    error = %e,
                    "Duplicate webhook delivery ignored"
                );
                Ok(WebhookOutcome::AlreadyProcessed { order_id })
            }
            None => Err(e),
        },
        Err(e) => Err(e),
    }
}

/// Id of an order already recorded for this session or its payment intent.
async fn existing_order_id(
    orders: &OrderRepository,
    event: &CheckoutCompleted,
) -> DbResult<Option<String>> {
    if let Some(order) = orders.get_by_id(&event.session_id).await? {
        return Ok(Some(order.id));
    }

    match event.payment_intent_id.as_deref() {
        Some(payment_intent_id) => Ok(orders
            .get_by_payment_intent(payment_intent_id)
            .await?
            .map(|order| order.id)),
        None => Ok(None),
    }
}
