//! # Orders
//!
//! Orders are created once per completed checkout. Deposits are ordinary
//! orders with a single item pointing at [`DEPOSIT_PRODUCT_ID`].
//!
//! ## Status Graph
//! ```text
//!   pending ──► paid ──┬──► applied     (terminal, deposit consumed)
//!      │               ├──► refunding ──► refunded  (terminal, deposit returned)
//!      │               │        └──► paid  (processor refused the refund)
//!      │               ├──► refunded
//!      │               ├──► fulfilled ──► shipped ──► delivered
//!      │               └──► shipped ─────────┘
//!      └──► cancelled ◄─── paid / fulfilled
//! ```
//!
//! ## Metadata
//! The processor carries a flat string map; it is parsed into
//! [`OrderMetadata`] once, at the webhook boundary, and stored as tagged
//! JSON. Nothing downstream reads untyped metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_id, validate_price_cents};
use crate::DEPOSIT_PRODUCT_ID;

// =============================================================================
// Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    /// Deposit credited against a final purchase.
    Applied,
    /// Deposit claimed by a refund that the processor has not confirmed yet.
    Refunding,
    Refunded,
    Fulfilled,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Applied => "applied",
            OrderStatus::Refunding => "refunding",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether `self → next` is an edge of the status graph.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Applied)
                | (Paid, Refunded)
                | (Paid, Refunding)
                | (Refunding, Refunded)
                | (Refunding, Paid)
                | (Paid, Fulfilled)
                | (Paid, Shipped)
                | (Paid, Cancelled)
                | (Fulfilled, Shipped)
                | (Fulfilled, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Checks a transition, returning `IllegalTransition` when it is not allowed.
    pub fn transition_to(&self, next: OrderStatus) -> CoreResult<OrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::IllegalTransition { from: *self, to: next })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Applied
                | OrderStatus::Refunded
                | OrderStatus::Delivered
                | OrderStatus::Cancelled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "applied" => Ok(OrderStatus::Applied),
            "refunding" => Ok(OrderStatus::Refunding),
            "refunded" => Ok(OrderStatus::Refunded),
            "fulfilled" => Ok(OrderStatus::Fulfilled),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Order Metadata
// =============================================================================

/// Typed contents of the order metadata column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "order_type", rename_all = "snake_case")]
#[ts(export)]
pub enum OrderMetadata {
    /// A pre-sale deposit reserving wholesale pricing for one product.
    Deposit {
        target_product_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_variant_id: Option<String>,
    },
    /// A regular purchase, optionally consuming a deposit.
    Purchase {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deposit_order_id: Option<String>,
        #[serde(
            rename = "deposit_applied",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        deposit_applied_cents: Option<i64>,
        /// Set when the referenced deposit could not be consumed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deposit_reconciliation: Option<DepositReconciliation>,
    },
}

/// Why a paid purchase was recorded without consuming its deposit.
///
/// The purchase is kept either way; these need an operator to settle the
/// difference with the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "reason", rename_all = "snake_case")]
#[ts(export)]
pub enum DepositReconciliation {
    /// The deposit had already left `paid` (applied, refunding or refunded).
    NotActive { status: OrderStatus },
    /// No deposit of this customer has the referenced id.
    UnknownDeposit,
}

impl fmt::Display for DepositReconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepositReconciliation::NotActive { status } => {
                write!(f, "deposit was already {}", status)
            }
            DepositReconciliation::UnknownDeposit => f.write_str("deposit not found for customer"),
        }
    }
}

impl OrderMetadata {
    pub fn purchase() -> Self {
        OrderMetadata::Purchase {
            deposit_order_id: None,
            deposit_applied_cents: None,
            deposit_reconciliation: None,
        }
    }

    /// A purchase consuming `deposit_order_id`.
    pub fn purchase_with_deposit(deposit_order_id: impl Into<String>, applied_cents: i64) -> Self {
        OrderMetadata::Purchase {
            deposit_order_id: Some(deposit_order_id.into()),
            deposit_applied_cents: Some(applied_cents),
            deposit_reconciliation: None,
        }
    }

    pub fn deposit(target_product_id: impl Into<String>, target_variant_id: Option<String>) -> Self {
        OrderMetadata::Deposit {
            target_product_id: target_product_id.into(),
            target_variant_id,
        }
    }

    /// Discriminant as stored in the `order_type` column.
    pub fn order_type(&self) -> &'static str {
        match self {
            OrderMetadata::Deposit { .. } => "deposit",
            OrderMetadata::Purchase { .. } => "purchase",
        }
    }

    pub fn is_deposit(&self) -> bool {
        matches!(self, OrderMetadata::Deposit { .. })
    }

    /// Deposit order consumed by this purchase, if any.
    pub fn applied_deposit(&self) -> Option<&str> {
        match self {
            OrderMetadata::Purchase {
                deposit_order_id: Some(id),
                ..
            } => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn deposit_reconciliation(&self) -> Option<&DepositReconciliation> {
        match self {
            OrderMetadata::Purchase {
                deposit_reconciliation,
                ..
            } => deposit_reconciliation.as_ref(),
            _ => None,
        }
    }

    /// Records that the referenced deposit was not consumed. No-op on deposits.
    pub fn flag_deposit(&mut self, reason: DepositReconciliation) {
        if let OrderMetadata::Purchase {
            deposit_reconciliation,
            ..
        } = self
        {
            *deposit_reconciliation = Some(reason);
        }
    }

    /// Parses the flat string map the payment processor echoes back.
    ///
    /// ## Errors
    /// `InvalidMetadata` when `order_type` is missing or unknown, a deposit
    /// lacks `target_product_id`, or `deposit_applied` is not an integer.
    pub fn from_processor(metadata: &HashMap<String, String>) -> CoreResult<Self> {
        let field = |key: &str| {
            metadata
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match field("order_type").as_deref() {
            Some("deposit") => {
                let target_product_id =
                    field("target_product_id").ok_or_else(|| CoreError::InvalidMetadata {
                        reason: "deposit order without target_product_id".to_string(),
                    })?;
                Ok(OrderMetadata::Deposit {
                    target_product_id,
                    target_variant_id: field("target_variant_id"),
                })
            }
            Some("purchase") => {
                let deposit_applied_cents = field("deposit_applied")
                    .map(|raw| {
                        raw.parse::<i64>().map_err(|_| CoreError::InvalidMetadata {
                            reason: format!("deposit_applied is not an integer: {}", raw),
                        })
                    })
                    .transpose()?;
                Ok(OrderMetadata::Purchase {
                    deposit_order_id: field("deposit_order_id"),
                    deposit_applied_cents,
                    deposit_reconciliation: None,
                })
            }
            Some(other) => Err(CoreError::InvalidMetadata {
                reason: format!("unknown order_type: {}", other),
            }),
            None => Err(CoreError::InvalidMetadata {
                reason: "missing order_type".to_string(),
            }),
        }
    }

    /// Reads the stored JSON form.
    pub fn from_json(raw: &str) -> CoreResult<Self> {
        serde_json::from_str(raw).map_err(|e| CoreError::InvalidMetadata {
            reason: e.to_string(),
        })
    }

    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::InvalidMetadata {
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Address snapshot taken from the checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

// =============================================================================
// Order
// =============================================================================

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    /// Checkout session id; the idempotency key.
    pub id: String,
    pub payment_intent_id: Option<String>,
    pub customer_email: String,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub shipping_address: Option<ShippingAddress>,
    pub metadata: OrderMetadata,
    pub tracking_number: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub applied_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub shipped_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn is_deposit(&self) -> bool {
        self.metadata.is_deposit()
    }

    /// Product a deposit order reserves.
    pub fn deposit_target(&self) -> Option<&str> {
        match &self.metadata {
            OrderMetadata::Deposit {
                target_product_id, ..
            } => Some(target_product_id.as_str()),
            _ => None,
        }
    }
}

/// Line snapshot frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// Catalog id, or [`DEPOSIT_PRODUCT_ID`] for deposits.
    pub product_id: String,
    pub variant_id: Option<String>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }

    #[inline]
    pub fn is_deposit(&self) -> bool {
        self.product_id == DEPOSIT_PRODUCT_ID
    }
}

// =============================================================================
// Order Creation Parameters
// =============================================================================

/// Everything needed to record one completed checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub id: String,
    pub payment_intent_id: Option<String>,
    pub customer_email: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub shipping_address: Option<ShippingAddress>,
    pub metadata: OrderMetadata,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl NewOrderItem {
    /// The single item of a deposit order.
    pub fn deposit(product_name: &str, amount_cents: i64) -> Self {
        NewOrderItem {
            product_id: DEPOSIT_PRODUCT_ID.to_string(),
            variant_id: None,
            product_name: format!("Pre-sale deposit: {}", product_name),
            variant_name: None,
            unit_price_cents: amount_cents,
            quantity: 1,
        }
    }

    #[inline]
    pub fn is_deposit(&self) -> bool {
        self.product_id == DEPOSIT_PRODUCT_ID
    }
}

impl NewOrder {
    /// Checks the shape of the parameters before they reach storage.
    ///
    /// The processor has already taken the money, so only what storage
    /// cannot hold is rejected: cart-side limits (email format, the
    /// per-line quantity cap) do not apply here. Deposit metadata must come
    /// with exactly one sentinel item, and the sentinel may not appear in a
    /// purchase.
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("id", &self.id)?;
        if self.customer_email.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "customer_email".to_string(),
            }
            .into());
        }
        validate_price_cents("total_cents", self.total_cents)?;

        if self.items.is_empty() {
            return Err(CoreError::InvalidMetadata {
                reason: "order has no items".to_string(),
            });
        }

        for item in &self.items {
            validate_id("product_id", &item.product_id)?;
            if item.quantity < 1 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }
            validate_price_cents("unit_price_cents", item.unit_price_cents)?;
        }

        let sentinel_items = self.items.iter().filter(|i| i.is_deposit()).count();
        match (&self.metadata, sentinel_items, self.items.len()) {
            (OrderMetadata::Deposit { .. }, 1, 1) => Ok(()),
            (OrderMetadata::Deposit { .. }, _, _) => Err(CoreError::InvalidMetadata {
                reason: "deposit order must carry exactly one deposit item".to_string(),
            }),
            (OrderMetadata::Purchase { .. }, 0, _) => Ok(()),
            (OrderMetadata::Purchase { .. }, _, _) => Err(CoreError::InvalidMetadata {
                reason: "purchase order contains a deposit item".to_string(),
            }),
        }
    }
}
