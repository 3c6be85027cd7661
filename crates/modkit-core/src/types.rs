//! # Catalog Types
//!
//! Rows the catalog-sync process owns and this core reads at request time,
//! plus the cart line that references them.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Catalog Types                                   │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌─────────────────┐                          │
//! │  │    Product      │───────│    Variant      │                          │
//! │  │  sell_status    │       │  price_modifier │                          │
//! │  │  max/sold qty   │       │  max/sold qty   │                          │
//! │  └───────┬─────────┘       └─────────────────┘                          │
//! │          │ source                                                       │
//! │  ┌───────▼─────────┐       ┌─────────────────┐                          │
//! │  │   Dependency    │       │  CartLineItem   │  (voltage + limited flag │
//! │  │  requires, ...  │       │  price snapshot │   denormalised at add)   │
//! │  └─────────────────┘       └─────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Counter Ownership
//! Everything here is read-only to the core except `sold_quantity`, which
//! only the order ledger increments, inside the order transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Sell Status
// =============================================================================

/// Where a product sits in its sales lifecycle.
///
/// ```text
///   pre-sale ──(admin)──► pre-order ──(admin)──► for-sale ──► sold-out
///      │                      │
///   deposit CTA          wholesale price for
///   only, no price       active deposit holders
/// ```
/// Transitions are administrative and happen outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum SellStatus {
    ForSale,
    PreOrder,
    PreSale,
    SoldOut,
    Internal,
}

impl SellStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellStatus::ForSale => "for-sale",
            SellStatus::PreOrder => "pre-order",
            SellStatus::PreSale => "pre-sale",
            SellStatus::SoldOut => "sold-out",
            SellStatus::Internal => "internal",
        }
    }
}

impl fmt::Display for SellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SellStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "for-sale" => Ok(SellStatus::ForSale),
            "pre-order" => Ok(SellStatus::PreOrder),
            "pre-sale" => Ok(SellStatus::PreSale),
            "sold-out" => Ok(SellStatus::SoldOut),
            "internal" => Ok(SellStatus::Internal),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,

    /// List price in cents.
    pub base_price_cents: i64,

    /// Price offered to active deposit holders once the product is in pre-order.
    pub wholesale_price_cents: Option<i64>,

    /// Deposit charged while the product is in pre-sale.
    pub presale_deposit_price_cents: Option<i64>,

    pub cost_cents: i64,
    pub sell_status: SellStatus,

    /// `None` means unlimited.
    pub max_quantity: Option<i64>,
    pub sold_quantity: i64,

    pub has_variants: bool,

    /// Readiness stage; released at [`crate::RELEASED_DEV_STATUS`] and above.
    pub dev_status: i64,

    pub is_live: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    /// Units left before the product-level cap, `None` when unlimited.
    pub fn remaining(&self) -> Option<i64> {
        self.max_quantity.map(|max| max - self.sold_quantity)
    }

    /// `max_quantity is null OR sold_quantity < max_quantity`.
    pub fn is_available(&self) -> bool {
        self.max_quantity
            .map_or(true, |max| self.sold_quantity < max)
    }
}

// =============================================================================
// Variant
// =============================================================================

/// The axis a variant varies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum VariantType {
    Color,
    Voltage,
    Size,
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    pub variant_type: VariantType,
    pub variant_value: String,

    /// Added to the product's base price.
    pub price_modifier: i64,
    /// Added to the product's wholesale price.
    pub wholesale_price_modifier: i64,
    /// Added to the product's pre-sale deposit.
    pub presale_deposit_modifier: i64,

    pub is_limited_edition: bool,

    /// `None` means unlimited.
    pub max_quantity: Option<i64>,
    pub sold_quantity: i64,
}

impl Variant {
    /// Units left before the variant cap, `None` when unlimited.
    pub fn remaining(&self) -> Option<i64> {
        self.max_quantity.map(|max| max - self.sold_quantity)
    }

    pub fn is_available(&self) -> bool {
        self.max_quantity
            .map_or(true, |max| self.sold_quantity < max)
    }

    /// Voltage class carried by this variant, if it is a voltage variant.
    pub fn voltage(&self) -> Option<&str> {
        match self.variant_type {
            VariantType::Voltage => Some(self.variant_value.as_str()),
            _ => None,
        }
    }
}

/// Product-level counters derived from a product's variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRollup {
    pub max_quantity: Option<i64>,
    pub sold_quantity: i64,
}

/// Sums variant counters into the values a `has_variants` product must hold.
///
/// Only non-null maxima contribute; if no variant has a maximum the product
/// is unlimited.
///
/// ## Example
/// ```rust
/// use modkit_core::types::{rollup_variants, CounterRollup};
///
/// let rollup = rollup_variants(&[]);
/// assert_eq!(rollup, CounterRollup { max_quantity: None, sold_quantity: 0 });
/// ```
pub fn rollup_variants(variants: &[Variant]) -> CounterRollup {
    let max_quantity = variants
        .iter()
        .filter_map(|v| v.max_quantity)
        .fold(None, |acc: Option<i64>, max| Some(acc.unwrap_or(0) + max));

    CounterRollup {
        max_quantity,
        sold_quantity: variants.iter().map(|v| v.sold_quantity).sum(),
    }
}

// =============================================================================
// Dependency
// =============================================================================

/// Kind of relationship between two products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Hard dependency. Missing target yields a warning.
    Requires,
    /// Soft recommendation.
    Suggests,
    /// Both endpoints in one cart is a blocking error.
    Incompatible,
    /// Endpoints must share a voltage class.
    VoltageMatch,
}

/// Directed edge `product_id → depends_on_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Dependency {
    pub id: i64,
    pub product_id: String,
    pub depends_on_id: String,
    pub dependency_type: DependencyType,
    /// Human-readable explanation shown with the issue.
    pub message: Option<String>,
}

// =============================================================================
// Cart Line Item
// =============================================================================

/// One line of a cart as submitted for validation or checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLineItem {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
    /// Unit price frozen when the line was added.
    pub unit_price_cents: i64,
    #[serde(default)]
    pub voltage: Option<String>,
    #[serde(default)]
    pub is_limited_edition: bool,
}

impl CartLineItem {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        CartLineItem {
            product_id: product_id.into(),
            variant_id: None,
            quantity,
            unit_price_cents,
            voltage: None,
            is_limited_edition: false,
        }
    }

    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn with_voltage(mut self, voltage: impl Into<String>) -> Self {
        self.voltage = Some(voltage.into());
        self
    }

    pub fn limited_edition(mut self) -> Self {
        self.is_limited_edition = true;
        self
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(id: &str) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: format!("Module {}", id),
            category: "modules".to_string(),
            base_price_cents: 4900,
            wholesale_price_cents: None,
            presale_deposit_price_cents: None,
            cost_cents: 1500,
            sell_status: SellStatus::ForSale,
            max_quantity: None,
            sold_quantity: 0,
            has_variants: false,
            dev_status: crate::RELEASED_DEV_STATUS,
            is_live: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn variant(id: &str, product_id: &str) -> Variant {
        Variant {
            id: id.to_string(),
            product_id: product_id.to_string(),
            variant_type: VariantType::Color,
            variant_value: "black".to_string(),
            price_modifier: 0,
            wholesale_price_modifier: 0,
            presale_deposit_modifier: 0,
            is_limited_edition: false,
            max_quantity: None,
            sold_quantity: 0,
        }
    }

    pub fn limited_variant(id: &str, product_id: &str, max: i64, sold: i64) -> Variant {
        Variant {
            is_limited_edition: true,
            max_quantity: Some(max),
            sold_quantity: sold,
            ..variant(id, product_id)
        }
    }

    pub fn edge(id: i64, from: &str, to: &str, kind: DependencyType) -> Dependency {
        Dependency {
            id,
            product_id: from.to_string(),
            depends_on_id: to.to_string(),
            dependency_type: kind,
            message: None,
        }
    }
}
