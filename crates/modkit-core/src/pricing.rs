//! # Pricing / Deposit Lifecycle
//!
//! Computes what a customer sees for a product in its current sell status.
//! Status changes themselves are administrative and never happen here.
//!
//! ## Display Price by Status
//! ```text
//! ┌────────────────┬──────────────────┬──────────────────────────────────────┐
//! │ sell_status    │ has paid deposit │ Displayed                            │
//! ├────────────────┼──────────────────┼──────────────────────────────────────┤
//! │ pre-sale       │ (any)            │ nothing, deposit call-to-action only │
//! │ pre-order      │ yes              │ wholesale + wholesale modifier       │
//! │ pre-order      │ no               │ base + price modifier                │
//! │ for-sale       │ (any)            │ base + price modifier                │
//! │ sold-out       │ (any)            │ base + price modifier (nominal)      │
//! │ internal       │ (any)            │ base + price modifier (nominal)      │
//! └────────────────┴──────────────────┴──────────────────────────────────────┘
//! ```
//!
//! A pre-order product with no wholesale price configured falls back to
//! the base price while still applying the wholesale modifier.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Product, SellStatus, Variant};

/// Which price list a [`DisplayPrice`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PriceType {
    Base,
    Wholesale,
}

/// Price to render for one product/variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DisplayPrice {
    #[serde(rename = "price")]
    pub price_cents: i64,
    #[serde(rename = "type")]
    pub price_type: PriceType,
}

impl DisplayPrice {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Price to display, or `None` while the product is in pre-sale.
///
/// ## Example
/// ```rust
/// # use modkit_core::pricing::{display_price, PriceType};
/// # use modkit_core::types::{Product, SellStatus};
/// # fn check(product: &Product) {
/// if product.sell_status == SellStatus::PreSale {
///     assert!(display_price(product, None, true).is_none());
/// }
/// # }
/// ```
pub fn display_price(
    product: &Product,
    variant: Option<&Variant>,
    has_paid_deposit: bool,
) -> Option<DisplayPrice> {
    match product.sell_status {
        SellStatus::PreSale => None,
        SellStatus::PreOrder if has_paid_deposit => {
            let wholesale = product
                .wholesale_price_cents
                .unwrap_or(product.base_price_cents);
            let price = Money::from_cents(wholesale)
                .with_modifier(variant.map(|v| v.wholesale_price_modifier));
            Some(DisplayPrice {
                price_cents: price.cents(),
                price_type: PriceType::Wholesale,
            })
        }
        _ => Some(base_price(product, variant)),
    }
}

fn base_price(product: &Product, variant: Option<&Variant>) -> DisplayPrice {
    let price = product
        .base_price()
        .with_modifier(variant.map(|v| v.price_modifier));
    DisplayPrice {
        price_cents: price.cents(),
        price_type: PriceType::Base,
    }
}

/// Deposit owed for a pre-sale product, in cents.
///
/// `None` outside pre-sale, or when no deposit price is configured.
pub fn deposit_amount(product: &Product, variant: Option<&Variant>) -> Option<i64> {
    if product.sell_status != SellStatus::PreSale {
        return None;
    }

    let deposit = Money::from_cents(product.presale_deposit_price_cents?)
        .with_modifier(variant.map(|v| v.presale_deposit_modifier));
    Some(deposit.cents())
}

/// Whether the pricing path needs to ask the ledger about deposits at all.
///
/// Only pre-order prices depend on the deposit predicate, so callers skip
/// the lookup for every other status.
#[inline]
pub fn needs_deposit_lookup(product: &Product) -> bool {
    product.sell_status == SellStatus::PreOrder
}
