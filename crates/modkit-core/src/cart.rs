//! # Cart
//!
//! In-memory accumulation of cart lines between page loads. Lines snapshot
//! price, voltage and the limited-edition flag when added, so validation can
//! run without refetching variants.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_item(product, variant, price, qty)                                 │
//! │      same (product, variant) already present ──► quantity += qty        │
//! │      otherwise                                ──► push new line         │
//! │                                                                         │
//! │  update_quantity(product, variant, qty)                                 │
//! │      qty == 0 ──► remove line                                           │
//! │                                                                         │
//! │  remove_item(product, variant) / clear()                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `(product_id, variant_id)`
//! - Every quantity is in `1..=MAX_ITEM_QUANTITY`
//! - At most `MAX_CART_ITEMS` lines

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::DisplayPrice;
use crate::types::{CartLineItem, Product, Variant};
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

impl CartLineItem {
    /// Builds a line from catalog rows and the price the customer was shown.
    pub fn from_catalog(
        product: &Product,
        variant: Option<&Variant>,
        price: &DisplayPrice,
        quantity: i64,
    ) -> Self {
        CartLineItem {
            product_id: product.id.clone(),
            variant_id: variant.map(|v| v.id.clone()),
            quantity,
            unit_price_cents: price.price_cents,
            voltage: variant.and_then(|v| v.voltage()).map(str::to_string),
            is_limited_edition: variant.map_or(false, |v| v.is_limited_edition),
        }
    }

    fn matches(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.product_id == product_id && self.variant_id.as_deref() == variant_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartLineItem>,
    /// When the cart was created or last cleared.
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a line, or grows the existing line for the same product and variant.
    ///
    /// The price of an existing line is kept; only the quantity changes.
    pub fn add_item(
        &mut self,
        product: &Product,
        variant: Option<&Variant>,
        price: &DisplayPrice,
        quantity: i64,
    ) -> CoreResult<()> {
        validate_quantity(quantity)?;

        let variant_id = variant.map(|v| v.id.as_str());
        if let Some(line) = self
            .items
            .iter_mut()
            .find(|l| l.matches(&product.id, variant_id))
        {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        self.items
            .push(CartLineItem::from_catalog(product, variant, price, quantity));
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(
        &mut self,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id, variant_id);
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        validate_quantity(quantity)?;

        match self
            .items
            .iter_mut()
            .find(|l| l.matches(product_id, variant_id))
        {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::LineNotInCart {
                product_id: product_id.to_string(),
            }),
        }
    }

    pub fn remove_item(&mut self, product_id: &str, variant_id: Option<&str>) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|l| !l.matches(product_id, variant_id));

        if self.items.len() == initial_len {
            Err(CoreError::LineNotInCart {
                product_id: product_id.to_string(),
            })
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.created_at = Utc::now();
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|l| l.quantity).sum()
    }

    /// Sum of the snapshotted line totals.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn lines(&self) -> &[CartLineItem] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceType;
    use crate::types::fixtures::{limited_variant, product, variant};
    use crate::types::VariantType;

    fn base(cents: i64) -> DisplayPrice {
        DisplayPrice {
            price_cents: cents,
            price_type: PriceType::Base,
        }
    }

    #[test]
    fn test_add_merges_same_variant() {
        let mut cart = Cart::new();
        let p = product("strip");
        let v = variant("strip-black", "strip");

        cart.add_item(&p, Some(&v), &base(2900), 2).unwrap();
        cart.add_item(&p, Some(&v), &base(2900), 3).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
        assert_eq!(cart.subtotal().cents(), 14500);
    }

    #[test]
    fn test_different_variants_are_separate_lines() {
        let mut cart = Cart::new();
        let p = product("strip");

        cart.add_item(&p, Some(&variant("black", "strip")), &base(2900), 1)
            .unwrap();
        cart.add_item(&p, Some(&variant("white", "strip")), &base(2900), 1)
            .unwrap();

        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_line_snapshots_voltage_and_limited_flag() {
        let mut cart = Cart::new();
        let p = product("psu");
        let v = Variant {
            variant_type: VariantType::Voltage,
            variant_value: "24v".to_string(),
            ..limited_variant("psu-24", "psu", 50, 0)
        };

        cart.add_item(&p, Some(&v), &base(3900), 1).unwrap();

        let line = &cart.lines()[0];
        assert_eq!(line.voltage.as_deref(), Some("24v"));
        assert!(line.is_limited_edition);
        assert_eq!(line.unit_price_cents, 3900);
    }

    #[test]
    fn test_quantity_limits() {
        let mut cart = Cart::new();
        let p = product("ctrl");

        cart.add_item(&p, None, &base(4900), 998).unwrap();
        assert!(matches!(
            cart.add_item(&p, None, &base(4900), 2),
            Err(CoreError::QuantityTooLarge { .. })
        ));
        assert!(cart.add_item(&p, None, &base(4900), 0).is_err());
        assert!(cart.update_quantity("ctrl", None, 1000).is_err());
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut cart = Cart::new();
        cart.add_item(&product("ctrl"), None, &base(4900), 1).unwrap();

        cart.update_quantity("ctrl", None, 0).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            cart.update_quantity("ctrl", None, 2),
            Err(CoreError::LineNotInCart { .. })
        ));
    }

    #[test]
    fn test_cart_size_limit() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add_item(&product(&format!("p{}", i)), None, &base(100), 1)
                .unwrap();
        }
        assert!(matches!(
            cart.add_item(&product("one-more"), None, &base(100), 1),
            Err(CoreError::CartTooLarge { .. })
        ));
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.add_item(&product("ctrl"), None, &base(4900), 1).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.remove_item("ctrl", None).is_err());
    }
}
