//! # Pricing Service
//!
//! Resolves the price a given customer sees for a product and variant.
//!
//! ```text
//!   get_product / get_variant ──► sell_status == pre-order && email?
//!                                      │ yes                 │ no
//!                                      ▼                     │
//!                           user_has_paid_deposit            │
//!                                      │                     │
//!                                      └──────► display_price(..)
//! ```
//! The deposit predicate is read from the ledger on every request.

use tracing::debug;

use modkit_core::pricing::{deposit_amount, display_price, needs_deposit_lookup};
use modkit_core::{DisplayPrice, Product, Variant};

use crate::error::{DbError, DbResult};
use crate::store::{CatalogSource, DepositLedger};

#[derive(Debug, Clone)]
pub struct PricingService<C, D> {
    catalog: C,
    ledger: D,
}

impl<C: CatalogSource, D: DepositLedger> PricingService<C, D> {
    pub fn new(catalog: C, ledger: D) -> Self {
        PricingService { catalog, ledger }
    }

    /// Price to show `email` (or an anonymous visitor) for a product.
    ///
    /// `Ok(None)` while the product is in pre-sale.
    ///
    /// ## Errors
    /// `NotFound` when the product, or a variant of that product, is missing.
    pub async fn display_price_for(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
        email: Option<&str>,
    ) -> DbResult<Option<DisplayPrice>> {
        let (product, variant) = self.resolve(product_id, variant_id).await?;

        let has_paid_deposit = match email {
            Some(email) if needs_deposit_lookup(&product) => {
                self.ledger.user_has_paid_deposit(email, product_id).await?
            }
            _ => false,
        };

        let price = display_price(&product, variant.as_ref(), has_paid_deposit);

        debug!(
            product_id = %product_id,
            status = %product.sell_status,
            has_paid_deposit,
            price = ?price.map(|p| p.price_cents),
            "Display price resolved"
        );

        Ok(price)
    }

    /// Deposit owed for a pre-sale product, `Ok(None)` outside pre-sale.
    pub async fn deposit_amount_for(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<Option<i64>> {
        let (product, variant) = self.resolve(product_id, variant_id).await?;
        Ok(deposit_amount(&product, variant.as_ref()))
    }

    async fn resolve(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<(Product, Option<Variant>)> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))?;

        let variant = match variant_id {
            Some(id) => {
                let variant = self
                    .catalog
                    .get_variant(id)
                    .await?
                    .filter(|v| v.product_id == product.id)
                    .ok_or_else(|| DbError::not_found("Variant", id))?;
                Some(variant)
            }
            None => None,
        };

        Ok((product, variant))
    }
}
