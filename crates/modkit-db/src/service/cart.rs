//! # Cart Validation Service
//!
//! Fetches the catalog rows a cart touches and runs the pure checks.
//!
//! ## Fetch Plan
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  items ──► distinct product ids ─┬─► products_by_ids          ┐         │
//! │        └─► distinct variant ids ─┼─► variants_by_ids          ├ join    │
//! │                                  └─► dependencies_for_products┘         │
//! │                                             │                           │
//! │                                             ▼                           │
//! │                          CatalogSnapshot ──► validate_snapshot          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Three queries per validation whatever the cart size; none for an empty
//! cart.

use tracing::debug;

use modkit_core::validator::{product_ids, validate_snapshot, variant_ids};
use modkit_core::{CartLineItem, CartValidation, CatalogSnapshot, ValidationPolicy};

use crate::error::DbResult;
use crate::store::CatalogSource;

/// Validates carts against a catalog source.
#[derive(Debug, Clone)]
pub struct CartValidator<C> {
    catalog: C,
    policy: ValidationPolicy,
}

impl<C: CatalogSource> CartValidator<C> {
    pub fn new(catalog: C, policy: ValidationPolicy) -> Self {
        CartValidator { catalog, policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validates a cart.
    ///
    /// Rule violations come back inside the report. Only storage failures
    /// are returned as `Err`.
    pub async fn validate_cart(&self, items: &[CartLineItem]) -> DbResult<CartValidation> {
        if items.is_empty() {
            return Ok(CartValidation::empty());
        }

        let product_ids = product_ids(items);
        let variant_ids = variant_ids(items);

        let (products, variants, dependencies) = tokio::try_join!(
            self.catalog.products_by_ids(&product_ids),
            self.catalog.variants_by_ids(&variant_ids),
            self.catalog.dependencies_for_products(&product_ids),
        )?;

        let snapshot = CatalogSnapshot::new(products, variants, dependencies);
        let report = validate_snapshot(items, &snapshot, &self.policy);

        debug!(
            lines = items.len(),
            valid = report.valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Cart validated"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::testing::{limited_variant, product};
    use modkit_core::{Dependency, DependencyType, IssueKind, Product, Variant};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory catalog that counts round trips.
    #[derive(Default)]
    struct FakeCatalog {
        products: Vec<Product>,
        variants: Vec<Variant>,
        dependencies: Vec<Dependency>,
        calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CatalogSource for FakeCatalog {
        async fn products_by_ids(&self, ids: &[String]) -> DbResult<Vec<Product>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }

        async fn variants_by_ids(&self, ids: &[String]) -> DbResult<Vec<Variant>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .variants
                .iter()
                .filter(|v| ids.contains(&v.id))
                .cloned()
                .collect())
        }

        async fn dependencies_for_products(&self, ids: &[String]) -> DbResult<Vec<Dependency>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .dependencies
                .iter()
                .filter(|d| ids.contains(&d.product_id))
                .cloned()
                .collect())
        }

        async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
            Ok(self.products.iter().find(|p| p.id == id).cloned())
        }

        async fn get_variant(&self, id: &str) -> DbResult<Option<Variant>> {
            Ok(self.variants.iter().find(|v| v.id == id).cloned())
        }
    }

    fn requires(from: &str, to: &str) -> Dependency {
        Dependency {
            id: 1,
            product_id: from.to_string(),
            depends_on_id: to.to_string(),
            dependency_type: DependencyType::Requires,
            message: Some("Needs a power supply".to_string()),
        }
    }

    #[tokio::test]
    async fn test_empty_cart_makes_no_fetch() {
        let validator = CartValidator::new(FakeCatalog::default(), ValidationPolicy::default());
        let report = validator.validate_cart(&[]).await.unwrap();

        assert_eq!(report, CartValidation::empty());
        assert_eq!(validator.catalog.calls(), 0);
    }

    #[tokio::test]
    async fn test_three_fetches_regardless_of_cart_size() {
        let catalog = FakeCatalog {
            products: (0..20).map(|i| product(&format!("m{}", i))).collect(),
            ..Default::default()
        };
        let validator = CartValidator::new(catalog, ValidationPolicy::default());

        let items: Vec<CartLineItem> = (0..20)
            .map(|i| CartLineItem::new(format!("m{}", i), 1, 4900))
            .collect();
        let report = validator.validate_cart(&items).await.unwrap();

        assert!(report.valid);
        assert_eq!(validator.catalog.calls(), 3);
    }

    #[tokio::test]
    async fn test_missing_requirement_then_added() {
        let catalog = FakeCatalog {
            products: vec![product("ctrl"), product("psu-5")],
            dependencies: vec![requires("ctrl", "psu-5")],
            ..Default::default()
        };
        let validator = CartValidator::new(catalog, ValidationPolicy::default());

        let mut items = vec![CartLineItem::new("ctrl", 1, 4900)];
        let report = validator.validate_cart(&items).await.unwrap();
        assert!(report.valid);
        assert!(report.has_kind(IssueKind::MissingComponent));

        items.push(CartLineItem::new("psu-5", 1, 2900));
        let report = validator.validate_cart(&items).await.unwrap();
        assert!(!report.has_kind(IssueKind::MissingComponent));
    }

    #[tokio::test]
    async fn test_against_sqlite_catalog() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let mut strip = product("strip");
        strip.has_variants = true;
        catalog.upsert_product(&strip).await.unwrap();
        let mut gold = limited_variant("strip-gold", "strip", 10);
        gold.sold_quantity = 8;
        catalog.upsert_variant(&gold).await.unwrap();
        catalog.upsert_product(&product("ctrl-5")).await.unwrap();
        catalog.upsert_product(&product("psu-24")).await.unwrap();

        let validator = CartValidator::new(catalog, ValidationPolicy::default());
        let items = vec![
            CartLineItem::new("strip", 3, 4900)
                .with_variant("strip-gold")
                .limited_edition(),
            CartLineItem::new("ctrl-5", 1, 4900).with_voltage("5v"),
            CartLineItem::new("psu-24", 1, 2900).with_voltage("24v"),
            CartLineItem::new("discontinued", 1, 100),
        ];

        let report = validator.validate_cart(&items).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.count_kind(IssueKind::VoltageMismatch), 1);
        assert_eq!(report.count_kind(IssueKind::OutOfStock), 1);
        assert_eq!(report.count_kind(IssueKind::Unavailable), 1);
    }
}
