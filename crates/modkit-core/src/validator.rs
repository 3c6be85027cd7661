//! # Cart Validator (pure half)
//!
//! Combines compatibility and availability over a catalog snapshot that the
//! caller has already fetched. The storage half lives in
//! `modkit_db::service::cart`, which fills a [`CatalogSnapshot`] with
//! exactly three batched queries and hands it here.
//!
//! ```text
//!   items ──► ids ──► [products batch] [variants batch] [edges batch]
//!                                  │
//!                                  ▼
//!                        CatalogSnapshot ──► validate_snapshot ──► CartValidation
//! ```

use std::collections::{BTreeSet, HashMap};

use crate::availability::{check_availability, ValidationPolicy};
use crate::compatibility::check_compatibility;
use crate::issue::{CartValidation, IssueSet};
use crate::types::{CartLineItem, Dependency, Product, Variant};

/// Catalog rows relevant to one cart, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub products: HashMap<String, Product>,
    pub variants: HashMap<String, Variant>,
    /// Edges whose source is a cart product.
    pub dependencies: Vec<Dependency>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>, variants: Vec<Variant>, dependencies: Vec<Dependency>) -> Self {
        CatalogSnapshot {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            variants: variants.into_iter().map(|v| (v.id.clone(), v)).collect(),
            dependencies,
        }
    }
}

/// Distinct product ids in a cart, sorted.
pub fn product_ids(items: &[CartLineItem]) -> Vec<String> {
    items
        .iter()
        .map(|i| i.product_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct variant ids in a cart, sorted.
pub fn variant_ids(items: &[CartLineItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.variant_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Validates a cart against a fetched snapshot.
///
/// Compatibility issues come first, then availability issues in cart
/// order. An empty cart is valid with no issues.
pub fn validate_snapshot(
    items: &[CartLineItem],
    snapshot: &CatalogSnapshot,
    policy: &ValidationPolicy,
) -> CartValidation {
    if items.is_empty() {
        return CartValidation::empty();
    }

    let mut issues: IssueSet = check_compatibility(items, &snapshot.dependencies);

    for item in items {
        let product = snapshot.products.get(&item.product_id);
        let variant = item
            .variant_id
            .as_ref()
            .and_then(|id| snapshot.variants.get(id))
            .filter(|v| v.product_id == item.product_id);

        if let Some(issue) = check_availability(item, product, variant, policy) {
            issues.push(issue);
        }
    }

    issues.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueKind;
    use crate::types::fixtures::{edge, limited_variant, product};
    use crate::types::DependencyType;

    #[test]
    fn test_empty_cart_is_valid() {
        let report = validate_snapshot(&[], &CatalogSnapshot::default(), &ValidationPolicy::default());
        assert_eq!(report, CartValidation::empty());
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let snapshot = CatalogSnapshot::new(
            vec![product("ctrl")],
            vec![],
            vec![edge(1, "ctrl", "psu-5", DependencyType::Requires)],
        );
        let items = vec![CartLineItem::new("ctrl", 1, 4900)];

        let report = validate_snapshot(&items, &snapshot, &ValidationPolicy::default());
        assert!(report.valid);
        assert_eq!(report.count_kind(IssueKind::MissingComponent), 1);
    }

    #[test]
    fn test_combines_compatibility_and_availability() {
        let snapshot = CatalogSnapshot::new(
            vec![product("ctrl"), product("strip")],
            vec![limited_variant("strip-gold", "strip", 10, 10)],
            vec![],
        );
        let items = vec![
            CartLineItem::new("ctrl", 1, 4900).with_voltage("5v"),
            CartLineItem::new("strip", 1, 2900)
                .with_variant("strip-gold")
                .with_voltage("24v")
                .limited_edition(),
        ];

        let report = validate_snapshot(&items, &snapshot, &ValidationPolicy::default());
        assert!(!report.valid);
        assert_eq!(report.errors[0].kind, IssueKind::VoltageMismatch);
        assert_eq!(report.errors[1].kind, IssueKind::OutOfStock);
    }

    #[test]
    fn test_unknown_product_blocks() {
        let items = vec![CartLineItem::new("ghost", 1, 100)];
        let report = validate_snapshot(&items, &CatalogSnapshot::default(), &ValidationPolicy::default());
        assert!(!report.valid);
        assert!(report.has_kind(IssueKind::Unavailable));
    }

    #[test]
    fn test_variant_of_another_product_is_unavailable() {
        let snapshot = CatalogSnapshot::new(
            vec![product("strip"), product("matrix")],
            vec![crate::types::fixtures::variant("matrix-black", "matrix")],
            vec![],
        );
        let items = vec![CartLineItem::new("strip", 1, 2900).with_variant("matrix-black")];

        let report = validate_snapshot(&items, &snapshot, &ValidationPolicy::default());
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IssueKind::Unavailable);
        assert_eq!(report.errors[0].variant_id.as_deref(), Some("matrix-black"));
    }

    #[test]
    fn test_distinct_ids() {
        let items = vec![
            CartLineItem::new("b", 1, 100).with_variant("b-1"),
            CartLineItem::new("a", 1, 100),
            CartLineItem::new("b", 1, 100).with_variant("b-1"),
        ];
        assert_eq!(product_ids(&items), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(variant_ids(&items), vec!["b-1".to_string()]);
    }
}
