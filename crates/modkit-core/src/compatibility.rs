//! # Compatibility Rule Engine
//!
//! Decides whether the components in a cart can be combined.
//!
//! ## Evaluation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Voltage partition   distinct non-null voltage tags ≥ 2 → ONE error  │
//! │                                                                         │
//! │  2. Dependency edges, per cart product, in this order:                 │
//! │     requires      target absent → missing_component  (warning)         │
//! │     suggests      target absent → suggested_product  (warning)         │
//! │     incompatible  target present → incompatible      (error)           │
//! │     voltage_match covered by step 1                                    │
//! │                                                                         │
//! │  Each edge reports at most once, however many lines or units share    │
//! │  its source product.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A missing hard dependency only warns. Checkout is not blocked on it.

use std::collections::{BTreeSet, HashSet};

use crate::issue::{Issue, IssueKind, IssueSet};
use crate::types::{CartLineItem, Dependency, DependencyType};

/// Checks voltage classes and dependency edges for a cart.
///
/// `edges` may contain edges whose source is not in the cart; they are
/// ignored.
pub fn check_compatibility(items: &[CartLineItem], edges: &[Dependency]) -> IssueSet {
    let mut issues = IssueSet::default();

    if let Some(issue) = check_voltage_partition(items) {
        issues.push(issue);
    }

    let in_cart: HashSet<&str> = items.iter().map(|i| i.product_id.as_str()).collect();

    // Cart order, first occurrence of each product.
    let mut sources: Vec<&str> = Vec::new();
    for item in items {
        if !sources.contains(&item.product_id.as_str()) {
            sources.push(item.product_id.as_str());
        }
    }

    let mut reported: HashSet<(&str, &str, DependencyType)> = HashSet::new();

    for kind in [
        DependencyType::Requires,
        DependencyType::Suggests,
        DependencyType::Incompatible,
    ] {
        for source in &sources {
            for edge in edges
                .iter()
                .filter(|e| e.product_id == *source && e.dependency_type == kind)
            {
                let key = (
                    edge.product_id.as_str(),
                    edge.depends_on_id.as_str(),
                    edge.dependency_type,
                );
                if reported.contains(&key) {
                    continue;
                }

                let target_present = in_cart.contains(edge.depends_on_id.as_str());
                if let Some(issue) = evaluate_edge(edge, target_present) {
                    reported.insert(key);
                    issues.push(issue);
                }
            }
        }
    }

    issues
}

/// Emits a single `voltage_mismatch` when the cart mixes voltage classes.
///
/// Tag values are not checked against [`crate::VOLTAGE_CLASSES`]; any
/// distinct string counts as a class.
pub fn check_voltage_partition(items: &[CartLineItem]) -> Option<Issue> {
    let classes: BTreeSet<&str> = items.iter().filter_map(|i| i.voltage.as_deref()).collect();

    if classes.len() < 2 {
        return None;
    }

    let mut names = classes.iter();
    let first = names.next().copied().unwrap_or_default();
    let second = names.next().copied().unwrap_or_default();

    Some(Issue::new(
        IssueKind::VoltageMismatch,
        format!(
            "Cannot mix {} and {} components in the same order",
            first, second
        ),
    ))
}

fn evaluate_edge(edge: &Dependency, target_present: bool) -> Option<Issue> {
    let message = |fallback: String| edge.message.clone().unwrap_or(fallback);

    match edge.dependency_type {
        DependencyType::Requires if !target_present => Some(
            Issue::new(
                IssueKind::MissingComponent,
                message(format!(
                    "{} requires {} to work",
                    edge.product_id, edge.depends_on_id
                )),
            )
            .for_product(&edge.product_id)
            .suggesting(&edge.depends_on_id),
        ),
        DependencyType::Suggests if !target_present => Some(
            Issue::new(
                IssueKind::SuggestedProduct,
                message(format!(
                    "{} works well with {}",
                    edge.product_id, edge.depends_on_id
                )),
            )
            .for_product(&edge.product_id)
            .suggesting(&edge.depends_on_id),
        ),
        DependencyType::Incompatible if target_present => Some(
            Issue::new(
                IssueKind::Incompatible,
                message(format!(
                    "{} cannot be combined with {}",
                    edge.product_id, edge.depends_on_id
                )),
            )
            .for_product(&edge.product_id),
        ),
        _ => None,
    }
}
