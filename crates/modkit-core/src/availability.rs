//! # Availability Checker
//!
//! Per-line stock decisions from the stored sold/max counters.
//!
//! ## Decision Table (limited runs)
//! ```text
//! remaining = max_quantity - sold_quantity
//!
//! ┌──────────────────────────────────────┬───────────────┬───────────────┐
//! │ Condition                            │ Kind          │ Blocking?     │
//! ├──────────────────────────────────────┼───────────────┼───────────────┤
//! │ max_quantity is null                 │ (none)        │               │
//! │ remaining <= 0                       │ out_of_stock  │ yes           │
//! │ 0 < remaining < requested            │ out_of_stock  │ yes           │
//! │ remaining / max < threshold (10%)    │ low_stock     │ no            │
//! │ otherwise                            │ (none)        │               │
//! └──────────────────────────────────────┴───────────────┴───────────────┘
//! ```
//!
//! These reads are optimistic. Two checkouts can both pass for the last
//! unit; the ledger's atomic increment and the payment processor settle it.

use serde::{Deserialize, Serialize};

use crate::issue::{Issue, IssueKind};
use crate::types::{CartLineItem, Product, Variant};
use crate::{LOW_STOCK_THRESHOLD_BPS, RELEASED_DEV_STATUS};

/// Tunables for the availability checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Products with a lower dev status are reported unavailable.
    #[serde(default = "default_released_dev_status")]
    pub released_dev_status: i64,

    /// Low stock threshold in basis points of `max_quantity`.
    #[serde(default = "default_low_stock_threshold_bps")]
    pub low_stock_threshold_bps: u32,
}

fn default_released_dev_status() -> i64 {
    RELEASED_DEV_STATUS
}

fn default_low_stock_threshold_bps() -> u32 {
    LOW_STOCK_THRESHOLD_BPS
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            released_dev_status: default_released_dev_status(),
            low_stock_threshold_bps: default_low_stock_threshold_bps(),
        }
    }
}

/// Checks one cart line against its product and (optional) variant row.
///
/// `product` is `None` when the catalog no longer has the row, which is
/// reported the same way as an unreleased product. A variant row that
/// belongs to another product counts as a missing option.
pub fn check_availability(
    line: &CartLineItem,
    product: Option<&Product>,
    variant: Option<&Variant>,
    policy: &ValidationPolicy,
) -> Option<Issue> {
    let Some(product) = product else {
        return Some(
            Issue::new(IssueKind::Unavailable, "This product is no longer available")
                .for_product(&line.product_id),
        );
    };

    if product.dev_status < policy.released_dev_status {
        return Some(
            Issue::new(
                IssueKind::Unavailable,
                format!("{} is no longer available", product.name),
            )
            .for_product(&product.id),
        );
    }

    match line.variant_id.as_deref() {
        Some(variant_id) => {
            let Some(variant) = variant.filter(|v| v.product_id == product.id) else {
                return Some(
                    Issue::new(
                        IssueKind::Unavailable,
                        format!("This option of {} is no longer available", product.name),
                    )
                    .for_product(&product.id)
                    .for_variant(Some(variant_id)),
                );
            };

            if !variant.is_limited_edition {
                return None;
            }

            check_remaining(
                variant.max_quantity,
                variant.sold_quantity,
                line.quantity,
                policy,
            )
            .map(|issue| {
                issue
                    .for_product(&product.id)
                    .for_variant(Some(variant_id))
            })
        }
        None if !product.has_variants => check_remaining(
            product.max_quantity,
            product.sold_quantity,
            line.quantity,
            policy,
        )
        .map(|issue| issue.for_product(&product.id)),
        None => None,
    }
}

/// Applies the decision table to a pair of counters.
pub fn check_remaining(
    max_quantity: Option<i64>,
    sold_quantity: i64,
    requested: i64,
    policy: &ValidationPolicy,
) -> Option<Issue> {
    let max = max_quantity?;
    let remaining = max - sold_quantity;

    if remaining <= 0 {
        return Some(Issue::new(IssueKind::OutOfStock, "This item is sold out").with_remaining(0));
    }

    if remaining < requested {
        return Some(
            Issue::new(
                IssueKind::OutOfStock,
                format!("Only {} units remaining", remaining),
            )
            .with_remaining(remaining),
        );
    }

    if is_low_stock(remaining, max, policy.low_stock_threshold_bps) {
        return Some(
            Issue::new(
                IssueKind::LowStock,
                format!("Only {} left in this limited run", remaining),
            )
            .with_remaining(remaining),
        );
    }

    None
}

/// `remaining / max < bps / 10000`, in integer arithmetic.
#[inline]
fn is_low_stock(remaining: i64, max: i64, threshold_bps: u32) -> bool {
    max > 0 && (remaining as i128) * 10_000 < (max as i128) * threshold_bps as i128
}
