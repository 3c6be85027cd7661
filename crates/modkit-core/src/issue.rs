//! # Validation Issues
//!
//! Cart rule violations are data, not errors. Every check returns `Issue`
//! values and the caller decides how to present them.
//!
//! | Kind | Blocking? | Raised by |
//! |---|---|---|
//! | `unavailable` | yes | availability |
//! | `out_of_stock` | yes | availability |
//! | `low_stock` | no | availability |
//! | `voltage_mismatch` | yes | compatibility |
//! | `incompatible` | yes | compatibility |
//! | `missing_component` | no | compatibility |
//! | `suggested_product` | no | compatibility |

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Discriminant of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Unavailable,
    OutOfStock,
    LowStock,
    VoltageMismatch,
    Incompatible,
    MissingComponent,
    SuggestedProduct,
}

impl IssueKind {
    /// Blocking kinds make the cart invalid; the rest are advisory.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            IssueKind::Unavailable
                | IssueKind::OutOfStock
                | IssueKind::VoltageMismatch
                | IssueKind::Incompatible
        )
    }
}

/// A single finding against a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub message: String,

    /// Cart product the issue is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,

    /// Product the customer should add (requires / suggests edges).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_product_id: Option<String>,

    /// Units left for stock issues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
}

impl Issue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Issue {
            kind,
            message: message.into(),
            product_id: None,
            variant_id: None,
            suggested_product_id: None,
            remaining: None,
        }
    }

    pub fn for_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn for_variant(mut self, variant_id: Option<&str>) -> Self {
        self.variant_id = variant_id.map(str::to_string);
        self
    }

    pub fn suggesting(mut self, product_id: impl Into<String>) -> Self {
        self.suggested_product_id = Some(product_id.into());
        self
    }

    pub fn with_remaining(mut self, remaining: i64) -> Self {
        self.remaining = Some(remaining);
        self
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.kind.is_blocking()
    }
}

/// Errors and warnings produced by one check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueSet {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl IssueSet {
    /// Files an issue under errors or warnings by its kind.
    pub fn push(&mut self, issue: Issue) {
        if issue.is_blocking() {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    pub fn extend(&mut self, other: IssueSet) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Result of validating a whole cart.
///
/// `valid` is exactly `errors.is_empty()`; warnings never affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartValidation {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl CartValidation {
    /// The result for an empty cart.
    pub fn empty() -> Self {
        CartValidation {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn has_kind(&self, kind: IssueKind) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|i| i.kind == kind)
    }

    pub fn count_kind(&self, kind: IssueKind) -> usize {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(|i| i.kind == kind)
            .count()
    }
}

impl From<IssueSet> for CartValidation {
    fn from(set: IssueSet) -> Self {
        CartValidation {
            valid: set.errors.is_empty(),
            errors: set.errors,
            warnings: set.warnings,
        }
    }
}
