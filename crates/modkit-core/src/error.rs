//! # Error Types
//!
//! Domain-specific error types for modkit-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  modkit-core errors (this file)                                        │
//! │  ├── CoreError        - Cart and order rule failures                   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  modkit-db errors (separate crate)                                     │
//! │  └── DbError          - Storage and ledger failures                    │
//! │                                                                         │
//! │  NOT errors: cart rule violations. Those are `Issue` values returned   │
//! │  inside a `CartValidation` report.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::order::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Line is not in the cart.
    #[error("Product {product_id} is not in the cart")]
    LineNotInCart { product_id: String },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Order metadata could not be read as either a deposit or a purchase.
    ///
    /// ## When This Occurs
    /// - Webhook metadata lacks `order_type`
    /// - A deposit without `target_product_id`
    /// - Stored JSON written by an older schema
    #[error("Invalid order metadata: {reason}")]
    InvalidMetadata { reason: String },

    /// Unknown order status string.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// Transition not present in the order status graph.
    #[error("Order cannot move from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
