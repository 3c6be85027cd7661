//! # Validation Module
//!
//! Input validators for values that arrive from outside: webhook payloads,
//! cart requests, configuration.
//!
//! ## Where Each Check Lives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Webhook / request payload                                              │
//! │  ├── Type validation (serde deserialization)                           │
//! │  └── THIS MODULE: ids, email, quantities, cents                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Cart rules (compatibility, availability)                              │
//! │  └── Reported as Issues, never as ValidationError                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  SQLite                                                                │
//! │  ├── PRIMARY KEY orders.id, UNIQUE payment_intent_id                   │
//! │  └── CHECK constraints on counters                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use modkit_core::validation::{validate_email, validate_quantity};
//!
//! validate_email("ada@example.com").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest id accepted for catalog rows and checkout sessions.
pub const MAX_ID_LEN: usize = 255;

/// Longest email accepted (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an opaque identifier (catalog id, checkout session id).
///
/// ## Rules
/// - Must not be empty
/// - At most 255 characters
/// - No whitespace
///
/// ## Example
/// ```rust
/// use modkit_core::validation::validate_id;
///
/// assert!(validate_id("product_id", "led-strip-24").is_ok());
/// assert!(validate_id("product_id", "").is_err());
/// assert!(validate_id("product_id", "led strip").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    if id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a customer email.
///
/// Deposit eligibility is keyed on the email string, so only the shape is
/// checked here: one `@`, a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LEN,
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(|| invalid("missing @"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("must have exactly one @ and a local part"));
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(())
}

/// Canonical form used to store and look up customer emails.
///
/// ## Example
/// ```rust
/// use modkit_core::validation::normalize_email;
///
/// assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
/// ```
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount in cents. Zero is allowed.
///
/// ## Example
/// ```rust
/// use modkit_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("total_cents", 25000).is_ok());
/// assert!(validate_price_cents("total_cents", 0).is_ok());
/// assert!(validate_price_cents("total_cents", -100).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a ratio in basis points (0 to 10000).
pub fn validate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more distinct line fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "cs_test_a1B2c3").is_ok());
        assert!(validate_id("id", "pre-sale-deposit").is_ok());

        assert!(validate_id("id", "").is_err());
        assert!(validate_id("id", "has space").is_err());
        assert!(validate_id("id", &"a".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("  ada@example.co.uk ").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("ada.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("ada@ex@ample.com").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_bps() {
        assert!(validate_bps("low_stock_threshold_bps", 1000).is_ok());
        assert!(validate_bps("low_stock_threshold_bps", 10_000).is_ok());
        assert!(validate_bps("low_stock_threshold_bps", 10_001).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }
}
