//! # modkit-core: Storefront Domain Logic
//!
//! Pure rules behind the Modkit storefront: what may go in a cart together,
//! whether limited runs can still cover a request, and what price a customer
//! sees while a product moves through its pre-sale lifecycle.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Modkit Storefront Core                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Request handlers (web app, webhooks)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    modkit-db (services)                         │   │
//! │  │   CartValidator ─ PricingService ─ checkout ─ refund            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ rows in, decisions out                 │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ modkit-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   compatibility   availability   validator   pricing   order    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog rows (Product, Variant, Dependency) and cart lines
//! - [`order`] - Orders, order items, status model, metadata union
//! - [`issue`] - Validation issues and the combined report
//! - [`compatibility`] - Voltage partition and dependency edges
//! - [`availability`] - Limited-edition stock checks
//! - [`validator`] - Runs both checks over a fetched catalog snapshot
//! - [`pricing`] - Display price and deposit amount
//! - [`cart`] - In-memory cart accumulation
//! - [`money`] - Integer cents
//! - [`validation`] - Input validators
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use modkit_core::compatibility::check_compatibility;
//! use modkit_core::types::CartLineItem;
//!
//! let items = vec![
//!     CartLineItem::new("controller", 1, 4900).with_voltage("5v"),
//!     CartLineItem::new("psu-24", 1, 2900).with_voltage("24v"),
//! ];
//!
//! let outcome = check_compatibility(&items, &[]);
//! assert_eq!(outcome.errors.len(), 1);
//! ```

pub mod availability;
pub mod cart;
pub mod compatibility;
pub mod error;
pub mod issue;
pub mod money;
pub mod order;
pub mod pricing;
pub mod types;
pub mod validation;
pub mod validator;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use availability::ValidationPolicy;
pub use error::{CoreError, CoreResult, ValidationError};
pub use issue::{CartValidation, Issue, IssueKind};
pub use money::Money;
pub use order::*;
pub use pricing::{DisplayPrice, PriceType};
pub use types::*;
pub use validator::CatalogSnapshot;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Product reference carried by deposit orders in place of a catalog id.
///
/// Deposit payments are stored as ordinary orders whose single item points
/// at this id, so no separate deposits table exists.
pub const DEPOSIT_PRODUCT_ID: &str = "pre-sale-deposit";

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Dev status at which a product counts as released.
pub const RELEASED_DEV_STATUS: i64 = 5;

/// Remaining-stock ratio below which a low stock warning is raised (10%).
pub const LOW_STOCK_THRESHOLD_BPS: u32 = 1000;

/// The two voltage classes of the hardware line.
pub const VOLTAGE_CLASSES: [&str; 2] = ["5v", "24v"];
