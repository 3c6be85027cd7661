//! # modkit-db: Storage and Ledger for the Modkit Storefront
//!
//! SQLite access for the storefront: batched catalog reads for cart
//! validation and pricing, the transactional order ledger, and the
//! webhook and refund flows built on it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Modkit Request Flow                              │
//! │                                                                         │
//! │  Request handler (cart page, checkout webhook, refund request)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    modkit-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   service     │    │  repository   │    │  migrations  │  │   │
//! │  │   │               │    │               │    │  (embedded)  │  │   │
//! │  │   │ CartValidator │───►│ CatalogRepo   │    │              │  │   │
//! │  │   │ PricingService│    │ OrderRepo     │    │ 001_initial  │  │   │
//! │  │   │ checkout      │    │               │    │              │  │   │
//! │  │   │ refund        │    └───────┬───────┘    └──────────────┘  │   │
//! │  │   └───────────────┘            │                               │   │
//! │  │         ▲ store traits         │  pool.rs (SqlitePool)         │   │
//! │  └─────────┼──────────────────────┼────────────────────────────────┘   │
//! │            │                      ▼                                     │
//! │   modkit-core rules         SQLite database (modkit.db)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Layered shop configuration (defaults, TOML, environment)
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Catalog and order repositories
//! - [`store`] - Read seams implemented by the repositories
//! - [`service`] - Cart validation, pricing, checkout webhook, refunds
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modkit_db::{CartValidator, Database, ShopConfig};
//!
//! let config = ShopConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let validator = CartValidator::new(db.catalog(), config.validation);
//! let report = validator.validate_cart(&items).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::ShopConfig;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{CatalogSource, DepositLedger};

// Repository re-exports for convenience
pub use repository::{CatalogRepository, OrderRepository};

pub use service::{
    handle_checkout_completed, refund_active_deposit, refund_deposit_order, CartValidator,
    CheckoutCompleted, CheckoutLineItem, PricingService, RefundGateway, RefundReceipt,
    WebhookOutcome,
};
