//! # Repository Module
//!
//! SQL for the storefront lives here and nowhere else.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and their callers                       │
//! │                                                                         │
//! │  CartValidator / PricingService           checkout / refund services   │
//! │       │                                          │                      │
//! │       │  (through the store traits)              │                      │
//! │       ▼                                          ▼                      │
//! │  CatalogRepository                         OrderRepository             │
//! │  ├── products_by_ids(ids)                  ├── create_order(params)    │
//! │  ├── variants_by_ids(ids)                  ├── update_order_status(..) │
//! │  ├── dependencies_for_products(ids)        ├── finalize_deposit(..)    │
//! │  └── upsert_* (catalog sync, seed)         ├── *_deposit_refund(..)    │
//! │                                            └── get_deposit_order(..)   │
//! │       │                                          │                      │
//! │       └──────────────────┬───────────────────────┘                      │
//! │                          ▼                                              │
//! │                   SQLite Database                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`] - Batched catalog reads and catalog sync upserts
//! - [`OrderRepository`] - Order ledger and deposit lookups

pub mod catalog;
pub mod order;

pub use catalog::CatalogRepository;
pub use order::OrderRepository;
