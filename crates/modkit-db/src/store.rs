//! # Storage Seams
//!
//! The narrow read interfaces the services depend on. The SQLite
//! repositories implement them; tests substitute in-memory fakes.
//!
//! ```text
//!   CartValidator<C: CatalogSource>      PricingService<C, D: DepositLedger>
//!            │                                    │
//!            ▼                                    ▼
//!   ┌──────────────────┐                ┌──────────────────┐
//!   │ CatalogRepository│                │ OrderRepository  │
//!   └──────────────────┘                └──────────────────┘
//! ```

use std::future::Future;

use modkit_core::{Dependency, Product, Variant};

use crate::error::DbResult;
use crate::repository::{CatalogRepository, OrderRepository};

/// Batched catalog reads keyed by cart contents.
///
/// Each batch method must answer with a single round trip regardless of
/// how many ids it is given, and return an empty list for an empty input.
pub trait CatalogSource: Send + Sync {
    fn products_by_ids(&self, ids: &[String]) -> impl Future<Output = DbResult<Vec<Product>>> + Send;

    fn variants_by_ids(&self, ids: &[String]) -> impl Future<Output = DbResult<Vec<Variant>>> + Send;

    /// Edges whose source product is in `product_ids`.
    fn dependencies_for_products(
        &self,
        product_ids: &[String],
    ) -> impl Future<Output = DbResult<Vec<Dependency>>> + Send;

    fn get_product(&self, id: &str) -> impl Future<Output = DbResult<Option<Product>>> + Send;

    fn get_variant(&self, id: &str) -> impl Future<Output = DbResult<Option<Variant>>> + Send;
}

/// Deposit eligibility lookup used by pricing.
pub trait DepositLedger: Send + Sync {
    fn user_has_paid_deposit(
        &self,
        email: &str,
        product_id: &str,
    ) -> impl Future<Output = DbResult<bool>> + Send;
}

impl CatalogSource for CatalogRepository {
    async fn products_by_ids(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        CatalogRepository::products_by_ids(self, ids).await
    }

    async fn variants_by_ids(&self, ids: &[String]) -> DbResult<Vec<Variant>> {
        CatalogRepository::variants_by_ids(self, ids).await
    }

    async fn dependencies_for_products(&self, product_ids: &[String]) -> DbResult<Vec<Dependency>> {
        CatalogRepository::dependencies_for_products(self, product_ids).await
    }

    async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        CatalogRepository::get_product(self, id).await
    }

    async fn get_variant(&self, id: &str) -> DbResult<Option<Variant>> {
        CatalogRepository::get_variant(self, id).await
    }
}

impl DepositLedger for OrderRepository {
    async fn user_has_paid_deposit(&self, email: &str, product_id: &str) -> DbResult<bool> {
        OrderRepository::user_has_paid_deposit(self, email, product_id).await
    }
}
