//! # Catalog Repository
//!
//! Reads of products, variants and dependency edges, keyed by the ids in a
//! cart. Every read takes a whole id list and issues one statement, so a
//! cart validation costs three queries however many lines it has.
//!
//! ## Write Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Column              Written by                                         │
//! │  ─────────────────   ───────────────────────────────────────────────    │
//! │  everything else     catalog sync (upsert_* here, seed binary)          │
//! │  sold_quantity       OrderRepository::create_order ONLY                 │
//! │                      (upserts never overwrite it on conflict)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use modkit_core::{rollup_variants, CounterRollup, Dependency, DependencyType, Product, Variant};

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, name, category, base_price_cents, wholesale_price_cents, \
     presale_deposit_price_cents, cost_cents, sell_status, max_quantity, sold_quantity, \
     has_variants, dev_status, is_live, created_at, updated_at";

const VARIANT_COLUMNS: &str = "id, product_id, variant_type, variant_value, price_modifier, \
     wholesale_price_modifier, presale_deposit_modifier, is_limited_edition, max_quantity, \
     sold_quantity";

const DEPENDENCY_COLUMNS: &str = "id, product_id, depends_on_id, dependency_type, message";

/// `?, ?, ?` for an `IN (...)` list of `n` ids.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Repository for catalog reads.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Batched reads
    // =========================================================================

    /// Products for a list of ids, in one query. Unknown ids are skipped.
    pub async fn products_by_ids(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = ids.len(), "Fetching products batch");

        let sql = format!(
            "SELECT {} FROM products WHERE id IN ({}) ORDER BY id",
            PRODUCT_COLUMNS,
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, Product>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Variants for a list of ids, in one query.
    pub async fn variants_by_ids(&self, ids: &[String]) -> DbResult<Vec<Variant>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = ids.len(), "Fetching variants batch");

        let sql = format!(
            "SELECT {} FROM variants WHERE id IN ({}) ORDER BY id",
            VARIANT_COLUMNS,
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, Variant>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// All edges whose source is one of `product_ids`, in one query.
    pub async fn dependencies_for_products(
        &self,
        product_ids: &[String],
    ) -> DbResult<Vec<Dependency>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = product_ids.len(), "Fetching dependency edges");

        let sql = format!(
            "SELECT {} FROM dependencies WHERE product_id IN ({}) ORDER BY id",
            DEPENDENCY_COLUMNS,
            placeholders(product_ids.len())
        );
        let mut query = sqlx::query_as::<_, Dependency>(&sql);
        for id in product_ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    // =========================================================================
    // Single-row reads
    // =========================================================================

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn get_variant(&self, id: &str) -> DbResult<Option<Variant>> {
        let sql = format!("SELECT {} FROM variants WHERE id = ?1", VARIANT_COLUMNS);
        let variant = sqlx::query_as::<_, Variant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(variant)
    }

    pub async fn variants_for_product(&self, product_id: &str) -> DbResult<Vec<Variant>> {
        let sql = format!(
            "SELECT {} FROM variants WHERE product_id = ?1 ORDER BY id",
            VARIANT_COLUMNS
        );
        let variants = sqlx::query_as::<_, Variant>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(variants)
    }

    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Catalog sync writes
    // =========================================================================

    /// Inserts or updates a product. An existing `sold_quantity` is kept.
    pub async fn upsert_product(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, status = %product.sell_status, "Upserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category,
                base_price_cents, wholesale_price_cents, presale_deposit_price_cents, cost_cents,
                sell_status, max_quantity, sold_quantity,
                has_variants, dev_status, is_live,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                base_price_cents = excluded.base_price_cents,
                wholesale_price_cents = excluded.wholesale_price_cents,
                presale_deposit_price_cents = excluded.presale_deposit_price_cents,
                cost_cents = excluded.cost_cents,
                sell_status = excluded.sell_status,
                max_quantity = excluded.max_quantity,
                has_variants = excluded.has_variants,
                dev_status = excluded.dev_status,
                is_live = excluded.is_live,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.base_price_cents)
        .bind(product.wholesale_price_cents)
        .bind(product.presale_deposit_price_cents)
        .bind(product.cost_cents)
        .bind(product.sell_status)
        .bind(product.max_quantity)
        .bind(product.sold_quantity)
        .bind(product.has_variants)
        .bind(product.dev_status)
        .bind(product.is_live)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or updates a variant. An existing `sold_quantity` is kept.
    pub async fn upsert_variant(&self, variant: &Variant) -> DbResult<()> {
        debug!(id = %variant.id, product_id = %variant.product_id, "Upserting variant");

        sqlx::query(
            r#"
            INSERT INTO variants (
                id, product_id, variant_type, variant_value,
                price_modifier, wholesale_price_modifier, presale_deposit_modifier,
                is_limited_edition, max_quantity, sold_quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (id) DO UPDATE SET
                product_id = excluded.product_id,
                variant_type = excluded.variant_type,
                variant_value = excluded.variant_value,
                price_modifier = excluded.price_modifier,
                wholesale_price_modifier = excluded.wholesale_price_modifier,
                presale_deposit_modifier = excluded.presale_deposit_modifier,
                is_limited_edition = excluded.is_limited_edition,
                max_quantity = excluded.max_quantity
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(variant.variant_type)
        .bind(&variant.variant_value)
        .bind(variant.price_modifier)
        .bind(variant.wholesale_price_modifier)
        .bind(variant.presale_deposit_modifier)
        .bind(variant.is_limited_edition)
        .bind(variant.max_quantity)
        .bind(variant.sold_quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a dependency edge, updating the message of an existing one.
    ///
    /// Returns the edge id.
    pub async fn upsert_dependency(
        &self,
        product_id: &str,
        depends_on_id: &str,
        dependency_type: DependencyType,
        message: Option<&str>,
    ) -> DbResult<i64> {
        debug!(
            product_id = %product_id,
            depends_on_id = %depends_on_id,
            kind = ?dependency_type,
            "Upserting dependency"
        );

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO dependencies (product_id, depends_on_id, dependency_type, message)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (product_id, depends_on_id, dependency_type)
            DO UPDATE SET message = excluded.message
            RETURNING id
            "#,
        )
        .bind(product_id)
        .bind(depends_on_id)
        .bind(dependency_type)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Rewrites the product-level `max_quantity` from its variants.
    ///
    /// `sold_quantity` is not touched; the ledger increments product and
    /// variant counters together, so the sums stay equal.
    pub async fn sync_variant_caps(&self, product_id: &str) -> DbResult<CounterRollup> {
        let variants = self.variants_for_product(product_id).await?;
        let rollup = rollup_variants(&variants);

        let result = sqlx::query(
            "UPDATE products SET max_quantity = ?1, has_variants = 1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(rollup.max_quantity)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        debug!(
            product_id = %product_id,
            max_quantity = ?rollup.max_quantity,
            sold_quantity = rollup.sold_quantity,
            "Variant caps rolled up"
        );

        Ok(rollup)
    }
}
