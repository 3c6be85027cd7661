//! Row and order builders shared by the storage tests.

use chrono::Utc;
use std::path::PathBuf;
use uuid::Uuid;

use modkit_core::{
    NewOrder, NewOrderItem, OrderMetadata, Product, SellStatus, Variant, VariantType,
    RELEASED_DEV_STATUS,
};

use crate::pool::{Database, DbConfig};

/// File-backed database in the temp dir with a real connection pool.
///
/// The file and its WAL siblings are removed on drop.
pub struct TempDb {
    pub db: Database,
    path: PathBuf,
}

impl TempDb {
    pub async fn new(max_connections: u32) -> TempDb {
        let path = std::env::temp_dir().join(format!("modkit-test-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(max_connections))
            .await
            .unwrap();
        TempDb { db, path }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

pub fn product(id: &str) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        name: format!("Module {}", id),
        category: "modules".to_string(),
        base_price_cents: 4900,
        wholesale_price_cents: None,
        presale_deposit_price_cents: None,
        cost_cents: 1500,
        sell_status: SellStatus::ForSale,
        max_quantity: None,
        sold_quantity: 0,
        has_variants: false,
        dev_status: RELEASED_DEV_STATUS,
        is_live: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn limited_variant(id: &str, product_id: &str, max: i64) -> Variant {
    Variant {
        id: id.to_string(),
        product_id: product_id.to_string(),
        variant_type: VariantType::Color,
        variant_value: "gold".to_string(),
        price_modifier: 0,
        wholesale_price_modifier: 0,
        presale_deposit_modifier: 0,
        is_limited_edition: true,
        max_quantity: Some(max),
        sold_quantity: 0,
    }
}

pub fn purchase_order(
    id: &str,
    product_id: &str,
    variant_id: Option<&str>,
    quantity: i64,
) -> NewOrder {
    NewOrder {
        id: id.to_string(),
        payment_intent_id: Some(format!("pi_{}", id)),
        customer_email: "ada@example.com".to_string(),
        subtotal_cents: 4900 * quantity,
        tax_cents: 0,
        shipping_cents: 0,
        total_cents: 4900 * quantity,
        shipping_address: None,
        metadata: OrderMetadata::purchase(),
        items: vec![NewOrderItem {
            product_id: product_id.to_string(),
            variant_id: variant_id.map(str::to_string),
            product_name: format!("Module {}", product_id),
            variant_name: variant_id.map(|_| "gold".to_string()),
            unit_price_cents: 4900,
            quantity,
        }],
    }
}

pub fn deposit_order(id: &str, email: &str, product_id: &str, amount_cents: i64) -> NewOrder {
    NewOrder {
        id: id.to_string(),
        payment_intent_id: Some(format!("pi_{}", id)),
        customer_email: email.to_string(),
        subtotal_cents: amount_cents,
        tax_cents: 0,
        shipping_cents: 0,
        total_cents: amount_cents,
        shipping_address: None,
        metadata: OrderMetadata::deposit(product_id, None),
        items: vec![NewOrderItem::deposit(product_id, amount_cents)],
    }
}
