//! # Sample Catalog Seeder
//!
//! Loads a small modular-hardware catalog for development.
//!
//! ## Usage
//! ```bash
//! # Use modkit.toml (or defaults) for the database location
//! cargo run -p modkit-db --bin seed
//!
//! # Explicit database file
//! cargo run -p modkit-db --bin seed -- --db ./data/modkit.db
//!
//! # More logging
//! RUST_LOG=modkit_db=debug cargo run -p modkit-db --bin seed
//! ```
//!
//! ## Generated Catalog
//! - Controllers in both voltage classes
//! - LED modules, one with limited-edition colour variants
//! - Power supplies (5v, 24v)
//! - A pre-sale flagship with a deposit price
//! - Dependency edges: controllers require a matching PSU, strips suggest
//!   diffusers, 5v and 24v controllers are incompatible
//!
//! Re-running is safe: rows are upserted and sold counters are kept.

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use modkit_core::{DependencyType, Product, SellStatus, Variant, VariantType, RELEASED_DEV_STATUS};
use modkit_db::{Database, DbResult, ShopConfig};

/// `(id, name, category, price_cents, max_quantity)`
const PRODUCTS: &[(&str, &str, &str, i64, Option<i64>)] = &[
    ("ctrl-5v", "Pixel Controller 5V", "controllers", 4900, None),
    ("ctrl-24v", "Pixel Controller 24V", "controllers", 5900, None),
    ("psu-5v", "Power Supply 5V 10A", "power", 2900, None),
    ("psu-24v", "Power Supply 24V 5A", "power", 3400, None),
    ("led-matrix", "LED Matrix 16x16", "modules", 3900, None),
    ("led-strip", "LED Strip 1m", "modules", 2400, None),
    ("diffuser", "Opal Diffuser Panel", "accessories", 1200, None),
    ("knob-module", "Rotary Knob Module", "modules", 1900, Some(200)),
];

/// `(product_id, depends_on_id, kind, message)`
const EDGES: &[(&str, &str, DependencyType, Option<&str>)] = &[
    ("ctrl-5v", "psu-5v", DependencyType::Requires, Some("The 5V controller needs a 5V power supply")),
    ("ctrl-24v", "psu-24v", DependencyType::Requires, Some("The 24V controller needs a 24V power supply")),
    ("led-strip", "diffuser", DependencyType::Suggests, Some("Diffusers soften individual pixels")),
    ("led-matrix", "diffuser", DependencyType::Suggests, None),
    ("ctrl-5v", "ctrl-24v", DependencyType::Incompatible, Some("Use a single controller voltage per build")),
    ("led-strip", "ctrl-5v", DependencyType::VoltageMatch, None),
];

/// `(suffix, colour, price_modifier, max_quantity)`
const STRIP_EDITIONS: &[(&str, &str, i64, i64)] = &[
    ("gold", "Gold", 1500, 50),
    ("copper", "Copper", 1000, 75),
    ("midnight", "Midnight", 500, 100),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Modkit sample catalog seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file (overrides config)");
                println!("  -c, --config <PATH>   Config file (default: modkit.toml)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = ShopConfig::load(config_path.as_deref())?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    info!(path = %config.database.path.display(), "Seeding sample catalog");

    let db = Database::new(config.db_config()).await?;

    if let Err(e) = seed(&db).await {
        error!(error = %e, "Seed failed");
        return Err(e.into());
    }

    let count = db.catalog().count_products().await?;
    info!(products = count, "Seed complete");

    db.close().await;
    Ok(())
}

async fn seed(db: &Database) -> DbResult<()> {
    let catalog = db.catalog();

    for (id, name, category, price_cents, max_quantity) in PRODUCTS {
        let mut product = product(id, name, category, *price_cents);
        product.max_quantity = *max_quantity;
        catalog.upsert_product(&product).await?;
    }

    // Flagship kit: deposit now, wholesale price for depositors later
    let mut flagship = product("modkit-one", "Modkit One Starter Kit", "kits", 100000);
    flagship.wholesale_price_cents = Some(75000);
    flagship.presale_deposit_price_cents = Some(25000);
    flagship.sell_status = SellStatus::PreSale;
    flagship.has_variants = true;
    catalog.upsert_product(&flagship).await?;

    for (suffix, colour, modifier) in [("copper", "Copper", 5000), ("black", "Black", 0)] {
        catalog
            .upsert_variant(&Variant {
                id: format!("modkit-one-{}", suffix),
                product_id: "modkit-one".to_string(),
                variant_type: VariantType::Color,
                variant_value: colour.to_string(),
                price_modifier: modifier,
                wholesale_price_modifier: modifier / 2,
                presale_deposit_modifier: modifier,
                is_limited_edition: false,
                max_quantity: None,
                sold_quantity: 0,
            })
            .await?;
    }

    for (suffix, colour, modifier, max) in STRIP_EDITIONS {
        catalog
            .upsert_variant(&Variant {
                id: format!("led-strip-{}", suffix),
                product_id: "led-strip".to_string(),
                variant_type: VariantType::Color,
                variant_value: colour.to_string(),
                price_modifier: *modifier,
                wholesale_price_modifier: 0,
                presale_deposit_modifier: 0,
                is_limited_edition: true,
                max_quantity: Some(*max),
                sold_quantity: 0,
            })
            .await?;
    }
    let rollup = catalog.sync_variant_caps("led-strip").await?;
    info!(max_quantity = ?rollup.max_quantity, "LED strip editions rolled up");

    for (from, to, kind, message) in EDGES {
        catalog.upsert_dependency(from, to, *kind, *message).await?;
    }

    info!(
        products = PRODUCTS.len() + 1,
        editions = STRIP_EDITIONS.len(),
        edges = EDGES.len(),
        "Sample catalog written"
    );

    Ok(())
}

fn product(id: &str, name: &str, category: &str, price_cents: i64) -> Product {
    let now = Utc::now();

    Product {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        base_price_cents: price_cents,
        wholesale_price_cents: None,
        presale_deposit_price_cents: None,
        // Roughly 40% margin
        cost_cents: price_cents * 60 / 100,
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
