//! Seed catalog loading from config.toml
//!
//! This module loads an optional catalog of components and products from a TOML file.
//! The catalog is used to seed the database on first run; entries whose name already
//! exists are left untouched.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming the seed catalog file
pub const CATALOG_CONFIG_ENV: &str = "CATALOG_CONFIG";

/// Seed catalog file used when `CATALOG_CONFIG` is not set
pub const DEFAULT_CATALOG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default)]
pub struct CatalogConfig {
    /// Components to seed
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    /// Products to seed, referencing components by name
    #[serde(default)]
    pub products: Vec<ProductConfig>,
}

/// Configuration for a single component
#[derive(Debug, Deserialize, Clone)]
pub struct ComponentConfig {
    /// Name of the component
    pub name: String,
    /// Unit purchase price
    pub purchase_price: Decimal,
    /// Margin in percent
    #[serde(default)]
    pub margin_percent: Decimal,
}

/// Configuration for a single product
#[derive(Debug, Deserialize, Clone)]
pub struct ProductConfig {
    /// Name of the product
    pub name: String,
    /// Labor rate per hour
    #[serde(default)]
    pub hourly_rate: Decimal,
    /// Labor hours per unit
    #[serde(default)]
    pub hours: Decimal,
    /// Bill of materials
    #[serde(default)]
    pub components: Vec<BomEntryConfig>,
}

/// One bill-of-materials entry of a seeded product
#[derive(Debug, Deserialize, Clone)]
pub struct BomEntryConfig {
    /// Name of a component defined in the catalog or already in the database
    pub name: String,
    /// Units per product
    pub quantity: i32,
}

/// Loads the seed catalog from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let path = path.as_ref();
    debug!("Loading seed catalog from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read catalog file {path:?}: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog file {path:?}: {e}"),
    })
}

/// Loads the seed catalog named by `CATALOG_CONFIG`, or `config.toml`.
///
/// Returns `Ok(None)` when the file does not exist, so seeding is optional.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_default_config() -> Result<Option<CatalogConfig>> {
    let path =
        std::env::var(CATALOG_CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string());
    if !Path::new(&path).exists() {
        info!("No seed catalog at {}, skipping seeding", path);
        return Ok(None);
    }
    load_config(&path).map(Some)
}
