//! Catalog seeding from the TOML seed catalog.

use crate::{
    config::catalog::CatalogConfig,
    core::{component, product},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::{info, warn};

/// What a seeding run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    /// Components inserted
    pub components_created: usize,
    /// Products inserted
    pub products_created: usize,
    /// Entries skipped because the name already existed
    pub skipped: usize,
}

/// Inserts every component and product of `config` whose name does not exist yet.
///
/// Runs in one transaction: a product referencing an unknown component aborts the
/// whole seed.
///
/// # Errors
/// Returns `Error::Config` for an unknown component reference, or any validation or
/// database error raised while inserting.
pub async fn seed_catalog<C>(db: &C, config: &CatalogConfig) -> Result<SeedReport>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let mut report = SeedReport::default();

    for cfg in &config.components {
        if component::get_component_by_name(&txn, cfg.name.trim()).await?.is_some() {
            warn!("Component '{}' already exists. Skipping.", cfg.name);
            report.skipped += 1;
            continue;
        }
        component::create_component(&txn, cfg.name.clone(), cfg.purchase_price, cfg.margin_percent)
            .await?;
        report.components_created += 1;
    }

    for cfg in &config.products {
        if product::get_product_by_name(&txn, cfg.name.trim()).await?.is_some() {
            warn!("Product '{}' already exists. Skipping.", cfg.name);
            report.skipped += 1;
            continue;
        }
        let created =
            product::create_product(&txn, cfg.name.clone(), cfg.hourly_rate, cfg.hours).await?;
        for entry in &cfg.components {
            let part = component::get_component_by_name(&txn, entry.name.trim())
                .await?
                .ok_or_else(|| Error::Config {
                    message: format!(
                        "Product '{}' references unknown component '{}'",
                        cfg.name, entry.name
                    ),
                })?;
            product::set_product_component(&txn, created.id, part.id, entry.quantity).await?;
        }
        report.products_created += 1;
    }

    txn.commit().await?;
    info!(
        components = report.components_created,
        products = report.products_created,
        skipped = report.skipped,
        "Seeded catalog"
    );
    Ok(report)
}
