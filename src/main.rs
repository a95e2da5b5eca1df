use catalog_pricing::{
    PricingContext, Result,
    config::{catalog, database},
    core::seed,
};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    // 3. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 4. Seed the catalog if a seed file is present
    if let Some(config) = catalog::load_default_config()? {
        seed::seed_catalog(&db, &config)
            .await
            .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
    }

    // 5. Bring every stored price in line with the cost model
    let ctx = PricingContext::new(db);
    let report = ctx.reprice_catalog().await?;
    for failure in report
        .component_failures
        .iter()
        .chain(report.products.failures.iter())
    {
        warn!("{}", failure);
    }
    info!(
        components = report.components_recomputed,
        products = report.products.products_recomputed.len(),
        draft_projects = report.products.draft_projects_affected.len(),
        "Catalog prices are up to date"
    );

    Ok(())
}
