//! Shared test utilities for the pricing core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{component, product, project},
    entities::{self, Amount},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, Set};
use std::str::FromStr;

/// Parses a decimal literal. Panics on malformed input, which is fine in tests.
#[allow(clippy::unwrap_used)]
pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

/// Parses a decimal literal into a stored [`Amount`].
pub fn amount(value: &str) -> Amount {
    Amount(dec(value))
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test component with sensible defaults.
///
/// # Defaults
/// * `purchase_price`: 10
/// * `margin_percent`: 20 (sale price 12)
pub async fn create_test_component(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::component::Model> {
    component::create_component(db, name.to_string(), dec("10"), dec("20")).await
}

/// Creates a test component with custom pricing.
pub async fn create_custom_component(
    db: &DatabaseConnection,
    name: &str,
    purchase_price: Decimal,
    margin_percent: Decimal,
) -> Result<entities::component::Model> {
    component::create_component(db, name.to_string(), purchase_price, margin_percent).await
}

/// A product model that never touched a database.
pub fn sample_product_model(sale_price: Decimal) -> entities::product::Model {
    let now = chrono::Utc::now().naive_utc();
    entities::product::Model {
        id: 1,
        name: "Sample".to_string(),
        hourly_rate: Amount::default(),
        hours: Amount::default(),
        cost: sale_price.into(),
        sale_price: sale_price.into(),
        is_archived: false,
        created_at: now,
        updated_at: now,
    }
}

/// Adds a line to `project_id` pointing at a product that does not exist.
///
/// Foreign key enforcement is switched off on the connection first.
pub async fn insert_dangling_line(
    db: &DatabaseConnection,
    project_id: i64,
) -> Result<entities::project_product::Model> {
    db.execute_unprepared("PRAGMA foreign_keys = OFF").await?;
    let link = entities::project_product::ActiveModel {
        project_id: Set(project_id),
        product_id: Set(9999),
        quantity: Set(1),
        frozen_unit_price: Set(None),
        frozen_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(link)
}

/// The reference pricing setup shared by most integration tests.
pub struct Scenario {
    /// In-memory database
    pub db: DatabaseConnection,
    /// "Plank": purchase 10, margin 20% (sale 12)
    pub component: entities::component::Model,
    /// "Bench": 2 x Plank plus 1 hour at 50 (cost 70, sale 74)
    pub product: entities::product::Model,
    /// "Patio": draft project
    pub project: entities::project::Model,
    /// 3 x Bench in Patio
    pub link: entities::project_product::Model,
}

/// Sets up component A, product P built from it and draft project J with 3 x P.
pub async fn setup_scenario() -> Result<Scenario> {
    let db = setup_test_db().await?;
    let component = create_test_component(&db, "Plank").await?;
    let created = product::create_product(&db, "Bench".to_string(), dec("50"), dec("1")).await?;
    let product = product::set_product_component(&db, created.id, component.id, 2).await?;
    let project = project::create_project(&db, "Patio".to_string(), None).await?;
    let link = project::add_product_to_project(&db, project.id, product.id, 3).await?;
    Ok(Scenario {
        db,
        component,
        product,
        project,
        link,
    })
}
