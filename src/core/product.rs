//! Product business logic - Bills of materials, labor and derived prices.
//!
//! This module provides functions for creating, retrieving, updating, and managing products.
//! A product's stored `cost` and `sale_price` are recomputed in the same transaction as any
//! change to its bill of materials or labor parameters, so readers never see a stale price
//! for the product itself. Dependent projects are handled by [`crate::core::cascade`].

use crate::{
    core::cost::{self, Labor, LineItem},
    entities::{
        Component, Product, ProductComponent, ProjectProduct, component, product,
        product_component, project_product,
    },
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// A bill-of-materials line together with its component.
#[derive(Debug, Clone, PartialEq)]
pub struct BomLine {
    /// The line itself (product, component, quantity)
    pub line: product_component::Model,
    /// The referenced component
    pub component: component::Model,
}

/// Retrieves all active (non-archived) products, ordered alphabetically by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_products<C>(db: &C) -> Result<Vec<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .filter(product::Column::IsArchived.eq(false))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds an active product by its exact name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_name<C>(db: &C, name: &str) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .filter(product::Column::Name.eq(name))
        .filter(product::Column::IsArchived.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific product by its unique ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_id<C>(db: &C, product_id: i64) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a product with an empty bill of materials. Its cost and sale price both
/// start at the labor cost.
///
/// # Errors
/// Returns an error if:
/// - The product name is empty or whitespace-only
/// - The hourly rate or the number of hours is negative
/// - The database insert operation fails
pub async fn create_product<C>(
    db: &C,
    name: String,
    hourly_rate: Decimal,
    hours: Decimal,
) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    let name = validated_name(&name)?;
    let labor_cost = Labor::new(hourly_rate, hours).cost()?;
    let now = chrono::Utc::now().naive_utc();

    let product = product::ActiveModel {
        name: Set(name),
        hourly_rate: Set(hourly_rate.into()),
        hours: Set(hours.into()),
        cost: Set(labor_cost.into()),
        sale_price: Set(labor_cost.into()),
        is_archived: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let product = product.insert(db).await?;
    info!(product_id = product.id, name = %product.name, "Created product");
    Ok(product)
}

/// Updates a product's name and labor parameters and recomputes its prices.
///
/// # Errors
/// Returns an error if:
/// - The name is empty, or the hourly rate or hours are negative
/// - The product does not exist
/// - Any bill-of-materials line references a missing component
/// - The database update fails
pub async fn update_product_labor<C>(
    db: &C,
    product_id: i64,
    new_name: String,
    hourly_rate: Decimal,
    hours: Decimal,
) -> Result<product::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let name = validated_name(&new_name)?;
    Labor::new(hourly_rate, hours).cost()?;

    let txn = db.begin().await?;
    let mut product: product::ActiveModel = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?
        .into();

    product.name = Set(name);
    product.hourly_rate = Set(hourly_rate.into());
    product.hours = Set(hours.into());
    product.update(&txn).await?;

    let product = recompute_product(&txn, product_id).await?;
    txn.commit().await?;
    Ok(product)
}

/// Sets how many units of a component go into a product, adding the line if needed,
/// and recomputes the product's prices.
///
/// # Errors
/// Returns an error if:
/// - The quantity is less than 1
/// - The product or the component does not exist
/// - The database write fails
pub async fn set_product_component<C>(
    db: &C,
    product_id: i64,
    component_id: i64,
    quantity: i32,
) -> Result<product::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    cost::quantity_from_db(quantity)?;

    let txn = db.begin().await?;
    Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;
    Component::find_by_id(component_id)
        .one(&txn)
        .await?
        .ok_or(Error::ComponentNotFound { id: component_id })?;

    let existing = ProductComponent::find()
        .filter(product_component::Column::ProductId.eq(product_id))
        .filter(product_component::Column::ComponentId.eq(component_id))
        .one(&txn)
        .await?;

    match existing {
        Some(line) => {
            let mut line: product_component::ActiveModel = line.into();
            line.quantity = Set(quantity);
            line.update(&txn).await?;
        }
        None => {
            product_component::ActiveModel {
                product_id: Set(product_id),
                component_id: Set(component_id),
                quantity: Set(quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    let product = recompute_product(&txn, product_id).await?;
    txn.commit().await?;
    info!(product_id, component_id, quantity, "Set product component");
    Ok(product)
}

/// Removes a component from a product's bill of materials and recomputes its prices.
///
/// # Errors
/// Returns an error if the product does not use the component or a write fails.
pub async fn remove_product_component<C>(
    db: &C,
    product_id: i64,
    component_id: i64,
) -> Result<product::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let result = ProductComponent::delete_many()
        .filter(product_component::Column::ProductId.eq(product_id))
        .filter(product_component::Column::ComponentId.eq(component_id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::ComponentNotFound { id: component_id });
    }

    let product = recompute_product(&txn, product_id).await?;
    txn.commit().await?;
    info!(product_id, component_id, "Removed product component");
    Ok(product)
}

/// Lists a product's bill of materials with the referenced components, ordered by line id.
///
/// # Errors
/// Returns `Error::ComponentNotFound` for a dangling line or an error if the query fails.
pub async fn get_product_lines<C>(db: &C, product_id: i64) -> Result<Vec<BomLine>>
where
    C: ConnectionTrait,
{
    ProductComponent::find()
        .filter(product_component::Column::ProductId.eq(product_id))
        .order_by_asc(product_component::Column::Id)
        .find_also_related(Component)
        .all(db)
        .await?
        .into_iter()
        .map(|(line, component)| {
            let component = component.ok_or(Error::ComponentNotFound {
                id: line.component_id,
            })?;
            Ok(BomLine { line, component })
        })
        .collect()
}

/// Recomputes and stores a product's cost and sale price from the *current* purchase
/// price and margin of each of its components plus its labor.
///
/// Running it twice without an intervening change stores the same values.
///
/// # Errors
/// Returns `Error::ProductNotFound` or `Error::ComponentNotFound` when an entity is
/// gone, a cost model error for invalid data, or a database error.
pub async fn recompute_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    let product = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    let items = get_product_lines(db, product_id)
        .await?
        .into_iter()
        .map(|bom| {
            Ok(LineItem {
                purchase_price: bom.component.purchase_price.0,
                margin_percent: bom.component.margin_percent.0,
                quantity: cost::quantity_from_db(bom.line.quantity)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let labor = Labor::new(product.hourly_rate.0, product.hours.0);
    let new_cost = cost::product_cost(&items, labor)?;
    let new_sale_price = cost::product_sale_price(&items, labor)?;

    if new_cost == product.cost && new_sale_price == product.sale_price {
        debug!(product_id, "Product prices unchanged");
        return Ok(product);
    }

    let mut active: product::ActiveModel = product.into();
    active.cost = Set(new_cost.into());
    active.sale_price = Set(new_sale_price.into());
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    let product = active.update(db).await?;
    debug!(
        product_id,
        cost = %new_cost,
        sale_price = %new_sale_price,
        "Recomputed product prices"
    );
    Ok(product)
}

/// Archives a product. Existing project lines keep referencing it.
///
/// # Errors
/// Returns an error if the product does not exist, is already archived, or the
/// update fails.
pub async fn archive_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    let mut product: product::ActiveModel = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?
        .into();

    if *product.is_archived.as_ref() {
        return Err(Error::ProductNotFound { id: product_id });
    }

    product.is_archived = Set(true);
    product.updated_at = Set(chrono::Utc::now().naive_utc());
    product.update(db).await.map_err(Into::into)
}

/// Permanently deletes a product, its bill of materials and every project line using it.
///
/// Returns the ids of the projects that lost a line.
///
/// # Errors
/// Returns an error if the product does not exist or any delete fails. Nothing is
/// removed in that case.
pub async fn delete_product<C>(db: &C, product_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let product = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    let mut projects: Vec<i64> = ProjectProduct::find()
        .filter(project_product::Column::ProductId.eq(product_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|link| link.project_id)
        .collect();
    projects.sort_unstable();
    projects.dedup();

    ProjectProduct::delete_many()
        .filter(project_product::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    ProductComponent::delete_many()
        .filter(product_component::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    product.delete(&txn).await?;

    txn.commit().await?;
    info!(product_id, affected_projects = projects.len(), "Deleted product");
    Ok(projects)
}

fn validated_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    Ok(name.to_string())
}
