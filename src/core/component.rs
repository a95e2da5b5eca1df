//! Component business logic - Catalog operations on purchasable parts.
//!
//! Every write keeps the stored `sale_price` equal to the cost model's result for the
//! stored purchase price and margin. Propagating a change to the products that use a
//! component is the cascade's job, see [`crate::core::cascade`].

use crate::{
    core::cost,
    entities::{Component, ProductComponent, component, product_component},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// Retrieves all active (non-archived) components, ordered alphabetically by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_components<C>(db: &C) -> Result<Vec<component::Model>>
where
    C: ConnectionTrait,
{
    Component::find()
        .filter(component::Column::IsArchived.eq(false))
        .order_by_asc(component::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific component by its unique ID, archived or not.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_component_by_id<C>(db: &C, component_id: i64) -> Result<Option<component::Model>>
where
    C: ConnectionTrait,
{
    Component::find_by_id(component_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an active component by its exact name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_component_by_name<C>(db: &C, name: &str) -> Result<Option<component::Model>>
where
    C: ConnectionTrait,
{
    Component::find()
        .filter(component::Column::Name.eq(name))
        .filter(component::Column::IsArchived.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a component and stores its derived sale price.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The purchase price is negative
/// - The database insert fails
pub async fn create_component<C>(
    db: &C,
    name: String,
    purchase_price: Decimal,
    margin_percent: Decimal,
) -> Result<component::Model>
where
    C: ConnectionTrait,
{
    let name = validated_name(&name)?;
    let sale_price = cost::component_sale_price(purchase_price, margin_percent)?;
    let now = chrono::Utc::now().naive_utc();

    let component = component::ActiveModel {
        name: Set(name),
        purchase_price: Set(purchase_price.into()),
        margin_percent: Set(margin_percent.into()),
        sale_price: Set(sale_price.into()),
        is_archived: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let component = component.insert(db).await?;
    info!(
        component_id = component.id,
        name = %component.name,
        sale_price = %component.sale_price,
        "Created component"
    );
    Ok(component)
}

/// Updates a component's name, purchase price and margin, recomputing its sale price.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or the purchase price is negative
/// - The component does not exist
/// - The database update fails
pub async fn update_component<C>(
    db: &C,
    component_id: i64,
    new_name: String,
    purchase_price: Decimal,
    margin_percent: Decimal,
) -> Result<component::Model>
where
    C: ConnectionTrait,
{
    let name = validated_name(&new_name)?;
    let sale_price = cost::component_sale_price(purchase_price, margin_percent)?;

    let mut component: component::ActiveModel = Component::find_by_id(component_id)
        .one(db)
        .await?
        .ok_or(Error::ComponentNotFound { id: component_id })?
        .into();

    component.name = Set(name);
    component.purchase_price = Set(purchase_price.into());
    component.margin_percent = Set(margin_percent.into());
    component.sale_price = Set(sale_price.into());
    component.updated_at = Set(chrono::Utc::now().naive_utc());

    let component = component.update(db).await?;
    info!(
        component_id,
        sale_price = %component.sale_price,
        "Updated component"
    );
    Ok(component)
}

/// Recomputes and stores a component's sale price from its stored purchase price and margin.
///
/// Running it twice without an intervening change stores the same value.
///
/// # Errors
/// Returns `Error::ComponentNotFound` if the component is gone, or a cost model or
/// database error.
pub async fn recompute_component<C>(db: &C, component_id: i64) -> Result<component::Model>
where
    C: ConnectionTrait,
{
    let component = Component::find_by_id(component_id)
        .one(db)
        .await?
        .ok_or(Error::ComponentNotFound { id: component_id })?;

    let sale_price =
        cost::component_sale_price(component.purchase_price.0, component.margin_percent.0)?;
    if sale_price == component.sale_price {
        debug!(component_id, %sale_price, "Component sale price unchanged");
        return Ok(component);
    }

    let mut active: component::ActiveModel = component.into();
    active.sale_price = Set(sale_price.into());
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    let component = active.update(db).await?;
    debug!(component_id, %sale_price, "Recomputed component sale price");
    Ok(component)
}

/// Ids of every product whose bill of materials references `component_id`.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_products_using_component<C>(db: &C, component_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    ProductComponent::find()
        .select_only()
        .column(product_component::Column::ProductId)
        .filter(product_component::Column::ComponentId.eq(component_id))
        .distinct()
        .order_by_asc(product_component::Column::ProductId)
        .into_tuple::<i64>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// Archives a component. Products keep using it and keep their prices.
///
/// # Errors
/// Returns an error if the component does not exist, is already archived, or the
/// update fails.
pub async fn archive_component<C>(db: &C, component_id: i64) -> Result<component::Model>
where
    C: ConnectionTrait,
{
    let mut component: component::ActiveModel = Component::find_by_id(component_id)
        .one(db)
        .await?
        .ok_or(Error::ComponentNotFound { id: component_id })?
        .into();

    if *component.is_archived.as_ref() {
        return Err(Error::ComponentNotFound { id: component_id });
    }

    component.is_archived = Set(true);
    component.updated_at = Set(chrono::Utc::now().naive_utc());
    component.update(db).await.map_err(Into::into)
}

/// Permanently deletes a component together with every bill-of-materials line using it.
///
/// Returns the ids of the products that lost the component; their prices are stale
/// until the cascade reprices them.
///
/// # Errors
/// Returns an error if the component does not exist or any delete fails. Nothing is
/// removed in that case.
pub async fn delete_component<C>(db: &C, component_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let component = Component::find_by_id(component_id)
        .one(&txn)
        .await?
        .ok_or(Error::ComponentNotFound { id: component_id })?;

    let affected = get_products_using_component(&txn, component_id).await?;
    ProductComponent::delete_many()
        .filter(product_component::Column::ComponentId.eq(component_id))
        .exec(&txn)
        .await?;
    component.delete(&txn).await?;

    txn.commit().await?;
    info!(
        component_id,
        affected_products = affected.len(),
        "Deleted component"
    );
    Ok(affected)
}

fn validated_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Component name cannot be empty"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_component_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_component(&db, "  ".to_string(), dec("10"), dec("20")).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let result = create_component(&db, "Plank".to_string(), dec("-10"), dec("20")).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_component_integration() -> Result<()> {
        let db = setup_test_db().await?;

        let component = create_component(&db, " Plank ".to_string(), dec("10"), dec("20")).await?;

        assert_eq!(component.name, "Plank");
        assert_eq!(component.purchase_price, dec("10"));
        assert_eq!(component.margin_percent, dec("20"));
        assert_eq!(component.sale_price, dec("12"));
        assert!(!component.is_archived);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_component_recomputes_sale_price() -> Result<()> {
        let db = setup_test_db().await?;
        let component = create_test_component(&db, "Plank").await?;

        let updated =
            update_component(&db, component.id, "Oak plank".to_string(), dec("10"), dec("50"))
                .await?;
        assert_eq!(updated.name, "Oak plank");
        assert_eq!(updated.sale_price, dec("15"));

        let stored = get_component_by_id(&db, component.id).await?.unwrap();
        assert_eq!(stored.sale_price, dec("15"));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_component_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = update_component(&db, 999, "Ghost".to_string(), dec("1"), dec("1")).await;
        assert!(matches!(result.unwrap_err(), Error::ComponentNotFound { id: 999 }));
        Ok(())
    }

    #[tokio::test]
    async fn test_recompute_component_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let component = create_test_component(&db, "Plank").await?;

        let first = recompute_component(&db, component.id).await?;
        let second = recompute_component(&db, component.id).await?;
        assert_eq!(first.sale_price, dec("12"));
        assert_eq!(first.sale_price, second.sale_price);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_all_active_components_excludes_archived() -> Result<()> {
        let db = setup_test_db().await?;
        let bolt = create_test_component(&db, "Bolt").await?;
        let nut = create_test_component(&db, "Nut").await?;
        let axle = create_test_component(&db, "Axle").await?;

        archive_component(&db, nut.id).await?;

        let active = get_all_active_components(&db).await?;
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, axle.id);
        assert_eq!(active[1].id, bolt.id);

        // Archiving twice is rejected
        let result = archive_component(&db, nut.id).await;
        assert!(matches!(result.unwrap_err(), Error::ComponentNotFound { id: _ }));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_component_by_name() -> Result<()> {
        let db = setup_test_db().await?;
        let bolt = create_test_component(&db, "Bolt").await?;

        assert_eq!(get_component_by_name(&db, "Bolt").await?.unwrap().id, bolt.id);
        assert!(get_component_by_name(&db, "Nut").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_component_removes_bom_lines() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        assert_eq!(
            get_products_using_component(db, scenario.component.id).await?,
            vec![scenario.product.id]
        );

        let affected = delete_component(db, scenario.component.id).await?;
        assert_eq!(affected, vec![scenario.product.id]);
        assert!(get_component_by_id(db, scenario.component.id).await?.is_none());
        assert!(
            crate::core::product::get_product_lines(db, scenario.product.id)
                .await?
                .is_empty()
        );
        Ok(())
    }
}
