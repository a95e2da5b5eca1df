//! Pricing context - The surface the UI layer calls after a form save.
//!
//! Each operation commits the direct entity's own write before returning, then hands
//! back a [`CascadeHandle`] for the dependents. Callers either await the handle or
//! detach it; failures in a detached cascade are logged by the cascade task.

use crate::{
    core::{
        cascade::{self, CascadeHandle, CascadeReport, CatalogRepriceReport},
        component,
        events::{PriceEvent, PriceEvents},
        product,
        project::{self, ProjectTotals},
        status::{PriceAction, ProjectStatus},
    },
    entities::{
        component as component_entity, product as product_entity, project as project_entity,
        project_product,
    },
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

/// Shared state for pricing operations.
/// Holds the database connection and the price event bus; cheap to clone.
#[derive(Debug, Clone)]
pub struct PricingContext {
    /// Database connection for all store operations
    pub database: Arc<DatabaseConnection>,
    /// Bus that receives every price event
    pub events: PriceEvents,
}

impl PricingContext {
    /// Creates a context with a fresh event bus.
    #[must_use]
    pub fn new(database: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self::with_events(database, PriceEvents::default())
    }

    /// Creates a context publishing to an existing event bus.
    #[must_use]
    pub fn with_events(database: impl Into<Arc<DatabaseConnection>>, events: PriceEvents) -> Self {
        Self {
            database: database.into(),
            events,
        }
    }

    /// The underlying connection.
    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        &self.database
    }

    /// Recomputes a component's own sale price, then reprices its products in the
    /// background.
    ///
    /// # Errors
    /// Returns an error if the component cannot be recomputed; the cascade is not
    /// started in that case.
    pub async fn recompute_component(&self, component_id: i64) -> Result<CascadeHandle> {
        component::recompute_component(self.db(), component_id).await?;
        self.events
            .publish(PriceEvent::ComponentRepriced { component_id });
        Ok(cascade::spawn_component_cascade(
            Arc::clone(&self.database),
            self.events.clone(),
            component_id,
        ))
    }

    /// Recomputes a product's own prices, then notifies its draft projects in the
    /// background.
    ///
    /// # Errors
    /// Returns an error if the product cannot be recomputed.
    pub async fn recompute_product(&self, product_id: i64) -> Result<CascadeHandle> {
        product::recompute_product(self.db(), product_id).await?;
        Ok(self.product_repriced(product_id))
    }

    /// Saves a component edit and cascades the new price.
    ///
    /// # Errors
    /// Returns a validation, not-found or database error from the save.
    pub async fn update_component(
        &self,
        component_id: i64,
        name: String,
        purchase_price: Decimal,
        margin_percent: Decimal,
    ) -> Result<(component_entity::Model, CascadeHandle)> {
        let component = component::update_component(
            self.db(),
            component_id,
            name,
            purchase_price,
            margin_percent,
        )
        .await?;
        self.events
            .publish(PriceEvent::ComponentRepriced { component_id });
        let handle = cascade::spawn_component_cascade(
            Arc::clone(&self.database),
            self.events.clone(),
            component_id,
        );
        Ok((component, handle))
    }

    /// Saves a product's labor edit and notifies its draft projects.
    ///
    /// # Errors
    /// Returns a validation, not-found or database error from the save.
    pub async fn update_product_labor(
        &self,
        product_id: i64,
        name: String,
        hourly_rate: Decimal,
        hours: Decimal,
    ) -> Result<(product_entity::Model, CascadeHandle)> {
        let product =
            product::update_product_labor(self.db(), product_id, name, hourly_rate, hours).await?;
        Ok((product, self.product_repriced(product_id)))
    }

    /// Sets a component quantity in a product's bill of materials.
    ///
    /// # Errors
    /// Returns a validation, not-found or database error from the save.
    pub async fn set_product_component(
        &self,
        product_id: i64,
        component_id: i64,
        quantity: i32,
    ) -> Result<(product_entity::Model, CascadeHandle)> {
        let product =
            product::set_product_component(self.db(), product_id, component_id, quantity).await?;
        Ok((product, self.product_repriced(product_id)))
    }

    /// Removes a component from a product's bill of materials.
    ///
    /// # Errors
    /// Returns a not-found or database error from the save.
    pub async fn remove_product_component(
        &self,
        product_id: i64,
        component_id: i64,
    ) -> Result<(product_entity::Model, CascadeHandle)> {
        let product = product::remove_product_component(self.db(), product_id, component_id).await?;
        Ok((product, self.product_repriced(product_id)))
    }

    /// Permanently deletes a component and reprices the products that used it.
    ///
    /// # Errors
    /// Returns a not-found or database error from the delete.
    pub async fn delete_component(&self, component_id: i64) -> Result<CascadeHandle> {
        let products = component::delete_component(self.db(), component_id).await?;
        Ok(cascade::spawn_products_cascade(
            Arc::clone(&self.database),
            self.events.clone(),
            "component",
            component_id,
            products,
        ))
    }

    /// Permanently deletes a product and every line using it.
    ///
    /// # Errors
    /// Returns a not-found or database error from the delete.
    pub async fn delete_product(&self, product_id: i64) -> Result<Vec<i64>> {
        let projects = product::delete_product(self.db(), product_id).await?;
        for &project_id in &projects {
            self.lines_changed(project_id);
        }
        Ok(projects)
    }

    /// Totals of a project, computed from the current store.
    ///
    /// # Errors
    /// Returns an error if the project does not exist or the totals cannot be computed.
    pub async fn project_totals(&self, project_id: i64) -> Result<ProjectTotals> {
        project::project_totals(self.db(), project_id).await
    }

    /// Adds a product line to a project.
    ///
    /// # Errors
    /// Returns a validation, not-found or database error from the insert.
    pub async fn add_product_to_project(
        &self,
        project_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<project_product::Model> {
        let link =
            project::add_product_to_project(self.db(), project_id, product_id, quantity).await?;
        self.lines_changed(project_id);
        Ok(link)
    }

    /// Changes the quantity of a project line.
    ///
    /// # Errors
    /// Returns a validation, not-found or database error from the update.
    pub async fn update_line_quantity(
        &self,
        link_id: i64,
        quantity: i32,
    ) -> Result<project_product::Model> {
        let link = project::update_line_quantity(self.db(), link_id, quantity).await?;
        self.lines_changed(link.project_id);
        Ok(link)
    }

    /// Removes a line from its project. Returns the project id.
    ///
    /// # Errors
    /// Returns a not-found or database error from the delete.
    pub async fn remove_project_line(&self, link_id: i64) -> Result<i64> {
        let project_id = project::remove_project_line(self.db(), link_id).await?;
        self.lines_changed(project_id);
        Ok(project_id)
    }

    /// Archives a project.
    ///
    /// # Errors
    /// Returns a not-found or database error from the update.
    pub async fn archive_project(&self, project_id: i64) -> Result<project_entity::Model> {
        let project = project::archive_project(self.db(), project_id).await?;
        self.lines_changed(project_id);
        Ok(project)
    }

    /// Permanently deletes a project and its lines.
    ///
    /// # Errors
    /// Returns a not-found or database error from the delete.
    pub async fn delete_project(&self, project_id: i64) -> Result<()> {
        project::delete_project(self.db(), project_id).await?;
        self.lines_changed(project_id);
        Ok(())
    }

    /// Changes a project's status, freezing or unfreezing its line prices in the same
    /// transaction.
    ///
    /// # Errors
    /// Returns an error if the project does not exist or any write fails; the status
    /// is unchanged in that case.
    pub async fn change_project_status(
        &self,
        project_id: i64,
        new_status: ProjectStatus,
    ) -> Result<project_entity::Model> {
        let (project, action) =
            project::set_project_status(self.db(), project_id, new_status).await?;
        self.publish_price_action(project_id, action);
        Ok(project)
    }

    /// Handles a status change `old` → `new` coming from the project save flow.
    ///
    /// Writes the status if it is still pending and applies the price action in the
    /// same transaction, see [`project::apply_status_change`].
    ///
    /// # Errors
    /// Returns an error if the stored status matches neither side, or if any write
    /// fails. Nothing is saved in that case.
    pub async fn on_project_status_changed(
        &self,
        project_id: i64,
        old: ProjectStatus,
        new: ProjectStatus,
    ) -> Result<PriceAction> {
        let (_, action) = project::apply_status_change(self.db(), project_id, old, new).await?;
        self.publish_price_action(project_id, action);
        Ok(action)
    }

    /// Recomputes every component and product in the catalog.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be listed.
    pub async fn reprice_catalog(&self) -> Result<CatalogRepriceReport> {
        cascade::reprice_catalog(self.db(), &self.events).await
    }

    /// Reprices the given products in the background.
    #[must_use]
    pub fn reprice_products(&self, product_ids: Vec<i64>) -> CascadeHandle {
        if product_ids.is_empty() {
            return CascadeHandle::completed(CascadeReport::default());
        }
        cascade::spawn_products_cascade(
            Arc::clone(&self.database),
            self.events.clone(),
            "catalog",
            0,
            product_ids,
        )
    }

    fn product_repriced(&self, product_id: i64) -> CascadeHandle {
        self.events.publish(PriceEvent::ProductRepriced { product_id });
        cascade::spawn_product_cascade(Arc::clone(&self.database), self.events.clone(), product_id)
    }

    fn lines_changed(&self, project_id: i64) {
        self.events
            .publish(PriceEvent::ProjectLinesChanged { project_id });
    }

    fn publish_price_action(&self, project_id: i64, action: PriceAction) {
        match action {
            PriceAction::Freeze => self
                .events
                .publish(PriceEvent::ProjectPricesFrozen { project_id }),
            PriceAction::Unfreeze => self
                .events
                .publish(PriceEvent::ProjectPricesUnfrozen { project_id }),
            PriceAction::Keep => info!(project_id, "Status change needed no price action"),
        }
    }
}
