//! Cascade propagation - Repricing the dependents of a changed component or product.
//!
//! A component change reprices every product that uses it; a product change is
//! reported to the draft projects that link it. Locked projects are never touched,
//! their line prices are frozen.
//!
//! Propagation is best effort: a product that fails to reprice (deleted concurrently,
//! invalid data) is logged and recorded in the [`CascadeReport`] while the remaining
//! products are still processed. Nothing already committed is rolled back.

use crate::{
    core::{
        component,
        events::{PriceEvent, PriceEvents},
        product, project,
    },
    entities::{Component, Product},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, QuerySelect, prelude::*};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of one cascade run.
#[derive(Debug, Default)]
pub struct CascadeReport {
    /// Products whose stored prices were recomputed
    pub products_recomputed: Vec<i64>,
    /// Draft projects whose live totals follow the recomputed products
    pub draft_projects_affected: Vec<i64>,
    /// One `Error::Recompute` per product that could not be processed
    pub failures: Vec<Error>,
}

impl CascadeReport {
    /// True when every dependent was processed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a full catalog repricing sweep.
#[derive(Debug, Default)]
pub struct CatalogRepriceReport {
    /// Components whose sale price was recomputed
    pub components_recomputed: usize,
    /// Components that failed to recompute
    pub component_failures: Vec<Error>,
    /// Product pass over the whole catalog
    pub products: CascadeReport,
}

/// Reprices every product using `component_id` and notifies their draft projects.
///
/// # Errors
/// Returns an error only if the dependent products cannot be looked up. Failures on
/// individual products are collected in the report.
pub async fn on_component_changed<C>(
    db: &C,
    events: &PriceEvents,
    component_id: i64,
) -> Result<CascadeReport>
where
    C: ConnectionTrait,
{
    let products = component::get_products_using_component(db, component_id).await?;
    debug!(component_id, products = products.len(), "Cascading component change");
    Ok(reprice_products(db, events, &products).await)
}

/// Reports a product change to the draft projects linking it.
///
/// No write happens: draft totals read the live product price. Locked projects are
/// left alone. Returns the affected draft project ids.
///
/// # Errors
/// Returns an error if the project lookup fails.
pub async fn on_product_changed<C>(
    db: &C,
    events: &PriceEvents,
    product_id: i64,
) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let project_ids = project::get_draft_projects_using_product(db, product_id).await?;
    if !project_ids.is_empty() {
        debug!(product_id, projects = ?project_ids, "Draft projects follow product price");
        events.publish(PriceEvent::DraftProjectsAffected {
            product_id,
            project_ids: project_ids.clone(),
        });
    }
    Ok(project_ids)
}

/// Recomputes each product in `product_ids` and runs [`on_product_changed`] for it.
///
/// Products are independent of each other, so a failure on one never stops the rest.
pub async fn reprice_products<C>(db: &C, events: &PriceEvents, product_ids: &[i64]) -> CascadeReport
where
    C: ConnectionTrait,
{
    let mut report = CascadeReport::default();

    for &product_id in product_ids {
        if let Err(e) = product::recompute_product(db, product_id).await {
            if e.is_not_found() {
                warn!(product_id, error = %e, "Skipping product that vanished during cascade");
            } else {
                error!(product_id, error = %e, "Failed to recompute product during cascade");
            }
            report.failures.push(e.recompute("product", product_id));
            continue;
        }
        report.products_recomputed.push(product_id);
        events.publish(PriceEvent::ProductRepriced { product_id });

        match on_product_changed(db, events, product_id).await {
            Ok(projects) => report.draft_projects_affected.extend(projects),
            Err(e) => {
                warn!(product_id, error = %e, "Failed to notify draft projects");
                report.failures.push(e.recompute("product", product_id));
            }
        }
    }

    report.draft_projects_affected.sort_unstable();
    report.draft_projects_affected.dedup();
    report
}

/// Recomputes every component, then every product, in the catalog.
///
/// Used as a maintenance pass, e.g. at startup after seeding.
///
/// # Errors
/// Returns an error only if the catalog cannot be listed.
pub async fn reprice_catalog<C>(db: &C, events: &PriceEvents) -> Result<CatalogRepriceReport>
where
    C: ConnectionTrait,
{
    let mut report = CatalogRepriceReport::default();

    let component_ids: Vec<i64> = Component::find()
        .select_only()
        .column(crate::entities::component::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    for component_id in component_ids {
        match component::recompute_component(db, component_id).await {
            Ok(_) => {
                report.components_recomputed += 1;
                events.publish(PriceEvent::ComponentRepriced { component_id });
            }
            Err(e) => {
                error!(component_id, error = %e, "Failed to recompute component");
                report
                    .component_failures
                    .push(e.recompute("component", component_id));
            }
        }
    }

    let product_ids: Vec<i64> = Product::find()
        .select_only()
        .column(crate::entities::product::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    report.products = reprice_products(db, events, &product_ids).await;

    info!(
        components = report.components_recomputed,
        products = report.products.products_recomputed.len(),
        failures = report.component_failures.len() + report.products.failures.len(),
        "Repriced catalog"
    );
    Ok(report)
}

/// A cascade running in the background.
///
/// The caller decides whether to [`wait`](Self::wait) for the report or
/// [`detach`](Self::detach) it. Either way, failures are logged by the task itself.
#[derive(Debug)]
pub struct CascadeHandle {
    task: JoinHandle<Result<CascadeReport>>,
}

impl CascadeHandle {
    /// Spawns `cascade` on the runtime, logging its outcome against `entity`/`id`.
    pub fn spawn<F>(entity: &'static str, id: i64, cascade: F) -> Self
    where
        F: Future<Output = Result<CascadeReport>> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let result = cascade.await;
            match &result {
                Ok(report) if report.is_complete() => info!(
                    entity,
                    id,
                    products = report.products_recomputed.len(),
                    draft_projects = report.draft_projects_affected.len(),
                    "Cascade finished"
                ),
                Ok(report) => warn!(
                    entity,
                    id,
                    failures = report.failures.len(),
                    "Cascade finished with failures"
                ),
                Err(e) => error!(entity, id, error = %e, "Cascade failed"),
            }
            result
        });
        Self { task }
    }

    /// A handle for a cascade that had nothing to do.
    #[must_use]
    pub fn completed(report: CascadeReport) -> Self {
        Self {
            task: tokio::spawn(async move { Ok(report) }),
        }
    }

    /// Waits for the cascade and returns its report.
    ///
    /// # Errors
    /// Returns the cascade's own error, or `Error::Task` if the task panicked.
    pub async fn wait(self) -> Result<CascadeReport> {
        self.task.await?
    }

    /// Lets the cascade finish on its own.
    pub fn detach(self) {
        drop(self.task);
    }
}

/// Spawns [`on_component_changed`] in the background.
#[must_use]
pub fn spawn_component_cascade(
    db: Arc<DatabaseConnection>,
    events: PriceEvents,
    component_id: i64,
) -> CascadeHandle {
    CascadeHandle::spawn("component", component_id, async move {
        on_component_changed(&*db, &events, component_id).await
    })
}

/// Spawns [`reprice_products`] for `product_ids` in the background.
#[must_use]
pub fn spawn_products_cascade(
    db: Arc<DatabaseConnection>,
    events: PriceEvents,
    entity: &'static str,
    id: i64,
    product_ids: Vec<i64>,
) -> CascadeHandle {
    CascadeHandle::spawn(entity, id, async move {
        Ok(reprice_products(&*db, &events, &product_ids).await)
    })
}

/// Spawns [`on_product_changed`] in the background for an already recomputed product.
#[must_use]
pub fn spawn_product_cascade(
    db: Arc<DatabaseConnection>,
    events: PriceEvents,
    product_id: i64,
) -> CascadeHandle {
    CascadeHandle::spawn("product", product_id, async move {
        let draft_projects_affected = on_product_changed(&*db, &events, product_id).await?;
        Ok(CascadeReport {
            draft_projects_affected,
            ..CascadeReport::default()
        })
    })
}
