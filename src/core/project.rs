//! Project business logic - Product lines, status changes and totals.
//!
//! Projects start in draft, where every line tracks its product's live sale price.
//! Changing the status runs the price action from [`crate::core::status`] inside the
//! same database transaction as the status write.

use crate::{
    core::{
        cost::{self, Margin},
        freeze,
        status::{self, PriceAction, ProjectStatus},
    },
    entities::{Product, Project, ProjectProduct, product, project, project_product},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// A project line together with its product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLine {
    /// The line itself (project, product, quantity, frozen price)
    pub link: project_product::Model,
    /// The linked product with its current prices
    pub product: product::Model,
}

impl ProjectLine {
    /// Unit price used for totals, see [`freeze::effective_unit_price`].
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        freeze::effective_unit_price(&self.link, &self.product)
    }
}

/// Derived totals of a project. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTotals {
    /// Project the totals belong to
    pub project_id: i64,
    /// `Σ(effective unit price × quantity)`
    pub total_sale: Decimal,
    /// `Σ(current product cost × quantity)`, live even for locked projects
    pub total_cost: Decimal,
    /// Margin of `total_sale` over `total_cost`
    pub margin: Margin,
    /// Distinct products the totals depend on
    pub product_ids: Vec<i64>,
}

/// Retrieves all active (non-archived) projects, newest first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_projects<C>(db: &C) -> Result<Vec<project::Model>>
where
    C: ConnectionTrait,
{
    Project::find()
        .filter(project::Column::IsArchived.eq(false))
        .order_by_desc(project::Column::CreatedAt)
        .order_by_desc(project::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific project by its unique ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_project_by_id<C>(db: &C, project_id: i64) -> Result<Option<project::Model>>
where
    C: ConnectionTrait,
{
    Project::find_by_id(project_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a project in draft status.
///
/// # Errors
/// Returns an error if the name is empty or the insert fails.
pub async fn create_project<C>(
    db: &C,
    name: String,
    client: Option<String>,
) -> Result<project::Model>
where
    C: ConnectionTrait,
{
    let name = validated_name(&name)?;
    let now = chrono::Utc::now().naive_utc();

    let project = project::ActiveModel {
        name: Set(name),
        client: Set(normalized_client(client)),
        status: Set(ProjectStatus::Draft.as_str().to_string()),
        is_archived: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let project = project.insert(db).await?;
    info!(project_id = project.id, name = %project.name, "Created project");
    Ok(project)
}

/// Renames a project and changes its client. The status is left alone.
///
/// # Errors
/// Returns an error if the name is empty, the project does not exist, or the
/// update fails.
pub async fn update_project_details<C>(
    db: &C,
    project_id: i64,
    new_name: String,
    client: Option<String>,
) -> Result<project::Model>
where
    C: ConnectionTrait,
{
    let name = validated_name(&new_name)?;
    let mut project: project::ActiveModel = find_project(db, project_id).await?.into();

    project.name = Set(name);
    project.client = Set(normalized_client(client));
    project.updated_at = Set(chrono::Utc::now().naive_utc());
    project.update(db).await.map_err(Into::into)
}

/// Changes a project's status and applies the matching price action atomically.
///
/// Leaving draft freezes every line at its product's current sale price, returning to
/// draft clears every frozen price. If the price action fails nothing is saved.
///
/// # Errors
/// Returns an error if the project does not exist, its stored status is invalid, or
/// any write fails.
pub async fn set_project_status<C>(
    db: &C,
    project_id: i64,
    new_status: ProjectStatus,
) -> Result<(project::Model, PriceAction)>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let project = find_project(&txn, project_id).await?;
    let old_status = project.status()?;
    let changed = write_status(&txn, project, old_status, new_status).await?;

    txn.commit().await?;
    info!(project_id, old = %old_status, new = %new_status, "Changed project status");
    Ok(changed)
}

/// Applies a status change `old` → `new` reported by the project save flow.
///
/// The stored status must be either `old` (the save is still pending and is written
/// here) or `new` (already saved). The status write and the price action share one
/// transaction, so a failed freeze leaves both the status and every line untouched.
///
/// # Errors
/// Returns `Error::Validation` if the stored status is neither `old` nor `new`, or
/// an error if the project does not exist or any write fails.
pub async fn apply_status_change<C>(
    db: &C,
    project_id: i64,
    old: ProjectStatus,
    new: ProjectStatus,
) -> Result<(project::Model, PriceAction)>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let project = find_project(&txn, project_id).await?;
    let stored = project.status()?;
    if stored != old && stored != new {
        return Err(Error::validation(format!(
            "Project {project_id} is {stored}, expected {old} or {new}"
        )));
    }
    let changed = write_status(&txn, project, old, new).await?;

    txn.commit().await?;
    info!(project_id, %old, %new, "Applied project status change");
    Ok(changed)
}

async fn write_status<C>(
    db: &C,
    project: project::Model,
    old: ProjectStatus,
    new: ProjectStatus,
) -> Result<(project::Model, PriceAction)>
where
    C: ConnectionTrait,
{
    let project_id = project.id;
    let project = if project.status()? == new {
        project
    } else {
        let mut active: project::ActiveModel = project.into();
        active.status = Set(new.as_str().to_string());
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        active.update(db).await?
    };

    let action = status::on_project_status_changed(db, project_id, old, new).await?;
    Ok((project, action))
}

/// Adds a product line to a project.
///
/// A line added while the project is locked is frozen right away at the product's
/// current sale price.
///
/// # Errors
/// Returns an error if the quantity is less than 1, the project or product does not
/// exist, or the insert fails.
pub async fn add_product_to_project<C>(
    db: &C,
    project_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<project_product::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    cost::quantity_from_db(quantity)?;

    let txn = db.begin().await?;
    let project = find_project(&txn, project_id).await?;
    let product = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    let frozen_unit_price = freeze::initial_frozen_price(project.status()?, &product);
    let link = project_product::ActiveModel {
        project_id: Set(project_id),
        product_id: Set(product_id),
        quantity: Set(quantity),
        frozen_unit_price: Set(frozen_unit_price.map(Into::into)),
        frozen_at: Set(frozen_unit_price.map(|_| chrono::Utc::now().naive_utc())),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        project_id,
        product_id,
        quantity,
        frozen = frozen_unit_price.is_some(),
        "Added product to project"
    );
    Ok(link)
}

/// Changes the quantity of a project line. The unit price is left alone.
///
/// # Errors
/// Returns an error if the quantity is less than 1, the line does not exist, or the
/// update fails.
pub async fn update_line_quantity<C>(
    db: &C,
    link_id: i64,
    quantity: i32,
) -> Result<project_product::Model>
where
    C: ConnectionTrait,
{
    cost::quantity_from_db(quantity)?;

    let mut link: project_product::ActiveModel = ProjectProduct::find_by_id(link_id)
        .one(db)
        .await?
        .ok_or(Error::LinkNotFound { id: link_id })?
        .into();
    link.quantity = Set(quantity);
    link.update(db).await.map_err(Into::into)
}

/// Removes a line from its project. Returns the project id.
///
/// # Errors
/// Returns an error if the line does not exist or the delete fails.
pub async fn remove_project_line<C>(db: &C, link_id: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    let link = ProjectProduct::find_by_id(link_id)
        .one(db)
        .await?
        .ok_or(Error::LinkNotFound { id: link_id })?;
    let project_id = link.project_id;
    link.delete(db).await?;
    Ok(project_id)
}

/// Lists a project's lines with their products, ordered by line id.
///
/// # Errors
/// Returns `Error::ProductNotFound` for a dangling line or an error if the query fails.
pub async fn get_project_lines<C>(db: &C, project_id: i64) -> Result<Vec<ProjectLine>>
where
    C: ConnectionTrait,
{
    ProjectProduct::find()
        .filter(project_product::Column::ProjectId.eq(project_id))
        .order_by_asc(project_product::Column::Id)
        .find_also_related(Product)
        .all(db)
        .await?
        .into_iter()
        .map(|(link, product)| {
            let product = product.ok_or(Error::ProductNotFound {
                id: link.product_id,
            })?;
            Ok(ProjectLine { link, product })
        })
        .collect()
}

/// Computes a project's totals from the current store.
///
/// Draft lines use the live product sale price, frozen lines their frozen price. The
/// cost side always uses the product's current cost.
///
/// # Errors
/// Returns an error if the project does not exist, a line is dangling, or the sums
/// overflow.
pub async fn project_totals<C>(db: &C, project_id: i64) -> Result<ProjectTotals>
where
    C: ConnectionTrait,
{
    find_project(db, project_id).await?;
    let lines = get_project_lines(db, project_id).await?;
    totals_from_lines(project_id, &lines)
}

/// Sums project lines into [`ProjectTotals`].
///
/// # Errors
/// Returns `Error::Validation` for a zero quantity and `Error::Arithmetic` on overflow.
pub fn totals_from_lines(project_id: i64, lines: &[ProjectLine]) -> Result<ProjectTotals> {
    let mut total_sale = Decimal::ZERO;
    let mut total_cost = Decimal::ZERO;
    let mut product_ids = Vec::with_capacity(lines.len());

    for line in lines {
        let quantity = cost::quantity_from_db(line.link.quantity)?;
        let sale = cost::line_total(line.unit_price(), quantity, "project total sale")?;
        let line_cost = cost::line_total(line.product.cost.0, quantity, "project total cost")?;
        total_sale = total_sale.checked_add(sale).ok_or(Error::Arithmetic {
            what: "project total sale",
        })?;
        total_cost = total_cost.checked_add(line_cost).ok_or(Error::Arithmetic {
            what: "project total cost",
        })?;
        product_ids.push(line.product.id);
    }
    product_ids.sort_unstable();
    product_ids.dedup();

    Ok(ProjectTotals {
        project_id,
        total_sale,
        total_cost,
        margin: cost::margin(total_cost, total_sale),
        product_ids,
    })
}

/// Ids of draft projects with at least one line on `product_id`.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_draft_projects_using_product<C>(db: &C, product_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let mut projects: Vec<i64> = ProjectProduct::find()
        .inner_join(Project)
        .filter(project_product::Column::ProductId.eq(product_id))
        .filter(project::Column::Status.eq(ProjectStatus::Draft.as_str()))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.project_id)
        .collect();
    projects.sort_unstable();
    projects.dedup();
    Ok(projects)
}

/// Archives a project. Its lines and frozen prices are kept.
///
/// # Errors
/// Returns an error if the project does not exist, is already archived, or the
/// update fails.
pub async fn archive_project<C>(db: &C, project_id: i64) -> Result<project::Model>
where
    C: ConnectionTrait,
{
    let mut project: project::ActiveModel = find_project(db, project_id).await?.into();

    if *project.is_archived.as_ref() {
        return Err(Error::ProjectNotFound { id: project_id });
    }

    project.is_archived = Set(true);
    project.updated_at = Set(chrono::Utc::now().naive_utc());
    project.update(db).await.map_err(Into::into)
}

/// Permanently deletes a project and all of its lines.
///
/// # Errors
/// Returns an error if the project does not exist or any delete fails.
pub async fn delete_project<C>(db: &C, project_id: i64) -> Result<()>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let project = find_project(&txn, project_id).await?;

    ProjectProduct::delete_many()
        .filter(project_product::Column::ProjectId.eq(project_id))
        .exec(&txn)
        .await?;
    project.delete(&txn).await?;

    txn.commit().await?;
    info!(project_id, "Deleted project");
    Ok(())
}

async fn find_project<C>(db: &C, project_id: i64) -> Result<project::Model>
where
    C: ConnectionTrait,
{
    Project::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or(Error::ProjectNotFound { id: project_id })
}

fn validated_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Project name cannot be empty"));
    }
    Ok(name.to_string())
}

fn normalized_client(client: Option<String>) -> Option<String> {
    client
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_project_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_project(&db, " ".to_string(), None).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let result = add_product_to_project(&db, 1, 1, 0).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let result = update_line_quantity(&db, 1, -1).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_project_starts_in_draft() -> Result<()> {
        let db = setup_test_db().await?;

        let project = create_project(&db, "Patio".to_string(), Some("  ".to_string())).await?;
        assert_eq!(project.status()?, ProjectStatus::Draft);
        assert_eq!(project.client, None);

        let updated =
            update_project_details(&db, project.id, "Patio v2".to_string(), Some("Acme".to_string()))
                .await?;
        assert_eq!(updated.name, "Patio v2");
        assert_eq!(updated.client.as_deref(), Some("Acme"));
        assert_eq!(updated.status()?, ProjectStatus::Draft);
        Ok(())
    }

    #[tokio::test]
    async fn test_draft_totals_are_live() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        let totals = project_totals(db, scenario.project.id).await?;
        assert_eq!(totals.total_sale, dec("222"));
        assert_eq!(totals.total_cost, dec("210"));
        assert_eq!(totals.margin.amount, dec("12"));
        assert_eq!(totals.product_ids, vec![scenario.product.id]);

        crate::core::product::update_product_labor(
            db,
            scenario.product.id,
            "Bench".to_string(),
            dec("56"),
            dec("1"),
        )
        .await?;
        let totals = project_totals(db, scenario.project.id).await?;
        assert_eq!(totals.total_sale, dec("240"));
        Ok(())
    }

    #[tokio::test]
    async fn test_leaving_draft_freezes_lines() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        let (project, action) =
            set_project_status(db, scenario.project.id, ProjectStatus::InProgress).await?;
        assert_eq!(action, PriceAction::Freeze);
        assert_eq!(project.status()?, ProjectStatus::InProgress);

        let lines = get_project_lines(db, scenario.project.id).await?;
        assert!(lines.iter().all(|l| l.link.frozen_unit_price.is_some()));
        assert_eq!(lines[0].unit_price(), dec("74"));

        // Product gets more expensive, the locked project does not follow
        crate::core::product::update_product_labor(
            db,
            scenario.product.id,
            "Bench".to_string(),
            dec("76"),
            dec("1"),
        )
        .await?;
        let totals = project_totals(db, scenario.project.id).await?;
        assert_eq!(totals.total_sale, dec("222"));
        // Cost stays live
        assert_eq!(totals.total_cost, dec("288"));
        Ok(())
    }

    #[tokio::test]
    async fn test_freeze_failure_keeps_project_in_draft() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;
        insert_dangling_line(db, scenario.project.id).await?;

        let result = set_project_status(db, scenario.project.id, ProjectStatus::Done).await;
        assert!(matches!(result.unwrap_err(), Error::ProductNotFound { id: 9999 }));

        let project = get_project_by_id(db, scenario.project.id).await?.unwrap();
        assert_eq!(project.status()?, ProjectStatus::Draft);
        let links = ProjectProduct::find()
            .filter(project_product::Column::ProjectId.eq(scenario.project.id))
            .all(db)
            .await?;
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.frozen_unit_price.is_none()));
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_status_change_writes_pending_status() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        let (project, action) =
            apply_status_change(db, scenario.project.id, ProjectStatus::Draft, ProjectStatus::Done)
                .await?;
        assert_eq!(action, PriceAction::Freeze);
        assert_eq!(project.status()?, ProjectStatus::Done);
        let lines = get_project_lines(db, scenario.project.id).await?;
        assert_eq!(lines[0].link.frozen_unit_price, Some(amount("74")));

        // Already saved by the caller: only the price action runs
        let (project, action) =
            apply_status_change(db, scenario.project.id, ProjectStatus::Draft, ProjectStatus::Done)
                .await?;
        assert_eq!(action, PriceAction::Freeze);
        assert_eq!(project.status()?, ProjectStatus::Done);

        let result = apply_status_change(
            db,
            scenario.project.id,
            ProjectStatus::Draft,
            ProjectStatus::InProgress,
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_status_change_rolls_back_on_freeze_failure() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;
        insert_dangling_line(db, scenario.project.id).await?;

        let result =
            apply_status_change(db, scenario.project.id, ProjectStatus::Draft, ProjectStatus::Done)
                .await;
        assert!(result.unwrap_err().is_not_found());

        let project = get_project_by_id(db, scenario.project.id).await?.unwrap();
        assert_eq!(project.status()?, ProjectStatus::Draft);
        let links = ProjectProduct::find()
            .filter(project_product::Column::ProjectId.eq(scenario.project.id))
            .all(db)
            .await?;
        assert!(links.iter().all(|l| l.frozen_unit_price.is_none()));
        Ok(())
    }

    #[tokio::test]
    async fn test_locked_to_locked_keeps_prices() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        set_project_status(db, scenario.project.id, ProjectStatus::InProgress).await?;
        let (_, action) = set_project_status(db, scenario.project.id, ProjectStatus::Done).await?;
        assert_eq!(action, PriceAction::Keep);

        let lines = get_project_lines(db, scenario.project.id).await?;
        assert_eq!(lines[0].link.frozen_unit_price, Some(amount("74")));
        Ok(())
    }

    #[tokio::test]
    async fn test_returning_to_draft_unfreezes() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        set_project_status(db, scenario.project.id, ProjectStatus::Done).await?;
        crate::core::product::update_product_labor(
            db,
            scenario.product.id,
            "Bench".to_string(),
            dec("56"),
            dec("1"),
        )
        .await?;
        assert_eq!(project_totals(db, scenario.project.id).await?.total_sale, dec("222"));

        let (_, action) = set_project_status(db, scenario.project.id, ProjectStatus::Draft).await?;
        assert_eq!(action, PriceAction::Unfreeze);
        let lines = get_project_lines(db, scenario.project.id).await?;
        assert!(lines.iter().all(|l| l.link.frozen_unit_price.is_none()));
        assert_eq!(project_totals(db, scenario.project.id).await?.total_sale, dec("240"));
        Ok(())
    }

    #[tokio::test]
    async fn test_status_change_on_missing_project() -> Result<()> {
        let db = setup_test_db().await?;
        let result = set_project_status(&db, 5, ProjectStatus::Done).await;
        assert!(matches!(result.unwrap_err(), Error::ProjectNotFound { id: 5 }));
        Ok(())
    }

    #[tokio::test]
    async fn test_line_added_to_locked_project_is_frozen() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        set_project_status(db, scenario.project.id, ProjectStatus::InProgress).await?;
        let link = add_product_to_project(db, scenario.project.id, scenario.product.id, 1).await?;
        assert_eq!(link.frozen_unit_price, Some(amount("74")));
        assert!(link.frozen_at.is_some());

        let draft = create_project(db, "Shed".to_string(), None).await?;
        let link = add_product_to_project(db, draft.id, scenario.product.id, 1).await?;
        assert_eq!(link.frozen_unit_price, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_line_quantity_and_removal() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        let link = update_line_quantity(db, scenario.link.id, 1).await?;
        assert_eq!(link.quantity, 1);
        assert_eq!(project_totals(db, scenario.project.id).await?.total_sale, dec("74"));

        assert_eq!(remove_project_line(db, scenario.link.id).await?, scenario.project.id);
        let totals = project_totals(db, scenario.project.id).await?;
        assert_eq!(totals.total_sale, Decimal::ZERO);
        assert_eq!(totals.margin.percent, None);

        let result = remove_project_line(db, scenario.link.id).await;
        assert!(matches!(result.unwrap_err(), Error::LinkNotFound { id: _ }));
        Ok(())
    }

    #[tokio::test]
    async fn test_draft_projects_using_product() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        let locked = create_project(db, "Deck".to_string(), None).await?;
        add_product_to_project(db, locked.id, scenario.product.id, 2).await?;
        set_project_status(db, locked.id, ProjectStatus::Done).await?;

        assert_eq!(
            get_draft_projects_using_product(db, scenario.product.id).await?,
            vec![scenario.project.id]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_and_delete_project() -> Result<()> {
        let scenario = setup_scenario().await?;
        let db = &scenario.db;

        archive_project(db, scenario.project.id).await?;
        assert!(get_all_active_projects(db).await?.is_empty());
        assert_eq!(get_project_lines(db, scenario.project.id).await?.len(), 1);

        delete_project(db, scenario.project.id).await?;
        assert!(get_project_by_id(db, scenario.project.id).await?.is_none());
        assert!(get_project_lines(db, scenario.project.id).await?.is_empty());

        let result = project_totals(db, scenario.project.id).await;
        assert!(matches!(result.unwrap_err(), Error::ProjectNotFound { id: _ }));
        Ok(())
    }
}
