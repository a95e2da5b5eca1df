//! Price-freeze policy for project lines.
//!
//! A line's effective unit price is its frozen price when one is set, otherwise the
//! product's current sale price. Freezing never overwrites an existing frozen price.

use crate::{
    core::status::ProjectStatus,
    entities::{Product, ProjectProduct, product, project_product},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Set, prelude::*};
use tracing::debug;

/// Unit price used for totals: the frozen price if any, else the live product price.
#[must_use]
pub fn effective_unit_price(link: &project_product::Model, product: &product::Model) -> Decimal {
    link.frozen_unit_price.unwrap_or(product.sale_price).0
}

/// True for every status except draft.
#[must_use]
pub const fn should_freeze(status: ProjectStatus) -> bool {
    status.is_locked()
}

/// Frozen price a brand new line gets under `status`: `None` for draft,
/// the product's current sale price otherwise.
#[must_use]
pub fn initial_frozen_price(status: ProjectStatus, product: &product::Model) -> Option<Decimal> {
    should_freeze(status).then_some(product.sale_price.0)
}

/// Freezes every unfrozen line of `project_id` at its product's current sale price.
///
/// Lines that already carry a frozen price are left untouched, so calling this twice
/// changes nothing the second time. Returns the number of lines frozen.
///
/// # Errors
/// Returns `Error::ProductNotFound` if a line references a missing product, or a
/// database error if a write fails.
pub async fn freeze_links_for_project<C>(db: &C, project_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let links = ProjectProduct::find()
        .filter(project_product::Column::ProjectId.eq(project_id))
        .filter(project_product::Column::FrozenUnitPrice.is_null())
        .find_also_related(Product)
        .all(db)
        .await?;

    let now = chrono::Utc::now().naive_utc();
    let mut frozen = 0;
    for (link, product) in links {
        let product = product.ok_or(Error::ProductNotFound {
            id: link.product_id,
        })?;
        debug!(
            link_id = link.id,
            product_id = product.id,
            price = %product.sale_price,
            "Freezing project line"
        );
        let mut line: project_product::ActiveModel = link.into();
        line.frozen_unit_price = Set(Some(product.sale_price));
        line.frozen_at = Set(Some(now));
        line.update(db).await?;
        frozen += 1;
    }
    Ok(frozen)
}

/// Clears the frozen price of every line of `project_id`.
///
/// Only meant for a project returning to draft. Returns the number of lines cleared.
///
/// # Errors
/// Returns a database error if the update fails.
pub async fn unfreeze_links_for_project<C>(db: &C, project_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = ProjectProduct::update_many()
        .set(project_product::ActiveModel {
            frozen_unit_price: Set(None),
            frozen_at: Set(None),
            ..Default::default()
        })
        .filter(project_product::Column::ProjectId.eq(project_id))
        .filter(project_product::Column::FrozenUnitPrice.is_not_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
