//! Project status and the price action attached to each status transition.
//!
//! `draft` is the only status under which line prices track the live product price.
//! Any status may move to any other; the price action depends only on whether the
//! transition crosses the draft boundary.

use crate::{
    core::freeze,
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::info;

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Quote being prepared, prices are live
    Draft,
    /// Work accepted and running
    InProgress,
    /// Work delivered
    Done,
    /// Abandoned
    Cancelled,
}

impl ProjectStatus {
    /// Every status, in display order.
    pub const ALL: [Self; 4] = [Self::Draft, Self::InProgress, Self::Done, Self::Cancelled];

    /// Value stored in the `projects.status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// True for every status whose line prices must be frozen.
    #[must_use]
    pub const fn is_locked(self) -> bool {
        !matches!(self, Self::Draft)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| Error::InvalidStatus {
                value: value.to_string(),
            })
    }
}

/// What has to happen to a project's line prices for a given transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceAction {
    /// Capture the live price into every unfrozen line
    Freeze,
    /// Clear every frozen price so lines track live prices again
    Unfreeze,
    /// Nothing to do
    Keep,
}

/// Decides the price action for a transition from `old` to `new`.
#[must_use]
pub const fn transition_action(old: ProjectStatus, new: ProjectStatus) -> PriceAction {
    match (old.is_locked(), new.is_locked()) {
        (false, true) => PriceAction::Freeze,
        (true, false) => PriceAction::Unfreeze,
        _ => PriceAction::Keep,
    }
}

/// Applies the price action for a status change of `project_id`.
///
/// Must run on the same connection or transaction as the status write so a locked
/// project is never visible with unfrozen lines. Any error must abort that save.
///
/// # Errors
/// Returns an error if the freeze or unfreeze write fails.
pub async fn on_project_status_changed<C>(
    db: &C,
    project_id: i64,
    old: ProjectStatus,
    new: ProjectStatus,
) -> Result<PriceAction>
where
    C: ConnectionTrait,
{
    let action = transition_action(old, new);
    match action {
        PriceAction::Freeze => {
            let frozen = freeze::freeze_links_for_project(db, project_id).await?;
            info!(project_id, %old, %new, frozen, "Froze project line prices");
        }
        PriceAction::Unfreeze => {
            let cleared = freeze::unfreeze_links_for_project(db, project_id).await?;
            info!(project_id, %old, %new, cleared, "Unfroze project line prices");
        }
        PriceAction::Keep => {}
    }
    Ok(action)
}
