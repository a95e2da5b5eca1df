//! Project entity - A client engagement bundling products at quantities.
//!
//! The status is stored as text (`draft`, `in_progress`, `done`, `cancelled`);
//! see [`crate::core::status::ProjectStatus`] for the typed view.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::status::ProjectStatus;

/// Project database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// Unique identifier for the project
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable project name
    pub name: String,
    /// Client the project is for, if known
    pub client: Option<String>,
    /// Pricing status: `"draft"`, `"in_progress"`, `"done"` or `"cancelled"`
    pub status: String,
    /// Soft delete flag
    pub is_archived: bool,
    /// When the project was created
    pub created_at: DateTime,
    /// When the project was last modified
    pub updated_at: DateTime,
}

impl Model {
    /// Parses the stored status.
    ///
    /// # Errors
    /// Returns `Error::InvalidStatus` if the column holds an unknown value.
    pub fn status(&self) -> crate::errors::Result<ProjectStatus> {
        self.status.parse()
    }
}

/// Defines relationships between Project and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One project has many product lines
    #[sea_orm(has_many = "super::project_product::Entity")]
    ProjectProducts,
}

impl Related<super::project_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
