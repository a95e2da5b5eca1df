//! Project product entity - A product line inside a project.
//!
//! `frozen_unit_price` is `None` while the project is in draft and holds the
//! product sale price captured at freeze time for every other status.

use super::Amount;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Project line database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "project_products")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning project
    pub project_id: i64,
    /// Linked product
    pub product_id: i64,
    /// Number of product units (at least 1)
    pub quantity: i32,
    /// Unit price fixed when the project left draft, `None` while live
    #[sea_orm(column_type = "Text", nullable)]
    pub frozen_unit_price: Option<Amount>,
    /// When the unit price was frozen
    pub frozen_at: Option<DateTime>,
}

/// Defines relationships between a project line and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one project
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
    /// Each line references one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
