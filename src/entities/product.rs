//! Product entity - A bill of materials plus labor, with derived cost and sale price.
//!
//! `cost` and `sale_price` are stored caches of the cost model and must be rewritten
//! whenever the bill of materials or the labor parameters change.

use super::Amount;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "Garden bench")
    pub name: String,
    /// Labor rate per hour
    #[sea_orm(column_type = "Text")]
    pub hourly_rate: Amount,
    /// Labor hours needed to build one unit
    #[sea_orm(column_type = "Text")]
    pub hours: Amount,
    /// Derived unit cost: component purchase prices plus labor
    #[sea_orm(column_type = "Text")]
    pub cost: Amount,
    /// Derived unit sale price: component sale prices plus labor
    #[sea_orm(column_type = "Text")]
    pub sale_price: Amount,
    /// Soft delete flag - archived products are hidden but keep pricing
    pub is_archived: bool,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many bill-of-materials lines
    #[sea_orm(has_many = "super::product_component::Entity")]
    ProductComponents,
    /// One product is linked into many projects
    #[sea_orm(has_many = "super::project_product::Entity")]
    ProjectProducts,
}

impl Related<super::product_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductComponents.def()
    }
}

impl Related<super::project_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
