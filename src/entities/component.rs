//! Component entity - A purchasable raw part with a cost and a margin.
//!
//! The sale price is derived from `purchase_price` and `margin_percent` and stored
//! alongside them so products can be priced without recomputing every component.

use super::Amount;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Component database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "components")]
pub struct Model {
    /// Unique identifier for the component
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the component (e.g., "Oak plank", "M4 screw")
    pub name: String,
    /// Unit purchase price
    #[sea_orm(column_type = "Text")]
    pub purchase_price: Amount,
    /// Margin applied on top of the purchase price, in percent
    #[sea_orm(column_type = "Text")]
    pub margin_percent: Amount,
    /// Derived unit sale price: `purchase_price * (1 + margin_percent / 100)`
    #[sea_orm(column_type = "Text")]
    pub sale_price: Amount,
    /// Soft delete flag - archived components are hidden but keep pricing
    pub is_archived: bool,
    /// When the component was created
    pub created_at: DateTime,
    /// When the component was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Component and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One component appears in many product bills of materials
    #[sea_orm(has_many = "super::product_component::Entity")]
    ProductComponents,
}

impl Related<super::product_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductComponents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
