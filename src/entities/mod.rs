//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the catalog tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod amount;
pub mod component;
pub mod product;
pub mod product_component;
pub mod project;
pub mod project_product;

// Re-export specific types to avoid conflicts
pub use amount::Amount;
pub use component::{Column as ComponentColumn, Entity as Component, Model as ComponentModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use product_component::{
    Column as ProductComponentColumn, Entity as ProductComponent, Model as ProductComponentModel,
};
pub use project::{Column as ProjectColumn, Entity as Project, Model as ProjectModel};
pub use project_product::{
    Column as ProjectProductColumn, Entity as ProjectProduct, Model as ProjectProductModel,
};
