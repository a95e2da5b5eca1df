//! Core business logic - framework-agnostic catalog and pricing operations.

/// Read-through cache of project totals
pub mod cache;
/// Propagation of price changes to dependent products and projects
pub mod cascade;
/// Component catalog operations
pub mod component;
/// Pure pricing arithmetic
pub mod cost;
/// Price change notifications
pub mod events;
/// Line price freezing policy
pub mod freeze;
/// Product catalog and bill-of-materials operations
pub mod product;
/// Project lines, status changes and totals
pub mod project;
/// Catalog seeding
pub mod seed;
/// Project status and transition price actions
pub mod status;
