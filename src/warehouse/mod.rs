//! Warehouse module
//!
//! The write side of replication: the [`WarehouseClient`] collaborator trait,
//! stage storage backed by `object_store`, and an embedded DuckDB
//! implementation.

mod embedded;
mod stage;
mod types;

pub use embedded::DuckDbWarehouse;
pub use stage::{gzip, StageArea};
pub use types::{StagedFile, WarehouseClient, WarehouseContext};
