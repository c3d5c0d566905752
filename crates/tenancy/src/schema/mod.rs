//! Entity metadata.
//!
//! - [`EntityType`] - a table with columns, relations and an optional tenant
//!   column
//! - [`EntityRegistry`] - the validated table-name to entity mapping
//! - [`TenantAwareRelation`] - tenant-safe join conditions

mod entity;
mod registry;
mod relation;

pub use entity::{EntityType, RelationDef, TenantColumn};
pub use registry::{EntityRegistry, EntityRegistryBuilder};
pub use relation::{ForeignKeyJoin, RelationJoin, TenantAwareRelation};
