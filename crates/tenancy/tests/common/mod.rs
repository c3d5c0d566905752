//! Test infrastructure for the tenancy layer.
//!
//! Provides the stores/products/purchases shop schema used across the
//! integration tests, backed by an in-memory SQLite database.

pub mod fixtures;

pub use fixtures::*;
