//! Error types for the tenancy layer.
//!
//! Errors are grouped by how they must be handled:
//!
//! - [`ConfigError`] - schema/registration mistakes, fatal at startup
//! - [`ResolutionError`] - a query references something the registry cannot
//!   map; compilation is aborted rather than running unscoped
//! - [`ContextError`] - the unit of work cannot establish a trustworthy tenant
//! - [`QueryError`] - ordinary query outcomes such as "no row found"
//! - [`BackendError`] - failures in the executing database
//!
//! Nothing in this crate retries; every error propagates to the caller.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The umbrella error type for all tenancy operations.
#[derive(Error, Debug)]
pub enum TenancyError {
    /// Schema and registration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Table/entity resolution errors
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Tenant context errors
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Query outcome errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl TenancyError {
    /// Returns `true` for errors that indicate a programming or schema mistake
    /// rather than a data condition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TenancyError::Config(_) | TenancyError::Resolution(_) | TenancyError::Context(_)
        )
    }
}

/// Errors detected while building the entity registry or relation metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two entity types map to the same physical table.
    #[error("table '{table}' is claimed by both '{first}' and '{second}'")]
    DuplicateTable {
        table: String,
        first: String,
        second: String,
    },

    /// Two entity types share a name.
    #[error("entity '{entity}' registered twice")]
    DuplicateEntity { entity: String },

    /// A table, column or relation name is not a plain SQL identifier.
    #[error("invalid identifier '{identifier}' on entity '{entity}'")]
    InvalidIdentifier { entity: String, identifier: String },

    /// The declared tenant column does not exist on the entity.
    #[error("tenant column '{column}' is not defined on entity '{entity}'")]
    UnknownTenantColumn { entity: String, column: String },

    /// A relation names an entity that was never registered.
    #[error("relation '{entity}.{relation}' targets unregistered entity '{target}'")]
    UnknownRelationTarget {
        entity: String,
        relation: String,
        target: String,
    },

    /// A relation or column referenced by name does not exist.
    #[error("entity '{entity}' has no relation named '{relation}'")]
    UnknownRelation { entity: String, relation: String },

    /// A tenant-aware relation has a side without a tenant column.
    #[error(
        "tenant-aware relation '{entity}.{relation}' requires a tenant column on '{missing_on}'"
    )]
    MissingRelationTenantColumn {
        entity: String,
        relation: String,
        missing_on: String,
    },

    /// A relation-derived tenant column whose foreign key does not point at
    /// the target's tenant column, so its value is not a tenant ID.
    #[error(
        "tenant relation '{entity}.{relation}' references '{target}.{target_column}', which is not the tenant column of '{target}'"
    )]
    IndirectTenantRelation {
        entity: String,
        relation: String,
        target: String,
        target_column: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors raised while resolving query aliases against the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No entity type is registered for the physical table.
    #[error("no entity registered for table '{table}'")]
    TableNotRegistered { table: String },

    /// No entity type is registered under the name.
    #[error("no entity registered with name '{entity}'")]
    EntityNotRegistered { entity: String },

    /// The alias is not part of the query.
    #[error("alias '{alias}' is not part of the query")]
    UnknownAlias { alias: String },
}

/// Errors establishing or requiring the tenant context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// An authenticated actor has no usable tenant-bearing profile.
    #[error(
        "actor '{actor}' has no resolvable profile ({reason}); refusing to continue without a tenant"
    )]
    ProfileUnavailable { actor: String, reason: String },

    /// Deny-by-default mode is active and no tenant is set.
    #[error("no current tenant while querying tenant-scoped table '{table}'")]
    MissingTenant { table: String },
}

/// Errors describing query outcomes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A single-row fetch found nothing.
    #[error("{entity} matching query does not exist")]
    DoesNotExist { entity: String },

    /// A single-row fetch found more than one row.
    #[error("get() returned {count} {entity} rows, expected exactly one")]
    MultipleObjectsReturned { entity: String, count: usize },

    /// The column is not defined on the entity.
    #[error("entity '{entity}' has no column '{column}'")]
    UnknownColumn { entity: String, column: String },

    /// An update with nothing to write.
    #[error("update of '{entity}' has no values to write")]
    EmptyUpdate { entity: String },

    /// A join reused an alias already present in the query.
    #[error("alias '{alias}' is already used in the query")]
    DuplicateAlias { alias: String },

    /// A value cannot be bound as a SQL parameter.
    #[error("value for column '{column}' is not a scalar")]
    UnsupportedValue { column: String },

    /// A result row was missing the expected value.
    #[error("result row has no value for '{column}'")]
    MissingValue { column: String },
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Value conversion error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for tenancy operations.
pub type TenancyResult<T> = Result<T, TenancyError>;

impl From<serde_json::Error> for TenancyError {
    fn from(err: serde_json::Error) -> Self {
        TenancyError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for TenancyError {
    fn from(err: rusqlite::Error) -> Self {
        TenancyError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for TenancyError {
    fn from(_err: r2d2::Error) -> Self {
        TenancyError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
