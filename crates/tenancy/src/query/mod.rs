//! Query representation shared by the tenant policy and the backends.
//!
//! - [`SqlFragment`] / [`SqlParam`] - parameterized SQL pieces
//! - [`QueryBuilder`] - the alias-graph boundary the policy rewrites
//! - [`SelectQuery`] - the concrete builder and renderer

mod builder;
mod sql;

pub use builder::{
    Aggregate, AggregateFunction, Join, JoinKind, OrderBy, Predicate, QueryBuilder, SelectColumn,
    SelectQuery,
};
pub use sql::{SqlFragment, SqlParam, column_ref, quote_ident};
