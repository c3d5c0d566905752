//! Tenant-scoped querysets.
//!
//! A [`TenantQuerySet`] wraps an uncompiled [`SelectQuery`] and intercepts
//! every event that turns it into SQL. Each event clones the stored query,
//! runs the tenant policy over the clone (embedded subqueries first) and only
//! then renders and executes it. The stored query is never rewritten, so the
//! same queryset can be executed any number of times, under different current
//! tenants, without predicates piling up.
//!
//! | Event | Method |
//! |-------|--------|
//! | iteration | [`fetch_all`](TenantQuerySet::fetch_all), [`iter`](TenantQuerySet::iter) |
//! | single row | [`get`](TenantQuerySet::get), [`first`](TenantQuerySet::first) |
//! | count | [`count`](TenantQuerySet::count), [`exists`](TenantQuerySet::exists) |
//! | aggregate | [`aggregate`](TenantQuerySet::aggregate) |
//! | subquery | [`as_subquery`](TenantQuerySet::as_subquery), [`filter_in`](TenantQuerySet::filter_in) |
//! | update | [`update`](TenantQuerySet::update) |

use std::sync::Arc;

use serde_json::Value;

use crate::backends::{Executor, Row};
use crate::error::{QueryError, ResolutionError, TenancyResult};
use crate::query::{
    Aggregate, JoinKind, Predicate, QueryBuilder, SelectQuery, SqlFragment, SqlParam, column_ref,
};
use crate::schema::{EntityType, RelationJoin};
use crate::tenant::{TenantId, current_tenant};

use super::policy::TenantPolicy;
use super::update::{RowUpdater, UpdateGuard, UpdateRequest};

/// A lazily compiled, tenant-scoped query over one entity.
pub struct TenantQuerySet<E> {
    entity: EntityType,
    query: SelectQuery,
    policy: Arc<TenantPolicy>,
    executor: Arc<E>,
}

impl<E> Clone for TenantQuerySet<E> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            query: self.query.clone(),
            policy: Arc::clone(&self.policy),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E> std::fmt::Debug for TenantQuerySet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantQuerySet")
            .field("entity", &self.entity.name())
            .field("query", &self.query)
            .finish()
    }
}

impl<E> TenantQuerySet<E> {
    /// Creates an unfiltered queryset over `entity`.
    pub fn new(entity: EntityType, policy: Arc<TenantPolicy>, executor: Arc<E>) -> Self {
        let query = SelectQuery::from_table(entity.table());
        Self {
            entity,
            query,
            policy,
            executor,
        }
    }

    /// The entity this queryset returns.
    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    /// The stored, uncompiled query.
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    pub(crate) fn query_mut(&mut self) -> &mut SelectQuery {
        &mut self.query
    }

    /// Compiles the query for the current tenant.
    ///
    /// This is the hook every SQL-generating method goes through.
    pub fn compile(&self) -> TenancyResult<SelectQuery> {
        let tenant = current_tenant();
        let mut query = self.query.clone();
        rewrite_tree(&self.policy, &mut query, tenant.as_ref())?;
        Ok(query)
    }

    /// The SQL that [`fetch_all`](Self::fetch_all) would run right now.
    pub fn to_sql(&self) -> TenancyResult<SqlFragment> {
        Ok(self.compile()?.select_sql())
    }

    /// Compiles the query as a subquery selecting `column`, for embedding in
    /// SQL built elsewhere.
    pub fn as_subquery(&self, column: &str) -> TenancyResult<SqlFragment> {
        self.require_column(&self.entity, column)?;
        Ok(self.compile()?.subquery_sql(column))
    }

    /// Adds `column = value` on the base table. `NULL` becomes `IS NULL`.
    pub fn filter_eq(mut self, column: &str, value: impl Into<SqlParam>) -> TenancyResult<Self> {
        self.require_column(&self.entity, column)?;
        let lhs = column_ref(self.query.base_alias(), column);
        self.query.append_raw_predicate(equality(lhs, value.into()));
        Ok(self)
    }

    /// Adds `alias.column = value` for a joined alias.
    pub fn filter_alias_eq(
        mut self,
        alias: &str,
        column: &str,
        value: impl Into<SqlParam>,
    ) -> TenancyResult<Self> {
        let entity = self.alias_entity(alias)?.clone();
        self.require_column(&entity, column)?;
        self.query.add_ref(alias);
        self.query
            .append_raw_predicate(equality(column_ref(alias, column), value.into()));
        Ok(self)
    }

    /// Adds a hand-written predicate.
    pub fn filter_raw(mut self, predicate: SqlFragment) -> Self {
        self.query.append_raw_predicate(predicate);
        self
    }

    /// Adds `column IN (SELECT other_column FROM other ...)`.
    ///
    /// The embedded queryset is compiled together with this one, so it is
    /// scoped to whichever tenant is current when this queryset executes.
    pub fn filter_in<F>(
        mut self,
        column: &str,
        other: &TenantQuerySet<F>,
        other_column: &str,
    ) -> TenancyResult<Self> {
        self.require_column(&self.entity, column)?;
        self.require_column(&other.entity, other_column)?;
        let lhs = column_ref(self.query.base_alias(), column);
        self.query.push_predicate(Predicate::InSubquery {
            lhs,
            column: other_column.to_string(),
            query: Box::new(other.query.clone()),
        });
        Ok(self)
    }

    /// Joins the base entity's `relation` under the target table's name (or
    /// the next free alias).
    pub fn join_relation(self, relation: &str) -> TenancyResult<Self> {
        let base_alias = self.query.base_alias().to_string();
        let alias = self
            .entity
            .relation(relation)
            .and_then(|r| self.policy.registry().entity(&r.target).ok())
            .map(|target| self.query.next_alias(target.table()))
            .unwrap_or_else(|| relation.to_string());
        self.join_relation_as(&base_alias, relation, &alias)
    }

    /// Joins `relation` of the entity behind `from_alias` as `alias`.
    ///
    /// Tenant-aware relations contribute the tenant-equality condition to the
    /// `ON` clause regardless of the current tenant.
    pub fn join_relation_as(
        mut self,
        from_alias: &str,
        relation: &str,
        alias: &str,
    ) -> TenancyResult<Self> {
        if self.query.has_alias(alias) {
            return Err(QueryError::DuplicateAlias {
                alias: alias.to_string(),
            }
            .into());
        }
        let source = self.alias_entity(from_alias)?.name().to_string();
        let join = RelationJoin::resolve(self.policy.registry(), &source, relation)?;
        let on = join.join_condition(from_alias, alias);
        let table = join.foreign_key().target_table.clone();

        self.query.add_ref(from_alias);
        self.query = self.query.join(JoinKind::Inner, table, alias, on);
        Ok(self)
    }

    /// Orders by a base-table column.
    pub fn order_by(mut self, column: &str, descending: bool) -> TenancyResult<Self> {
        self.require_column(&self.entity, column)?;
        let alias = self.query.base_alias().to_string();
        self.query = self.query.order_by(alias, column, descending);
        Ok(self)
    }

    /// Limits the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query = self.query.limit(limit);
        self
    }

    /// Drops a join that is no longer referenced.
    pub fn trim_join(mut self, alias: &str) -> Self {
        self.query.trim_join(alias);
        self
    }

    fn alias_entity(&self, alias: &str) -> TenancyResult<&EntityType> {
        let table = self
            .query
            .alias_table(alias)
            .ok_or_else(|| ResolutionError::UnknownAlias {
                alias: alias.to_string(),
            })?;
        Ok(self.policy.registry().resolve_by_table_name(table)?)
    }

    fn require_column(&self, entity: &EntityType, column: &str) -> TenancyResult<()> {
        if entity.has_column(column) {
            Ok(())
        } else {
            Err(QueryError::UnknownColumn {
                entity: entity.name().to_string(),
                column: column.to_string(),
            }
            .into())
        }
    }
}

impl<E: Executor> TenantQuerySet<E> {
    /// Materializes every row.
    pub fn fetch_all(&self) -> TenancyResult<Vec<Row>> {
        let sql = self.compile()?.select_sql();
        self.executor.fetch(&sql)
    }

    /// Materializes every row and iterates over them.
    pub fn iter(&self) -> TenancyResult<std::vec::IntoIter<Row>> {
        Ok(self.fetch_all()?.into_iter())
    }

    /// Returns the first row, if any. An existing smaller limit is kept.
    pub fn first(&self) -> TenancyResult<Option<Row>> {
        let query = self.compile()?;
        let limit = query.row_limit().map_or(1, |limit| limit.min(1));
        let sql = query.limit(limit).select_sql();
        Ok(self.executor.fetch(&sql)?.into_iter().next())
    }

    /// Returns exactly one row.
    pub fn get(&self) -> TenancyResult<Row> {
        let sql = self.compile()?.select_sql();
        let mut rows = self.executor.fetch(&sql)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(QueryError::DoesNotExist {
                entity: self.entity.name().to_string(),
            }
            .into()),
            count => Err(QueryError::MultipleObjectsReturned {
                entity: self.entity.name().to_string(),
                count,
            }
            .into()),
        }
    }

    /// Counts the rows.
    pub fn count(&self) -> TenancyResult<u64> {
        let sql = self.compile()?.count_sql();
        self.executor
            .fetch_scalar(&sql)?
            .as_u64()
            .ok_or_else(|| {
                QueryError::MissingValue {
                    column: "COUNT(*)".to_string(),
                }
                .into()
            })
    }

    /// Returns `true` if at least one row matches.
    pub fn exists(&self) -> TenancyResult<bool> {
        let sql = self.compile()?.exists_sql();
        Ok(self.executor.fetch_scalar(&sql)?.as_i64() == Some(1))
    }

    /// Computes an aggregate. Returns `Value::Null` over zero rows.
    pub fn aggregate(&self, aggregate: &Aggregate) -> TenancyResult<Value> {
        let entity = match aggregate.alias.as_deref() {
            Some(alias) => self.alias_entity(alias)?,
            None => &self.entity,
        };
        self.require_column(entity, &aggregate.column)?;
        let sql = self.compile()?.aggregate_sql(aggregate);
        self.executor.fetch_scalar(&sql)
    }
}

impl<E: Executor + RowUpdater> TenantQuerySet<E> {
    /// Updates every row in the queryset.
    ///
    /// The target rows are selected by primary key through the compiled
    /// query, and the update itself passes through the [`UpdateGuard`].
    pub fn update<I, S>(&self, values: I) -> TenancyResult<usize>
    where
        I: IntoIterator<Item = (S, SqlParam)>,
        S: Into<String>,
    {
        let pk = self.entity.primary_key();
        let targets = self.compile()?.subquery_sql(pk);

        let mut request = UpdateRequest::new(self.entity.name(), self.entity.table())
            .with_predicate(SqlFragment::with_params(
                format!("{} IN ({})", column_ref(self.entity.table(), pk), targets.sql),
                targets.params,
            ));
        for (column, value) in values {
            let column = column.into();
            self.require_column(&self.entity, &column)?;
            request = request.set(column, value);
        }

        UpdateGuard::new(Arc::clone(&self.executor), Arc::clone(&self.policy)).update_rows(&request)
    }
}

fn rewrite_tree(
    policy: &TenantPolicy,
    query: &mut SelectQuery,
    tenant: Option<&TenantId>,
) -> TenancyResult<()> {
    for subquery in query.subqueries_mut() {
        rewrite_tree(policy, subquery, tenant)?;
    }
    policy.rewrite_with_joins(query, tenant)?;
    Ok(())
}

fn equality(lhs: String, value: SqlParam) -> SqlFragment {
    match value {
        SqlParam::Null => SqlFragment::new(format!("{lhs} IS NULL")),
        value => SqlFragment::eq(lhs, value),
    }
}
