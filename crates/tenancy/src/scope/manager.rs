//! The default entry point for an entity's rows.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::backends::{Executor, Row};
use crate::error::{ConfigError, QueryError, ResolutionError, TenancyResult};
use crate::query::{QueryBuilder, SqlFragment, SqlParam, column_ref};
use crate::schema::{EntityType, TenantAwareRelation};
use crate::tenant::current_tenant;

use super::policy::TenantPolicy;
use super::queryset::TenantQuerySet;
use super::update::{RowUpdater, UpdateGuard, UpdateRequest};

/// Hands out querysets for one entity, pre-filtered to the current tenant.
pub struct ScopedManager<E> {
    entity: EntityType,
    policy: Arc<TenantPolicy>,
    executor: Arc<E>,
}

impl<E> Clone for ScopedManager<E> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            policy: Arc::clone(&self.policy),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E> ScopedManager<E> {
    /// Creates a manager for the registered entity `name`.
    pub fn new(
        name: &str,
        policy: Arc<TenantPolicy>,
        executor: Arc<E>,
    ) -> Result<Self, ResolutionError> {
        let entity = policy.registry().entity(name)?.clone();
        Ok(Self {
            entity,
            policy,
            executor,
        })
    }

    /// The managed entity.
    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    /// A queryset filtered to the current tenant, if one is set.
    ///
    /// The filter uses the tenant current when this method is called. The
    /// join rewriter still runs at execution time and adds the base filter if
    /// the tenant has changed in between.
    pub fn default_query_set(&self) -> TenantQuerySet<E> {
        let mut queryset = self.unscoped();
        if let (Some(tenant), Some(column)) = (current_tenant(), self.entity.tenant_column()) {
            let query = queryset.query_mut();
            let alias = query.base_alias().to_string();
            query.append_raw_predicate(SqlFragment::eq(
                column_ref(&alias, column),
                tenant.to_sql_param(),
            ));
            query.mark_tenant_filtered(&alias, &tenant);
        }
        queryset
    }

    /// Shorthand for [`default_query_set`](Self::default_query_set).
    pub fn all(&self) -> TenantQuerySet<E> {
        self.default_query_set()
    }

    /// A queryset without the manager's base filter.
    ///
    /// Execution still passes through the tenant policy, so this only differs
    /// from [`default_query_set`](Self::default_query_set) when the current
    /// tenant is unset at execution time.
    pub fn unscoped(&self) -> TenantQuerySet<E> {
        TenantQuerySet::new(
            self.entity.clone(),
            Arc::clone(&self.policy),
            Arc::clone(&self.executor),
        )
    }
}

impl<E: Executor> ScopedManager<E> {
    /// Follows `relation` from a loaded `row` to the related row.
    ///
    /// Returns `Ok(None)` when the foreign key is `NULL`. For tenant-aware
    /// relations the target is also restricted to the current tenant; with no
    /// tenant set the access proceeds unscoped and is logged.
    pub fn related(&self, row: &Row, relation: &str) -> TenancyResult<Option<Row>> {
        let registry = self.policy.registry();
        let def = self
            .entity
            .relation(relation)
            .ok_or_else(|| ConfigError::UnknownRelation {
                entity: self.entity.name().to_string(),
                relation: relation.to_string(),
            })?;

        let key = row.get(&def.column).unwrap_or(&Value::Null);
        let Some(key) = SqlParam::from_json(key).filter(|k| *k != SqlParam::Null) else {
            return Ok(None);
        };

        let target = registry.entity(&def.target)?.clone();
        let mut queryset =
            TenantQuerySet::new(target, Arc::clone(&self.policy), Arc::clone(&self.executor))
                .filter_eq(&def.target_column, key)?;

        if def.tenant_aware {
            let constraint = TenantAwareRelation::resolve(registry, self.entity.name(), relation)?;
            match current_tenant() {
                Some(tenant) => {
                    let query = queryset.query_mut();
                    let alias = query.base_alias().to_string();
                    query.append_raw_predicate(constraint.descriptor_filter(&alias, &tenant));
                    query.mark_tenant_filtered(&alias, &tenant);
                }
                None if self.policy.config().warn_unscoped_relations => {
                    warn!(
                        entity = self.entity.name(),
                        relation,
                        "Tenant-aware relation accessed without a current tenant"
                    );
                }
                None => {}
            }
        }

        queryset.get().map(Some)
    }
}

impl<E: RowUpdater> ScopedManager<E> {
    /// Saves changed values of the row with primary key `pk`.
    ///
    /// With `update_fields` only those columns are written. The update is
    /// narrowed to the current tenant; a row of another tenant is left
    /// untouched and `Ok(0)` is returned.
    pub fn save(
        &self,
        pk: impl Into<SqlParam>,
        values: &Row,
        update_fields: Option<&[&str]>,
    ) -> TenancyResult<usize> {
        let mut request = UpdateRequest::new(self.entity.name(), self.entity.table())
            .with_primary_key(self.entity.primary_key(), pk.into());

        for (column, value) in values {
            if column == self.entity.primary_key() {
                continue;
            }
            if !self.entity.has_column(column) {
                return Err(QueryError::UnknownColumn {
                    entity: self.entity.name().to_string(),
                    column: column.clone(),
                }
                .into());
            }
            let param = SqlParam::from_json(value).ok_or_else(|| QueryError::UnsupportedValue {
                column: column.clone(),
            })?;
            request = request.set(column.clone(), param);
        }
        if let Some(fields) = update_fields {
            request = request.with_update_fields(fields.iter().copied());
        }

        let updated = UpdateGuard::new(Arc::clone(&self.executor), Arc::clone(&self.policy))
            .update_rows(&request)?;
        debug!(entity = self.entity.name(), rows = updated, "Saved row");
        Ok(updated)
    }
}
