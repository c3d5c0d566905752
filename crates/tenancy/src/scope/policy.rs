//! The tenant predicate rewriter.
//!
//! [`TenantPolicy`] is the single place tenant predicates are produced. It
//! works against any [`QueryBuilder`], so the same engine serves select
//! queries, embedded subqueries and row updates.

use std::sync::Arc;

use tracing::debug;

use crate::config::TenancyConfig;
use crate::error::{ContextError, ResolutionError, TenancyResult};
use crate::query::{QueryBuilder, SqlFragment, column_ref};
use crate::schema::EntityRegistry;
use crate::tenant::TenantId;

/// Injects tenant-equality predicates into queries.
#[derive(Debug, Clone)]
pub struct TenantPolicy {
    registry: Arc<EntityRegistry>,
    config: TenancyConfig,
}

impl TenantPolicy {
    /// Creates a policy over `registry` with default configuration.
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self::with_config(registry, TenancyConfig::default())
    }

    /// Creates a policy with explicit configuration.
    pub fn with_config(registry: Arc<EntityRegistry>, config: TenancyConfig) -> Self {
        Self { registry, config }
    }

    /// The registry used to resolve tables.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// The active configuration.
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Filters every live alias of `query` that maps to a tenant-scoped
    /// entity, the base alias included.
    ///
    /// Aliases with a zero reference count are skipped. An alias already
    /// carrying the predicate for `tenant` is not filtered again, so the
    /// manager's base filter and this pass never double up. Returns the number
    /// of predicates added.
    pub fn rewrite_with_joins<Q>(
        &self,
        query: &mut Q,
        tenant: Option<&TenantId>,
    ) -> TenancyResult<usize>
    where
        Q: QueryBuilder + ?Sized,
    {
        let Some(tenant) = tenant else {
            self.check_missing_tenant(query, true)?;
            return Ok(0);
        };

        let base_alias = query.base_alias().to_string();
        let mut pending = Vec::new();

        for (alias, refcount) in query.alias_refcounts() {
            if refcount == 0 || alias == base_alias {
                continue;
            }
            if let Some(predicate) = self.alias_predicate(query, alias, tenant)? {
                pending.push((alias.to_string(), predicate));
            }
        }
        if let Some(predicate) = self.alias_predicate(query, &base_alias, tenant)? {
            pending.push((base_alias, predicate));
        }

        Ok(self.apply(query, pending, tenant))
    }

    /// Filters only the base alias. Used on paths without an alias graph,
    /// such as row updates.
    pub fn rewrite_without_joins<Q>(
        &self,
        query: &mut Q,
        tenant: Option<&TenantId>,
    ) -> TenancyResult<usize>
    where
        Q: QueryBuilder + ?Sized,
    {
        let Some(tenant) = tenant else {
            self.check_missing_tenant(query, false)?;
            return Ok(0);
        };

        let base_alias = query.base_alias().to_string();
        let pending = self
            .alias_predicate(query, &base_alias, tenant)?
            .map(|predicate| vec![(base_alias, predicate)])
            .unwrap_or_default();

        Ok(self.apply(query, pending, tenant))
    }

    /// Builds `alias.tenant_column = ?` for a tenant-scoped alias that is not
    /// yet filtered for `tenant`.
    fn alias_predicate<Q>(
        &self,
        query: &Q,
        alias: &str,
        tenant: &TenantId,
    ) -> TenancyResult<Option<SqlFragment>>
    where
        Q: QueryBuilder + ?Sized,
    {
        if query.tenant_filtered(alias, tenant) {
            return Ok(None);
        }
        let table = query
            .alias_table(alias)
            .ok_or_else(|| ResolutionError::UnknownAlias {
                alias: alias.to_string(),
            })?;
        let entity = self.registry.resolve_by_table_name(table)?;

        Ok(self
            .registry
            .tenant_column(entity)
            .map(|column| SqlFragment::eq(column_ref(alias, column), tenant.to_sql_param())))
    }

    fn apply<Q>(
        &self,
        query: &mut Q,
        pending: Vec<(String, SqlFragment)>,
        tenant: &TenantId,
    ) -> usize
    where
        Q: QueryBuilder + ?Sized,
    {
        let added = pending.len();
        if added > 0 {
            let aliases: Vec<&str> = pending.iter().map(|(alias, _)| alias.as_str()).collect();
            debug!(
                table = query.base_table(),
                tenant = %tenant,
                aliases = ?aliases,
                predicates = added,
                "Injected tenant predicates"
            );
        }
        for (alias, predicate) in pending {
            query.append_raw_predicate(predicate);
            query.mark_tenant_filtered(&alias, tenant);
        }
        added
    }

    /// In deny mode, fails if the query touches a tenant-scoped table.
    fn check_missing_tenant<Q>(&self, query: &Q, with_joins: bool) -> TenancyResult<()>
    where
        Q: QueryBuilder + ?Sized,
    {
        if !self.config.denies_missing_tenant() {
            return Ok(());
        }

        let base_alias = query.base_alias();
        for (alias, refcount) in query.alias_refcounts() {
            if refcount == 0 || (!with_joins && alias != base_alias) {
                continue;
            }
            let table = query
                .alias_table(alias)
                .ok_or_else(|| ResolutionError::UnknownAlias {
                    alias: alias.to_string(),
                })?;
            let entity = self.registry.resolve_by_table_name(table)?;
            if self.registry.is_tenant_scoped(entity) {
                return Err(ContextError::MissingTenant {
                    table: table.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}
