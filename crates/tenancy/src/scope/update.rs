//! Write-path tenant containment.
//!
//! [`RowUpdater`] is the persistence boundary for row updates. Wrapping an
//! updater in [`UpdateGuard`] narrows every [`UpdateRequest`] to the current
//! tenant before it reaches the database, whatever predicate the caller
//! built.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{QueryError, TenancyResult};
use crate::query::{QueryBuilder, SqlFragment, SqlParam, column_ref, quote_ident};
use crate::tenant::{TenantId, current_tenant};

use super::policy::TenantPolicy;

/// Executes row updates.
pub trait RowUpdater {
    /// Applies `request` and returns the number of rows changed.
    fn update_rows(&self, request: &UpdateRequest) -> TenancyResult<usize>;
}

impl<U: RowUpdater + ?Sized> RowUpdater for Arc<U> {
    fn update_rows(&self, request: &UpdateRequest) -> TenancyResult<usize> {
        (**self).update_rows(request)
    }
}

impl<U: RowUpdater + ?Sized> RowUpdater for &U {
    fn update_rows(&self, request: &UpdateRequest) -> TenancyResult<usize> {
        (**self).update_rows(request)
    }
}

/// An `UPDATE` against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    entity: String,
    table: String,
    predicates: Vec<SqlFragment>,
    primary_key: Option<(String, SqlParam)>,
    values: Vec<(String, SqlParam)>,
    update_fields: Option<Vec<String>>,
    tenant_filters: HashSet<TenantId>,
}

impl UpdateRequest {
    /// Starts an update of `table` on behalf of `entity`.
    pub fn new(entity: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            predicates: Vec::new(),
            primary_key: None,
            values: Vec::new(),
            update_fields: None,
            tenant_filters: HashSet::new(),
        }
    }

    /// Targets the single row with this primary key.
    pub fn with_primary_key(mut self, column: impl Into<String>, value: SqlParam) -> Self {
        self.primary_key = Some((column.into(), value));
        self
    }

    /// Adds a target-row predicate.
    pub fn with_predicate(mut self, predicate: SqlFragment) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Sets a column value.
    pub fn set(mut self, column: impl Into<String>, value: SqlParam) -> Self {
        self.values.push((column.into(), value));
        self
    }

    /// Restricts the written columns to `fields`.
    pub fn with_update_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Physical table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Target-row predicates, tenant predicates included once narrowed.
    pub fn predicates(&self) -> &[SqlFragment] {
        &self.predicates
    }

    /// Values that will actually be written, honouring `update_fields`.
    pub fn effective_values(&self) -> Vec<&(String, SqlParam)> {
        self.values
            .iter()
            .filter(|(column, _)| match &self.update_fields {
                Some(fields) => fields.iter().any(|f| f == column),
                None => true,
            })
            .collect()
    }

    /// Renders `UPDATE ... SET ... WHERE ...`.
    pub fn to_sql(&self) -> TenancyResult<SqlFragment> {
        let values = self.effective_values();
        if values.is_empty() {
            return Err(QueryError::EmptyUpdate {
                entity: self.entity.clone(),
            }
            .into());
        }

        let mut fragment = SqlFragment::new(format!("UPDATE {} SET ", quote_ident(&self.table)));
        for (index, (column, value)) in values.into_iter().enumerate() {
            if index > 0 {
                fragment.push_sql(", ");
            }
            fragment.push_sql(&format!("{} = ", quote_ident(column)));
            let placeholder = fragment.add_param(value.clone());
            fragment.push_sql(placeholder);
        }

        let key = self
            .primary_key
            .as_ref()
            .map(|(column, value)| SqlFragment::eq(column_ref(&self.table, column), value.clone()));
        let conditions =
            SqlFragment::and_all(key.into_iter().chain(self.predicates.iter().cloned()));
        if !conditions.is_empty() {
            fragment.push_sql(" WHERE ");
            fragment.push(&conditions);
        }
        Ok(fragment)
    }
}

impl QueryBuilder for UpdateRequest {
    fn base_table(&self) -> &str {
        &self.table
    }

    fn base_alias(&self) -> &str {
        &self.table
    }

    fn alias_refcounts(&self) -> Vec<(&str, usize)> {
        vec![(self.table.as_str(), 1)]
    }

    fn alias_table(&self, alias: &str) -> Option<&str> {
        (alias == self.table).then_some(self.table.as_str())
    }

    fn append_raw_predicate(&mut self, predicate: SqlFragment) {
        self.predicates.push(predicate);
    }

    fn tenant_filtered(&self, _alias: &str, tenant: &TenantId) -> bool {
        self.tenant_filters.contains(tenant)
    }

    fn mark_tenant_filtered(&mut self, _alias: &str, tenant: &TenantId) {
        self.tenant_filters.insert(tenant.clone());
    }
}

/// Narrows updates to the current tenant before delegating.
#[derive(Debug, Clone)]
pub struct UpdateGuard<U> {
    inner: U,
    policy: Arc<TenantPolicy>,
}

impl<U: RowUpdater> UpdateGuard<U> {
    /// Wraps `inner`.
    pub fn new(inner: U, policy: Arc<TenantPolicy>) -> Self {
        Self { inner, policy }
    }
}

impl<U: RowUpdater> RowUpdater for UpdateGuard<U> {
    fn update_rows(&self, request: &UpdateRequest) -> TenancyResult<usize> {
        let tenant = current_tenant();
        let mut narrowed = request.clone();
        self.policy.rewrite_without_joins(&mut narrowed, tenant.as_ref())?;

        let updated = self.inner.update_rows(&narrowed)?;
        debug!(
            entity = narrowed.entity(),
            tenant = ?tenant,
            rows = updated,
            "Guarded update applied"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::TenancyConfig;
    use crate::error::{ContextError, TenancyError};
    use crate::schema::{EntityRegistry, EntityType, RelationDef, TenantColumn};
    use crate::tenant::with_tenant;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<SqlFragment>>,
    }

    impl RowUpdater for Recorder {
        fn update_rows(&self, request: &UpdateRequest) -> TenancyResult<usize> {
            self.seen.lock().unwrap().push(request.to_sql()?);
            Ok(1)
        }
    }

    fn policy(config: TenancyConfig) -> Arc<TenantPolicy> {
        let registry = EntityRegistry::builder()
            .register(EntityType::new("Store", "stores").with_tenant(TenantColumn::column("id")))
            .register(
                EntityType::new("Product", "products")
                    .with_column("name")
                    .with_relation(RelationDef::foreign_key("store", "store_id", "Store"))
                    .with_tenant(TenantColumn::relation("store")),
            )
            .build()
            .unwrap();
        Arc::new(TenantPolicy::with_config(Arc::new(registry), config))
    }

    fn rename_product() -> UpdateRequest {
        UpdateRequest::new("Product", "products")
            .with_primary_key("id", SqlParam::integer(10))
            .set("name", SqlParam::string("Renamed"))
    }

    #[test]
    fn test_to_sql() {
        let sql = rename_product().to_sql().unwrap();
        assert_eq!(
            sql.sql,
            "UPDATE \"products\" SET \"name\" = ? WHERE (\"products\".\"id\" = ?)"
        );
        assert_eq!(
            sql.params,
            vec![SqlParam::String("Renamed".to_string()), SqlParam::Integer(10)]
        );
    }

    #[test]
    fn test_update_fields_subset() {
        let request = rename_product()
            .set("store_id", SqlParam::integer(2))
            .with_update_fields(["name"]);
        assert_eq!(request.effective_values().len(), 1);
        assert!(!request.to_sql().unwrap().sql.contains("store_id"));
    }

    #[test]
    fn test_empty_update_is_error() {
        let request = rename_product().with_update_fields(Vec::<String>::new());
        assert!(matches!(
            request.to_sql().unwrap_err(),
            TenancyError::Query(QueryError::EmptyUpdate { .. })
        ));
    }

    #[test]
    fn test_guard_narrows_to_current_tenant() {
        let recorder = Recorder::default();
        let guard = UpdateGuard::new(&recorder, policy(TenancyConfig::default()));

        with_tenant(1, || guard.update_rows(&rename_product())).unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(
            seen[0].sql,
            "UPDATE \"products\" SET \"name\" = ? WHERE (\"products\".\"id\" = ?) AND (\"products\".\"store_id\" = ?)"
        );
        assert_eq!(seen[0].params.last(), Some(&SqlParam::Integer(1)));
    }

    #[test]
    fn test_guard_without_tenant_passes_through() {
        let recorder = Recorder::default();
        let guard = UpdateGuard::new(&recorder, policy(TenancyConfig::default()));

        crate::tenant::clear_current_tenant();
        guard.update_rows(&rename_product()).unwrap();
        assert!(!recorder.seen.lock().unwrap()[0].sql.contains("store_id"));
    }

    #[test]
    fn test_guard_deny_mode() {
        let recorder = Recorder::default();
        let guard = UpdateGuard::new(
            &recorder,
            policy(TenancyConfig::new().with_deny_missing_tenant()),
        );

        crate::tenant::clear_current_tenant();
        let err = guard.update_rows(&rename_product()).unwrap_err();
        assert!(matches!(err, TenancyError::Context(ContextError::MissingTenant { .. })));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
