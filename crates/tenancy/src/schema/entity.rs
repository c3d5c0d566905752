//! Entity type definitions.

use serde::{Deserialize, Serialize};

/// How a tenant-scoped entity identifies its owning tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantColumn {
    /// A column on the entity's own table.
    Column(String),
    /// A relation whose foreign-key column holds the tenant ID.
    Relation(String),
}

impl TenantColumn {
    /// Tenant stored directly in `name`.
    pub fn column(name: impl Into<String>) -> Self {
        TenantColumn::Column(name.into())
    }

    /// Tenant reached through the relation `name`.
    pub fn relation(name: impl Into<String>) -> Self {
        TenantColumn::Relation(name.into())
    }
}

/// A foreign-key relation from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name, e.g. `store`.
    pub name: String,
    /// Foreign-key column on the owning table, e.g. `store_id`.
    pub column: String,
    /// Name of the target entity.
    pub target: String,
    /// Referenced column on the target table.
    #[serde(default = "default_primary_key")]
    pub target_column: String,
    /// Whether joins over this relation must also match tenant columns.
    #[serde(default)]
    pub tenant_aware: bool,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl RelationDef {
    /// A foreign key named `name` stored in `column`, referencing the
    /// target's `id`.
    pub fn foreign_key(
        name: impl Into<String>,
        column: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            target: target.into(),
            target_column: default_primary_key(),
            tenant_aware: false,
        }
    }

    /// Makes joins over this relation tenant-aware.
    pub fn tenant_aware(mut self) -> Self {
        self.tenant_aware = true;
        self
    }

    /// Sets the referenced target column.
    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }
}

/// A schema type backed by one physical table.
///
/// # Example
///
/// ```
/// use helios_tenancy::schema::{EntityType, RelationDef, TenantColumn};
///
/// let product = EntityType::new("Product", "products")
///     .with_column("name")
///     .with_relation(RelationDef::foreign_key("store", "store_id", "Store").tenant_aware())
///     .with_tenant(TenantColumn::relation("store"));
///
/// assert_eq!(product.tenant_column(), Some("store_id"));
/// assert!(product.has_column("store_id"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    name: String,
    table: String,
    primary_key: String,
    columns: Vec<String>,
    relations: Vec<RelationDef>,
    tenant: Option<TenantColumn>,
}

impl EntityType {
    /// Creates an entity with an `id` primary key and no other columns.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: default_primary_key(),
            columns: vec![default_primary_key()],
            relations: Vec::new(),
            tenant: None,
        }
    }

    /// Replaces the primary key column.
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        let old = std::mem::replace(&mut self.primary_key, column.clone());
        match self.columns.iter_mut().find(|c| **c == old) {
            Some(slot) => *slot = column,
            None => self.columns.insert(0, column),
        }
        self
    }

    /// Adds a plain column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
        self
    }

    /// Adds a relation; its foreign-key column becomes a column too.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self = self.with_column(relation.column.clone());
        self.relations.push(relation);
        self
    }

    /// Declares the entity tenant-scoped.
    pub fn with_tenant(mut self, tenant: TenantColumn) -> Self {
        self.tenant = Some(tenant);
        self
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary key column.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Columns in declaration order, primary key first.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns `true` if the table has `column`.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Relations in declaration order.
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// The tenant declaration as written.
    pub fn tenant(&self) -> Option<&TenantColumn> {
        self.tenant.as_ref()
    }

    /// Returns `true` if rows of this entity belong to a tenant.
    pub fn is_tenant_scoped(&self) -> bool {
        self.tenant.is_some()
    }

    /// The physical column holding the tenant ID.
    ///
    /// Relation declarations resolve to the relation's foreign-key column.
    pub fn tenant_column(&self) -> Option<&str> {
        match self.tenant.as_ref()? {
            TenantColumn::Column(column) => Some(column),
            TenantColumn::Relation(name) => self.relation(name).map(|r| r.column.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_is_its_own_tenant() {
        let store = EntityType::new("Store", "stores")
            .with_column("name")
            .with_tenant(TenantColumn::column("id"));
        assert!(store.is_tenant_scoped());
        assert_eq!(store.tenant_column(), Some("id"));
        assert_eq!(store.columns(), ["id", "name"]);
    }

    #[test]
    fn test_relation_tenant_resolves_to_fk() {
        let product = EntityType::new("Product", "products")
            .with_relation(RelationDef::foreign_key("store", "store_id", "Store"))
            .with_tenant(TenantColumn::relation("store"));
        assert_eq!(product.tenant_column(), Some("store_id"));
    }

    #[test]
    fn test_unknown_relation_has_no_column() {
        let broken =
            EntityType::new("Broken", "broken").with_tenant(TenantColumn::relation("ghost"));
        assert!(broken.is_tenant_scoped());
        assert_eq!(broken.tenant_column(), None);
    }

    #[test]
    fn test_custom_primary_key() {
        let entity = EntityType::new("Account", "accounts")
            .with_column("email")
            .with_primary_key("account_id");
        assert_eq!(entity.primary_key(), "account_id");
        assert_eq!(entity.columns(), ["account_id", "email"]);
    }

    #[test]
    fn test_unscoped_entity() {
        let entity = EntityType::new("Country", "countries");
        assert!(!entity.is_tenant_scoped());
        assert_eq!(entity.tenant_column(), None);
    }

    #[test]
    fn test_deserialize_from_json() {
        let entity: EntityType = serde_json::from_value(serde_json::json!({
            "name": "Purchase",
            "table": "purchases",
            "primary_key": "id",
            "columns": ["id", "store_id"],
            "relations": [{"name": "store", "column": "store_id", "target": "Store"}],
            "tenant": {"relation": "store"}
        }))
        .unwrap();
        assert_eq!(entity.tenant_column(), Some("store_id"));
        assert_eq!(entity.relation("store").unwrap().target_column, "id");
    }
}
