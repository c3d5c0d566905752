//! Join conditions for foreign-key relations.
//!
//! A [`TenantAwareRelation`] joins two tenant-scoped entities and always ANDs
//! the equality of both sides' tenant columns into the join condition. The
//! extra condition does not depend on the current tenant, so a structurally
//! cross-tenant pair (a product pointing at another tenant's store) never
//! survives the join, even in unscoped maintenance code.

use crate::error::{ConfigError, TenancyResult};
use crate::query::{SqlFragment, column_ref};
use crate::tenant::TenantId;

use super::entity::RelationDef;
use super::registry::EntityRegistry;

/// A plain foreign-key join `source.fk = target.pk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyJoin {
    /// Source entity name.
    pub entity: String,
    /// Relation name on the source.
    pub relation: String,
    /// Foreign-key column on the source table.
    pub column: String,
    /// Target entity name.
    pub target_entity: String,
    /// Target physical table.
    pub target_table: String,
    /// Referenced column on the target.
    pub target_column: String,
}

impl ForeignKeyJoin {
    /// Resolves `entity.relation` against the registry.
    pub fn resolve(registry: &EntityRegistry, entity: &str, relation: &str) -> TenancyResult<Self> {
        let (def, target_table) = lookup(registry, entity, relation)?;
        Ok(Self {
            entity: entity.to_string(),
            relation: def.name.clone(),
            column: def.column.clone(),
            target_entity: def.target.clone(),
            target_table,
            target_column: def.target_column.clone(),
        })
    }

    /// `left.fk = right.pk`
    pub fn join_condition(&self, left_alias: &str, right_alias: &str) -> SqlFragment {
        SqlFragment::new(format!(
            "{} = {}",
            column_ref(left_alias, &self.column),
            column_ref(right_alias, &self.target_column)
        ))
    }
}

/// A foreign-key relation between two tenant-scoped entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantAwareRelation {
    join: ForeignKeyJoin,
    source_tenant_column: String,
    target_tenant_column: String,
}

impl TenantAwareRelation {
    /// Resolves `entity.relation`, requiring a tenant column on both sides.
    pub fn resolve(registry: &EntityRegistry, entity: &str, relation: &str) -> TenancyResult<Self> {
        let join = ForeignKeyJoin::resolve(registry, entity, relation)?;
        let source = registry.entity(entity)?;
        let target = registry.entity(&join.target_entity)?;

        let missing = |missing_on: &str| ConfigError::MissingRelationTenantColumn {
            entity: entity.to_string(),
            relation: relation.to_string(),
            missing_on: missing_on.to_string(),
        };
        let source_tenant_column = source
            .tenant_column()
            .ok_or_else(|| missing(source.name()))?
            .to_string();
        let target_tenant_column = target
            .tenant_column()
            .ok_or_else(|| missing(target.name()))?
            .to_string();

        Ok(Self {
            join,
            source_tenant_column,
            target_tenant_column,
        })
    }

    /// The underlying key join.
    pub fn foreign_key(&self) -> &ForeignKeyJoin {
        &self.join
    }

    /// `left.fk = right.pk AND left.tenant = right.tenant`
    ///
    /// When the key pair already is the tenant pair (`products.store_id ->
    /// stores.id`) the key equality alone is rendered.
    pub fn join_condition(&self, left_alias: &str, right_alias: &str) -> SqlFragment {
        let key = self.join.join_condition(left_alias, right_alias);
        if self.joins_on_tenant_key() {
            return key;
        }
        key.and(SqlFragment::new(format!(
            "{} = {}",
            column_ref(left_alias, &self.source_tenant_column),
            column_ref(right_alias, &self.target_tenant_column)
        )))
    }

    fn joins_on_tenant_key(&self) -> bool {
        self.join.column == self.source_tenant_column
            && self.join.target_column == self.target_tenant_column
    }

    /// Restricts the related target row to `tenant`, used when following the
    /// relation from a loaded source row.
    pub fn descriptor_filter(&self, target_alias: &str, tenant: &TenantId) -> SqlFragment {
        SqlFragment::eq(
            column_ref(target_alias, &self.target_tenant_column),
            tenant.to_sql_param(),
        )
    }

}

/// Either kind of relation join, picked by the relation's `tenant_aware` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationJoin {
    /// Key equality only.
    Plain(ForeignKeyJoin),
    /// Key and tenant equality.
    TenantAware(TenantAwareRelation),
}

impl RelationJoin {
    /// Resolves `entity.relation`.
    pub fn resolve(registry: &EntityRegistry, entity: &str, relation: &str) -> TenancyResult<Self> {
        let (def, _) = lookup(registry, entity, relation)?;
        if def.tenant_aware {
            TenantAwareRelation::resolve(registry, entity, relation).map(RelationJoin::TenantAware)
        } else {
            ForeignKeyJoin::resolve(registry, entity, relation).map(RelationJoin::Plain)
        }
    }

    /// The underlying key join.
    pub fn foreign_key(&self) -> &ForeignKeyJoin {
        match self {
            RelationJoin::Plain(join) => join,
            RelationJoin::TenantAware(relation) => relation.foreign_key(),
        }
    }

    /// The `ON` condition for joining `left_alias` to `right_alias`.
    pub fn join_condition(&self, left_alias: &str, right_alias: &str) -> SqlFragment {
        match self {
            RelationJoin::Plain(join) => join.join_condition(left_alias, right_alias),
            RelationJoin::TenantAware(relation) => relation.join_condition(left_alias, right_alias),
        }
    }
}

fn lookup<'a>(
    registry: &'a EntityRegistry,
    entity: &str,
    relation: &str,
) -> TenancyResult<(&'a RelationDef, String)> {
    let source = registry.entity(entity)?;
    let def = source
        .relation(relation)
        .ok_or_else(|| ConfigError::UnknownRelation {
            entity: entity.to_string(),
            relation: relation.to_string(),
        })?;
    let target_table = registry.entity(&def.target)?.table().to_string();
    Ok((def, target_table))
}
