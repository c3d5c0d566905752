//! Entity metadata registry.
//!
//! Maps physical table names to entity types. The registry is built once,
//! validated eagerly and then shared read-only (typically as
//! `Arc<EntityRegistry>`) by every query compilation.

use std::collections::HashMap;

use regex::Regex;
use tracing::info;

use crate::error::{ConfigError, ResolutionError};

use super::entity::{EntityType, TenantColumn};

/// Pattern every table, column and relation name must match.
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Validated, immutable table-name to entity mapping.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    entities: Vec<EntityType>,
    by_table: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl EntityRegistry {
    /// Starts building a registry.
    pub fn builder() -> EntityRegistryBuilder {
        EntityRegistryBuilder::default()
    }

    /// Resolves a physical table name to its entity type.
    pub fn resolve_by_table_name(&self, table: &str) -> Result<&EntityType, ResolutionError> {
        self.by_table
            .get(table)
            .map(|&index| &self.entities[index])
            .ok_or_else(|| ResolutionError::TableNotRegistered {
                table: table.to_string(),
            })
    }

    /// Looks up an entity by name.
    pub fn entity(&self, name: &str) -> Result<&EntityType, ResolutionError> {
        self.by_name
            .get(name)
            .map(|&index| &self.entities[index])
            .ok_or_else(|| ResolutionError::EntityNotRegistered {
                entity: name.to_string(),
            })
    }

    /// Returns `true` if rows of `entity` belong to a tenant.
    pub fn is_tenant_scoped(&self, entity: &EntityType) -> bool {
        entity.is_tenant_scoped()
    }

    /// The physical tenant column of `entity`, if it is tenant-scoped.
    pub fn tenant_column<'a>(&self, entity: &'a EntityType) -> Option<&'a str> {
        entity.tenant_column()
    }

    /// Registered entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.iter()
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Collects entity types and validates them on [`build`](Self::build).
#[derive(Debug, Default)]
pub struct EntityRegistryBuilder {
    entities: Vec<EntityType>,
}

impl EntityRegistryBuilder {
    /// Adds an entity type.
    pub fn register(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    /// Validates the collected entities and builds the registry.
    ///
    /// Fails on the first problem found: a malformed identifier, a duplicate
    /// entity name or table, a tenant declaration that does not resolve, a
    /// relation to an unregistered entity, or a tenant-aware relation with an
    /// unscoped side.
    ///
    /// A tenant declared through a relation must reference the target's own
    /// tenant column (`Product.store -> Store.id` where `Store` is scoped by
    /// `id`). Going through a parent whose key is not the tenant ID, such as
    /// `Purchase.product -> Product.id`, is rejected; declare the tenant on a
    /// relation that reaches the tenant key directly instead.
    pub fn build(self) -> Result<EntityRegistry, ConfigError> {
        let identifier = Regex::new(IDENTIFIER_PATTERN).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;

        let mut by_table = HashMap::new();
        let mut by_name = HashMap::new();

        for (index, entity) in self.entities.iter().enumerate() {
            validate_identifiers(&identifier, entity)?;

            if by_name.insert(entity.name().to_string(), index).is_some() {
                return Err(ConfigError::DuplicateEntity {
                    entity: entity.name().to_string(),
                });
            }
            if let Some(first) = by_table.insert(entity.table().to_string(), index) {
                return Err(ConfigError::DuplicateTable {
                    table: entity.table().to_string(),
                    first: self.entities[first].name().to_string(),
                    second: entity.name().to_string(),
                });
            }

            validate_tenant(entity)?;
        }

        for entity in &self.entities {
            for relation in entity.relations() {
                let Some(&target_index) = by_name.get(&relation.target) else {
                    return Err(ConfigError::UnknownRelationTarget {
                        entity: entity.name().to_string(),
                        relation: relation.name.clone(),
                        target: relation.target.clone(),
                    });
                };
                let target = &self.entities[target_index];

                if !target.has_column(&relation.target_column) {
                    return Err(ConfigError::Invalid {
                        message: format!(
                            "relation '{}.{}' references missing column '{}.{}'",
                            entity.name(),
                            relation.name,
                            target.name(),
                            relation.target_column
                        ),
                    });
                }

                if relation.tenant_aware {
                    let missing_on = if entity.tenant_column().is_none() {
                        Some(entity.name())
                    } else if target.tenant_column().is_none() {
                        Some(target.name())
                    } else {
                        None
                    };
                    if let Some(missing_on) = missing_on {
                        return Err(ConfigError::MissingRelationTenantColumn {
                            entity: entity.name().to_string(),
                            relation: relation.name.clone(),
                            missing_on: missing_on.to_string(),
                        });
                    }
                }

                let carries_tenant = matches!(
                    entity.tenant(),
                    Some(TenantColumn::Relation(name)) if *name == relation.name
                );
                let references_tenant_key =
                    target.tenant_column() == Some(relation.target_column.as_str());
                if carries_tenant && !references_tenant_key {
                    return Err(ConfigError::IndirectTenantRelation {
                        entity: entity.name().to_string(),
                        relation: relation.name.clone(),
                        target: target.name().to_string(),
                        target_column: relation.target_column.clone(),
                    });
                }
            }
        }

        let registry = EntityRegistry {
            entities: self.entities,
            by_table,
            by_name,
        };

        info!(
            entities = registry.len(),
            tenant_scoped = registry.iter().filter(|e| e.is_tenant_scoped()).count(),
            "Entity registry built"
        );

        Ok(registry)
    }
}

fn validate_identifiers(pattern: &Regex, entity: &EntityType) -> Result<(), ConfigError> {
    let names = std::iter::once(entity.table())
        .chain(entity.columns().iter().map(String::as_str))
        .chain(
            entity
                .relations()
                .iter()
                .flat_map(|r| [r.name.as_str(), r.target_column.as_str()]),
        );

    for name in names {
        if !pattern.is_match(name) {
            return Err(ConfigError::InvalidIdentifier {
                entity: entity.name().to_string(),
                identifier: name.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_tenant(entity: &EntityType) -> Result<(), ConfigError> {
    match entity.tenant() {
        None => Ok(()),
        Some(TenantColumn::Column(column)) if !entity.has_column(column) => {
            Err(ConfigError::UnknownTenantColumn {
                entity: entity.name().to_string(),
                column: column.clone(),
            })
        }
        Some(TenantColumn::Relation(name)) if entity.relation(name).is_none() => {
            Err(ConfigError::UnknownRelation {
                entity: entity.name().to_string(),
                relation: name.clone(),
            })
        }
        Some(_) => Ok(()),
    }
}
