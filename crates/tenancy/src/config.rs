//! Tenancy engine configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What happens when a tenant-scoped table is queried with no current tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTenantPolicy {
    /// Run the query unscoped. Intended for maintenance and system paths.
    #[default]
    Allow,
    /// Refuse to compile the query.
    Deny,
}

impl fmt::Display for MissingTenantPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingTenantPolicy::Allow => write!(f, "allow"),
            MissingTenantPolicy::Deny => write!(f, "deny"),
        }
    }
}

impl FromStr for MissingTenantPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(MissingTenantPolicy::Allow),
            "deny" => Ok(MissingTenantPolicy::Deny),
            other => Err(ConfigError::Invalid {
                message: format!(
                    "unknown missing-tenant policy '{other}', expected 'allow' or 'deny'"
                ),
            }),
        }
    }
}

/// Configuration for the tenant policy.
///
/// # Example
///
/// ```
/// use helios_tenancy::config::{MissingTenantPolicy, TenancyConfig};
///
/// let config = TenancyConfig {
///     missing_tenant: MissingTenantPolicy::Deny,
///     ..Default::default()
/// };
/// assert!(config.warn_unscoped_relations);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Behaviour when no tenant is current.
    ///
    /// The default is the permissive passthrough: queries run unscoped.
    #[serde(default)]
    pub missing_tenant: MissingTenantPolicy,

    /// Whether following a tenant-aware relation without a current tenant
    /// logs a warning.
    #[serde(default = "default_true")]
    pub warn_unscoped_relations: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            missing_tenant: MissingTenantPolicy::default(),
            warn_unscoped_relations: default_true(),
        }
    }
}

impl TenancyConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses tenant-scoped queries when no tenant is current.
    pub fn with_deny_missing_tenant(mut self) -> Self {
        self.missing_tenant = MissingTenantPolicy::Deny;
        self
    }

    /// Sets the missing-tenant policy.
    pub fn with_missing_tenant(mut self, policy: MissingTenantPolicy) -> Self {
        self.missing_tenant = policy;
        self
    }

    /// Enables or disables the unscoped-relation warning.
    pub fn with_warn_unscoped_relations(mut self, warn: bool) -> Self {
        self.warn_unscoped_relations = warn;
        self
    }

    /// Returns `true` when queries without a tenant must be refused.
    pub fn denies_missing_tenant(&self) -> bool {
        self.missing_tenant == MissingTenantPolicy::Deny
    }
}
