//! Configuration for the tenant propagation layer.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TENANCY_MISSING_TENANT` | allow | `allow` runs tenant-less queries unscoped, `deny` rejects them |
//! | `TENANCY_WARN_UNSCOPED_RELATIONS` | true | Log tenant-aware relation access without a tenant |
//! | `TENANCY_PROFILE_FAILURE_STATUS` | 403 | Status returned when an actor's profile cannot be resolved |
//! | `TENANCY_LOG_LEVEL` | info | Log level |
//!
//! # Example
//!
//! ```rust
//! use helios_tenancy::MissingTenantPolicy;
//! use helios_tenancy_http::TenantLayerConfig;
//!
//! let config = TenantLayerConfig {
//!     missing_tenant: MissingTenantPolicy::Deny,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! assert!(config.tenancy_config().denies_missing_tenant());
//! ```

use clap::{ArgAction, Parser};
use helios_tenancy::{MissingTenantPolicy, TenancyConfig};
use http::StatusCode;

/// Configuration for [`propagate_tenant`](crate::middleware::propagate_tenant)
/// and the engine behind it.
#[derive(Debug, Clone, Parser)]
#[command(name = "tenancy")]
#[command(about = "Row-level tenancy propagation")]
pub struct TenantLayerConfig {
    /// Behaviour for queries on tenant-scoped tables without a tenant
    /// (allow, deny).
    #[arg(long, env = "TENANCY_MISSING_TENANT", default_value = "allow")]
    pub missing_tenant: MissingTenantPolicy,

    /// Log a warning when a tenant-aware relation is followed without a tenant.
    #[arg(
        long,
        env = "TENANCY_WARN_UNSCOPED_RELATIONS",
        default_value = "true",
        action = ArgAction::Set
    )]
    pub warn_unscoped_relations: bool,

    /// HTTP status returned when an authenticated actor's profile cannot be
    /// resolved.
    #[arg(long, env = "TENANCY_PROFILE_FAILURE_STATUS", default_value = "403")]
    pub profile_failure_status: u16,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TENANCY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for TenantLayerConfig {
    fn default() -> Self {
        Self {
            missing_tenant: MissingTenantPolicy::Allow,
            warn_unscoped_relations: true,
            profile_failure_status: 403,
            log_level: "info".to_string(),
        }
    }
}

impl TenantLayerConfig {
    /// Reads the configuration from environment variables only.
    ///
    /// Falls back to the defaults if any variable fails to parse.
    pub fn from_env() -> Self {
        Self::try_parse_from(["tenancy"]).unwrap_or_default()
    }

    /// The engine configuration selected by this layer configuration.
    pub fn tenancy_config(&self) -> TenancyConfig {
        TenancyConfig::new()
            .with_missing_tenant(self.missing_tenant)
            .with_warn_unscoped_relations(self.warn_unscoped_relations)
    }

    /// The status for profile resolution failures.
    ///
    /// Out-of-range values fall back to `500`; [`validate`](Self::validate)
    /// reports them.
    pub fn profile_failure_status(&self) -> StatusCode {
        StatusCode::from_u16(self.profile_failure_status)
            .ok()
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match StatusCode::from_u16(self.profile_failure_status) {
            Ok(status) if status.is_client_error() || status.is_server_error() => {}
            _ => errors.push(format!(
                "Profile failure status must be a 4xx or 5xx code, got {}",
                self.profile_failure_status
            )),
        }

        if !matches!(
            self.log_level.to_ascii_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            errors.push(format!("Unknown log level '{}'", self.log_level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
