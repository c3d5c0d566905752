//! Tenant identifier type.
//!
//! This module defines the [`TenantId`] type, an opaque and comparable value
//! identifying the tenant that owns a row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::query::SqlParam;

/// An opaque tenant identifier.
///
/// Tenant-scoped rows carry their owning tenant in a designated column, so the
/// identifier has to match whatever type that column stores. Integer keys,
/// textual slugs and UUIDs are all supported. Two identifiers are equal only
/// when both the kind and the value agree.
///
/// # Examples
///
/// ```
/// use helios_tenancy::tenant::TenantId;
///
/// let by_key = TenantId::from(42);
/// let by_slug = TenantId::from("acme");
///
/// assert_eq!(by_key.to_string(), "42");
/// assert_ne!(TenantId::from(1), TenantId::from("1"));
/// assert_eq!(by_slug, "acme".parse().unwrap());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TenantId {
    /// Integer key, the common case for a tenant table's primary key.
    Integer(i64),
    /// UUID key.
    Uuid(Uuid),
    /// Free-form textual key.
    Text(String),
}

impl TenantId {
    /// Creates a textual tenant ID.
    pub fn text(id: impl Into<String>) -> Self {
        TenantId::Text(id.into())
    }

    /// Returns the bound SQL parameter representing this ID.
    ///
    /// UUIDs bind as their hyphenated text form.
    pub fn to_sql_param(&self) -> SqlParam {
        match self {
            TenantId::Integer(value) => SqlParam::Integer(*value),
            TenantId::Uuid(value) => SqlParam::String(value.hyphenated().to_string()),
            TenantId::Text(value) => SqlParam::String(value.clone()),
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantId::Integer(value) => write!(f, "{}", value),
            TenantId::Uuid(value) => write!(f, "{}", value.hyphenated()),
            TenantId::Text(value) => write!(f, "{}", value),
        }
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self)
    }
}

/// Parses integers first, then UUIDs, and falls back to text.
impl FromStr for TenantId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(value) = s.parse::<i64>() {
            return Ok(TenantId::Integer(value));
        }
        if let Ok(value) = Uuid::parse_str(s) {
            return Ok(TenantId::Uuid(value));
        }
        Ok(TenantId::Text(s.to_string()))
    }
}

impl From<i64> for TenantId {
    fn from(value: i64) -> Self {
        TenantId::Integer(value)
    }
}

impl From<i32> for TenantId {
    fn from(value: i32) -> Self {
        TenantId::Integer(i64::from(value))
    }
}

impl From<Uuid> for TenantId {
    fn from(value: Uuid) -> Self {
        TenantId::Uuid(value)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        TenantId::Text(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        TenantId::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TenantId::from(7).to_string(), "7");
        assert_eq!(TenantId::text("acme").to_string(), "acme");

        let uuid = Uuid::parse_str("7d444840-9dc0-11d1-b245-5ffdce74fad2").unwrap();
        assert_eq!(
            TenantId::from(uuid).to_string(),
            "7d444840-9dc0-11d1-b245-5ffdce74fad2"
        );
    }

    #[test]
    fn test_equality_is_kind_sensitive() {
        assert_eq!(TenantId::from(1), TenantId::from(1i32));
        assert_ne!(TenantId::from(1), TenantId::text("1"));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("12".parse::<TenantId>().unwrap(), TenantId::Integer(12));
        assert_eq!(
            "acme-corp".parse::<TenantId>().unwrap(),
            TenantId::text("acme-corp")
        );
        assert!(matches!(
            "7d444840-9dc0-11d1-b245-5ffdce74fad2".parse::<TenantId>().unwrap(),
            TenantId::Uuid(_)
        ));
    }

    #[test]
    fn test_to_sql_param() {
        assert!(matches!(TenantId::from(3).to_sql_param(), SqlParam::Integer(3)));
        assert!(matches!(
            TenantId::text("acme").to_sql_param(),
            SqlParam::String(ref s) if s == "acme"
        ));
    }

    #[test]
    fn test_serde_untagged() {
        let json = serde_json::to_string(&TenantId::from(5)).unwrap();
        assert_eq!(json, "5");
        let parsed: TenantId = serde_json::from_str("\"acme\"").unwrap();
        assert_eq!(parsed, TenantId::text("acme"));
        let parsed: TenantId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, TenantId::Integer(9));
    }
}
