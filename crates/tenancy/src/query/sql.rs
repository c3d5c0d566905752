//! Parameterized SQL pieces.
//!
//! Fragments use anonymous `?` placeholders and keep their bound parameters in
//! the order the placeholders appear in the text, so fragments can be
//! concatenated freely as long as the parameters are concatenated in the same
//! order.

use serde_json::Value;

/// A fragment of SQL with bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }

    /// Converts a scalar JSON value into a parameter.
    ///
    /// Returns `None` for arrays and objects. Booleans bind as `0`/`1`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(SqlParam::Null),
            Value::Bool(b) => Some(SqlParam::Integer(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(SqlParam::Integer)
                .or_else(|| n.as_f64().map(SqlParam::Float)),
            Value::String(s) => Some(SqlParam::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Integer(value)
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        SqlParam::Integer(i64::from(value))
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::String(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::String(value)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Float(value)
    }
}

impl SqlFragment {
    /// Creates a new SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Creates `lhs = ?` bound to `value`.
    pub fn eq(lhs: impl Into<String>, value: SqlParam) -> Self {
        Self::with_params(format!("{} = ?", lhs.into()), vec![value])
    }

    /// Adds a parameter and returns its placeholder.
    pub fn add_param(&mut self, param: SqlParam) -> &'static str {
        self.params.push(param);
        "?"
    }

    /// Appends another fragment verbatim.
    pub fn push(&mut self, other: &SqlFragment) {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params.iter().cloned());
    }

    /// Appends raw SQL without parameters.
    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Combines with another fragment using AND.
    pub fn and(mut self, other: SqlFragment) -> Self {
        if !self.sql.is_empty() && !other.sql.is_empty() {
            self.sql = format!("({}) AND ({})", self.sql, other.sql);
        } else if !other.sql.is_empty() {
            self.sql = other.sql;
        }
        self.params.extend(other.params);
        self
    }

    /// Joins fragments with AND, parenthesizing each one.
    ///
    /// Returns an empty fragment for an empty input.
    pub fn and_all<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = SqlFragment>,
    {
        let mut combined = SqlFragment::default();
        for fragment in fragments.into_iter().filter(|f| !f.is_empty()) {
            if !combined.sql.is_empty() {
                combined.sql.push_str(" AND ");
            }
            combined.sql.push('(');
            combined.sql.push_str(&fragment.sql);
            combined.sql.push(')');
            combined.params.extend(fragment.params);
        }
        combined
    }

    /// Returns true if this fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Returns the number of placeholders in the text.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Quotes an identifier for SQL, doubling embedded quotes.
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Renders `"alias"."column"`.
pub fn column_ref(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(alias), quote_ident(column))
}
