//! Abstract query and the concrete select builder.
//!
//! [`QueryBuilder`] is the boundary the tenant policy works against: it sees
//! only the alias graph and an appendable predicate list. [`SelectQuery`] is
//! the in-crate implementation that also knows how to render itself for every
//! SQL-generating event (rows, count, aggregate, exists, subquery, update
//! target).

use std::collections::HashSet;

use crate::tenant::TenantId;

use super::sql::{SqlFragment, column_ref, quote_ident};

/// The view of an in-flight query needed to inject tenant predicates.
pub trait QueryBuilder {
    /// Physical table of the base alias.
    fn base_table(&self) -> &str;

    /// Alias the base table is referenced by.
    fn base_alias(&self) -> &str;

    /// Every alias in the query (base included) with its reference count.
    ///
    /// A zero count means the alias is vestigial and will not be rendered.
    fn alias_refcounts(&self) -> Vec<(&str, usize)>;

    /// Physical table behind `alias`.
    fn alias_table(&self, alias: &str) -> Option<&str>;

    /// Appends a predicate to the `WHERE` clause.
    fn append_raw_predicate(&mut self, predicate: SqlFragment);

    /// Returns `true` if `alias` already carries the equality predicate for
    /// `tenant`.
    fn tenant_filtered(&self, alias: &str, tenant: &TenantId) -> bool;

    /// Records that `alias` carries the equality predicate for `tenant`.
    fn mark_tenant_filtered(&mut self, alias: &str, tenant: &TenantId);
}

/// How a joined table is combined with the rows so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    /// `INNER JOIN`
    #[default]
    Inner,
    /// `LEFT OUTER JOIN`
    LeftOuter,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// A joined table occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Alias of this occurrence.
    pub alias: String,
    /// Physical table.
    pub table: String,
    /// Join type.
    pub kind: JoinKind,
    /// `ON` condition.
    pub on: SqlFragment,
    /// Number of references; zero trims the join.
    pub refcount: usize,
}

/// Aggregate functions supported by [`SelectQuery::aggregate_sql`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// `COUNT(col)`
    Count,
    /// `SUM(col)`
    Sum,
    /// `AVG(col)`
    Avg,
    /// `MIN(col)`
    Min,
    /// `MAX(col)`
    Max,
}

impl AggregateFunction {
    fn sql_name(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// An aggregate over one column of one alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Function to apply.
    pub function: AggregateFunction,
    /// Alias owning the column; `None` means the base alias.
    pub alias: Option<String>,
    /// Column name.
    pub column: String,
}

impl Aggregate {
    /// Aggregate over a base-table column.
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            alias: None,
            column: column.into(),
        }
    }

    /// Aggregate over a column of a joined alias.
    pub fn on_alias(
        function: AggregateFunction,
        alias: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            function,
            alias: Some(alias.into()),
            column: column.into(),
        }
    }

    /// `SUM(column)` on the base table.
    pub fn sum(column: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Sum, column)
    }

    /// `MAX(column)` on the base table.
    pub fn max(column: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Max, column)
    }
}

/// A `WHERE` clause entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Pre-rendered SQL with bound parameters.
    Raw(SqlFragment),
    /// `lhs IN (SELECT column FROM ...)`, rendered when the outer query is.
    InSubquery {
        /// Left-hand side SQL, usually a column reference.
        lhs: String,
        /// Column selected by the subquery.
        column: String,
        /// The embedded query.
        query: Box<SelectQuery>,
    },
}

impl Predicate {
    fn render(&self) -> SqlFragment {
        match self {
            Predicate::Raw(fragment) => fragment.clone(),
            Predicate::InSubquery { lhs, column, query } => {
                let inner = query.subquery_sql(column);
                SqlFragment::with_params(format!("{} IN ({})", lhs, inner.sql), inner.params)
            }
        }
    }
}

/// A column in the `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Owning alias.
    pub alias: String,
    /// Column name.
    pub column: String,
    /// Sort descending.
    pub descending: bool,
}

/// A selected output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    /// Owning alias.
    pub alias: String,
    /// Column name.
    pub column: String,
    /// Output label.
    pub label: String,
}

/// A `SELECT` over a base table with optional joins.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    base_table: String,
    base_alias: String,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    columns: Vec<SelectColumn>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
    tenant_filters: HashSet<(String, TenantId)>,
}

impl SelectQuery {
    /// Starts a query on `table`, aliased by its own name.
    pub fn from_table(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            base_alias: table.clone(),
            base_table: table,
            joins: Vec::new(),
            predicates: Vec::new(),
            columns: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            tenant_filters: HashSet::new(),
        }
    }

    /// Uses `alias` for the base table instead of its name.
    pub fn with_base_alias(mut self, alias: impl Into<String>) -> Self {
        self.base_alias = alias.into();
        self
    }

    /// Adds a join with a reference count of one.
    pub fn join(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        alias: impl Into<String>,
        on: SqlFragment,
    ) -> Self {
        self.joins.push(Join {
            alias: alias.into(),
            table: table.into(),
            kind,
            on,
            refcount: 1,
        });
        self
    }

    /// Returns an alias for `table` not yet used in this query.
    ///
    /// The first occurrence of a table is aliased by its name, later ones
    /// get `T2`, `T3` and so on.
    pub fn next_alias(&self, table: &str) -> String {
        if !self.has_alias(table) {
            return table.to_string();
        }
        let mut n = self.joins.len() + 1;
        loop {
            let candidate = format!("T{n}");
            if !self.has_alias(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Returns `true` if `alias` names the base table or a join.
    pub fn has_alias(&self, alias: &str) -> bool {
        self.base_alias == alias || self.joins.iter().any(|j| j.alias == alias)
    }

    /// Increments the reference count of a join.
    pub fn add_ref(&mut self, alias: &str) {
        if let Some(join) = self.joins.iter_mut().find(|j| j.alias == alias) {
            join.refcount += 1;
        }
    }

    /// Marks a join as unused; it is neither rendered nor tenant-filtered.
    pub fn trim_join(&mut self, alias: &str) {
        if let Some(join) = self.joins.iter_mut().find(|j| j.alias == alias) {
            join.refcount = 0;
        }
    }

    /// Returns the joins, including trimmed ones.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Appends a predicate.
    pub fn push_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Returns the `WHERE` entries.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Mutable access to embedded subqueries, outermost first.
    pub fn subqueries_mut(&mut self) -> impl Iterator<Item = &mut SelectQuery> {
        self.predicates.iter_mut().filter_map(|p| match p {
            Predicate::InSubquery { query, .. } => Some(query.as_mut()),
            Predicate::Raw(_) => None,
        })
    }

    /// Adds an output column. Without any, `base_alias.*` is selected.
    pub fn select(
        mut self,
        alias: impl Into<String>,
        column: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.columns.push(SelectColumn {
            alias: alias.into(),
            column: column.into(),
            label: label.into(),
        });
        self
    }

    /// Adds an ordering column.
    pub fn order_by(
        mut self,
        alias: impl Into<String>,
        column: impl Into<String>,
        descending: bool,
    ) -> Self {
        self.order_by.push(OrderBy {
            alias: alias.into(),
            column: column.into(),
            descending,
        });
        self
    }

    /// Limits the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the row limit, if any.
    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Renders the row-returning statement.
    pub fn select_sql(&self) -> SqlFragment {
        let projection = if self.columns.is_empty() {
            format!("{}.*", quote_ident(&self.base_alias))
        } else {
            self.columns
                .iter()
                .map(|c| {
                    format!(
                        "{} AS {}",
                        column_ref(&c.alias, &c.column),
                        quote_ident(&c.label)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.render(&projection, true)
    }

    /// Renders `SELECT COUNT(*)`.
    pub fn count_sql(&self) -> SqlFragment {
        if self.limit.is_some() {
            let inner = self.render("1", true);
            return SqlFragment::with_params(
                format!("SELECT COUNT(*) FROM ({}) AS \"counted\"", inner.sql),
                inner.params,
            );
        }
        self.render("COUNT(*)", false)
    }

    /// Renders an aggregate over the query's rows.
    pub fn aggregate_sql(&self, aggregate: &Aggregate) -> SqlFragment {
        let alias = aggregate.alias.as_deref().unwrap_or(&self.base_alias);
        let target = column_ref(alias, &aggregate.column);
        let function = aggregate.function.sql_name();
        if self.limit.is_some() {
            let inner = self.render(&format!("{target} AS \"value\""), true);
            return SqlFragment::with_params(
                format!("SELECT {function}(\"value\") FROM ({}) AS \"aggregated\"", inner.sql),
                inner.params,
            );
        }
        self.render(&format!("{function}({target})"), false)
    }

    /// Renders `SELECT EXISTS(...)`.
    pub fn exists_sql(&self) -> SqlFragment {
        let mut probe = self.clone();
        probe.order_by.clear();
        probe.limit = Some(1);
        let inner = probe.render("1", true);
        SqlFragment::with_params(format!("SELECT EXISTS({})", inner.sql), inner.params)
    }

    /// Renders the query as a single-column subquery selecting
    /// `base_alias.column`.
    pub fn subquery_sql(&self, column: &str) -> SqlFragment {
        let projection = column_ref(&self.base_alias, column);
        self.render(&projection, self.limit.is_some())
    }

    fn render(&self, projection: &str, with_tail: bool) -> SqlFragment {
        let mut fragment =
            SqlFragment::new(format!("SELECT {} FROM {}", projection, self.from_clause()));

        for join in self.joins.iter().filter(|j| j.refcount > 0) {
            let target = if join.alias == join.table {
                quote_ident(&join.table)
            } else {
                format!("{} AS {}", quote_ident(&join.table), quote_ident(&join.alias))
            };
            fragment.push_sql(&format!(" {} {} ON ", join.kind.keyword(), target));
            fragment.push(&join.on);
        }

        let conditions = SqlFragment::and_all(self.predicates.iter().map(Predicate::render));
        if !conditions.is_empty() {
            fragment.push_sql(" WHERE ");
            fragment.push(&conditions);
        }

        if with_tail {
            if !self.order_by.is_empty() {
                let ordering = self
                    .order_by
                    .iter()
                    .map(|o| {
                        let direction = if o.descending { "DESC" } else { "ASC" };
                        format!("{} {}", column_ref(&o.alias, &o.column), direction)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                fragment.push_sql(&format!(" ORDER BY {ordering}"));
            }
            if let Some(limit) = self.limit {
                fragment.push_sql(&format!(" LIMIT {limit}"));
            }
        }
        fragment
    }

    fn from_clause(&self) -> String {
        if self.base_alias == self.base_table {
            quote_ident(&self.base_table)
        } else {
            format!("{} AS {}", quote_ident(&self.base_table), quote_ident(&self.base_alias))
        }
    }
}

impl QueryBuilder for SelectQuery {
    fn base_table(&self) -> &str {
        &self.base_table
    }

    fn base_alias(&self) -> &str {
        &self.base_alias
    }

    fn alias_refcounts(&self) -> Vec<(&str, usize)> {
        std::iter::once((self.base_alias.as_str(), 1))
            .chain(self.joins.iter().map(|j| (j.alias.as_str(), j.refcount)))
            .collect()
    }

    fn alias_table(&self, alias: &str) -> Option<&str> {
        if alias == self.base_alias {
            return Some(&self.base_table);
        }
        self.joins
            .iter()
            .find(|j| j.alias == alias)
            .map(|j| j.table.as_str())
    }

    fn append_raw_predicate(&mut self, predicate: SqlFragment) {
        self.predicates.push(Predicate::Raw(predicate));
    }

    fn tenant_filtered(&self, alias: &str, tenant: &TenantId) -> bool {
        self.tenant_filters
            .contains(&(alias.to_string(), tenant.clone()))
    }

    fn mark_tenant_filtered(&mut self, alias: &str, tenant: &TenantId) {
        self.tenant_filters.insert((alias.to_string(), tenant.clone()));
    }
}
