//! Safe ORDER BY construction for list queries.
//!
//! Callers name sort fields by their API names. Each repository passes a whitelist mapping
//! those names to column expressions; anything outside the whitelist falls back to the
//! repository's default ordering. Caller-supplied text never reaches the SQL string.

use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Case-insensitive `desc` sorts descending; anything else ascending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(order) if order.trim().eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Requested ordering for a list query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    pub field: Option<String>,
    pub order: SortOrder,
}

/// API field name to column expression
pub type SortColumns = &'static [(&'static str, &'static str)];

impl Sort {
    pub fn new(field: Option<String>, order: Option<&str>) -> Self {
        Self {
            field,
            order: SortOrder::parse(order),
        }
    }

    /// Resolve the requested field against the whitelist
    pub fn column(&self, allowed: SortColumns) -> Option<&'static str> {
        let field = self.field.as_deref()?.trim();
        allowed.iter().find(|(name, _)| *name == field).map(|(_, column)| *column)
    }

    /// Render the ORDER BY clause, using `default_clause` when no whitelisted field was asked for
    pub fn order_by_clause(&self, allowed: SortColumns, default_clause: &'static str) -> String {
        match self.column(allowed) {
            Some(column) => format!(" ORDER BY {} {}", column, self.order.as_sql()),
            None => format!(" ORDER BY {default_clause}"),
        }
    }

    pub fn push_order_by(&self, query: &mut QueryBuilder<'_, Postgres>, allowed: SortColumns, default_clause: &'static str) {
        query.push(self.order_by_clause(allowed, default_clause));
    }
}
