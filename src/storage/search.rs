//! Runtime composition of search queries.
//!
//! Search is the only statement whose shape depends on its arguments. The
//! [`PredicateBuilder`] starts from a full scan and can only append AND-ed
//! comparisons against known [`Column`]s with a freshly numbered placeholder,
//! so caller values are always bound and never interpolated.

use super::statements::{Column, Dialect, SELECT_COLUMNS};
use super::value::SqlValue;
use crate::models::SearchFilter;

/// A compiled search: SQL plus the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    sql: String,
    params: Vec<SqlValue>,
}

impl SearchQuery {
    /// Compiles `filter` against `table`.
    ///
    /// Clauses are appended in a fixed order: email substring, minimum
    /// subject id, maximum subject id. Absent criteria are skipped.
    #[must_use]
    pub fn from_filter(table: &str, dialect: Dialect, filter: &SearchFilter) -> Self {
        let mut builder = PredicateBuilder::select_all(table, dialect);
        if filter.is_empty() {
            return builder.build();
        }

        if let Some(fragment) = filter.email_fragment() {
            builder = builder.and_contains(Column::UserEmail, fragment);
        }
        if let Some(min) = filter.min_subject_id {
            builder = builder.and_at_least(Column::SubjectId, min);
        }
        if let Some(max) = filter.max_subject_id {
            builder = builder.and_at_most(Column::SubjectId, max);
        }

        builder.build()
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bound values.
    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

/// Appends AND-ed, parameterized predicates to a full-table scan.
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl PredicateBuilder {
    /// Starts from "select every row of `table`".
    #[must_use]
    pub fn select_all(table: &str, dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: format!("SELECT {SELECT_COLUMNS} FROM {table} WHERE 1=1"),
            params: Vec::new(),
        }
    }

    /// Binds `value` and returns its placeholder.
    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// Requires `column` to contain `fragment` (case-sensitive).
    #[must_use]
    pub fn and_contains(mut self, column: Column, fragment: &str) -> Self {
        let placeholder = self.bind(fragment.into());
        let predicate = self.dialect.contains(column, &placeholder);
        self.sql.push_str(" AND ");
        self.sql.push_str(&predicate);
        self
    }

    /// Requires `column >= value`.
    #[must_use]
    pub fn and_at_least(mut self, column: Column, value: i64) -> Self {
        let placeholder = self.bind(value.into());
        self.sql
            .push_str(&format!(" AND {} >= {placeholder}", column.as_str()));
        self
    }

    /// Requires `column <= value`.
    #[must_use]
    pub fn and_at_most(mut self, column: Column, value: i64) -> Self {
        let placeholder = self.bind(value.into());
        self.sql
            .push_str(&format!(" AND {} <= {placeholder}", column.as_str()));
        self
    }

    /// Finishes the query.
    #[must_use]
    pub fn build(self) -> SearchQuery {
        SearchQuery {
            sql: self.sql,
            params: self.params,
        }
    }
}
