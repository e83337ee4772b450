//! SQL-like query sublanguage
//!
//! Supports a single statement shape:
//!
//! ```text
//! SELECT * FROM <table>
//!     [WHERE <condition>]
//!     [ORDER BY <field> [ASC|DESC]]
//!     [LIMIT <n>] [;]
//! ```
//!
//! Conditions combine `=`, `!=`/`<>`, `<`, `>`, `<=`, `>=`, `IS [NOT] NULL`,
//! `IN (...)` and `LIKE` with `AND`, `OR` and parentheses. `?` placeholders
//! are bound positionally from the parameter list.

pub mod ast;
pub mod compile;
pub mod lexer;
pub mod parser;

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::engine::Engine;
use crate::error::Result;
use crate::types::Record;

pub use ast::{CompareOp, Expr, OrderBy, Query, SortDirection};
pub use compile::{Predicate, compile};
pub use parser::{parse, parse_with_params};

/// A parsed query with its WHERE clause compiled
pub struct CompiledQuery {
    query: Query,
    predicate: Option<Predicate>,
}

impl fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl CompiledQuery {
    pub fn table(&self) -> &str {
        &self.query.table
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Whether `row` satisfies the WHERE clause
    pub fn matches(&self, row: &Record) -> bool {
        self.predicate.as_ref().is_none_or(|predicate| predicate(row))
    }

    /// Execute against the current contents of `engine`
    pub fn run(&self, engine: &Engine) -> Vec<Record> {
        let mut rows = engine.select(self.table(), |row| self.matches(row));
        if let Some(order) = &self.query.order_by {
            compile::sort_rows(&mut rows, order);
        }
        if let Some(limit) = self.query.limit {
            rows.truncate(limit);
        }
        rows
    }
}

impl Query {
    /// Compile the WHERE clause into a predicate
    pub fn compile(self) -> Result<CompiledQuery> {
        let predicate = self.filter.as_ref().map(compile).transpose()?;
        Ok(CompiledQuery {
            query: self,
            predicate,
        })
    }
}

impl Engine {
    /// Run a query without parameters
    ///
    /// An unknown table yields no rows.
    pub fn query(&self, sql: &str) -> Result<Vec<Record>> {
        self.query_with_params(sql, &[])
    }

    /// Run a query, binding `?` placeholders from `params` in order
    pub fn query_with_params(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let compiled = parse_with_params(sql, params)?.compile()?;
        let rows = compiled.run(self);
        debug!(table = compiled.table(), count = rows.len(), "ran query");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::StoreError;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn users() -> Engine {
        let mut engine = Engine::new(&StoreConfig::default());
        engine
            .insert(
                "users",
                vec![
                    record(json!({"name": "ada", "age": 17, "status": "active"})),
                    record(json!({"name": "bob", "age": 20, "status": "active"})),
                    record(json!({"name": "cy", "age": 30, "status": "inactive"})),
                    record(json!({"name": "dee", "age": 25, "status": "active"})),
                ],
            )
            .unwrap();
        engine
    }

    fn ages(rows: &[Record]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["age"].as_i64()).collect()
    }

    // =========================================================================
    // Execution Tests
    // =========================================================================

    #[test]
    fn test_filter_order_limit() {
        let engine = users();
        let rows = engine
            .query(
                "SELECT * FROM users WHERE age >= 18 AND status = 'active' \
                 ORDER BY age DESC LIMIT 2",
            )
            .unwrap();
        assert_eq!(ages(&rows), vec![25, 20]);
    }

    #[test]
    fn test_select_all_keeps_insertion_order() {
        let engine = users();
        let rows = engine.query("select * from users;").unwrap();
        assert_eq!(ages(&rows), vec![17, 20, 30, 25]);
    }

    #[test]
    fn test_order_ascending() {
        let engine = users();
        let rows = engine.query("SELECT * FROM users ORDER BY age").unwrap();
        assert_eq!(ages(&rows), vec![17, 20, 25, 30]);
    }

    #[test]
    fn test_limit_zero() {
        let engine = users();
        assert!(engine.query("SELECT * FROM users LIMIT 0").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_table_is_empty() {
        let engine = users();
        assert!(engine.query("SELECT * FROM nobody").unwrap().is_empty());
    }

    #[test]
    fn test_params_are_bound() {
        let engine = users();
        let rows = engine
            .query_with_params(
                "SELECT * FROM users WHERE age > ? AND name != ?",
                &[json!(18), json!("bob")],
            )
            .unwrap();
        assert_eq!(ages(&rows), vec![30, 25]);
    }

    #[test]
    fn test_like_and_in() {
        let engine = users();
        let rows = engine
            .query("SELECT * FROM users WHERE name LIKE '%e%' OR name IN ('cy')")
            .unwrap();
        assert_eq!(ages(&rows), vec![30, 25]);
    }

    #[test]
    fn test_syntax_error_surfaces() {
        let engine = users();
        let err = engine.query("SELECT name FROM users").unwrap_err();
        assert!(matches!(err, StoreError::QuerySyntax { .. }));
    }

    // =========================================================================
    // CompiledQuery Tests
    // =========================================================================

    #[test]
    fn test_compiled_query_reuse() {
        let mut engine = users();
        let compiled = parse("SELECT * FROM users WHERE status = 'active'")
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(compiled.table(), "users");
        assert_eq!(compiled.run(&engine).len(), 3);

        engine
            .insert("users", record(json!({"name": "eve", "age": 40, "status": "active"})))
            .unwrap();
        assert_eq!(compiled.run(&engine).len(), 4);
    }

    #[test]
    fn test_query_without_filter_matches_everything() {
        let compiled = Query::new("users").compile().unwrap();
        assert!(compiled.matches(&Record::new()));
    }
}
