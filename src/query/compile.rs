//! Compilation of query expressions into row predicates
//!
//! The expression tree is turned into one boxed closure up front, so rows
//! are never matched against the AST directly.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::query::ast::{CompareOp, Expr, OrderBy, SortDirection};
use crate::types::{Record, values_equal};

/// Compiled WHERE clause
pub type Predicate = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// Compile an expression into a predicate
///
/// A field missing from a row satisfies nothing except `IS NULL`.
pub fn compile(expr: &Expr) -> Result<Predicate> {
    Ok(match expr {
        Expr::And { operands } => {
            let parts = operands.iter().map(compile).collect::<Result<Vec<_>>>()?;
            Box::new(move |row| parts.iter().all(|part| part(row)))
        }
        Expr::Or { operands } => {
            let parts = operands.iter().map(compile).collect::<Result<Vec<_>>>()?;
            Box::new(move |row| parts.iter().any(|part| part(row)))
        }
        Expr::Compare { field, op, value } => {
            let (field, op, value) = (field.clone(), *op, value.clone());
            Box::new(move |row| {
                row.get(&field)
                    .is_some_and(|actual| compare(actual, op, &value))
            })
        }
        Expr::IsNull { field, negated } => {
            let (field, negated) = (field.clone(), *negated);
            Box::new(move |row| row.get(&field).is_none_or(Value::is_null) != negated)
        }
        Expr::In { field, values } => {
            let (field, values) = (field.clone(), values.clone());
            Box::new(move |row| {
                row.get(&field)
                    .is_some_and(|actual| values.iter().any(|v| values_equal(actual, v)))
            })
        }
        Expr::Like { field, pattern } => {
            let field = field.clone();
            let regex = like_to_regex(pattern)?;
            Box::new(move |row| {
                row.get(&field)
                    .and_then(Value::as_str)
                    .is_some_and(|text| regex.is_match(text))
            })
        }
    })
}

/// Evaluate `actual op literal`
///
/// Ordering operators only hold between two numbers or two strings.
pub fn compare(actual: &Value, op: CompareOp, literal: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(actual, literal),
        CompareOp::Ne => !values_equal(actual, literal),
        CompareOp::Lt => partial_order(actual, literal) == Some(Ordering::Less),
        CompareOp::Gt => partial_order(actual, literal) == Some(Ordering::Greater),
        CompareOp::Lte => matches!(
            partial_order(actual, literal),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gte => matches!(
            partial_order(actual, literal),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

fn partial_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Translate a SQL LIKE pattern into an anchored regex
pub fn like_to_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| StoreError::query_syntax(e.to_string(), pattern, 0))
}

fn sort_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_) | Value::Object(_)) => 4,
    }
}

/// Total order used by ORDER BY
///
/// Missing and null sort first, then booleans, numbers, strings, and
/// finally arrays and objects, which compare equal among themselves.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ Value::Number(_)), Some(y @ Value::Number(_)))
        | (Some(x @ Value::String(_)), Some(y @ Value::String(_))) => {
            partial_order(x, y).unwrap_or(Ordering::Equal)
        }
        _ => sort_rank(a).cmp(&sort_rank(b)),
    }
}

/// Stable sort of `rows` by the ORDER BY clause
pub fn sort_rows(rows: &mut [Record], order: &OrderBy) {
    rows.sort_by(|a, b| {
        let ordering = sort_order(a.get(&order.field), b.get(&order.field));
        match order.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}
