//! Parsed representation of the query language

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Binary comparison operator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Lte => "<=",
            CompareOp::Gte => ">=",
        }
    }
}

/// Boolean expression of a WHERE clause
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    And {
        operands: Vec<Expr>,
    },
    Or {
        operands: Vec<Expr>,
    },
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// `field IS NULL`, or `field IS NOT NULL` when `negated`
    IsNull {
        field: String,
        negated: bool,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    /// SQL wildcard pattern: `%` any run, `_` one character
    Like {
        field: String,
        pattern: String,
    },
}

impl Expr {
    /// Combine operands with AND, collapsing a single operand
    pub fn and(mut operands: Vec<Expr>) -> Expr {
        if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::And { operands }
        }
    }

    /// Combine operands with OR, collapsing a single operand
    pub fn or(mut operands: Vec<Expr>) -> Expr {
        if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::Or { operands }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// A full `SELECT * FROM ...` statement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub table: String,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,
    #[serde(rename = "orderBy", skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Query {
    /// Select every row of `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
