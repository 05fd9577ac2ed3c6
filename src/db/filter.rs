//! Query filters
//!
//! A filter is written as `"<field> <op>"` plus a value, e.g.
//! `("age >=", 18)`.

use crate::error::{ManagerError, ManagerResult};
use crate::model::Value;

/// Comparison operator of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    ILike,
    /// Array contains: `tags @> {"a"}`
    Contains,
    /// Array is contained by
    ContainedBy,
    /// Arrays share an element
    Overlaps,
}

impl FilterOp {
    /// Parse an operator token
    pub fn parse(token: &str) -> Option<Self> {
        let op = match token.to_ascii_lowercase().as_str() {
            "=" => FilterOp::Eq,
            "!=" | "<>" => FilterOp::Ne,
            "<" => FilterOp::Lt,
            "<=" => FilterOp::Le,
            ">" => FilterOp::Gt,
            ">=" => FilterOp::Ge,
            "like" => FilterOp::Like,
            "ilike" => FilterOp::ILike,
            "@>" => FilterOp::Contains,
            "<@" => FilterOp::ContainedBy,
            "&&" => FilterOp::Overlaps,
            _ => return None,
        };
        Some(op)
    }

    /// SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Like => "LIKE",
            FilterOp::ILike => "ILIKE",
            FilterOp::Contains => "@>",
            FilterOp::ContainedBy => "<@",
            FilterOp::Overlaps => "&&",
        }
    }
}

/// A parsed filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Parse `"<field> <op>"` and pair it with `value`
    ///
    /// # Errors
    /// Returns `ManagerError::InvalidFilter` unless `expr` is exactly a
    /// field name and a known operator separated by whitespace
    pub fn parse(expr: &str, value: impl Into<Value>) -> ManagerResult<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        let [field, op] = parts.as_slice() else {
            return Err(ManagerError::InvalidFilter(expr.to_string()));
        };
        let op = FilterOp::parse(op).ok_or_else(|| ManagerError::InvalidFilter(expr.to_string()))?;
        Ok(Self {
            field: field.to_string(),
            op,
            value: value.into(),
        })
    }
}
