// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for condition expressions

use std::fmt;

/// A condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `path op literal`
    Compare {
        left: String,
        op: CompareOp,
        right: Literal,
    },
    /// `path in [a, b, c]`
    In { left: String, values: Vec<Literal> },
    /// Bare `path`: true when the state holds a non-empty value there
    Exists(String),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    True,
    False,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring for strings, membership for arrays
    Contains,
}

/// Literal values in expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Contains => "contains",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expression::In { left, values } => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} in [{}]", left, items.join(", "))
            }
            Expression::Exists(path) => f.write_str(path),
            Expression::And(l, r) => write!(f, "({} and {})", l, r),
            Expression::Or(l, r) => write!(f, "({} or {})", l, r),
            Expression::Not(inner) => write!(f, "not {}", inner),
            Expression::True => f.write_str("true"),
            Expression::False => f.write_str("false"),
        }
    }
}
