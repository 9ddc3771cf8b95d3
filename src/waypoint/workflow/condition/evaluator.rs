//! Condition expression evaluator

use super::ast::{CompareOp, Expression, Literal};
use crate::waypoint::workflow::state::WorkflowState;
use serde_json::Value;

/// Evaluate a condition expression against workflow state.
///
/// Missing paths compare equal to `null` and fail every ordering test.
pub fn evaluate(expr: &Expression, state: &WorkflowState) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Compare { left, op, right } => {
            let value = state.get_path(left);
            match op {
                CompareOp::Eq => matches_literal(value, right),
                CompareOp::NotEq => !matches_literal(value, right),
                CompareOp::Gt => compare_numbers(value, right, |a, b| a > b),
                CompareOp::Gte => compare_numbers(value, right, |a, b| a >= b),
                CompareOp::Lt => compare_numbers(value, right, |a, b| a < b),
                CompareOp::Lte => compare_numbers(value, right, |a, b| a <= b),
                CompareOp::Contains => contains(value, right),
            }
        }
        Expression::In { left, values } => {
            let value = state.get_path(left);
            values.iter().any(|literal| matches_literal(value, literal))
        }
        Expression::Exists(path) => is_truthy(state.get_path(path)),
        Expression::And(left, right) => evaluate(left, state) && evaluate(right, state),
        Expression::Or(left, right) => evaluate(left, state) || evaluate(right, state),
        Expression::Not(inner) => !evaluate(inner, state),
    }
}

fn matches_literal(value: Option<&Value>, literal: &Literal) -> bool {
    match (value, literal) {
        (None | Some(Value::Null), Literal::Null) => true,
        (Some(Value::String(s)), Literal::String(expected)) => s == expected,
        (Some(Value::Number(n)), Literal::Number(expected)) => {
            n.as_f64().is_some_and(|f| (f - expected).abs() < f64::EPSILON)
        }
        (Some(Value::Bool(b)), Literal::Boolean(expected)) => b == expected,
        _ => false,
    }
}

fn compare_numbers(
    value: Option<&Value>,
    literal: &Literal,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (value.and_then(Value::as_f64), literal) {
        (Some(lhs), Literal::Number(rhs)) => cmp(lhs, *rhs),
        _ => false,
    }
}

fn contains(value: Option<&Value>, literal: &Literal) -> bool {
    match (value, literal) {
        (Some(Value::String(s)), Literal::String(needle)) => s.contains(needle.as_str()),
        (Some(Value::Array(items)), _) => items
            .iter()
            .any(|item| matches_literal(Some(item), literal)),
        (Some(Value::Object(map)), Literal::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}
