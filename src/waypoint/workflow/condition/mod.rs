// SPDX-License-Identifier: MIT

//! Condition evaluation for routing edges
//!
//! This module provides parsing and evaluation of `when` conditions.
//! Conditions are small boolean expressions over state paths:
//! - `topic == 'medical'`
//! - `total_cost > 1000`
//! - `topic in ['travel', 'trip'] and not extracted.city`

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::parse;
