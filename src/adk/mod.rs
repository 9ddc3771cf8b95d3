// SPDX-License-Identifier: MIT

//! Agent development kit: models, agents, tools, and typed errors

pub mod agent;
pub mod error;
pub mod model;
pub mod text;
pub mod tool;
