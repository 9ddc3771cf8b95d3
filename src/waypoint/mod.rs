// SPDX-License-Identifier: MIT

pub mod config;
pub mod nodes;
pub mod runtime;
pub mod server;
pub mod tools;
pub mod workflow;
