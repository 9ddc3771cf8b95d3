// SPDX-License-Identifier: MIT

//! waypoint-rs: conditional, stateful workflow graphs for LLM-backed
//! request pipelines (trip planning, topic-routed research reports).

pub mod adk;
pub mod waypoint;
