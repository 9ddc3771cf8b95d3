// SPDX-License-Identifier: MIT

//! The document a run produces

use serde::Serialize;
use serde_json::Value;

use crate::waypoint::workflow::state::WorkflowState;

pub const SUMMARY_KEY: &str = "summary";
pub const ARTIFACT_PATH_KEY: &str = "artifact_path";

/// Title, summary and supporting sections assembled from the final state
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinalArtifact {
    pub title: String,
    pub summary: String,
    pub sections: Vec<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

impl FinalArtifact {
    pub fn from_state(state: &WorkflowState) -> Self {
        let title = state
            .get_str("title")
            .map(str::to_string)
            .unwrap_or_else(|| default_title(state));

        let summary = state
            .get_str(SUMMARY_KEY)
            .unwrap_or("No summary available.")
            .to_string();

        let mut sections = Vec::new();
        let mut push = |heading: &str, body: Option<String>| {
            if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
                sections.push(Section {
                    heading: heading.to_string(),
                    body,
                });
            }
        };

        push("Itinerary", state.get_path("itinerary").map(render_value));
        push("Weather", state.get_str("weather").map(str::to_string));
        push(
            "Attractions",
            state.get_path("attractions").map(render_bullets),
        );
        push("Cost Estimate", cost_section(state));
        push("Research Notes", state.get_str("research").map(str::to_string));

        Self {
            title,
            summary,
            sections,
            path: state.get_str(ARTIFACT_PATH_KEY).map(str::to_string),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n{}\n", self.title, self.summary.trim());
        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n{}\n", section.heading, section.body.trim()));
        }
        out
    }
}

fn default_title(state: &WorkflowState) -> String {
    if let Some(city) = state.get_str("city") {
        return format!("Travel Plan: {}", city);
    }
    if let Some(topic) = state.get_str("topic") {
        let mut chars = topic.chars();
        let topic = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        return format!("{} Research Report", topic);
    }
    "Workflow Report".to_string()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn render_bullets(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| format!("- {}", render_value(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => render_value(other),
    }
}

fn cost_section(state: &WorkflowState) -> Option<String> {
    let hotel = state.get_f64("hotel_cost")?;
    let mut lines = Vec::new();
    match state.get_f64("nights") {
        Some(nights) => lines.push(format!("- Hotel: {:.2} ({} nights)", hotel, nights)),
        None => lines.push(format!("- Hotel: {:.2}", hotel)),
    }
    match state.get_f64("exchange_rate") {
        Some(rate) => lines.push(format!("- Exchange rate: {:.4}", rate)),
        None => lines.push("- Exchange rate: unavailable".to_string()),
    }
    if let Some(total) = state.get_f64("total_cost") {
        let currency = state.get_str("home_currency").unwrap_or("");
        lines.push(format!("- Total: {:.2} {}", total, currency).trim_end().to_string());
    }
    Some(lines.join("\n"))
}
