// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{json, Value};

use super::{api_key, base_url, get_json, parse_url};
use crate::adk::error::WaypointError;
use crate::adk::tool::{required_str, Tool};
use crate::waypoint::config::ApiEndpoint;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
const DEFAULT_LIMIT: usize = 5;

static PLACES_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "city": {
                "type": "string",
                "description": "City to find attractions in"
            },
            "limit": {
                "type": "integer",
                "description": "Maximum number of places (default 5)"
            }
        },
        "required": ["city"]
    })
});

/// Google Places text search for top attractions in a city
pub struct PlacesSearchTool {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PlacesSearchTool {
    pub fn new(client: Client, endpoint: &ApiEndpoint) -> Result<Self, WaypointError> {
        Ok(Self {
            client,
            api_key: api_key(endpoint, "GOOGLE_PLACES_API_KEY")?,
            base_url: base_url(endpoint, DEFAULT_BASE_URL),
        })
    }
}

/// Names of the first `limit` results of a text search response
pub fn parse_places(body: &Value, limit: usize) -> Result<Vec<String>, WaypointError> {
    if let Some(status) = body.get("status").and_then(|s| s.as_str()) {
        if status != "OK" && status != "ZERO_RESULTS" {
            let message = body
                .get("error_message")
                .and_then(|m| m.as_str())
                .unwrap_or(status);
            return Err(WaypointError::api("Google Places", message));
        }
    }

    Ok(body
        .get("results")
        .and_then(|r| r.as_array())
        .map(|results| {
            results
                .iter()
                .filter_map(|r| r.get("name").and_then(|n| n.as_str()))
                .take(limit)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

#[async_trait]
impl Tool for PlacesSearchTool {
    fn name(&self) -> &str {
        "places_search"
    }

    fn description(&self) -> &str {
        "Finds the top places to visit in a city. Returns place names."
    }

    fn schema(&self) -> &Value {
        &PLACES_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, WaypointError> {
        let city = required_str(&input, "city")?;
        let limit = input
            .get("limit")
            .and_then(|l| l.as_u64())
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LIMIT);

        let mut url = parse_url(&format!("{}/textsearch/json", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("query", &format!("top places to visit in {}", city))
            .append_pair("key", &self.api_key);

        let body = get_json(&self.client, url, "Google Places").await?;
        let places = parse_places(&body, limit)?;
        if places.is_empty() {
            log::warn!("No places found for {}", city);
        }

        Ok(json!({ "city": city, "places": places }))
    }
}
