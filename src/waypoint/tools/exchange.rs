// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{json, Value};

use super::{api_key, base_url, get_json, parse_url};
use crate::adk::error::WaypointError;
use crate::adk::tool::{required_str, Tool};
use crate::waypoint::config::ApiEndpoint;

pub const DEFAULT_BASE_URL: &str = "https://v6.exchangerate-api.com/v6";

static EXCHANGE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "base": {
                "type": "string",
                "description": "ISO currency code to convert from, e.g. 'USD'"
            },
            "target": {
                "type": "string",
                "description": "ISO currency code to convert to, e.g. 'INR'"
            }
        },
        "required": ["base", "target"]
    })
});

/// ExchangeRate-API latest rates
pub struct ExchangeRateTool {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ExchangeRateTool {
    pub fn new(client: Client, endpoint: &ApiEndpoint) -> Result<Self, WaypointError> {
        Ok(Self {
            client,
            api_key: api_key(endpoint, "EXCHANGE_RATE_API_KEY")?,
            base_url: base_url(endpoint, DEFAULT_BASE_URL),
        })
    }
}

/// Conversion rate to `target` from a `latest/<base>` response
pub fn parse_rate(body: &Value, target: &str) -> Result<f64, WaypointError> {
    if body.get("result").and_then(|r| r.as_str()) == Some("error") {
        let kind = body
            .get("error-type")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown-error");
        return Err(WaypointError::api("ExchangeRate", kind));
    }

    body.get("conversion_rates")
        .and_then(|rates| rates.get(target))
        .and_then(|rate| rate.as_f64())
        .ok_or_else(|| WaypointError::api("ExchangeRate", format!("no rate for {}", target)))
}

#[async_trait]
impl Tool for ExchangeRateTool {
    fn name(&self) -> &str {
        "exchange_rate"
    }

    fn description(&self) -> &str {
        "Looks up the latest conversion rate between two currencies."
    }

    fn schema(&self) -> &Value {
        &EXCHANGE_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, WaypointError> {
        let base = required_str(&input, "base")?.trim().to_uppercase();
        let target = required_str(&input, "target")?.trim().to_uppercase();

        let url = parse_url(&format!(
            "{}/{}/latest/{}",
            self.base_url, self.api_key, base
        ))?;
        let body = get_json(&self.client, url, "ExchangeRate").await?;
        let rate = parse_rate(&body, &target)?;

        log::info!("Exchange rate {} -> {}: {}", base, target, rate);
        Ok(json!({ "base": base, "target": target, "rate": rate }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        let body = json!({
            "result": "success",
            "base_code": "USD",
            "conversion_rates": {"USD": 1, "INR": 83.12, "JPY": 157.3}
        });
        assert_eq!(parse_rate(&body, "INR").unwrap(), 83.12);
        assert_eq!(parse_rate(&body, "USD").unwrap(), 1.0);
        assert!(parse_rate(&body, "XYZ").is_err());
    }

    #[test]
    fn test_parse_rate_error_result() {
        let body = json!({ "result": "error", "error-type": "unsupported-code" });
        let err = parse_rate(&body, "INR").unwrap_err();
        assert!(err.to_string().contains("unsupported-code"));
    }
}
