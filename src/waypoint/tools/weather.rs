// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{api_key, base_url, get_json, parse_url};
use crate::adk::error::WaypointError;
use crate::adk::tool::{required_str, Tool};
use crate::waypoint::config::ApiEndpoint;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const FORECAST_ENTRIES: usize = 5;

static WEATHER_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "city": {
                "type": "string",
                "description": "City name, e.g. 'Tokyo'"
            }
        },
        "required": ["city"]
    })
});

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt_txt: String,
    main: ForecastMain,
    #[serde(default)]
    weather: Vec<ForecastCondition>,
}

#[derive(Debug, Deserialize)]
struct ForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastCondition {
    description: String,
}

/// OpenWeatherMap 5-day / 3-hour forecast
pub struct WeatherTool {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WeatherTool {
    pub fn new(client: Client, endpoint: &ApiEndpoint) -> Result<Self, WaypointError> {
        Ok(Self {
            client,
            api_key: api_key(endpoint, "OPENWEATHER_API_KEY")?,
            base_url: base_url(endpoint, DEFAULT_BASE_URL),
        })
    }
}

/// Render the first forecast entries as `"<time>: <temp>°C, <description>"` lines
pub fn format_forecast(body: &Value) -> Result<String, WaypointError> {
    let list = body.get("list").ok_or_else(|| {
        let message = body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("response has no forecast list");
        WaypointError::api("OpenWeather", message)
    })?;

    let entries: Vec<ForecastEntry> = serde_json::from_value(list.clone())?;
    let lines: Vec<String> = entries
        .iter()
        .take(FORECAST_ENTRIES)
        .map(|e| {
            let description = e
                .weather
                .first()
                .map(|w| w.description.as_str())
                .unwrap_or("unknown");
            format!("{}: {}°C, {}", e.dt_txt, e.main.temp, description)
        })
        .collect();

    Ok(lines.join("\n"))
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather_forecast"
    }

    fn description(&self) -> &str {
        "Fetches the upcoming weather forecast for a city (metric units)."
    }

    fn schema(&self) -> &Value {
        &WEATHER_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, WaypointError> {
        let city = required_str(&input, "city")?;

        let mut url = parse_url(&format!("{}/forecast", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("q", city)
            .append_pair("appid", &self.api_key)
            .append_pair("units", "metric");

        let body = get_json(&self.client, url, "OpenWeather").await?;
        let forecast = format_forecast(&body)?;

        Ok(json!({ "city": city, "forecast": forecast }))
    }
}
