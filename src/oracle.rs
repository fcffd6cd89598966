//! Weather oracle adapter.
//!
//! One GET per check, keyed by city. Fields are read loosely: anything missing
//! falls back to zero rainfall, unknown temperature and a "clear" sky.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("weather request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("weather API returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed weather payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherObservation {
    pub rainfall_mm: f64,
    pub temperature_c: Option<f64>,
    pub condition: String,
}

impl WeatherObservation {
    pub fn temperature_label(&self) -> String {
        match self.temperature_c {
            Some(t) => format!("{t} °C"),
            None => "— °C".to_string(),
        }
    }

    pub fn rainfall_label(&self) -> String {
        format!("{} mm", crate::devnet::fixed_1(self.rainfall_mm))
    }
}

/// Weather endpoint client
#[derive(Clone)]
pub struct WeatherOracle {
    http: reqwest::Client,
    endpoint: String,
}

impl WeatherOracle {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Build a client with the given request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(http, endpoint))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_url(&self, city: &str) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}location={}",
            self.endpoint,
            sep,
            urlencoding::encode(city)
        )
    }

    /// Fetch the current observation for `city`.
    pub async fn observe(&self, city: &str) -> Result<WeatherObservation, OracleError> {
        let url = self.request_url(city);
        tracing::debug!(%url, "Querying weather oracle");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(OracleError::Status(response.status()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        let obs = parse_observation(&body)?;

        tracing::info!(
            city,
            rainfall_mm = obs.rainfall_mm,
            condition = %obs.condition,
            "Weather observation received"
        );
        Ok(obs)
    }
}

fn number_at(v: &Value, path: &[&str]) -> Option<f64> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_f64()
}

fn string_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str()
}

/// Best-effort field extraction. Only a non-object body is rejected.
pub fn parse_observation(body: &Value) -> Result<WeatherObservation, OracleError> {
    if !body.is_object() {
        return Err(OracleError::Malformed(format!(
            "expected a JSON object, got {}",
            kind_of(body)
        )));
    }

    let rainfall_mm = number_at(body, &["rainfall_mm"])
        .or_else(|| number_at(body, &["precipitation", "rainfall_mm"]))
        .or_else(|| number_at(body, &["precipitation", "mm"]))
        .or_else(|| number_at(body, &["precipitation"]))
        .filter(|r| r.is_finite())
        .unwrap_or(0.0);

    let temperature_c = number_at(body, &["temp"])
        .or_else(|| number_at(body, &["temperature_c"]))
        .or_else(|| number_at(body, &["temperature", "celsius"]))
        .filter(|t| t.is_finite());

    let condition = string_at(body, &["condition"])
        .or_else(|| string_at(body, &["condition", "text"]))
        .unwrap_or("clear")
        .to_string();

    Ok(WeatherObservation {
        rainfall_mm,
        temperature_c,
        condition,
    })
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
