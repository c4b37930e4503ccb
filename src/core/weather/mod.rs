//! weatherapi.com current-conditions client.

use serde::Deserialize;
use thiserror::Error;

pub const WEATHER_API_URL: &str = "https://api.weatherapi.com";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("weather network error: {0}")]
    NetworkError(String),

    #[error("weather provider error: {0}")]
    ProviderError(String),

    #[error("weather configuration error: {0}")]
    InvalidConfiguration(String),
}

/// Current conditions for one location, reduced to what the assistant speaks.
#[derive(Debug, Clone)]
pub struct CurrentWeather {
    pub location: String,
    pub temperature_c: f64,
    pub condition: String,
    pub feels_like_c: f64,
    pub humidity: u8,
}

impl CurrentWeather {
    /// One-sentence summary suitable for synthesis.
    pub fn summary(&self) -> String {
        format!(
            "It's currently {} degrees Celsius in {} with {}. It feels like {} degrees with {} percent humidity.",
            self.temperature_c,
            self.location,
            self.condition.to_lowercase(),
            self.feels_like_c,
            self.humidity
        )
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    location: ApiLocation,
    current: ApiCurrent,
}

#[derive(Debug, Deserialize)]
struct ApiLocation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    temp_c: f64,
    feelslike_c: f64,
    humidity: u8,
    condition: ApiCondition,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    text: String,
}

pub struct WeatherClient {
    api_key: String,
    endpoint: String,
    http: reqwest::Client,
}

impl WeatherClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: Option<String>,
        http: reqwest::Client,
    ) -> Result<Self, WeatherError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(WeatherError::InvalidConfiguration(
                "weather API key is required".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            endpoint: endpoint.unwrap_or_else(|| WEATHER_API_URL.to_string()),
            http,
        })
    }

    pub async fn current(&self, location: &str) -> Result<CurrentWeather, WeatherError> {
        let url = format!("{}/v1/current.json", self.endpoint.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", location)])
            .send()
            .await
            .map_err(|e| WeatherError::NetworkError(format!("weather request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(WeatherError::AuthenticationFailed(
                "weatherapi.com rejected the API key".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::ProviderError(format!(
                "weatherapi.com returned {status}: {body}"
            )));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::ProviderError(format!("invalid weather response: {e}")))?;

        Ok(CurrentWeather {
            location: parsed.location.name,
            temperature_c: parsed.current.temp_c,
            condition: parsed.current.condition.text,
            feels_like_c: parsed.current.feelslike_c,
            humidity: parsed.current.humidity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let result = WeatherClient::new("", None, reqwest::Client::new());
        assert!(matches!(result, Err(WeatherError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_summary_phrasing() {
        let weather = CurrentWeather {
            location: "Mumbai".into(),
            temperature_c: 31.0,
            condition: "Partly Cloudy".into(),
            feels_like_c: 35.0,
            humidity: 74,
        };
        let summary = weather.summary();
        assert!(summary.contains("31 degrees Celsius in Mumbai"));
        assert!(summary.contains("partly cloudy"));
        assert!(summary.contains("74 percent humidity"));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "location": {"name": "Mumbai"},
            "current": {
                "temp_c": 31.0,
                "feelslike_c": 35.2,
                "humidity": 74,
                "condition": {"text": "Partly cloudy"}
            }
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.location.name, "Mumbai");
        assert_eq!(parsed.current.humidity, 74);
    }
}
