use anyhow::{Context, Result};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

use crate::{
    error::WeatherError,
    model::WeatherQuery,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Number of attempts per fetch unless the caller overrides it.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Measurement system requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Kelvin, m/s. The provider's default; no `units` parameter is sent.
    #[default]
    Standard,
    Metric,
    Imperial,
}

impl Units {
    pub fn as_query_value(&self) -> Option<&'static str> {
        match self {
            Units::Standard => None,
            Units::Metric => Some("metric"),
            Units::Imperial => Some("imperial"),
        }
    }
}

/// Client settings other than the access token.
///
/// Example TOML:
/// ```toml
/// max_retries = 5
/// units = "metric"
/// probe_address = "1.1.1.1:53"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub max_retries: u32,
    pub units: Units,
    /// Two-letter language code for condition descriptions.
    pub lang: Option<String>,
    /// Address the connectivity probe tries to reach.
    pub probe_address: SocketAddr,
    pub probe_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            units: Units::Standard,
            lang: None,
            probe_address: SocketAddr::from(([8, 8, 8, 8], 53)),
            probe_timeout_ms: 2_000,
            user_agent: concat!("weather-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Parse settings from TOML; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: ClientConfig =
            toml::from_str(contents).context("Failed to parse weather client configuration")?;
        cfg.validate().context("Invalid weather client configuration")?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize weather client configuration")
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.endpoint.trim().is_empty() {
            return Err(WeatherError::invalid("endpoint must not be empty"));
        }
        if self.max_retries == 0 {
            return Err(WeatherError::invalid("max_retries must be at least 1"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(WeatherError::invalid("probe_timeout_ms must be at least 1"));
        }
        if HeaderValue::from_str(&self.user_agent).is_err() {
            return Err(WeatherError::invalid("user_agent is not a valid header value"));
        }
        Ok(())
    }

    /// `{endpoint}?zip={postal},{country}&appid={token}`, plus `units`/`lang` when set.
    pub(crate) fn request_url(&self, api_key: &str, query: &WeatherQuery) -> String {
        let mut url = format!(
            "{}?zip={},{}&appid={}",
            self.endpoint,
            query.postal_code,
            urlencoding::encode(query.country_code.trim()),
            urlencoding::encode(api_key),
        );

        if let Some(units) = self.units.as_query_value() {
            url.push_str("&units=");
            url.push_str(units);
        }
        if let Some(lang) = self.lang.as_deref().filter(|l| !l.is_empty()) {
            url.push_str("&lang=");
            url.push_str(&urlencoding::encode(lang));
        }

        url
    }
}
