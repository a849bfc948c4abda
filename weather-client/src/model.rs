use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WeatherError};

/// Location to look up: a postal code within a country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    pub postal_code: u32,
    pub country_code: String,
}

impl WeatherQuery {
    pub fn new(postal_code: u32, country_code: impl Into<String>) -> Self {
        Self { postal_code, country_code: country_code.into() }
    }

    /// Reject queries that could never resolve to a location.
    pub fn validate(&self) -> Result<()> {
        if self.postal_code == 0 {
            return Err(WeatherError::invalid("postal code must be a positive number"));
        }
        if self.country_code.trim().is_empty() {
            return Err(WeatherError::invalid("country code must not be empty"));
        }
        Ok(())
    }
}

/// Payload of the OpenWeather `data/2.5/weather` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub coord: Coordinates,
    pub weather: Vec<WeatherCondition>,
    pub main: Measurements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind: Option<Wind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clouds: Option<Clouds>,
    /// Meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<u32>,
    /// Observation time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sys: Option<SystemInfo>,
    /// Shift from UTC in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<i32>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: u32,
    /// Group name, e.g. "Rain" or "Clouds".
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// hPa.
    pub pressure: u32,
    /// Percent.
    pub humidity: u8,
    /// hPa at sea level. Only sent for some stations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sea_level: Option<u32>,
    /// hPa at ground level. Only sent for some stations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grnd_level: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    /// Direction, meteorological degrees.
    pub deg: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clouds {
    /// Cloudiness, percent.
    pub all: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<i64>,
}

impl WeatherResponse {
    pub fn primary_condition(&self) -> Option<&WeatherCondition> {
        self.weather.first()
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.dt.and_then(unix_to_utc)
    }

    pub fn sunrise_at(&self) -> Option<DateTime<Utc>> {
        self.sys.as_ref()?.sunrise.and_then(unix_to_utc)
    }

    pub fn sunset_at(&self) -> Option<DateTime<Utc>> {
        self.sys.as_ref()?.sunset.and_then(unix_to_utc)
    }

    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.timezone.and_then(FixedOffset::east_opt)
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_SAMPLE: &str = r#"{
        "coord": { "lon": -122.08, "lat": 37.39 },
        "weather": [
            { "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" },
            { "id": 701, "main": "Mist", "description": "mist", "icon": "50d" }
        ],
        "base": "stations",
        "main": {
            "temp": 282.55, "feels_like": 281.86, "temp_min": 280.37, "temp_max": 284.26,
            "pressure": 1023, "humidity": 100, "sea_level": 1023, "grnd_level": 1010
        },
        "visibility": 10000,
        "wind": { "speed": 1.5, "deg": 350, "gust": 3.2 },
        "clouds": { "all": 1 },
        "dt": 1560350645,
        "sys": { "type": 1, "id": 5122, "country": "US", "sunrise": 1560343627, "sunset": 1560396563 },
        "timezone": -25200,
        "id": 420006353,
        "name": "Mountain View",
        "cod": 200
    }"#;

    #[test]
    fn query_validation() {
        assert!(WeatherQuery::new(94040, "us").validate().is_ok());

        let err = WeatherQuery::new(0, "us").validate().unwrap_err();
        assert!(err.to_string().contains("postal code"));

        for country in ["", "   "] {
            let err = WeatherQuery::new(94040, country).validate().unwrap_err();
            assert!(matches!(err, WeatherError::InvalidArgument(_)));
        }
    }

    #[test]
    fn full_sample_maps_every_field() {
        let parsed: WeatherResponse = serde_json::from_str(FULL_SAMPLE).expect("sample should parse");

        assert_eq!(parsed.coord, Coordinates { lon: -122.08, lat: 37.39 });
        assert_eq!(parsed.weather.len(), 2);
        assert_eq!(parsed.weather[1].main, "Mist");
        assert_eq!(parsed.main.temp_max, 284.26);
        assert_eq!(parsed.main.sea_level, Some(1023));
        assert_eq!(parsed.main.grnd_level, Some(1010));
        assert_eq!(parsed.wind, Some(Wind { speed: 1.5, deg: 350, gust: Some(3.2) }));
        assert_eq!(parsed.clouds, Some(Clouds { all: 1 }));
        assert_eq!(parsed.visibility, Some(10000));
        assert_eq!(parsed.dt, Some(1560350645));
        assert_eq!(parsed.sys.as_ref().and_then(|s| s.country.as_deref()), Some("US"));
        assert_eq!(parsed.timezone, Some(-25200));
        assert_eq!(parsed.name, "Mountain View");
    }

    #[test]
    fn serialized_response_parses_back_identically() {
        let parsed: WeatherResponse = serde_json::from_str(FULL_SAMPLE).expect("sample should parse");
        let json = serde_json::to_string(&parsed).expect("serialize");
        let again: WeatherResponse = serde_json::from_str(&json).expect("reparse");
        assert_eq!(parsed, again);
    }

    #[test]
    fn missing_optional_pressures_stay_unset() {
        let body = r#"{
            "coord": { "lon": 10.0, "lat": 50.0 },
            "weather": [],
            "main": { "temp": 1.0, "feels_like": 0.5, "temp_min": 0.0, "temp_max": 2.0,
                      "pressure": 1000, "humidity": 80 }
        }"#;
        let parsed: WeatherResponse = serde_json::from_str(body).expect("minimal body should parse");

        assert_eq!(parsed.main.sea_level, None);
        assert_eq!(parsed.main.grnd_level, None);
        assert!(parsed.wind.is_none());
        assert!(parsed.sys.is_none());
        assert!(parsed.name.is_empty());

        let json = serde_json::to_string(&parsed).expect("serialize");
        assert!(!json.contains("sea_level"));
        let again: WeatherResponse = serde_json::from_str(&json).expect("reparse");
        assert_eq!(again.main.sea_level, None);
    }

    #[test]
    fn missing_required_section_is_an_error() {
        let body = r#"{ "coord": { "lon": 1.0, "lat": 2.0 }, "weather": [] }"#;
        assert!(serde_json::from_str::<WeatherResponse>(body).is_err());
    }

    #[test]
    fn time_accessors() {
        let parsed: WeatherResponse = serde_json::from_str(FULL_SAMPLE).expect("sample should parse");

        assert_eq!(parsed.observed_at().map(|t| t.timestamp()), Some(1560350645));
        assert_eq!(parsed.sunrise_at().map(|t| t.timestamp()), Some(1560343627));
        assert_eq!(parsed.sunset_at().map(|t| t.timestamp()), Some(1560396563));
        assert_eq!(parsed.utc_offset().map(|o| o.local_minus_utc()), Some(-25200));
        assert_eq!(parsed.primary_condition().map(|c| c.id), Some(800));
    }
}
