//! Daily forecast client.
//!
//! Fetches the public forecast feed for a fixed location, translates the
//! Malay descriptions into English and hands back plain records. Nothing
//! here touches the database; an activity only keeps the translated summary
//! string the caller chose to store.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::WeatherConfig;

/// Stored on an activity when its date has no forecast, or the fetch failed.
pub const FORECAST_UNAVAILABLE: &str = "Unknown, too far into the future";

/// Stored when the forecast exists but carries no summary.
pub const SUMMARY_MISSING: &str = "Unknown";

/// Source phrase → display phrase. Anything not listed is shown as-is.
const TRANSLATIONS: &[(&str, &str)] = &[
    ("Berjerebu", "Hazy"),
    ("Tiada hujan", "No rain"),
    ("Hujan", "Rain"),
    ("Hujan di beberapa tempat", "Scattered rain"),
    ("Hujan di satu dua tempat", "Isolated Rain"),
    ("Hujan di satu dua tempat di kawasan pantai", "Isolated rain over coastal areas"),
    ("Hujan di satu dua tempat di kawasan pedalaman", "Isolated rain over inland areas"),
    ("Ribut petir", "Thunderstorms"),
    ("Ribut petir di beberapa tempat", "Scattered thunderstorms"),
    (
        "Ribut petir di beberapa tempat di kawasan pedalaman",
        "Scattered thunderstorms over inland areas",
    ),
    ("Ribut petir di satu dua tempat", "Isolated thunderstorms"),
    (
        "Ribut petir di satu dua tempat di kawasan pantai",
        "Isolated thunderstorms over coastal areas",
    ),
    (
        "Ribut petir di satu dua tempat di kawasan pedalaman",
        "Isolated thunderstorms over inland areas",
    ),
    ("Pagi", "Morning"),
    ("Malam", "Night"),
    ("Petang", "Afternoon"),
    ("Pagi dan Petang", "Morning and Afternoon"),
    ("Pagi dan Malam", "Morning and Night"),
    ("Petang dan Malam", "Afternoon and Night"),
    ("Sepanjang Hari", "Throughout the Day"),
];

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Forecast request failed: {0}")]
    Transport(String),
    #[error("Forecast service returned HTTP {0}")]
    Status(u16),
    #[error("Failed to parse forecast response: {0}")]
    Parse(String),
}

/// One day of forecast, descriptions already translated.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast {
    pub date: String,
    pub location_name: String,
    pub morning_forecast: String,
    pub afternoon_forecast: String,
    pub night_forecast: String,
    pub summary_forecast: String,
    pub summary_when: String,
    pub min_temp: Option<i64>,
    pub max_temp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    location_name: String,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    date: String,
    location: RawLocation,
    #[serde(default)]
    morning_forecast: Option<String>,
    #[serde(default)]
    afternoon_forecast: Option<String>,
    #[serde(default)]
    night_forecast: Option<String>,
    #[serde(default)]
    summary_forecast: Option<String>,
    #[serde(default)]
    summary_when: Option<String>,
    #[serde(default)]
    min_temp: Option<i64>,
    #[serde(default)]
    max_temp: Option<i64>,
}

impl From<RawForecast> for DailyForecast {
    fn from(raw: RawForecast) -> Self {
        let text = |value: Option<String>| {
            value
                .map(|v| translate(&v).to_string())
                .unwrap_or_default()
        };
        Self {
            date: raw.date,
            location_name: raw.location.location_name,
            morning_forecast: text(raw.morning_forecast),
            afternoon_forecast: text(raw.afternoon_forecast),
            night_forecast: text(raw.night_forecast),
            summary_forecast: text(raw.summary_forecast),
            summary_when: text(raw.summary_when),
            min_temp: raw.min_temp,
            max_temp: raw.max_temp,
        }
    }
}

/// Translate a forecast phrase, falling back to the input unchanged.
pub fn translate(description: &str) -> &str {
    TRANSLATIONS
        .iter()
        .find(|(source, _)| *source == description)
        .map(|(_, target)| *target)
        .unwrap_or(description)
}

/// Parse a feed body into translated records sorted by date.
pub fn parse_forecast(body: &str) -> Result<Vec<DailyForecast>, WeatherError> {
    let raw: Vec<RawForecast> =
        serde_json::from_str(body).map_err(|e| WeatherError::Parse(e.to_string()))?;
    let mut days: Vec<DailyForecast> = raw.into_iter().map(DailyForecast::from).collect();
    // ISO dates sort lexicographically; stable so same-day records keep feed order.
    days.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(days)
}

/// Pick the summary to store on an activity dated `date`.
pub fn summary_for_date(days: &[DailyForecast], date: &str) -> String {
    match days.iter().find(|day| day.date == date) {
        Some(day) if day.summary_forecast.is_empty() => SUMMARY_MISSING.to_string(),
        Some(day) => day.summary_forecast.clone(),
        None => FORECAST_UNAVAILABLE.to_string(),
    }
}

/// Client for the forecast feed.
pub struct ForecastClient {
    config: WeatherConfig,
    agent: ureq::Agent,
}

impl ForecastClient {
    pub fn new(config: WeatherConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self {
            config,
            agent: builder.build(),
        }
    }

    /// Full request URL including the location filter
    pub fn request_url(&self) -> String {
        format!(
            "{}?contains={}@location__location_name",
            self.config.forecast_url, self.config.location_filter
        )
    }

    /// Fetch, translate and sort the forecast.
    pub fn fetch(&self) -> Result<Vec<DailyForecast>, WeatherError> {
        let url = self.request_url();
        tracing::debug!(%url, "fetching forecast");

        let body = match self.agent.get(&url).call() {
            Ok(response) => response
                .into_string()
                .map_err(|e| WeatherError::Transport(e.to_string()))?,
            Err(ureq::Error::Status(code, _)) => return Err(WeatherError::Status(code)),
            Err(ureq::Error::Transport(transport)) => {
                return Err(WeatherError::Transport(transport.to_string()));
            }
        };

        parse_forecast(&body)
    }

    /// Summary for one day, never failing: any error degrades to the
    /// "too far into the future" placeholder.
    pub fn summary_for(&self, date: &str) -> String {
        match self.fetch() {
            Ok(days) => summary_for_date(&days, date),
            Err(e) => {
                tracing::error!(error = %e, "error fetching weather data");
                FORECAST_UNAVAILABLE.to_string()
            }
        }
    }
}
