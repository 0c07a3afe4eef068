//! Weather data sources.
//!
//! Defines the `WeatherSource` trait, the wire format shared by every
//! source, and the conversion from wire records into domain types.
//! Implementations:
//! - `HttpWeatherSource` — per-city JSON documents over HTTP
//! - `FileWeatherSource` — the same documents read from a local directory

pub mod file;
pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::types::{City, Condition, ForecastDay, ForecastHour, SourceError};

pub use file::FileWeatherSource;
pub use http::HttpWeatherSource;

/// Abstraction over external forecast providers.
///
/// A failure is scoped to the requested city; callers treat it as an
/// omission, not as a reason to stop.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the multi-day hourly forecast for one city.
    async fn get_forecast(&self, city: City) -> Result<ForecastResponse, SourceError>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Per-city forecast document.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ForecastResponse {
    #[serde(default)]
    pub forecasts: Option<Vec<WireDay>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireDay {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub hours: Option<Vec<WireHour>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireHour {
    /// Sent as either a string ("9") or a number.
    #[serde(default)]
    pub hour: Option<serde_json::Value>,
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl ForecastResponse {
    /// Convert into domain days, keeping source order.
    ///
    /// A missing `forecasts` list fails the whole city. Days without a
    /// parseable date and hours missing a field are logged and skipped.
    pub fn into_days(self, city: City) -> Result<Vec<ForecastDay>, SourceError> {
        let wire_days = self.forecasts.ok_or_else(|| SourceError::Decode {
            city,
            message: "missing `forecasts` list".to_string(),
        })?;

        let mut days = Vec::with_capacity(wire_days.len());
        for (index, wire) in wire_days.into_iter().enumerate() {
            let Some(date) = wire.date.as_deref().and_then(parse_date) else {
                warn!(%city, stage = "fetch", day = index, date = ?wire.date, "Day without valid date, skipping");
                continue;
            };
            let Some(wire_hours) = wire.hours else {
                warn!(%city, stage = "fetch", %date, "Day without hours, skipping");
                continue;
            };

            let hours = wire_hours
                .into_iter()
                .enumerate()
                .take(24)
                .filter_map(|(position, h)| convert_hour(city, date, position, h))
                .collect();

            days.push(ForecastDay { date, hours });
        }
        Ok(days)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn convert_hour(city: City, date: NaiveDate, position: usize, h: WireHour) -> Option<ForecastHour> {
    let hour = match &h.hour {
        Some(serde_json::Value::String(s)) => s.trim().parse::<u8>().ok(),
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        None => u8::try_from(position).ok(),
        Some(_) => None,
    };
    match (hour, h.temp, h.condition) {
        (Some(hour), Some(temp), Some(condition)) if hour < 24 => {
            Some(ForecastHour { hour, temp, condition })
        }
        _ => {
            warn!(%city, stage = "fetch", %date, position, "Malformed hour record, skipping");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
