//! Shared types for the TRIPCAST pipeline.
//!
//! These types form the data model passed between the fetch, calculate,
//! aggregate and export stages. Stages depend on this module only, never
//! on each other's internals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// City registry
// ---------------------------------------------------------------------------

/// A destination under evaluation.
///
/// The set is closed. Declaration order is the registry order, which is
/// also the `Ord` used by every city-keyed map in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum City {
    Moscow,
    Paris,
    London,
    Berlin,
    Beijing,
    Kazan,
    Spetersburg,
    Volgograd,
    Novosibirsk,
    Kaliningrad,
    Abudhabi,
    Warszawa,
    Bucharest,
    Roma,
    Cairo,
}

impl City {
    /// Every known city, in registry order.
    pub const ALL: [City; 15] = [
        City::Moscow,
        City::Paris,
        City::London,
        City::Berlin,
        City::Beijing,
        City::Kazan,
        City::Spetersburg,
        City::Volgograd,
        City::Novosibirsk,
        City::Kaliningrad,
        City::Abudhabi,
        City::Warszawa,
        City::Bucharest,
        City::Roma,
        City::Cairo,
    ];

    /// Upper-case identifier, as printed in the best-city line.
    pub fn id(&self) -> &'static str {
        match self {
            City::Moscow => "MOSCOW",
            City::Paris => "PARIS",
            City::London => "LONDON",
            City::Berlin => "BERLIN",
            City::Beijing => "BEIJING",
            City::Kazan => "KAZAN",
            City::Spetersburg => "SPETERSBURG",
            City::Volgograd => "VOLGOGRAD",
            City::Novosibirsk => "NOVOSIBIRSK",
            City::Kaliningrad => "KALININGRAD",
            City::Abudhabi => "ABUDHABI",
            City::Warszawa => "WARSZAWA",
            City::Bucharest => "BUCHAREST",
            City::Roma => "ROMA",
            City::Cairo => "CAIRO",
        }
    }

    /// Localized name written to the report.
    pub fn display_name(&self) -> &'static str {
        match self {
            City::Moscow => "Москва",
            City::Paris => "Париж",
            City::London => "Лондон",
            City::Berlin => "Берлин",
            City::Beijing => "Пекин",
            City::Kazan => "Казань",
            City::Spetersburg => "Санкт-Петербург",
            City::Volgograd => "Волгоград",
            City::Novosibirsk => "Новосибирск",
            City::Kaliningrad => "Калининград",
            City::Abudhabi => "Абу-Даби",
            City::Warszawa => "Варшава",
            City::Bucharest => "Бухарест",
            City::Roma => "Рим",
            City::Cairo => "Каир",
        }
    }

    /// Lowercase key used by weather sources to locate a city's payload.
    pub fn slug(&self) -> String {
        self.id().to_lowercase()
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for City {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        City::ALL
            .iter()
            .copied()
            .find(|c| c.id() == upper)
            .ok_or_else(|| format!("Unknown city: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Weather conditions
// ---------------------------------------------------------------------------

/// Hourly weather condition as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Overcast,
    Drizzle,
    LightRain,
    Rain,
    ModerateRain,
    HeavyRain,
    ContinuousHeavyRain,
    Showers,
    WetSnow,
    LightSnow,
    Snow,
    SnowShowers,
    Hail,
    Thunderstorm,
    ThunderstormWithRain,
    ThunderstormWithHail,
    /// Any condition string this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl Condition {
    /// Whether an hour with this condition counts as comfortable
    /// (no precipitation).
    pub fn is_comfortable(&self) -> bool {
        matches!(
            self,
            Condition::Clear | Condition::PartlyCloudy | Condition::Cloudy | Condition::Overcast
        )
    }
}

// ---------------------------------------------------------------------------
// Raw forecast
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastHour {
    /// Hour of day, 0–23.
    pub hour: u8,
    pub temp: f64,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastDay {
    pub date: NaiveDate,
    /// Hours in source order, at most 24.
    pub hours: Vec<ForecastHour>,
}

/// Fetched forecasts per city. Day order within a city is source order.
pub type RawForecast = BTreeMap<City, Vec<ForecastDay>>;

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Comfort metrics for one day, over the daytime window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyMetric {
    pub date: NaiveDate,
    /// Mean temperature over the window, rounded to 1 decimal.
    pub avg_temp: f64,
    pub comfortable_hours: u32,
}

/// Date-keyed metrics that remember insertion order.
///
/// Inserting a date that is already present replaces its metric but keeps
/// its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayMetrics {
    entries: Vec<DailyMetric>,
}

impl DayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: DailyMetric) {
        match self.entries.iter_mut().find(|m| m.date == metric.date) {
            Some(existing) => *existing = metric,
            None => self.entries.push(metric),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DailyMetric> {
        self.entries.iter().find(|m| m.date == date)
    }

    /// The first `n` entries in insertion order.
    pub fn first(&self, n: usize) -> &[DailyMetric] {
        &self.entries[..self.entries.len().min(n)]
    }

    pub fn iter(&self) -> impl Iterator<Item = &DailyMetric> {
        self.entries.iter()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.iter().map(|m| m.date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<DailyMetric> for DayMetrics {
    fn from_iter<I: IntoIterator<Item = DailyMetric>>(iter: I) -> Self {
        let mut metrics = DayMetrics::new();
        for m in iter {
            metrics.insert(m);
        }
        metrics
    }
}

pub type CityMetrics = BTreeMap<City, DayMetrics>;

// ---------------------------------------------------------------------------
// Summary and ranking
// ---------------------------------------------------------------------------

/// Multi-day averages for one city.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CitySummary {
    /// Rounded to 1 decimal.
    pub avg_temp: f64,
    pub avg_comfortable_hours: f64,
}

pub type CitySummaries = BTreeMap<City, CitySummary>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankEntry {
    pub city: City,
    /// 1-based, unique, no gaps.
    pub rank: usize,
    pub summary: CitySummary,
}

impl fmt::Display for RankEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({:.1}°C, {:.1}h dry)",
            self.rank, self.city, self.summary.avg_temp, self.summary.avg_comfortable_hours
        )
    }
}

/// Cities in descending order of desirability.
pub type Ranking = Vec<RankEntry>;

/// Round to one decimal place.
///
/// Ties round half away from zero, so an exactly representable `x.x5`
/// goes up in magnitude (`0.25` becomes `0.3`) where banker's rounding
/// would pick the even digit. Ties that are not exact in binary round to
/// whichever side the stored value is nearer.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Per-city data source failure. Recovered by the fetch stage.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("No forecast available for {0}")]
    NotFound(City),

    #[error("Transport error ({city}): {message}")]
    Transport { city: City, message: String },

    #[error("Source returned HTTP {status} for {city}")]
    Status { city: City, status: u16 },

    #[error("Malformed payload ({city}): {message}")]
    Decode { city: City, message: String },

    #[error("Fetch for {city} timed out after {after:?}")]
    Timeout { city: City, after: std::time::Duration },
}

/// Conditions that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Weather source unreachable: all {attempted} city fetches failed")]
    SourceUnreachable { attempted: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
