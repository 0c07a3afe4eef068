//! Per-day comfort metrics.
//!
//! Reduces each day of a city's forecast to an average daytime temperature
//! and a count of dry hours. Cities are processed in parallel on the
//! blocking pool; the stage takes the finished `RawForecast` by value, so
//! it cannot start before the fetch barrier.

use std::ops::Range;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::types::{
    round1, City, CityMetrics, DailyMetric, DayMetrics, ForecastDay, ForecastHour, RawForecast,
};

/// Daytime window, by hour of day.
pub const DAYTIME_WINDOW: Range<usize> = 9..19;

/// Divisor for the window mean. Fixed even when fewer hours are present.
const WINDOW_HOURS: f64 = 10.0;

/// Metric for a single day.
///
/// Hours are matched on their hour of day, not their position, so a
/// skipped record never pulls a neighbour into the window. Only hours that
/// exist inside the window contribute; a short or empty day is not an error.
pub fn compute_day(day: &ForecastDay) -> DailyMetric {
    let window: Vec<&ForecastHour> = day
        .hours
        .iter()
        .filter(|h| DAYTIME_WINDOW.contains(&(h.hour as usize)))
        .collect();

    let temp_sum: f64 = window.iter().map(|h| h.temp).sum();
    let comfortable_hours = window.iter().filter(|h| h.condition.is_comfortable()).count() as u32;

    DailyMetric {
        date: day.date,
        avg_temp: round1(temp_sum / WINDOW_HOURS),
        comfortable_hours,
    }
}

/// Metrics for every day of one city, in source order.
pub fn compute(city: City, days: &[ForecastDay]) -> DayMetrics {
    let mut metrics = DayMetrics::new();
    for day in days {
        if day.hours.is_empty() {
            warn!(%city, stage = "calculate", date = %day.date, "Day has no hours, metric is zero");
        }
        metrics.insert(compute_day(day));
    }
    metrics
}

pub struct Calculator {
    workers: usize,
}

impl Calculator {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Compute metrics for every fetched city.
    pub async fn compute_all(&self, raw: RawForecast) -> CityMetrics {
        info!(cities = raw.len(), workers = self.workers, "Starting metric calculation");

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();

        for (city, days) in raw {
            let permit = Arc::clone(&permits).acquire_owned().await.ok();
            set.spawn_blocking(move || {
                let metrics = compute(city, &days);
                drop(permit);
                (city, metrics)
            });
        }

        let mut all = CityMetrics::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((city, metrics)) => {
                    debug!(%city, days = metrics.len(), "Metrics computed");
                    all.insert(city, metrics);
                }
                Err(e) => error!(stage = "calculate", error = %e, "Calculation task aborted"),
            }
        }

        info!(cities = all.len(), "Metric calculation complete");
        all
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
