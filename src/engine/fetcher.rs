//! Parallel forecast fetching.
//!
//! One task per city on a JoinSet, gated by a semaphore sized to the
//! worker pool. Each task owns exactly one city and hands its result back
//! through the join; the merged map is only built after every task has
//! finished, so downstream stages never see a half-populated result.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::source::WeatherSource;
use crate::types::{City, ForecastDay, RawForecast, SourceError};

pub struct Fetcher {
    source: Arc<dyn WeatherSource>,
    workers: usize,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(source: Arc<dyn WeatherSource>, workers: usize, timeout: Duration) -> Self {
        Self {
            source,
            workers: workers.max(1),
            timeout,
        }
    }

    /// Fetch and convert one city's forecast, bounded by the per-fetch timeout.
    pub async fn fetch(&self, city: City) -> Result<Vec<ForecastDay>, SourceError> {
        fetch_one(self.source.as_ref(), city, self.timeout).await
    }

    /// Fetch every city in the registry.
    pub async fn collect_all(&self) -> RawForecast {
        self.collect(&City::ALL).await
    }

    /// Fetch `cities` concurrently and wait for all of them.
    ///
    /// Failed cities are logged and left out of the result.
    pub async fn collect(&self, cities: &[City]) -> RawForecast {
        info!(
            source = self.source.name(),
            cities = cities.len(),
            workers = self.workers,
            "Starting forecast fetch"
        );

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();

        for &city in cities {
            let source = Arc::clone(&self.source);
            let permits = Arc::clone(&permits);
            let timeout = self.timeout;
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (city, fetch_one(source.as_ref(), city, timeout).await)
            });
        }

        let mut raw = RawForecast::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((city, Ok(days))) => {
                    debug!(%city, days = days.len(), "Forecast fetched");
                    raw.insert(city, days);
                }
                Ok((city, Err(e))) => {
                    warn!(%city, stage = "fetch", error = %e, "Fetch failed, omitting city");
                }
                Err(e) => {
                    error!(stage = "fetch", error = %e, "Fetch task aborted");
                }
            }
        }

        info!(
            fetched = raw.len(),
            omitted = cities.len() - raw.len(),
            "Forecast fetch complete"
        );
        raw
    }
}

async fn fetch_one(
    source: &dyn WeatherSource,
    city: City,
    timeout: Duration,
) -> Result<Vec<ForecastDay>, SourceError> {
    let response = tokio::time::timeout(timeout, source.get_forecast(city))
        .await
        .map_err(|_| SourceError::Timeout { city, after: timeout })??;
    response.into_days(city)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
