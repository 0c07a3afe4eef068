//! Mock weather source for integration testing.
//!
//! Provides a deterministic `WeatherSource` that serves canned per-city
//! forecasts from memory, can be told to fail for specific cities, and
//! records which cities were requested.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use tripcast::source::{ForecastResponse, WeatherSource, WireDay, WireHour};
use tripcast::types::{City, Condition, SourceError};

/// A mock weather source with fully controllable responses.
pub struct MockSource {
    forecasts: BTreeMap<City, ForecastResponse>,
    failing: Arc<Mutex<HashSet<City>>>,
    requests: Arc<Mutex<Vec<City>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            forecasts: BTreeMap::new(),
            failing: Arc::new(Mutex::new(HashSet::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve one day per entry of `temps`/`comfortable`, starting on
    /// 2022-05-26.
    ///
    /// Each day has 24 hours. The daytime window carries the given
    /// temperature on every hour and `comfortable` clear hours followed by
    /// rain; night hours are cold and rainy so window leaks are visible.
    pub fn with_city(mut self, city: City, temps: &[f64], comfortable: &[u32]) -> Self {
        let days = temps
            .iter()
            .zip(comfortable)
            .enumerate()
            .map(|(i, (&temp, &dry))| WireDay {
                date: Some(format!("2022-05-{:02}", 26 + i)),
                hours: Some(day_hours(temp, dry)),
            })
            .collect();
        self.forecasts.insert(
            city,
            ForecastResponse {
                forecasts: Some(days),
            },
        );
        self
    }

    /// Serve an arbitrary payload for `city`.
    pub fn with_response(mut self, city: City, response: ForecastResponse) -> Self {
        self.forecasts.insert(city, response);
        self
    }

    /// Fail every request for `city`.
    pub fn fail_for(self, city: City) -> Self {
        self.failing.lock().unwrap().insert(city);
        self
    }

    /// Cities requested so far, in request order.
    pub fn requests(&self) -> Vec<City> {
        self.requests.lock().unwrap().clone()
    }
}

/// The 24 hours `with_city` serves for one day.
pub fn day_hours(temp: f64, dry: u32) -> Vec<WireHour> {
    (0..24u32)
        .map(|hour| {
            let (temp, condition) = if (9..19).contains(&hour) {
                let dry_hour = hour - 9 < dry;
                (temp, if dry_hour { Condition::Clear } else { Condition::Rain })
            } else {
                (-40.0, Condition::Snow)
            };
            WireHour {
                hour: Some(serde_json::json!(hour.to_string())),
                temp: Some(temp),
                condition: Some(condition),
            }
        })
        .collect()
}

#[async_trait]
impl WeatherSource for MockSource {
    async fn get_forecast(&self, city: City) -> Result<ForecastResponse, SourceError> {
        self.requests.lock().unwrap().push(city);
        if self.failing.lock().unwrap().contains(&city) {
            return Err(SourceError::Transport {
                city,
                message: "mock transport failure".to_string(),
            });
        }
        self.forecasts
            .get(&city)
            .cloned()
            .ok_or(SourceError::NotFound(city))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
