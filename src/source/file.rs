//! File-backed weather source.
//!
//! Reads `{data_dir}/{slug}-response.json`. Same document layout as the
//! HTTP source; used for offline runs and fixtures.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{ForecastResponse, WeatherSource};
use crate::types::{City, SourceError};

pub struct FileWeatherSource {
    data_dir: PathBuf,
}

impl FileWeatherSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path_for(&self, city: City) -> PathBuf {
        self.data_dir.join(format!("{}-response.json", city.slug()))
    }
}

#[async_trait]
impl WeatherSource for FileWeatherSource {
    async fn get_forecast(&self, city: City) -> Result<ForecastResponse, SourceError> {
        let path = self.path_for(city);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(SourceError::NotFound(city)),
            Err(e) => {
                return Err(SourceError::Transport {
                    city,
                    message: format!("{}: {e}", path.display()),
                })
            }
        };
        serde_json::from_str(&contents).map_err(|e| SourceError::Decode {
            city,
            message: e.to_string(),
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}
