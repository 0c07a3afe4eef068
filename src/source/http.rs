//! HTTP weather source.
//!
//! Fetches one JSON forecast document per city from
//! `{base_url}/{slug}-response.json`. The document follows the Yandex
//! Weather forecast layout (`forecasts[].hours[]`).
//!
//! Auth: optional, sent as `X-Yandex-API-Key` when a key is configured.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{ForecastResponse, WeatherSource};
use crate::types::{City, SourceError};

const API_KEY_HEADER: &str = "X-Yandex-API-Key";

pub struct HttpWeatherSource {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpWeatherSource {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("TRIPCAST/0.1.0")
            .build()
            .context("Failed to build weather HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url_for(&self, city: City) -> String {
        format!("{}/{}-response.json", self.base_url, city.slug())
    }
}

#[async_trait]
impl WeatherSource for HttpWeatherSource {
    async fn get_forecast(&self, city: City) -> Result<ForecastResponse, SourceError> {
        let url = self.url_for(city);
        debug!(%city, url = %url, "Requesting forecast");

        let mut request = self.http.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let resp = request.send().await.map_err(|e| SourceError::Transport {
            city,
            message: e.to_string(),
        })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(city));
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                city,
                status: status.as_u16(),
            });
        }

        resp.json::<ForecastResponse>()
            .await
            .map_err(|e| SourceError::Decode {
                city,
                message: e.to_string(),
            })
    }

    fn name(&self) -> &str {
        "http"
    }
}
