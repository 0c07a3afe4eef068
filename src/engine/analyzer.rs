//! Pipeline orchestrator.
//!
//! Runs fetch → calculate → aggregate/rank in sequence, hands the ranking
//! to the exporter, and picks the best destination(s). Every run builds
//! its own stage instances and maps; nothing survives between runs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::AppConfig;
use crate::engine::aggregator::{self, Aggregator, Divisor};
use crate::engine::calculator::Calculator;
use crate::engine::exporter::{ExportStats, Exporter};
use crate::engine::fetcher::Fetcher;
use crate::source::WeatherSource;
use crate::types::{City, CityMetrics, CitySummaries, PipelineError, Ranking};

/// Tunables for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub workers: usize,
    pub fetch_timeout: Duration,
    pub channel_capacity: usize,
    pub divisor: Divisor,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            workers: cfg.pipeline.worker_count(),
            fetch_timeout: cfg.source.timeout(),
            channel_capacity: cfg.pipeline.channel_capacity,
            divisor: if cfg.pipeline.divide_by_available_days {
                Divisor::AvailableDays
            } else {
                Divisor::FixedWindow
            },
        }
    }
}

/// Result of the fetch, calculate and rank stages.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub metrics: Arc<CityMetrics>,
    pub summaries: Arc<CitySummaries>,
    pub ranking: Ranking,
    /// Registry cities with no data, in registry order.
    pub omitted: Vec<City>,
}

/// Everything a full run produces besides the report itself.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: Analysis,
    pub best: Vec<City>,
    pub export: ExportStats,
    pub elapsed: Duration,
}

pub struct Analyzer {
    source: Arc<dyn WeatherSource>,
    settings: PipelineSettings,
    cities: Vec<City>,
}

impl Analyzer {
    pub fn new(source: Arc<dyn WeatherSource>, settings: PipelineSettings) -> Self {
        Self {
            source,
            settings,
            cities: City::ALL.to_vec(),
        }
    }

    /// Restrict the run to a subset of the registry.
    pub fn with_cities(mut self, cities: &[City]) -> Self {
        self.cities = cities.to_vec();
        self
    }

    /// Fetch, calculate, aggregate and rank.
    ///
    /// Fails only when no city could be fetched at all.
    pub async fn collect_data(&self) -> Result<Analysis> {
        let fetcher = Fetcher::new(
            Arc::clone(&self.source),
            self.settings.workers,
            self.settings.fetch_timeout,
        );
        let raw = fetcher.collect(&self.cities).await;
        if raw.is_empty() && !self.cities.is_empty() {
            return Err(PipelineError::SourceUnreachable {
                attempted: self.cities.len(),
            }
            .into());
        }

        let omitted = self
            .cities
            .iter()
            .copied()
            .filter(|c| !raw.contains_key(c))
            .collect();

        let metrics = Calculator::new(self.settings.workers).compute_all(raw).await;
        let summaries = Aggregator::new(self.settings.divisor).summarize_all(&metrics);
        let ranking = aggregator::rank(&summaries);

        Ok(Analysis {
            metrics: Arc::new(metrics),
            summaries: Arc::new(summaries),
            ranking,
            omitted,
        })
    }

    /// Full run, writing the report to `writer`.
    pub async fn run<W>(&self, writer: W) -> Result<(AnalysisOutcome, W)>
    where
        W: Write + Send + 'static,
    {
        let started = Instant::now();
        let analysis = self.collect_data().await?;
        let (writer, export) = self.export(&analysis, writer).await?;
        Ok((self.finish(analysis, export, started), writer))
    }

    /// Full run, writing the report to a file at `path`.
    ///
    /// The file is only created once the ranking exists.
    pub async fn run_to_file(&self, path: &str) -> Result<AnalysisOutcome> {
        let started = Instant::now();
        let analysis = self.collect_data().await?;

        let file = File::create(path)
            .with_context(|| format!("Failed to open report file: {path}"))?;
        let (mut writer, export) = self.export(&analysis, BufWriter::new(file)).await?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush report file: {path}"))?;

        info!(path, "Report written");
        Ok(self.finish(analysis, export, started))
    }

    async fn export<W>(&self, analysis: &Analysis, writer: W) -> Result<(W, ExportStats)>
    where
        W: Write + Send + 'static,
    {
        Exporter::new(
            Arc::clone(&analysis.metrics),
            Arc::clone(&analysis.summaries),
            self.settings.channel_capacity,
        )
        .export(&analysis.ranking, writer)
        .await
    }

    fn finish(&self, analysis: Analysis, export: ExportStats, started: Instant) -> AnalysisOutcome {
        let best = choose_best(&analysis.ranking);
        let elapsed = started.elapsed();
        info!(
            ranked = analysis.ranking.len(),
            omitted = analysis.omitted.len(),
            best = ?best,
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline run complete"
        );
        AnalysisOutcome {
            analysis,
            best,
            export,
            elapsed,
        }
    }
}

/// Every city tied for the highest average temperature, in ranking order.
pub fn choose_best(ranking: &Ranking) -> Vec<City> {
    let Some(max) = ranking
        .iter()
        .map(|e| e.summary.avg_temp)
        .max_by(|a, b| a.total_cmp(b))
    else {
        return Vec::new();
    };
    ranking
        .iter()
        .filter(|e| e.summary.avg_temp == max)
        .map(|e| e.city)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
