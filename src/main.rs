//! TRIPCAST — weather-comfort ranking of travel destinations
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the weather source, runs the pipeline once and prints the best
//! destination(s) with the elapsed wall time.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{error, info, warn};

use tripcast::config::{AppConfig, SourceKind};
use tripcast::engine::analyzer::{Analyzer, PipelineSettings};
use tripcast::source::{FileWeatherSource, HttpWeatherSource, WeatherSource};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let started = Instant::now();
    match run().await {
        Ok(best) => {
            println!("{best}");
            println!("{:?}", started.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = format!("{e:#}"), "Pipeline failed");
            eprintln!("tripcast: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run the pipeline and return the best-city line.
async fn run() -> Result<String> {
    let cfg = AppConfig::load_or_default(CONFIG_PATH)?;
    let settings = PipelineSettings::from_config(&cfg);

    info!(
        source = ?cfg.source.kind,
        workers = settings.workers,
        fetch_timeout_secs = cfg.source.timeout_secs,
        report = %cfg.report.path,
        "Starting TRIPCAST run"
    );
    if cfg.pipeline.divide_by_available_days {
        warn!("divide_by_available_days is enabled: summaries no longer divide by a fixed 5 days");
    }

    let source = build_source(&cfg)?;
    let analyzer = Analyzer::new(source, settings);
    let outcome = analyzer.run_to_file(&cfg.report.path).await?;

    for entry in &outcome.analysis.ranking {
        info!(%entry, "Ranked");
    }
    if !outcome.analysis.omitted.is_empty() {
        warn!(omitted = ?outcome.analysis.omitted, "Some cities had no forecast and were left out");
    }

    Ok(outcome
        .best
        .iter()
        .map(|c| c.id())
        .collect::<Vec<_>>()
        .join(" "))
}

fn build_source(cfg: &AppConfig) -> Result<Arc<dyn WeatherSource>> {
    Ok(match cfg.source.kind {
        SourceKind::Http => {
            let api_key = match cfg.source.api_key_env.as_deref() {
                Some(env) => match AppConfig::resolve_env(env) {
                    Ok(key) => Some(key),
                    Err(e) => {
                        warn!(error = %e, "API key not available, sending unauthenticated requests");
                        None
                    }
                },
                None => None,
            };
            Arc::new(HttpWeatherSource::new(
                &cfg.source.base_url,
                api_key,
                cfg.source.timeout(),
            )?)
        }
        SourceKind::File => Arc::new(FileWeatherSource::new(&cfg.source.data_dir)),
    })
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tripcast=info"));

    let json_logging = std::env::var("TRIPCAST_LOG_JSON").is_ok();

    // Logs go to stderr so stdout carries only the result lines.
    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
