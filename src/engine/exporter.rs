//! Ranked CSV report export.
//!
//! A producer task walks the ranking and sends `(city, rank)` pairs over a
//! bounded channel, then an explicit `End` marker. A consumer task on the
//! blocking pool owns the CSV writer and turns each pair into a two-row
//! block, looking the city up in read-only snapshots of the metrics and
//! summaries. Rows appear in exactly the order the producer sends them.

use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::aggregator::SUMMARY_DAYS;
use crate::types::{
    City, CityMetrics, CitySummaries, CitySummary, DailyMetric, DayMetrics, Ranking,
};

// ---------------------------------------------------------------------------
// Report layout
// ---------------------------------------------------------------------------

const CITY_COLUMN: &str = "Страна/день";
const AVERAGE_COLUMN: &str = "Среднее";
const RANK_COLUMN: &str = "Рейтинг";
const TEMP_ROW_LABEL: &str = "Температура, среднее";
const DRY_ROW_LABEL: &str = "Без осадков, часов";

/// City label, row label, day columns, average, rank.
const ROW_WIDTH: usize = SUMMARY_DAYS + 4;

pub type Row = Vec<String>;

/// Message on the export channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMessage {
    Entry { city: City, rank: usize },
    End,
}

/// What the consumer wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Number of two-row city blocks written.
    pub cities: usize,
    /// Fields left blank because a lookup failed.
    pub blank_fields: usize,
}

/// First `SUMMARY_DAYS` distinct dates seen, walking cities in registry order.
pub fn header_dates(metrics: &CityMetrics) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(SUMMARY_DAYS);
    for date in metrics.values().flat_map(|m| m.dates()) {
        if dates.len() == SUMMARY_DAYS {
            break;
        }
        if !dates.contains(&date) {
            dates.push(date);
        }
    }
    dates
}

pub fn header_row(dates: &[NaiveDate]) -> Row {
    let mut row = Vec::with_capacity(ROW_WIDTH);
    row.push(CITY_COLUMN.to_string());
    row.push(String::new());
    for i in 0..SUMMARY_DAYS {
        row.push(dates.get(i).map(|d| d.format("%d-%m").to_string()).unwrap_or_default());
    }
    row.push(AVERAGE_COLUMN.to_string());
    row.push(RANK_COLUMN.to_string());
    row
}

/// Temperature row and dry-hours row for one ranked city.
///
/// Missing data leaves the affected fields blank; the returned count says
/// how many.
pub fn city_block(
    city: City,
    rank: usize,
    metrics: Option<&DayMetrics>,
    summary: Option<&CitySummary>,
) -> (Row, Row, usize) {
    let mut blanks = 0;
    let mut temp_row = Vec::with_capacity(ROW_WIDTH);
    let mut dry_row = Vec::with_capacity(ROW_WIDTH);

    temp_row.push(city.display_name().to_string());
    temp_row.push(TEMP_ROW_LABEL.to_string());
    dry_row.push(String::new());
    dry_row.push(DRY_ROW_LABEL.to_string());

    let days: &[DailyMetric] = match metrics {
        Some(m) => m.first(SUMMARY_DAYS),
        None => {
            warn!(%city, stage = "export", field = "metrics", "No daily metrics for ranked city");
            blanks += SUMMARY_DAYS * 2;
            &[]
        }
    };
    for i in 0..SUMMARY_DAYS {
        match days.get(i) {
            Some(day) => {
                temp_row.push(format!("{:.1}", day.avg_temp));
                dry_row.push(day.comfortable_hours.to_string());
            }
            None => {
                temp_row.push(String::new());
                dry_row.push(String::new());
            }
        }
    }

    match summary {
        Some(s) => {
            temp_row.push(format!("{:.1}", s.avg_temp));
            dry_row.push(format!("{:.1}", s.avg_comfortable_hours));
        }
        None => {
            warn!(%city, stage = "export", field = "summary", "No summary for ranked city");
            blanks += 2;
            temp_row.push(String::new());
            dry_row.push(String::new());
        }
    }

    temp_row.push(rank.to_string());
    dry_row.push(String::new());

    (temp_row, dry_row, blanks)
}

// ---------------------------------------------------------------------------
// Exporter
// ---------------------------------------------------------------------------

pub struct Exporter {
    metrics: Arc<CityMetrics>,
    summaries: Arc<CitySummaries>,
    channel_capacity: usize,
}

impl Exporter {
    pub fn new(
        metrics: Arc<CityMetrics>,
        summaries: Arc<CitySummaries>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            metrics,
            summaries,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Stream `ranking` into a CSV report on `writer`.
    ///
    /// Returns the writer once both producer and consumer have finished.
    pub async fn export<W>(&self, ranking: &Ranking, writer: W) -> Result<(W, ExportStats)>
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let pairs: Vec<(City, usize)> = ranking.iter().map(|e| (e.city, e.rank)).collect();
        let producer = tokio::spawn(produce(pairs, tx));

        let metrics = Arc::clone(&self.metrics);
        let summaries = Arc::clone(&self.summaries);
        let consumer = tokio::task::spawn_blocking(move || consume(rx, writer, &metrics, &summaries));

        let (produced, consumed) = tokio::join!(producer, consumer);
        let sent = produced.context("Export producer task failed")?;
        let (writer, stats) = consumed.context("Export consumer task failed")??;

        if stats.cities != sent {
            warn!(sent, written = stats.cities, "Report is missing ranked cities");
        }
        info!(
            cities = stats.cities,
            blank_fields = stats.blank_fields,
            "Report export complete"
        );
        Ok((writer, stats))
    }
}

/// Send every pair in order, then the end marker. Returns how many pairs
/// were delivered.
async fn produce(pairs: Vec<(City, usize)>, tx: mpsc::Sender<ExportMessage>) -> usize {
    let mut sent = 0;
    for (city, rank) in pairs {
        if tx.send(ExportMessage::Entry { city, rank }).await.is_err() {
            warn!(%city, stage = "export", "Report writer stopped early, dropping remaining rows");
            return sent;
        }
        sent += 1;
    }
    if tx.send(ExportMessage::End).await.is_err() {
        warn!(stage = "export", "Report writer stopped before end marker");
    }
    sent
}

fn consume<W: Write>(
    mut rx: mpsc::Receiver<ExportMessage>,
    writer: W,
    metrics: &CityMetrics,
    summaries: &CitySummaries,
) -> Result<(W, ExportStats)> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(header_row(&header_dates(metrics)))
        .context("Failed to write report header")?;

    let mut stats = ExportStats::default();
    loop {
        match rx.blocking_recv() {
            Some(ExportMessage::Entry { city, rank }) => {
                let (temp_row, dry_row, blanks) =
                    city_block(city, rank, metrics.get(&city), summaries.get(&city));
                out.write_record(&temp_row)
                    .and_then(|_| out.write_record(&dry_row))
                    .with_context(|| format!("Failed to write report rows for {city}"))?;
                debug!(%city, rank, "Report block written");
                stats.cities += 1;
                stats.blank_fields += blanks;
            }
            Some(ExportMessage::End) => break,
            None => {
                warn!(stage = "export", "Channel closed without end marker");
                break;
            }
        }
    }

    out.flush().context("Failed to flush report")?;
    let writer = out
        .into_inner()
        .map_err(|e| anyhow!("Failed to finish report: {}", e.error()))?;
    Ok((writer, stats))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
