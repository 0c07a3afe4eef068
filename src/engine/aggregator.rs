//! Multi-day summaries and city ranking.
//!
//! Each city's summary is computed on its own metrics only; nothing is
//! accumulated across cities. The ranking is the only total order the
//! pipeline imposes, and the exporter writes rows in exactly that order.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::types::{round1, CityMetrics, CitySummaries, CitySummary, DayMetrics, RankEntry, Ranking};

/// Number of leading days averaged into a summary. The report has one
/// column per day in this window.
pub const SUMMARY_DAYS: usize = 5;

/// How the summed window is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Divisor {
    /// Always divide by `SUMMARY_DAYS`, even when fewer days exist.
    #[default]
    FixedWindow,
    /// Divide by the number of days actually present in the window.
    AvailableDays,
}

pub struct Aggregator {
    divisor: Divisor,
}

impl Aggregator {
    pub fn new(divisor: Divisor) -> Self {
        Self { divisor }
    }

    /// Average the first `SUMMARY_DAYS` entries, in insertion order.
    pub fn summarize(&self, metrics: &DayMetrics) -> CitySummary {
        let window = metrics.first(SUMMARY_DAYS);
        let temp_sum: f64 = window.iter().map(|m| m.avg_temp).sum();
        let hours_sum: f64 = window.iter().map(|m| f64::from(m.comfortable_hours)).sum();

        let divisor = match self.divisor {
            Divisor::FixedWindow => SUMMARY_DAYS as f64,
            Divisor::AvailableDays => window.len().max(1) as f64,
        };

        CitySummary {
            avg_temp: round1(temp_sum / divisor),
            avg_comfortable_hours: hours_sum / divisor,
        }
    }

    pub fn summarize_all(&self, metrics: &CityMetrics) -> CitySummaries {
        let summaries: CitySummaries = metrics
            .iter()
            .map(|(city, days)| {
                let summary = self.summarize(days);
                debug!(
                    %city,
                    avg_temp = summary.avg_temp,
                    avg_comfortable_hours = summary.avg_comfortable_hours,
                    "City summarized"
                );
                (*city, summary)
            })
            .collect();
        info!(cities = summaries.len(), divisor = ?self.divisor, "Aggregation complete");
        summaries
    }
}

/// Descending by temperature, then by comfortable hours.
fn by_desirability(a: &CitySummary, b: &CitySummary) -> Ordering {
    b.avg_temp
        .total_cmp(&a.avg_temp)
        .then_with(|| b.avg_comfortable_hours.total_cmp(&a.avg_comfortable_hours))
}

/// Rank cities, best first.
///
/// The sort is stable over the summaries' registry order, so exact ties
/// still get distinct consecutive ranks.
pub fn rank(summaries: &CitySummaries) -> Ranking {
    let mut ordered: Vec<_> = summaries.iter().map(|(city, s)| (*city, *s)).collect();
    ordered.sort_by(|(_, a), (_, b)| by_desirability(a, b));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (city, summary))| RankEntry {
            city,
            rank: i + 1,
            summary,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
