//! End-to-end pipeline runs.
//!
//! Drives `Analyzer` over `MockSource` and checks the ranking, the best
//! city set and the CSV report.

use std::sync::Arc;
use std::time::Duration;

use tripcast::engine::aggregator::Divisor;
use tripcast::engine::analyzer::{Analyzer, PipelineSettings};
use tripcast::source::{ForecastResponse, WireDay};
use tripcast::types::{City, CitySummary, PipelineError};

use crate::mock_source::{day_hours, MockSource};

fn settings() -> PipelineSettings {
    PipelineSettings {
        workers: 4,
        fetch_timeout: Duration::from_secs(2),
        channel_capacity: 2,
        divisor: Divisor::FixedWindow,
    }
}

fn parse_rows(bytes: &[u8]) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes);
    reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect()
}

/// City labels of the temperature rows, in file order.
fn report_cities(rows: &[Vec<String>]) -> Vec<String> {
    rows.iter()
        .skip(1)
        .step_by(2)
        .map(|r| r[0].clone())
        .collect()
}

fn two_city_source() -> MockSource {
    MockSource::new()
        .with_city(City::Moscow, &[10.0, 12.0, 14.0, 16.0, 18.0], &[5, 5, 5, 5, 5])
        .with_city(City::Paris, &[20.0; 5], &[10; 5])
}

#[tokio::test]
async fn test_two_city_scenario() {
    let analyzer = Analyzer::new(Arc::new(two_city_source()), settings())
        .with_cities(&[City::Moscow, City::Paris]);

    let (outcome, bytes) = analyzer.run(Vec::<u8>::new()).await.unwrap();
    let summaries = &outcome.analysis.summaries;

    assert_eq!(
        summaries[&City::Moscow],
        CitySummary { avg_temp: 14.0, avg_comfortable_hours: 5.0 }
    );
    assert_eq!(
        summaries[&City::Paris],
        CitySummary { avg_temp: 20.0, avg_comfortable_hours: 10.0 }
    );

    let ranking: Vec<_> = outcome
        .analysis
        .ranking
        .iter()
        .map(|e| (e.city, e.rank))
        .collect();
    assert_eq!(ranking, vec![(City::Paris, 1), (City::Moscow, 2)]);
    assert_eq!(outcome.best, vec![City::Paris]);

    let rows = parse_rows(&bytes);
    assert_eq!(rows[0][2..7], ["26-05", "27-05", "28-05", "29-05", "30-05"]);
    assert_eq!(rows.len(), 5);
}

#[tokio::test]
async fn test_export_follows_ranking_not_registry() {
    // Moscow precedes Paris in the registry but ranks second.
    let analyzer = Analyzer::new(Arc::new(two_city_source()), settings())
        .with_cities(&[City::Moscow, City::Paris]);
    let (_, bytes) = analyzer.run(Vec::<u8>::new()).await.unwrap();

    let rows = parse_rows(&bytes);
    assert_eq!(report_cities(&rows), vec!["Париж", "Москва"]);
    assert_eq!(rows[1][8], "1");
    assert_eq!(rows[3][8], "2");
    assert_eq!(rows[2][1], "Без осадков, часов");
    assert_eq!(rows[2][7], "10.0");
}

#[tokio::test]
async fn test_failed_city_omitted_everywhere() {
    let source = two_city_source()
        .with_city(City::London, &[30.0; 5], &[10; 5])
        .fail_for(City::London);
    let analyzer = Analyzer::new(Arc::new(source), settings())
        .with_cities(&[City::Moscow, City::Paris, City::London]);

    let (outcome, bytes) = analyzer.run(Vec::<u8>::new()).await.unwrap();

    assert_eq!(outcome.analysis.ranking.len(), 2);
    assert_eq!(outcome.analysis.omitted, vec![City::London]);
    assert!(!outcome.analysis.metrics.contains_key(&City::London));
    assert_eq!(outcome.best, vec![City::Paris]);

    let rows = parse_rows(&bytes);
    assert_eq!(rows.len(), 1 + 2 * 2);
    assert!(!report_cities(&rows).contains(&"Лондон".to_string()));
    assert_eq!(outcome.export.cities, 2);
}

#[tokio::test]
async fn test_malformed_payload_omits_city() {
    let source = two_city_source().with_response(City::Kazan, ForecastResponse { forecasts: None });
    let analyzer = Analyzer::new(Arc::new(source), settings())
        .with_cities(&[City::Moscow, City::Paris, City::Kazan]);

    let analysis = analyzer.collect_data().await.unwrap();
    assert_eq!(analysis.omitted, vec![City::Kazan]);
    assert_eq!(analysis.ranking.len(), 2);
}

#[tokio::test]
async fn test_short_city_still_divides_by_five() {
    let source = MockSource::new().with_city(City::Roma, &[15.0, 15.0, 15.0], &[10, 10, 10]);
    let analyzer = Analyzer::new(Arc::new(source), settings()).with_cities(&[City::Roma]);

    let (outcome, bytes) = analyzer.run(Vec::<u8>::new()).await.unwrap();
    assert_eq!(
        outcome.analysis.summaries[&City::Roma],
        CitySummary { avg_temp: 9.0, avg_comfortable_hours: 6.0 }
    );
    assert_eq!(outcome.analysis.metrics[&City::Roma].len(), 3);

    let rows = parse_rows(&bytes);
    assert_eq!(rows[1][2..7], ["15.0", "15.0", "15.0", "", ""]);
}

/// Three full days followed by two days with an empty hour list, the way
/// the live forecast documents end.
fn trailing_empty_days() -> ForecastResponse {
    let full = [(10.0, 5), (12.0, 5), (14.0, 5)];
    let mut days: Vec<WireDay> = full
        .iter()
        .enumerate()
        .map(|(i, &(temp, dry))| WireDay {
            date: Some(format!("2022-05-{:02}", 26 + i)),
            hours: Some(day_hours(temp, dry)),
        })
        .collect();
    for d in [29, 30] {
        days.push(WireDay {
            date: Some(format!("2022-05-{d}")),
            hours: Some(Vec::new()),
        });
    }
    ForecastResponse {
        forecasts: Some(days),
    }
}

#[tokio::test]
async fn test_days_without_hours_reach_the_report_as_zero() {
    let source = MockSource::new().with_response(City::Moscow, trailing_empty_days());
    let analyzer = Analyzer::new(Arc::new(source), settings()).with_cities(&[City::Moscow]);

    let (outcome, bytes) = analyzer.run(Vec::<u8>::new()).await.unwrap();
    assert_eq!(outcome.analysis.metrics[&City::Moscow].len(), 5);
    assert_eq!(
        outcome.analysis.summaries[&City::Moscow],
        CitySummary { avg_temp: 7.2, avg_comfortable_hours: 3.0 }
    );

    let rows = parse_rows(&bytes);
    assert_eq!(rows[0][2..7], ["26-05", "27-05", "28-05", "29-05", "30-05"]);
    assert_eq!(rows[1][2..8], ["10.0", "12.0", "14.0", "0.0", "0.0", "7.2"]);
    assert_eq!(rows[2][2..8], ["5", "5", "5", "0", "0", "3.0"]);
    assert_eq!(outcome.export.blank_fields, 0);
}

#[tokio::test]
async fn test_malformed_hour_does_not_shift_window() {
    let mut hours = day_hours(10.0, 10);
    hours[0].temp = None;
    hours[19].temp = Some(100.0);
    let response = ForecastResponse {
        forecasts: Some(vec![WireDay {
            date: Some("2022-05-26".to_string()),
            hours: Some(hours),
        }]),
    };
    let source = MockSource::new().with_response(City::Berlin, response);
    let analyzer = Analyzer::new(Arc::new(source), settings()).with_cities(&[City::Berlin]);

    let analysis = analyzer.collect_data().await.unwrap();
    let day = analysis.metrics[&City::Berlin].first(1)[0];
    assert_eq!(day.avg_temp, 10.0);
    assert_eq!(day.comfortable_hours, 10);
}

#[tokio::test]
async fn test_available_days_divisor_opt_in() {
    let source = MockSource::new().with_city(City::Roma, &[15.0, 15.0, 15.0], &[10, 10, 10]);
    let analyzer = Analyzer::new(
        Arc::new(source),
        PipelineSettings {
            divisor: Divisor::AvailableDays,
            ..settings()
        },
    )
    .with_cities(&[City::Roma]);

    let analysis = analyzer.collect_data().await.unwrap();
    assert_eq!(
        analysis.summaries[&City::Roma],
        CitySummary { avg_temp: 15.0, avg_comfortable_hours: 10.0 }
    );
}

#[tokio::test]
async fn test_tied_best_cities() {
    let source = MockSource::new()
        .with_city(City::Cairo, &[30.0; 5], &[8; 5])
        .with_city(City::Abudhabi, &[30.0; 5], &[10; 5])
        .with_city(City::Roma, &[25.0; 5], &[10; 5]);
    let analyzer = Analyzer::new(Arc::new(source), settings())
        .with_cities(&[City::Cairo, City::Abudhabi, City::Roma]);

    let analysis = analyzer.collect_data().await.unwrap();
    let best = tripcast::engine::analyzer::choose_best(&analysis.ranking);
    assert_eq!(best, vec![City::Abudhabi, City::Cairo]);
}

#[tokio::test]
async fn test_every_source_failure_is_fatal() {
    let source = MockSource::new()
        .fail_for(City::Moscow)
        .fail_for(City::Paris);
    let analyzer = Analyzer::new(Arc::new(source), settings())
        .with_cities(&[City::Moscow, City::Paris]);

    let err = analyzer.run(Vec::<u8>::new()).await.unwrap_err();
    let pipeline_err = err.downcast_ref::<PipelineError>().unwrap();
    assert!(matches!(
        pipeline_err,
        PipelineError::SourceUnreachable { attempted: 2 }
    ));
}

#[tokio::test]
async fn test_full_registry_requests_each_city_once() {
    let source = Arc::new(two_city_source());
    let analyzer = Analyzer::new(source.clone(), settings());

    let analysis = analyzer.collect_data().await.unwrap();
    let mut requested = source.requests();
    requested.sort();
    assert_eq!(requested, City::ALL.to_vec());
    assert_eq!(analysis.ranking.len(), 2);
    assert_eq!(analysis.omitted.len(), City::ALL.len() - 2);
}

#[tokio::test]
async fn test_repeated_runs_do_not_share_state() {
    let analyzer = Analyzer::new(Arc::new(two_city_source()), settings())
        .with_cities(&[City::Moscow, City::Paris]);

    let first = analyzer.collect_data().await.unwrap();
    let second = analyzer.collect_data().await.unwrap();
    assert_eq!(first.ranking, second.ranking);
    assert_eq!(first.metrics, second.metrics);
}

#[tokio::test]
async fn test_run_to_file_writes_report() {
    let mut path = std::env::temp_dir();
    path.push(format!("tripcast_test_report_{}.csv", uuid::Uuid::new_v4()));
    let path = path.to_string_lossy().to_string();

    let analyzer = Analyzer::new(Arc::new(two_city_source()), settings())
        .with_cities(&[City::Moscow, City::Paris]);
    let outcome = analyzer.run_to_file(&path).await.unwrap();
    assert_eq!(outcome.best, vec![City::Paris]);

    let bytes = std::fs::read(&path).unwrap();
    let rows = parse_rows(&bytes);
    assert_eq!(rows[0][0], "Страна/день");
    assert_eq!(report_cities(&rows), vec!["Париж", "Москва"]);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_unwritable_report_path_is_fatal() {
    let analyzer = Analyzer::new(Arc::new(two_city_source()), settings())
        .with_cities(&[City::Moscow, City::Paris]);
    let err = analyzer
        .run_to_file("/nonexistent-dir/tripcast/report.csv")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to open report file"));
}
