//! Core engine — the fetch → calculate → aggregate → export pipeline.

pub mod fetcher;
pub mod calculator;
pub mod aggregator;
pub mod exporter;
pub mod analyzer;
