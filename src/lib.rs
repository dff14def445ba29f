//! # SLA Analyzer
//!
//! Parses messy SLA duration cells from billing-document spreadsheets and
//! aggregates them into per-stage timing statistics.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (raw cells, records, period orderings, aggregates)
//! - **duration**: Duration cell parsing and Indonesian-language formatting
//! - **ingest**: Column resolution, period filtering and record building
//! - **calculate**: Means, counts and trends over loaded tables
//! - **storage**: Upload readers (CSV, Parquet, JSON) and the local upload cache
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod duration;
pub mod ingest;
pub mod models;
pub mod storage;

pub use models::*;
