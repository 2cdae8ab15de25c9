//! Collects stock-market mover listings from several sources and reconciles
//! them into one canonical, deduplicated record per ticker.
//!
//! The flow is: fetchers ([`sources`]) produce [`data::RawRow`]s, and the
//! [`pipeline::Pipeline`] normalizes, filters and merges them into
//! [`data::CanonicalRecord`]s, which [`output`] writes to disk.

pub mod config;
pub mod consolidation;
pub mod data;
pub mod output;
pub mod pipeline;
pub mod sources;

pub use config::AppConfig;
pub use pipeline::{Pipeline, PipelineOutput, PipelineReport};
