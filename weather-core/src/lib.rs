//! Core library for the `weather` logger.
//!
//! This crate defines:
//! - The append-only observation store
//! - The dedup policy and the concurrent ingestion pipeline
//! - Aggregate queries over the stored history
//! - Abstraction over weather providers
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod model;
pub mod provider;
pub mod query;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, IngestConfig, ProviderConfig};
pub use dedup::{DEFAULT_DEDUP_WINDOW_MINUTES, DedupPolicy};
pub use error::{FetchError, StoreError};
pub use ingest::{
    FailedFetch, FetchLimits, IngestError, IngestReport, Ingestor, SkipReason, Skipped,
};
pub use model::{Observation, ProviderReading};
pub use provider::{ProviderId, WeatherProvider};
pub use query::{Extremes, QueryEngine};
pub use store::{JsonFileStore, MemoryStore, ObservationStore};
