//! Error types shared by the store, the providers and the ingestion pipeline.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to obtain a reading for one location. Never aborts a batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider answered with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed provider payload: {0}")]
    Malformed(String),

    #[error("timed out waiting for provider")]
    TimedOut,
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read record store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write record store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode observation: {0}")]
    Encode(#[from] serde_json::Error),
}
