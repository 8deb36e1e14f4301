//! Deduplicated batch ingestion.
//!
//! One "now" is captured per batch and every location is checked against the
//! stored history at that instant. Eligible locations are fetched
//! concurrently on the calling task; each success is appended to the store as
//! soon as it resolves.

use std::{collections::HashSet, time::Duration};

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    dedup::DedupPolicy,
    error::{FetchError, StoreError},
    model::{Observation, location_key},
    provider::WeatherProvider,
    store::ObservationStore,
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadlines for one ingestion batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Upper bound for a single location's fetch.
    pub per_fetch: Duration,
    /// Upper bound for the whole fan-out.
    pub batch: Duration,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self { per_fetch: DEFAULT_FETCH_TIMEOUT, batch: DEFAULT_BATCH_TIMEOUT }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already observed inside the dedup window.
    RecentlyLogged,
    /// Same location requested earlier in this batch.
    DuplicateInBatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub location: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct FailedFetch {
    pub location: String,
    pub error: FetchError,
}

/// Outcome of one `fetch_and_log` call.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Newly appended observations, in completion order.
    pub logged: Vec<Observation>,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<FailedFetch>,
}

impl IngestReport {
    pub fn fetched_count(&self) -> usize {
        self.logged.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// A store write failed mid-batch.
///
/// `report` holds everything settled before the failure; its `logged`
/// entries are already on disk. `unsaved` is the observation that could not
/// be written. Fetches still in flight are abandoned and not reported.
#[derive(Debug, Error)]
#[error("failed to record observation for {}: {source}", .unsaved.location)]
pub struct IngestError {
    pub report: IngestReport,
    pub unsaved: Observation,
    #[source]
    pub source: StoreError,
}

pub struct Ingestor<'a> {
    provider: &'a dyn WeatherProvider,
    store: &'a dyn ObservationStore,
    clock: &'a dyn Clock,
    policy: DedupPolicy,
    limits: FetchLimits,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        provider: &'a dyn WeatherProvider,
        store: &'a dyn ObservationStore,
        clock: &'a dyn Clock,
    ) -> Self {
        Self { provider, store, clock, policy: DedupPolicy::default(), limits: FetchLimits::default() }
    }

    pub fn with_policy(mut self, policy: DedupPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limits(mut self, limits: FetchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Split requested names into the ones to fetch and the ones to skip.
    ///
    /// Names are trimmed and blank names dropped. A name matching recent
    /// history is skipped even when it also repeats within the batch.
    pub fn partition<S: AsRef<str>>(
        &self,
        locations: &[S],
        history: &[Observation],
        now: DateTime<Utc>,
    ) -> (Vec<String>, Vec<Skipped>) {
        let mut eligible = Vec::new();
        let mut skipped = Vec::new();
        let mut seen = HashSet::new();

        for raw in locations {
            let location = raw.as_ref().trim();
            if location.is_empty() {
                debug!("ignoring blank location name");
                continue;
            }

            let first_in_batch = seen.insert(location_key(location));
            let reason = if self.policy.is_recently_logged(history, location, now) {
                Some(SkipReason::RecentlyLogged)
            } else if !first_in_batch {
                Some(SkipReason::DuplicateInBatch)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    debug!(location, ?reason, "skipping location");
                    skipped.push(Skipped { location: location.to_string(), reason });
                }
                None => eligible.push(location.to_string()),
            }
        }

        (eligible, skipped)
    }

    /// Fetch current conditions for every eligible location and log them.
    ///
    /// Fetch failures are collected in the report. A store write failure
    /// aborts the batch and hands back the partial report in the error.
    pub async fn fetch_and_log<S: AsRef<str>>(
        &self,
        locations: &[S],
    ) -> Result<IngestReport, IngestError> {
        let now = self.clock.now();
        let history = self.store.load();
        let (eligible, skipped) = self.partition(locations, &history, now);

        let mut report = IngestReport { skipped, ..IngestReport::default() };
        if eligible.is_empty() {
            info!(skipped = report.skipped_count(), "no new locations to fetch");
            return Ok(report);
        }

        let per_fetch = self.limits.per_fetch;
        let provider = self.provider;
        let mut pending: FuturesUnordered<_> = eligible
            .iter()
            .enumerate()
            .map(|(index, location)| async move {
                let outcome = match timeout(per_fetch, provider.current(location)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::TimedOut),
                };
                (index, outcome)
            })
            .collect();

        let mut resolved = vec![false; eligible.len()];
        // No deadline when the configured batch timeout overflows the clock.
        let deadline = Instant::now().checked_add(self.limits.batch);

        loop {
            let next = match deadline {
                Some(deadline) => timeout_at(deadline, pending.next()).await,
                None => Ok(pending.next().await),
            };
            let next = match next {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(_) => {
                    let outstanding = resolved.iter().filter(|done| !**done).count();
                    warn!(outstanding, "batch deadline reached, abandoning pending fetches");
                    break;
                }
            };

            let (index, outcome) = next;
            resolved[index] = true;
            let location = &eligible[index];

            match outcome {
                Ok(reading) => {
                    let observation = Observation::from_reading(reading, self.clock.now());
                    if let Err(source) = self.store.append(&observation) {
                        error!(location = %location, error = %source, "failed to record observation");
                        return Err(IngestError { report, unsaved: observation, source });
                    }
                    info!(
                        requested = %location,
                        location = %observation.location,
                        temperature_c = observation.temperature_c,
                        "logged observation"
                    );
                    report.logged.push(observation);
                }
                Err(error) => {
                    warn!(location = %location, error = %error, "fetch failed");
                    report.failed.push(FailedFetch { location: location.clone(), error });
                }
            }
        }
        drop(pending);

        for (location, _) in eligible.iter().zip(&resolved).filter(|(_, done)| !**done) {
            report.failed.push(FailedFetch { location: location.clone(), error: FetchError::TimedOut });
        }

        info!(
            fetched = report.fetched_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "ingestion batch finished"
        );
        Ok(report)
    }
}
