//! Scan loop: pull batches until a registered beacon shows up.
//!
//! Each iteration pulls one window of raw events, decodes them, deduplicates
//! the records and checks them against the registry in arrival order. The
//! first registered record becomes the [`Reading`] and ends the loop.
//!
//! The loop itself is the retry mechanism. It can be bounded by a batch
//! limit and stopped through a [`CancellationToken`]; wall-clock timeouts
//! are left to the caller.

use crate::decoder;
use crate::dedup::DedupPolicy;
use crate::reading::Reading;
use crate::registry::Registry;
use crate::scanner::{RawEvent, ScanError, ScanSource};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default collection window per batch.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(2);

/// Why the loop ended without a reading.
#[derive(Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Scan cancelled after {batches} batches")]
    Cancelled { batches: usize },
    #[error("No registered beacon found in {batches} batches")]
    Exhausted { batches: usize },
}

/// Outcome of processing one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    /// No registered beacon in the batch; keep scanning
    Scanning,
    /// A registered beacon was found
    MatchFound(Reading),
}

/// Decode, deduplicate and match batches of raw events.
#[derive(Debug, Clone)]
pub struct ScanLoop {
    registry: Registry,
    window: Duration,
    policy: DedupPolicy,
    max_batches: Option<usize>,
}

impl ScanLoop {
    /// A loop over `registry` with the default window, first-wins
    /// deduplication and no batch limit.
    pub fn new(registry: Registry) -> Self {
        ScanLoop {
            registry,
            window: DEFAULT_WINDOW,
            policy: DedupPolicy::default(),
            max_batches: None,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_policy(mut self, policy: DedupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Give up with [`LoopError::Exhausted`] after `max` batches.
    pub fn with_max_batches(mut self, max: Option<usize>) -> Self {
        self.max_batches = max;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one iteration's pipeline over a batch.
    pub fn process_batch(&self, batch: &[RawEvent]) -> ScanState {
        let candidates: Vec<_> = batch.iter().flat_map(decoder::decode).collect();
        let candidate_count = candidates.len();
        let unique = self.policy.apply(candidates);

        for record in &unique {
            match self.registry.label(&record.id) {
                Some(label) => return ScanState::MatchFound(Reading::assemble(label, record)),
                None => {
                    if let Some(color) = record.id.tilt_color() {
                        debug!(%color, id = %record.id, "ignoring unregistered Tilt");
                    }
                }
            }
        }

        debug!(
            events = batch.len(),
            candidates = candidate_count,
            unique = unique.len(),
            "no registered beacon in batch"
        );
        ScanState::Scanning
    }

    /// Pull batches from `source` until a registered beacon is found.
    ///
    /// Cancellation is checked while waiting for each batch, so a cancelled
    /// token stops the loop even when the source is idle.
    pub async fn run(
        &self,
        source: &mut dyn ScanSource,
        cancel: &CancellationToken,
    ) -> Result<Reading, LoopError> {
        let mut batches = 0;

        loop {
            if self.max_batches.is_some_and(|max| batches >= max) {
                return Err(LoopError::Exhausted { batches });
            }

            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LoopError::Cancelled { batches }),
                batch = source.next_batch(self.window) => batch?,
            };
            batches += 1;

            if let ScanState::MatchFound(reading) = self.process_batch(&batch) {
                info!(
                    label = %reading.label,
                    temperature = reading.temperature,
                    specific_gravity = reading.specific_gravity,
                    batches,
                    "read hydrometer"
                );
                return Ok(reading);
            }
        }
    }
}
