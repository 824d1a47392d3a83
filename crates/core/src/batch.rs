//! Batch dispatch aggregation.
//!
//! One logical action (a broadcast, a bulk pipeline submission) fans out into
//! independent units of work. Every unit is attempted; a failed unit is
//! recorded and the batch moves on. The caller gets a [`BatchDispatchResult`]
//! with per-unit outcomes in input order and a count-based summary.

use std::fmt::Display;
use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

/// Summary message for a batch with no units.
pub const NO_MATCHING_UNITS_MESSAGE: &str = "No matching units found";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outcome of a single unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Dispatched,
    Failed { reason: String },
}

impl UnitOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched)
    }
}

/// Aggregate result of a batch dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDispatchResult {
    pub attempted: usize,
    pub succeeded: usize,
    /// One entry per input unit, in input order.
    pub outcomes: Vec<UnitOutcome>,
    pub message: String,
}

impl BatchDispatchResult {
    /// Build the aggregate from per-unit outcomes.
    pub fn from_outcomes(outcomes: Vec<UnitOutcome>) -> Self {
        if outcomes.is_empty() {
            return Self::empty();
        }
        let attempted = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.is_dispatched()).count();
        Self {
            attempted,
            succeeded,
            outcomes,
            message: summary_message(succeeded, attempted),
        }
    }

    /// The result of a batch that matched no units.
    pub fn empty() -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            outcomes: Vec::new(),
            message: NO_MATCHING_UNITS_MESSAGE.to_string(),
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }
}

/// `"{succeeded} of {attempted} unit(s) dispatched"`.
pub fn summary_message(succeeded: usize, attempted: usize) -> String {
    format!("{succeeded} of {attempted} unit(s) dispatched")
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Attempt every unit in order, one at a time.
pub async fn dispatch_sequential<T, F, Fut, E>(
    units: impl IntoIterator<Item = T>,
    mut dispatch: F,
) -> BatchDispatchResult
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut outcomes = Vec::new();
    for (index, unit) in units.into_iter().enumerate() {
        let outcome = dispatch(unit).await;
        outcomes.push(record_outcome(index, outcome));
    }
    finish(outcomes)
}

/// Attempt units with at most `limit` in flight at once.
///
/// Outcomes are still reported in input order; a `limit` of zero is treated
/// as one.
pub async fn dispatch_concurrent<T, F, Fut, E>(
    units: impl IntoIterator<Item = T>,
    limit: usize,
    dispatch: F,
) -> BatchDispatchResult
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let results: Vec<Result<(), E>> = stream::iter(units)
        .map(dispatch)
        .buffered(limit.max(1))
        .collect()
        .await;

    let outcomes = results
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| record_outcome(index, outcome))
        .collect();
    finish(outcomes)
}

fn record_outcome<E: Display>(index: usize, outcome: Result<(), E>) -> UnitOutcome {
    match outcome {
        Ok(()) => UnitOutcome::Dispatched,
        Err(e) => {
            tracing::warn!(unit = index, error = %e, "Batch unit failed");
            UnitOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn finish(outcomes: Vec<UnitOutcome>) -> BatchDispatchResult {
    let result = BatchDispatchResult::from_outcomes(outcomes);
    tracing::info!(
        attempted = result.attempted,
        succeeded = result.succeeded,
        failed = result.failed(),
        "Batch dispatch finished",
    );
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
