//! Bounded fan-out / fan-in with a deadline.
//!
//! Child operations are independent calls to the store. They are dispatched
//! together, at most `max_in_flight` at a time, and joined once all have
//! settled or the deadline elapses. Results keep input order.

use std::future::Future;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt, stream};
use thiserror::Error;
use vitae_core::error::DomainError;

/// Concurrency and deadline limits for one fan-out batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutPolicy {
    /// Maximum number of child calls in flight per batch.
    pub max_in_flight: usize,
    /// Time allowed for the whole batch.
    pub deadline: Duration,
}

impl Default for FanOutPolicy {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            deadline: Duration::from_secs(5),
        }
    }
}

/// Why a fan-out batch did not produce a full result.
#[derive(Debug, Error)]
pub enum FanOutError {
    /// The item at `index` failed; later items were abandoned.
    #[error("item {index} failed: {source}")]
    Failed {
        /// Position of the failing item in the input.
        index: usize,
        /// The item's error.
        #[source]
        source: DomainError,
    },

    /// The batch did not settle in time.
    #[error("deadline of {}ms elapsed", .0.as_millis())]
    DeadlineElapsed(Duration),
}

/// Runs `op` over every item with bounded concurrency and returns the
/// results in input order.
///
/// # Errors
///
/// Returns the first failure in input order, or `DeadlineElapsed` if the
/// batch has not settled within `policy.deadline`.
pub async fn gather_ordered<I, F, Fut, T>(
    items: I,
    policy: FanOutPolicy,
    mut op: F,
) -> Result<Vec<T>, FanOutError>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let batch = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let call = op(item);
            async move { call.await.map_err(|source| FanOutError::Failed { index, source }) }
        })
        .buffered(policy.max_in_flight.max(1))
        .try_collect::<Vec<T>>();

    tokio::time::timeout(policy.deadline, batch)
        .await
        .map_err(|_| FanOutError::DeadlineElapsed(policy.deadline))?
}

/// Runs a single store call under a deadline.
///
/// # Errors
///
/// Returns `Failed { index: 0, .. }` if the call fails, or
/// `DeadlineElapsed` if it does not complete in time.
pub async fn within_deadline<Fut, T>(deadline: Duration, call: Fut) -> Result<T, FanOutError>
where
    Fut: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result.map_err(|source| FanOutError::Failed { index: 0, source }),
        Err(_) => Err(FanOutError::DeadlineElapsed(deadline)),
    }
}
