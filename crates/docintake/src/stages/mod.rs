//! The three per-task stages a coordinator drives in order.

pub mod extraction;
pub mod transfer;
pub mod verification;

use std::future::Future;
use std::time::Duration;

pub use extraction::ExtractionStage;
pub use transfer::TransferStage;
pub use verification::{decide, Verdict};

/// Result of a stage that ran to the end or was abandoned.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    /// The task was removed or superseded while the stage ran.
    Cancelled,
}

/// Awaits `work`, bounded by `deadline` when one is set.
async fn with_deadline<T, E, Fut>(
    deadline: Option<Duration>,
    work: Fut,
    timed_out: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(timed_out(limit)),
        },
        None => work.await,
    }
}
