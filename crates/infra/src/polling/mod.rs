//! Wait for remote jobs and batches to reach a terminal status.
//!
//! Polling is sequential: one query in flight, then a fixed pause. Transport
//! errors end the wait immediately; there is no retry.

mod schedule;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sitelens_core::{BatchId, BatchStatusReport, JobId, JobStatusReport};

use crate::oracle::{AnalysisOracle, OracleError};

pub use schedule::{PollPolicy, PollSchedule, PollStep, Terminal};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("{kind} {id} timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        kind: &'static str,
        id: String,
        timeout: Duration,
    },
    #[error("wait for {kind} {id} was cancelled")]
    Cancelled { kind: &'static str, id: String },
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Polls an [`AnalysisOracle`] until a job or batch settles.
pub struct StatusWaiter<O> {
    oracle: O,
}

impl<O: AnalysisOracle> StatusWaiter<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub async fn wait_for_job(
        &self,
        job_id: &JobId,
        policy: PollPolicy,
    ) -> Result<JobStatusReport, WaitError> {
        self.wait_for_job_until(job_id, policy, &CancellationToken::new())
            .await
    }

    /// Like [`wait_for_job`](Self::wait_for_job), but gives up as soon as `cancel` fires.
    pub async fn wait_for_job_until(
        &self,
        job_id: &JobId,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<JobStatusReport, WaitError> {
        poll_until("job", job_id.as_str(), policy, cancel, || {
            self.oracle.job_status(job_id)
        })
        .await
    }

    pub async fn wait_for_batch(
        &self,
        batch_id: &BatchId,
        policy: PollPolicy,
    ) -> Result<BatchStatusReport, WaitError> {
        self.wait_for_batch_until(batch_id, policy, &CancellationToken::new())
            .await
    }

    pub async fn wait_for_batch_until(
        &self,
        batch_id: &BatchId,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<BatchStatusReport, WaitError> {
        poll_until("batch", batch_id.as_str(), policy, cancel, || {
            self.oracle.batch_status(batch_id)
        })
        .await
    }
}

async fn poll_until<T, F, Fut>(
    kind: &'static str,
    id: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut query: F,
) -> Result<T, WaitError>
where
    T: Terminal,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let started = Instant::now();
    let mut schedule = PollSchedule::new(policy);
    let mut observation = None;

    let cancelled = || WaitError::Cancelled {
        kind,
        id: id.to_string(),
    };

    loop {
        match schedule.next_step(started.elapsed(), observation.take()) {
            PollStep::Query => {
                tracing::debug!(kind, id, attempt = schedule.queries(), "polling status");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    res = query() => observation = Some(res?),
                }
            }
            PollStep::Sleep(pause) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = tokio::time::sleep(pause) => {}
                }
            }
            PollStep::Finished(done) => {
                tracing::info!(
                    kind,
                    id,
                    attempts = schedule.queries(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "reached terminal status"
                );
                return Ok(done);
            }
            PollStep::TimedOut => {
                tracing::warn!(kind, id, attempts = schedule.queries(), "polling timed out");
                return Err(WaitError::TimedOut {
                    kind,
                    id: id.to_string(),
                    timeout: policy.timeout,
                });
            }
        }
    }
}
