//! Timing policy for status polling, independent of any clock or client.

use std::time::Duration;

use sitelens_core::{BatchStatusReport, JobStatusReport};

/// Something a poll can observe that may or may not be final.
pub trait Terminal {
    fn is_terminal(&self) -> bool;
}

impl Terminal for JobStatusReport {
    fn is_terminal(&self) -> bool {
        JobStatusReport::is_terminal(self)
    }
}

impl Terminal for BatchStatusReport {
    fn is_terminal(&self) -> bool {
        BatchStatusReport::is_terminal(self)
    }
}

/// Overall time budget and pause between status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Single-URL jobs: 5 minutes, every 5 seconds.
    pub const fn for_jobs() -> Self {
        Self::new(Duration::from_secs(300), Duration::from_secs(5))
    }

    /// Batches: 10 minutes, every 10 seconds.
    pub const fn for_batches() -> Self {
        Self::new(Duration::from_secs(600), Duration::from_secs(10))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// What the poller should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep<T> {
    /// Ask the service for the current status.
    Query,
    /// Not final yet; wait this long before the next query.
    Sleep(Duration),
    /// A terminal observation.
    Finished(T),
    /// The budget ran out before a terminal observation.
    TimedOut,
}

/// Query, then sleep, while the elapsed time is under the budget.
///
/// A query is only started while `elapsed < timeout`, and every non-terminal
/// answer is followed by a full interval. With a 30s budget and 5s interval that
/// is six queries, at 0s, 5s, ... 25s, and a timeout at 30s.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    policy: PollPolicy,
    queries: u32,
}

impl PollSchedule {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy, queries: 0 }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Number of queries handed out so far.
    pub fn queries(&self) -> u32 {
        self.queries
    }

    /// Advance the schedule.
    ///
    /// `observation` is the answer to the previous `Query`, or `None` at the start
    /// and after a `Sleep`.
    pub fn next_step<T: Terminal>(&mut self, elapsed: Duration, observation: Option<T>) -> PollStep<T> {
        match observation {
            Some(observed) if observed.is_terminal() => PollStep::Finished(observed),
            Some(_) => PollStep::Sleep(self.policy.interval),
            None if elapsed < self.policy.timeout => {
                self.queries += 1;
                PollStep::Query
            }
            None => PollStep::TimedOut,
        }
    }
}
