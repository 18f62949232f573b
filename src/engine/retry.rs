// src/engine/retry.rs

use tracing::trace;

use crate::errors::Result;

/// What one polling attempt achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Something moved: a message, an angle set, a flushed buffer.
    Progress,
    /// Nothing moved.
    Stalled,
    /// The loop's goal is reached.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryReport {
    /// `Finished` or `Stalled`.
    pub outcome: PollOutcome,
    pub polls: usize,
    pub idle_polls: usize,
}

/// Polling loop that gives up after `max_idle_polls` consecutive stalls.
///
/// Every progressing attempt resets the idle count, so a slow but moving
/// sweep never trips the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRetry {
    max_idle_polls: usize,
}

impl BoundedRetry {
    pub fn new(max_idle_polls: usize) -> Self {
        Self {
            max_idle_polls: max_idle_polls.max(1),
        }
    }

    pub fn max_idle_polls(&self) -> usize {
        self.max_idle_polls
    }

    pub fn run<F>(&self, mut step: F) -> Result<RetryReport>
    where
        F: FnMut() -> Result<PollOutcome>,
    {
        let mut polls = 0;
        let mut idle = 0;
        loop {
            polls += 1;
            match step()? {
                PollOutcome::Finished => {
                    return Ok(RetryReport {
                        outcome: PollOutcome::Finished,
                        polls,
                        idle_polls: idle,
                    });
                }
                PollOutcome::Progress => idle = 0,
                PollOutcome::Stalled => {
                    idle += 1;
                    if idle >= self.max_idle_polls {
                        trace!(polls, idle, "retry bound reached");
                        return Ok(RetryReport {
                            outcome: PollOutcome::Stalled,
                            polls,
                            idle_polls: idle,
                        });
                    }
                    std::thread::yield_now();
                }
            }
        }
    }
}
