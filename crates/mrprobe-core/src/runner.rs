//! Bounded-time execution of a check body.
//!
//! The body runs on its own tokio task and races a deadline timer. Exactly
//! one side decides the run's [`Outcome`]:
//!
//! - deadline first: the runner reports UNKNOWN and detaches the task. The
//!   task keeps running (there is no cancellation of the in-flight API
//!   call), but the only handle to its result is dropped, so whatever it
//!   renders later is never observed.
//! - task first: the timer is dropped and the task's own outcome stands.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use crate::check::{Check, Outcome, Severity};
use crate::duration::format_duration;
use crate::obs::emit_probe_timed_out;

/// Lifecycle of a [`ProbeRunner`]. `TimedOut` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    TimedOut,
    Completed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::TimedOut | RunState::Completed)
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// Single-shot deadline race between one check body and one timer.
#[derive(Debug)]
pub struct ProbeRunner {
    timeout: Duration,
    state: RunState,
}

impl ProbeRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: RunState::Pending,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(!self.state.is_terminal(), "runner already finished");
        debug!(from = ?self.state, to = ?next, "runner state");
        self.state = next;
    }

    /// Run `body` against the deadline.
    ///
    /// `body` receives the run's [`Check`] and must return the outcome of
    /// finishing it. It is called on the spawned task, so a panic while
    /// building its future is reported like any other panic. Consuming
    /// `self` keeps a runner from being reused.
    pub async fn run<F, Fut>(mut self, body: F) -> RunReport
    where
        F: FnOnce(Check) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let started = Instant::now();
        let check = Check::new();
        let mut task = tokio::spawn(async move { body(check).await });
        self.transition(RunState::Running);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let outcome = tokio::select! {
            biased;

            joined = &mut task => {
                self.transition(RunState::Completed);
                match joined {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(error = %e, "check task did not complete");
                        Check::new().exit(Severity::Unknown, format!("check aborted: {e}"))
                    }
                }
            }
            _ = &mut deadline => {
                self.transition(RunState::TimedOut);
                emit_probe_timed_out(self.timeout);
                drop(task);
                Check::new().exit(
                    Severity::Unknown,
                    format!("timeout after {}", format_duration(self.timeout)),
                )
            }
        };

        RunReport {
            state: self.state,
            outcome,
            elapsed: started.elapsed(),
        }
    }
}
