// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Poll loop that drives one [`CleanAttribute`] to completion.
//!
//! The driver is a small state machine:
//!
//! ```text
//!            ObjectsRemaining
//!              ┌────────┐
//!              v        │
//! start ──> Polling ────┴──── finalize_after elapsed ──> Escalating ──┐
//!              │                                            │    ^    │ ObjectsRemaining
//!              │ Ok                                      Ok │    └────┘
//!              v                                            v
//!            Done <─────────────────────────────────────────┘
//!
//! fatal error, deadline or cancellation in any state ──> Failed
//! ```
//!
//! While escalating, every attempt first force-finalizes stuck objects and then runs
//! the regular clean operation.

use crate::cleanup::operation::{clean_and_ensure_gone, finalize_stuck};
use crate::cleanup::target::CleanTarget;
use crate::cleanup::{CleanAttribute, CleanContext, Interruption};
use crate::constants::CLEANUP_POLL_INTERVAL_SECS;
use crate::errors::CleanError;
use crate::metrics;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Phase of a retry driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Deleting and re-listing on every poll
    Polling,
    /// The finalize window elapsed; stuck objects are finalized before each attempt
    Escalating,
    /// Nothing matching the selector is left
    Done,
    /// Fatal error, deadline or cancellation
    Failed,
}

impl RetryState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Polling => "Polling",
            Self::Escalating => "Escalating",
            Self::Done => "Done",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Repeats the clean operation for one attribute until it converges or fails.
#[derive(Debug, Clone, Copy)]
pub struct RetryDriver {
    interval: Duration,
}

impl Default for RetryDriver {
    fn default() -> Self {
        Self::new(Duration::from_secs(CLEANUP_POLL_INTERVAL_SECS))
    }
}

impl RetryDriver {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Clean up everything the attribute selects.
    ///
    /// # Errors
    ///
    /// - any non-transient error of the clean operation or forced finalization
    /// - [`CleanError::TimedOut`] when the context deadline passes first
    /// - [`CleanError::Cancelled`] when the context is cancelled first
    ///
    /// Both interruption errors carry the count of the last successful re-list, or
    /// `None` when no re-list finished before the interruption.
    pub async fn run(
        &self,
        ctx: &CleanContext,
        target: &dyn CleanTarget,
        attribute: &CleanAttribute,
    ) -> Result<(), CleanError> {
        let started = Instant::now();
        let result = self.drive(ctx, target, attribute, started).await;
        metrics::record_cleanup_duration(target.resource(), result.is_ok(), started.elapsed());
        result
    }

    async fn drive(
        &self,
        ctx: &CleanContext,
        target: &dyn CleanTarget,
        attribute: &CleanAttribute,
        started: Instant,
    ) -> Result<(), CleanError> {
        let resource = target.resource();
        let mut state = RetryState::Polling;
        let mut remaining = None;

        debug!(
            resource = %resource,
            selector = %attribute.selector,
            finalize_after = ?attribute.options.finalize_after,
            "Starting cleanup"
        );

        loop {
            if state == RetryState::Polling && started.elapsed() >= attribute.options.finalize_after
            {
                transition(resource, &mut state, RetryState::Escalating);
            }

            let outcome = tokio::select! {
                result = attempt(state, target, attribute) => result,
                interruption = ctx.interrupted() => {
                    transition(resource, &mut state, RetryState::Failed);
                    return Err(interrupted(resource, interruption, remaining));
                }
            };

            match outcome {
                Ok(()) => {
                    transition(resource, &mut state, RetryState::Done);
                    info!(resource = %resource, elapsed = ?started.elapsed(), "Cleanup finished");
                    return Ok(());
                }
                Err(CleanError::ObjectsRemaining { count, .. }) => remaining = Some(count),
                Err(err) => {
                    transition(resource, &mut state, RetryState::Failed);
                    warn!(resource = %resource, error = %err, "Cleanup failed");
                    return Err(err);
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                interruption = ctx.interrupted() => {
                    transition(resource, &mut state, RetryState::Failed);
                    return Err(interrupted(resource, interruption, remaining));
                }
            }
        }
    }
}

async fn attempt(
    state: RetryState,
    target: &dyn CleanTarget,
    attribute: &CleanAttribute,
) -> Result<(), CleanError> {
    if state == RetryState::Escalating {
        finalize_stuck(target, &attribute.selector, &attribute.options).await?;
    }
    clean_and_ensure_gone(target, &attribute.selector, &attribute.options).await
}

fn transition(resource: &str, state: &mut RetryState, next: RetryState) {
    debug!(resource = %resource, from = %state, to = %next, "Cleanup state transition");
    if next == RetryState::Escalating {
        info!(
            resource = %resource,
            "Finalize window elapsed, removing finalizers of stuck objects"
        );
    }
    *state = next;
}

fn interrupted(
    resource: &str,
    interruption: Interruption,
    remaining: Option<usize>,
) -> CleanError {
    let resource = resource.to_string();
    match interruption {
        Interruption::DeadlineExceeded => CleanError::TimedOut {
            resource,
            remaining,
        },
        Interruption::Cancelled => CleanError::Cancelled {
            resource,
            remaining,
        },
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod driver_tests;
