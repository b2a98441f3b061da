// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for individual Kubernetes API calls.
//!
//! Transient failures (HTTP 429, 5xx, transport errors) are retried in place with a
//! short jittered backoff. Everything else is returned immediately so the cleanup
//! operation can decide whether the error is ignored, tolerated or fatal.
//!
//! This is independent of the poll loop in [`crate::cleanup::driver`]: the driver
//! repeats whole cleanup attempts, this module repeats single requests.

use crate::constants::{
    API_RETRY_BACKOFF_MULTIPLIER, API_RETRY_INITIAL_INTERVAL_MILLIS, API_RETRY_MAX_ELAPSED_SECS,
    API_RETRY_MAX_INTERVAL_SECS, API_RETRY_RANDOMIZATION_FACTOR,
};
use crate::errors::ApiErrorClass;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Jittered exponential backoff for a single API request.
///
/// Starts at 100ms, doubles up to 5s between attempts and gives up once 30s have
/// passed since the first attempt. The poll loop repeats whole attempts every few
/// seconds anyway, so a request failing for longer is surfaced to it instead.
#[derive(Debug, Clone)]
pub struct ApiBackoff {
    next: Duration,
    cap: Duration,
    budget: Duration,
    started: Instant,
}

impl Default for ApiBackoff {
    fn default() -> Self {
        Self {
            next: Duration::from_millis(API_RETRY_INITIAL_INTERVAL_MILLIS),
            cap: Duration::from_secs(API_RETRY_MAX_INTERVAL_SECS),
            budget: Duration::from_secs(API_RETRY_MAX_ELAPSED_SECS),
            started: Instant::now(),
        }
    }
}

impl ApiBackoff {
    /// The un-jittered delay the next call to [`ApiBackoff::next_delay`] is based on.
    #[must_use]
    pub fn upcoming(&self) -> Duration {
        self.next
    }

    /// Delay before the next attempt, or `None` once the time budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.started.elapsed() >= self.budget {
            return None;
        }

        let base = self.next;
        self.next = base.mul_f64(API_RETRY_BACKOFF_MULTIPLIER).min(self.cap);
        Some(jitter(base))
    }
}

/// Spread `base` uniformly by the randomization factor in both directions.
fn jitter(base: Duration) -> Duration {
    let secs = base.as_secs_f64();
    let spread = secs * API_RETRY_RANDOMIZATION_FACTOR;
    if spread <= 0.0 {
        return base;
    }
    Duration::from_secs_f64(rand::rng().random_range((secs - spread)..=(secs + spread)))
}

/// Run `operation`, retrying it in place while it fails with a transient error.
///
/// `operation_name` only appears in logs (e.g. "list pods").
///
/// # Errors
///
/// Returns the last client error when it is not transient or when the backoff is
/// exhausted.
pub async fn retry_api_call<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = ApiBackoff::default();

    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Request recovered");
                }
                return Ok(value);
            }
            Err(err) if !is_retryable_error(&err) => return Err(err),
            Err(err) => match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        retry_after = ?delay,
                        error = %err,
                        "Transient API error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Retry budget spent, giving up"
                    );
                    return Err(err);
                }
            },
        }
    }
}

/// Whether a client error is worth retrying in place (HTTP 429, 5xx, transport).
pub(crate) fn is_retryable_error(err: &kube::Error) -> bool {
    ApiErrorClass::of(err) == ApiErrorClass::Transient
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
