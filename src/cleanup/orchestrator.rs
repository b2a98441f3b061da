// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Concurrent execution of every attribute of a cleanup category.

use crate::cleanup::driver::RetryDriver;
use crate::cleanup::target::TargetResolver;
use crate::cleanup::{CleanAttribute, CleanContext};
use crate::errors::CleanError;
use futures::future::join_all;
use tracing::{debug, warn};

/// Run one retry driver per attribute and wait for all of them.
///
/// Drivers run concurrently on the calling task. A failing kind never stops or
/// delays the others.
///
/// # Errors
///
/// Returns [`CleanError::Aggregate`] holding the error of every failing kind.
pub async fn run_all(
    ctx: &CleanContext,
    resolver: &dyn TargetResolver,
    driver: &RetryDriver,
    attributes: &[CleanAttribute],
) -> Result<(), CleanError> {
    let runs = attributes.iter().map(|attribute| async move {
        let target = resolver.resolve(attribute.kind);
        driver.run(ctx, target.as_ref(), attribute).await
    });

    let errors: Vec<CleanError> = join_all(runs)
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect();

    if errors.is_empty() {
        debug!(kinds = attributes.len(), "All resource kinds cleaned up");
        return Ok(());
    }

    let error = CleanError::Aggregate(errors);
    warn!(failed = ?error.failed_resources(), "Cleanup of some resource kinds failed");
    Err(error)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod orchestrator_tests;
