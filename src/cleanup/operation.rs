// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Single cleanup attempts for one resource kind.
//!
//! [`clean_and_ensure_gone`] deletes everything matching a selector and re-lists to
//! check whether anything is left. [`finalize_stuck`] strips the finalizers of objects
//! that are terminating but blocked. Neither loops: repetition and escalation are the
//! job of [`crate::cleanup::driver::RetryDriver`].
//!
//! API errors are handled the same way everywhere:
//!
//! - `NotFound` means the object (or the whole resource type) is already gone
//! - classes listed in [`CleanOptions::tolerated`] are logged and left to the next poll
//! - everything else fails the attempt with [`CleanError::Api`]

use crate::cleanup::target::{CleanObject, CleanTarget};
use crate::cleanup::CleanOptions;
use crate::constants::MAX_LOGGED_REMAINING_NAMES;
use crate::errors::{ApiErrorClass, CleanError};
use crate::metrics;
use crate::selector::Selector;
use tracing::{debug, info, warn};

/// Delete every object matching the selector, then verify nothing is left.
///
/// Uses a single delete-collection request when the target supports it, otherwise
/// deletes each matching object that is not already terminating.
///
/// # Errors
///
/// - [`CleanError::ObjectsRemaining`] when the re-list still finds matching objects
/// - [`CleanError::Api`] on any API error that is neither `NotFound` nor tolerated
pub async fn clean_and_ensure_gone(
    target: &dyn CleanTarget,
    selector: &Selector,
    options: &CleanOptions,
) -> Result<(), CleanError> {
    let result = match delete_matching(target, selector, options).await {
        Ok(()) => ensure_gone(target, selector).await,
        Err(err) => Err(err),
    };

    let outcome = match &result {
        Ok(()) => metrics::OUTCOME_CONVERGED,
        Err(err) if err.is_objects_remaining() => metrics::OUTCOME_REMAINING,
        Err(_) => metrics::OUTCOME_ERROR,
    };
    metrics::record_clean_attempt(target.resource(), outcome);

    result
}

/// Remove the finalizers of every matching object that is terminating but blocked.
///
/// Returns the number of objects finalized.
///
/// # Errors
///
/// Returns [`CleanError::Api`] on any API error that is neither `NotFound` nor
/// tolerated.
pub async fn finalize_stuck(
    target: &dyn CleanTarget,
    selector: &Selector,
    options: &CleanOptions,
) -> Result<usize, CleanError> {
    let resource = target.resource();
    let objects = list_matching(target, selector).await?;

    let mut finalized = 0;
    for object in objects.iter().filter(|object| object.is_stuck()) {
        match target.finalize(object).await {
            Ok(()) => {
                finalized += 1;
                metrics::record_forced_finalization(resource);
                info!(
                    resource = %resource,
                    object = %object.display_name(),
                    finalizers = ?object.finalizers,
                    "Forcefully removed finalizers of stuck object"
                );
            }
            Err(err) => tolerate(resource, options, err, "finalize", object)?,
        }
    }

    Ok(finalized)
}

async fn delete_matching(
    target: &dyn CleanTarget,
    selector: &Selector,
    options: &CleanOptions,
) -> Result<(), CleanError> {
    let resource = target.resource();

    if target.supports_delete_collection() {
        debug!(resource = %resource, selector = %selector, "Deleting collection");
        if let Err(err) = target
            .delete_collection(selector, options.grace_period_seconds)
            .await
        {
            match ApiErrorClass::of(&err) {
                ApiErrorClass::NotFound => {}
                class if options.tolerates(class) => {
                    warn!(resource = %resource, error = %err, "Tolerated error deleting collection");
                }
                _ => return Err(CleanError::api(resource, err)),
            }
        }
        return Ok(());
    }

    let objects = list_matching(target, selector).await?;
    for object in objects.iter().filter(|object| !object.is_terminating()) {
        debug!(resource = %resource, object = %object.display_name(), "Deleting object");
        if let Err(err) = target.delete(object, options.grace_period_seconds).await {
            tolerate(resource, options, err, "delete", object)?;
        }
    }
    Ok(())
}

async fn ensure_gone(target: &dyn CleanTarget, selector: &Selector) -> Result<(), CleanError> {
    let resource = target.resource();
    let remaining = list_matching(target, selector).await?;
    metrics::set_remaining_objects(resource, remaining.len());

    if remaining.is_empty() {
        return Ok(());
    }

    let names: Vec<String> = remaining
        .iter()
        .take(MAX_LOGGED_REMAINING_NAMES)
        .map(CleanObject::display_name)
        .collect();
    debug!(
        resource = %resource,
        remaining = remaining.len(),
        objects = ?names,
        "Objects still remaining"
    );

    Err(CleanError::ObjectsRemaining {
        resource: resource.to_string(),
        count: remaining.len(),
    })
}

/// List matching objects; a missing resource type counts as an empty list.
async fn list_matching(
    target: &dyn CleanTarget,
    selector: &Selector,
) -> Result<Vec<CleanObject>, CleanError> {
    match target.list(selector).await {
        Ok(objects) => Ok(objects),
        Err(err) if ApiErrorClass::of(&err) == ApiErrorClass::NotFound => Ok(Vec::new()),
        Err(err) => Err(CleanError::api(target.resource(), err)),
    }
}

fn tolerate(
    resource: &str,
    options: &CleanOptions,
    err: kube::Error,
    action: &str,
    object: &CleanObject,
) -> Result<(), CleanError> {
    match ApiErrorClass::of(&err) {
        ApiErrorClass::NotFound => Ok(()),
        class if options.tolerates(class) => {
            warn!(
                resource = %resource,
                object = %object.display_name(),
                class = %class,
                error = %err,
                "Tolerated error during {action}, retrying on next poll"
            );
            Ok(())
        }
        _ => Err(CleanError::api(resource, err)),
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod operation_tests;
