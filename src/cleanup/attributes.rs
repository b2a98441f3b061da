// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cleanup categories and the attributes they expand to.
//!
//! Every category has fixed timing defaults. A shoot can override them with one
//! annotation per category whose value is a number of seconds `N`:
//!
//! - the finalize window becomes `N` seconds
//! - the grace period becomes `floor(N × factor)` seconds, with the factor of the
//!   kind's timing defaults
//!
//! | Category | Grace period | Finalize after | Factor |
//! |---|---|---|---|
//! | webhooks | 0s | 5m | 0.0 |
//! | extended APIs | 0s | 1h | 0.0 |
//! | kubernetes resources | 300s | 5m | 0.9 |
//! | volume snapshots (contents) | 300s | 1h | 0.5 |
//! | namespaces | 0s | 5m | 0.0 |

use crate::cleanup::{CleanAttribute, CleanOptions, ResourceKind};
use crate::constants::{
    EXTENDED_APIS_GRACE_PERIOD_FACTOR, FINALIZE_AFTER_FIVE_MINUTES_SECS,
    FINALIZE_AFTER_ONE_HOUR_SECS, GRACE_PERIOD_FIVE_MINUTES_SECS,
    KUBERNETES_RESOURCES_GRACE_PERIOD_FACTOR, NAMESPACES_GRACE_PERIOD_FACTOR,
    VOLUME_SNAPSHOTS_GRACE_PERIOD_FACTOR, WEBHOOKS_GRACE_PERIOD_FACTOR, ZERO_GRACE_PERIOD_SECS,
};
use crate::errors::{ApiErrorClass, CleanError};
use crate::labels::{
    ANNOTATION_CLEANUP_EXTENDED_APIS_FINALIZE_GRACE_PERIOD_SECONDS,
    ANNOTATION_CLEANUP_KUBERNETES_RESOURCES_FINALIZE_GRACE_PERIOD_SECONDS,
    ANNOTATION_CLEANUP_NAMESPACES_FINALIZE_GRACE_PERIOD_SECONDS,
    ANNOTATION_CLEANUP_WEBHOOKS_FINALIZE_GRACE_PERIOD_SECONDS,
};
use crate::selector::{CleanupPolicy, Selector};
use std::collections::BTreeMap;
use std::fmt;
use std::num::{IntErrorKind, ParseIntError};
use std::str::FromStr;
use std::time::Duration;

/// Groups of resource kinds that are cleaned up together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupCategory {
    Webhooks,
    ExtendedApis,
    KubernetesResources,
    Namespaces,
}

impl CleanupCategory {
    /// Every category, in the order they must be cleaned up.
    pub const ALL: [CleanupCategory; 4] = [
        Self::Webhooks,
        Self::ExtendedApis,
        Self::KubernetesResources,
        Self::Namespaces,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webhooks => "webhooks",
            Self::ExtendedApis => "extended-apis",
            Self::KubernetesResources => "kubernetes-resources",
            Self::Namespaces => "namespaces",
        }
    }

    /// Annotation overriding the timing of this category.
    #[must_use]
    pub fn annotation_key(self) -> &'static str {
        match self {
            Self::Webhooks => ANNOTATION_CLEANUP_WEBHOOKS_FINALIZE_GRACE_PERIOD_SECONDS,
            Self::ExtendedApis => ANNOTATION_CLEANUP_EXTENDED_APIS_FINALIZE_GRACE_PERIOD_SECONDS,
            Self::KubernetesResources => {
                ANNOTATION_CLEANUP_KUBERNETES_RESOURCES_FINALIZE_GRACE_PERIOD_SECONDS
            }
            Self::Namespaces => ANNOTATION_CLEANUP_NAMESPACES_FINALIZE_GRACE_PERIOD_SECONDS,
        }
    }
}

impl fmt::Display for CleanupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!(
                    "unknown cleanup category '{s}', expected one of: {}",
                    known.join(", ")
                )
            })
    }
}

/// Default timing of a group of resource kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingDefaults {
    /// Grace period used when no annotation overrides it
    pub grace_period_seconds: u32,
    /// Finalize window used when no annotation overrides it
    pub finalize_after: Duration,
    /// Share of an annotated finalize window used as grace period
    pub grace_period_factor: f64,
}

pub const WEBHOOK_TIMING: TimingDefaults = TimingDefaults {
    grace_period_seconds: ZERO_GRACE_PERIOD_SECS,
    finalize_after: Duration::from_secs(FINALIZE_AFTER_FIVE_MINUTES_SECS),
    grace_period_factor: WEBHOOKS_GRACE_PERIOD_FACTOR,
};

pub const EXTENDED_API_TIMING: TimingDefaults = TimingDefaults {
    grace_period_seconds: ZERO_GRACE_PERIOD_SECS,
    finalize_after: Duration::from_secs(FINALIZE_AFTER_ONE_HOUR_SECS),
    grace_period_factor: EXTENDED_APIS_GRACE_PERIOD_FACTOR,
};

pub const KUBERNETES_RESOURCE_TIMING: TimingDefaults = TimingDefaults {
    grace_period_seconds: GRACE_PERIOD_FIVE_MINUTES_SECS,
    finalize_after: Duration::from_secs(FINALIZE_AFTER_FIVE_MINUTES_SECS),
    grace_period_factor: KUBERNETES_RESOURCES_GRACE_PERIOD_FACTOR,
};

pub const VOLUME_SNAPSHOT_TIMING: TimingDefaults = TimingDefaults {
    grace_period_seconds: GRACE_PERIOD_FIVE_MINUTES_SECS,
    finalize_after: Duration::from_secs(FINALIZE_AFTER_ONE_HOUR_SECS),
    grace_period_factor: VOLUME_SNAPSHOTS_GRACE_PERIOD_FACTOR,
};

pub const NAMESPACE_TIMING: TimingDefaults = TimingDefaults {
    grace_period_seconds: ZERO_GRACE_PERIOD_SECS,
    finalize_after: Duration::from_secs(FINALIZE_AFTER_FIVE_MINUTES_SECS),
    grace_period_factor: NAMESPACES_GRACE_PERIOD_FACTOR,
};

/// Clean options for `defaults`, overridden by the annotation `key` when present.
///
/// # Errors
///
/// Returns [`CleanError::InvalidAnnotation`] when the annotation is not a
/// non-negative integer.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn clean_options_from_annotations(
    annotations: &BTreeMap<String, String>,
    key: &str,
    defaults: &TimingDefaults,
) -> Result<CleanOptions, CleanError> {
    let Some(raw) = annotations.get(key) else {
        return Ok(CleanOptions::new(
            Some(defaults.grace_period_seconds),
            defaults.finalize_after,
        ));
    };

    let seconds: u64 = raw.parse().map_err(|err| CleanError::InvalidAnnotation {
        key: key.to_string(),
        value: raw.clone(),
        problem: annotation_problem(raw, &err).to_string(),
    })?;

    // float to int casts saturate
    let grace_period_seconds = (seconds as f64 * defaults.grace_period_factor).floor() as u32;

    Ok(CleanOptions::new(
        Some(grace_period_seconds),
        Duration::from_secs(seconds),
    ))
}

fn annotation_problem(raw: &str, err: &ParseIntError) -> &'static str {
    let negative = raw
        .strip_prefix('-')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
    if negative {
        return "negative durations are not allowed";
    }
    match err.kind() {
        IntErrorKind::PosOverflow => "number of seconds is too large",
        IntErrorKind::Empty => "value is empty, expected a number of seconds",
        _ => "expected a whole number of seconds",
    }
}

/// Builds the clean attributes of each category from the policy and the shoot's
/// annotations.
#[derive(Debug, Clone, Copy)]
pub struct CleanupAttributes<'a> {
    policy: &'a CleanupPolicy,
    annotations: &'a BTreeMap<String, String>,
}

impl<'a> CleanupAttributes<'a> {
    #[must_use]
    pub fn new(policy: &'a CleanupPolicy, annotations: &'a BTreeMap<String, String>) -> Self {
        Self {
            policy,
            annotations,
        }
    }

    /// Attributes of one category.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::InvalidAnnotation`] when the category's annotation is
    /// malformed.
    pub fn for_category(&self, category: CleanupCategory) -> Result<Vec<CleanAttribute>, CleanError> {
        match category {
            CleanupCategory::Webhooks => self.webhooks(),
            CleanupCategory::ExtendedApis => self.extended_apis(),
            CleanupCategory::KubernetesResources => self.kubernetes_resources(),
            CleanupCategory::Namespaces => self.namespaces(),
        }
    }

    /// Mutating and validating webhook configurations.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::InvalidAnnotation`] when the annotation is malformed.
    pub fn webhooks(&self) -> Result<Vec<CleanAttribute>, CleanError> {
        let options = self.options(CleanupCategory::Webhooks, &WEBHOOK_TIMING)?;
        let selector = self.policy.default_selector();
        Ok(vec![
            attribute(ResourceKind::MutatingWebhookConfigurations, selector, &options),
            attribute(ResourceKind::ValidatingWebhookConfigurations, selector, &options),
        ])
    }

    /// API services and custom resource definitions.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::InvalidAnnotation`] when the annotation is malformed.
    pub fn extended_apis(&self) -> Result<Vec<CleanAttribute>, CleanError> {
        let options = self.options(CleanupCategory::ExtendedApis, &EXTENDED_API_TIMING)?;
        Ok(vec![
            attribute(
                ResourceKind::ApiServices,
                self.policy.api_service_selector(),
                &options,
            ),
            attribute(
                ResourceKind::CustomResourceDefinitions,
                self.policy.default_selector(),
                &options,
            ),
        ])
    }

    /// Workloads, services, volume claims and volume snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::InvalidAnnotation`] when the annotation is malformed.
    pub fn kubernetes_resources(&self) -> Result<Vec<CleanAttribute>, CleanError> {
        let category = CleanupCategory::KubernetesResources;
        let options = self.options(category, &KUBERNETES_RESOURCE_TIMING)?;
        let snapshot_options = self.options(category, &VOLUME_SNAPSHOT_TIMING)?;
        let selector = self.policy.default_selector();

        let mut attributes: Vec<CleanAttribute> = [
            ResourceKind::CronJobs,
            ResourceKind::DaemonSets,
            ResourceKind::Deployments,
            ResourceKind::Ingresses,
            ResourceKind::Jobs,
            ResourceKind::Pods,
            ResourceKind::ReplicaSets,
            ResourceKind::ReplicationControllers,
        ]
        .into_iter()
        .map(|kind| attribute(kind, selector, &options))
        .collect();

        attributes.push(attribute(
            ResourceKind::Services,
            self.policy.service_selector(),
            &options,
        ));
        attributes.push(attribute(ResourceKind::StatefulSets, selector, &options));
        attributes.push(attribute(ResourceKind::PersistentVolumeClaims, selector, &options));
        attributes.push(attribute(ResourceKind::VolumeSnapshots, selector, &snapshot_options));
        attributes.push(attribute(
            ResourceKind::VolumeSnapshotContents,
            selector,
            &snapshot_options,
        ));

        Ok(attributes)
    }

    /// Every namespace except the protected system namespaces.
    ///
    /// Namespace deletion races with the namespace controller, so conflicts are
    /// tolerated and retried on the next poll.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::InvalidAnnotation`] when the annotation is malformed.
    pub fn namespaces(&self) -> Result<Vec<CleanAttribute>, CleanError> {
        let options = self
            .options(CleanupCategory::Namespaces, &NAMESPACE_TIMING)?
            .tolerating(ApiErrorClass::Conflict);
        Ok(vec![attribute(
            ResourceKind::Namespaces,
            self.policy.namespace_selector(),
            &options,
        )])
    }

    fn options(
        &self,
        category: CleanupCategory,
        defaults: &TimingDefaults,
    ) -> Result<CleanOptions, CleanError> {
        clean_options_from_annotations(self.annotations, category.annotation_key(), defaults)
    }
}

fn attribute(kind: ResourceKind, selector: &Selector, options: &CleanOptions) -> CleanAttribute {
    CleanAttribute::new(kind, selector.clone(), options.clone())
}

#[cfg(test)]
#[path = "attributes_tests.rs"]
mod attributes_tests;
