// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shoot cleanup engine.
//!
//! Before a shoot cluster is torn down, every user workload, webhook, extended API and
//! namespace in it has to go. This module provides the pipeline that does it:
//!
//! 1. [`attributes`] turns the cleanup policy and the shoot's annotations into a list
//!    of [`CleanAttribute`]s per cleanup category
//! 2. [`orchestrator`] runs one [`driver::RetryDriver`] per attribute concurrently
//! 3. each driver repeats the [`operation`] (delete + re-list) until nothing matching
//!    the selector is left, escalating to forced finalization once the attribute's
//!    finalize window has elapsed
//! 4. [`botanist::Botanist`] sequences the categories: webhooks, extended APIs,
//!    kubernetes resources, namespaces
//!
//! All cluster access goes through the [`target::CleanTarget`] trait so the engine can
//! run against a real API server or an in-memory fake.

pub mod attributes;
pub mod botanist;
pub mod driver;
pub mod operation;
pub mod orchestrator;
pub mod pagination;
pub mod retry;
pub mod target;

#[cfg(test)]
pub(crate) mod fake;

use crate::errors::ApiErrorClass;
use crate::selector::Selector;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub use botanist::Botanist;
pub use driver::{RetryDriver, RetryState};
pub use target::{CleanObject, CleanTarget, KubeTargets, TargetResolver};

/// The collections the cleanup engine knows how to empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// `admissionregistration.k8s.io/v1` mutating webhook configurations
    MutatingWebhookConfigurations,
    /// `admissionregistration.k8s.io/v1` validating webhook configurations
    ValidatingWebhookConfigurations,
    /// `apiregistration.k8s.io/v1` API services
    ApiServices,
    /// `apiextensions.k8s.io/v1` custom resource definitions
    CustomResourceDefinitions,
    CronJobs,
    DaemonSets,
    Deployments,
    Ingresses,
    Jobs,
    Pods,
    ReplicaSets,
    ReplicationControllers,
    Services,
    StatefulSets,
    PersistentVolumeClaims,
    /// `snapshot.storage.k8s.io/v1` volume snapshots
    VolumeSnapshots,
    /// `snapshot.storage.k8s.io/v1` volume snapshot contents
    VolumeSnapshotContents,
    Namespaces,
}

impl ResourceKind {
    /// Every kind, in the order the categories clean them up.
    pub const ALL: [ResourceKind; 18] = [
        Self::MutatingWebhookConfigurations,
        Self::ValidatingWebhookConfigurations,
        Self::ApiServices,
        Self::CustomResourceDefinitions,
        Self::CronJobs,
        Self::DaemonSets,
        Self::Deployments,
        Self::Ingresses,
        Self::Jobs,
        Self::Pods,
        Self::ReplicaSets,
        Self::ReplicationControllers,
        Self::Services,
        Self::StatefulSets,
        Self::PersistentVolumeClaims,
        Self::VolumeSnapshots,
        Self::VolumeSnapshotContents,
        Self::Namespaces,
    ];

    /// Lowercase plural resource name as used by the Kubernetes API.
    #[must_use]
    pub fn plural(self) -> &'static str {
        match self {
            Self::MutatingWebhookConfigurations => "mutatingwebhookconfigurations",
            Self::ValidatingWebhookConfigurations => "validatingwebhookconfigurations",
            Self::ApiServices => "apiservices",
            Self::CustomResourceDefinitions => "customresourcedefinitions",
            Self::CronJobs => "cronjobs",
            Self::DaemonSets => "daemonsets",
            Self::Deployments => "deployments",
            Self::Ingresses => "ingresses",
            Self::Jobs => "jobs",
            Self::Pods => "pods",
            Self::ReplicaSets => "replicasets",
            Self::ReplicationControllers => "replicationcontrollers",
            Self::Services => "services",
            Self::StatefulSets => "statefulsets",
            Self::PersistentVolumeClaims => "persistentvolumeclaims",
            Self::VolumeSnapshots => "volumesnapshots",
            Self::VolumeSnapshotContents => "volumesnapshotcontents",
            Self::Namespaces => "namespaces",
        }
    }

    /// Whether objects of this kind live inside a namespace.
    #[must_use]
    pub fn is_namespaced(self) -> bool {
        !matches!(
            self,
            Self::MutatingWebhookConfigurations
                | Self::ValidatingWebhookConfigurations
                | Self::ApiServices
                | Self::CustomResourceDefinitions
                | Self::VolumeSnapshotContents
                | Self::Namespaces
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// How objects of one kind are deleted and when cleanup escalates.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOptions {
    /// Grace period passed with every delete request (`None` uses the object's default)
    pub grace_period_seconds: Option<u32>,
    /// Time after which stuck objects get their finalizers removed by force
    pub finalize_after: Duration,
    /// API error classes that are logged and retried on the next poll instead of
    /// failing the cleanup
    pub tolerated: Vec<ApiErrorClass>,
}

impl CleanOptions {
    #[must_use]
    pub fn new(grace_period_seconds: Option<u32>, finalize_after: Duration) -> Self {
        Self {
            grace_period_seconds,
            finalize_after,
            tolerated: Vec::new(),
        }
    }

    /// Tolerate an additional API error class.
    #[must_use]
    pub fn tolerating(mut self, class: ApiErrorClass) -> Self {
        if !self.tolerated.contains(&class) {
            self.tolerated.push(class);
        }
        self
    }

    #[must_use]
    pub fn tolerates(&self, class: ApiErrorClass) -> bool {
        self.tolerated.contains(&class)
    }
}

/// One unit of cleanup work: which kind, which objects, and how.
#[derive(Debug, Clone)]
pub struct CleanAttribute {
    pub kind: ResourceKind,
    pub selector: Selector,
    pub options: CleanOptions,
}

impl CleanAttribute {
    #[must_use]
    pub fn new(kind: ResourceKind, selector: Selector, options: CleanOptions) -> Self {
        Self {
            kind,
            selector,
            options,
        }
    }
}

/// Why a cleanup run stopped before converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    DeadlineExceeded,
    Cancelled,
}

/// Deadline and cancellation shared by every driver of a cleanup run.
///
/// Cloning is cheap; clones observe the same cancellation token.
#[derive(Debug, Clone, Default)]
pub struct CleanContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CleanContext {
    /// A context without deadline that is never cancelled unless its token is.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline to `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the context without
    /// deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Completes once the deadline passes or the context is cancelled.
    ///
    /// Cancellation wins when both have already happened.
    pub async fn interrupted(&self) -> Interruption {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Interruption::Cancelled,
            () = deadline => Interruption::DeadlineExceeded,
        }
    }
}
