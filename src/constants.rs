// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Botanist cleanup engine.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.
//!
//! The cleanup timings below are part of the operational contract with shoot owners:
//! they encode how long external controllers are given to react to a deletion before
//! finalizers are force-removed. Do not retune them silently.

// ============================================================================
// Cleanup Polling Constants
// ============================================================================

/// Interval between two cleanup attempts for one resource kind (5 seconds)
pub const CLEANUP_POLL_INTERVAL_SECS: u64 = 5;

/// Maximum number of remaining object names included in log messages
pub const MAX_LOGGED_REMAINING_NAMES: usize = 5;

// ============================================================================
// Grace Period Constants
// ============================================================================

/// Delete immediately, without a graceful termination window
pub const ZERO_GRACE_PERIOD_SECS: u32 = 0;

/// Graceful termination window for workload resources (5 minutes)
pub const GRACE_PERIOD_FIVE_MINUTES_SECS: u32 = 5 * 60;

// ============================================================================
// Finalize-After Constants
// ============================================================================

/// Force-finalize short-lived resources (webhooks, workloads, namespaces) after 5 minutes
pub const FINALIZE_AFTER_FIVE_MINUTES_SECS: u64 = 5 * 60;

/// Force-finalize disruptive resources (CRDs, API services, volume snapshots) after 1 hour
pub const FINALIZE_AFTER_ONE_HOUR_SECS: u64 = 60 * 60;

// ============================================================================
// Annotation Grace Period Factors
// ============================================================================

/// Share of an annotated finalize window used as delete grace period for webhooks
pub const WEBHOOKS_GRACE_PERIOD_FACTOR: f64 = 0.0;

/// Share of an annotated finalize window used as delete grace period for extended APIs
pub const EXTENDED_APIS_GRACE_PERIOD_FACTOR: f64 = 0.0;

/// Share of an annotated finalize window used as delete grace period for workloads
pub const KUBERNETES_RESOURCES_GRACE_PERIOD_FACTOR: f64 = 0.9;

/// Share of an annotated finalize window used as delete grace period for volume snapshots
pub const VOLUME_SNAPSHOTS_GRACE_PERIOD_FACTOR: f64 = 0.5;

/// Share of an annotated finalize window used as delete grace period for namespaces
pub const NAMESPACES_GRACE_PERIOD_FACTOR: f64 = 0.0;

// ============================================================================
// Kubernetes API Constants
// ============================================================================

/// Page size for paginated list calls
pub const KUBE_LIST_PAGE_SIZE: u32 = 500;

/// Subresource used to finalize a terminating namespace
pub const NAMESPACE_FINALIZE_SUBRESOURCE: &str = "finalize";

/// API group of the volume snapshot CRDs
pub const SNAPSHOT_API_GROUP: &str = "snapshot.storage.k8s.io";

/// API version of the volume snapshot CRDs
pub const SNAPSHOT_API_VERSION: &str = "v1";

/// API group of aggregated API services
pub const APIREGISTRATION_API_GROUP: &str = "apiregistration.k8s.io";

/// API version of aggregated API services
pub const APIREGISTRATION_API_VERSION: &str = "v1";

// ============================================================================
// API Call Retry Constants
// ============================================================================

/// Initial retry interval for transient API errors (100ms)
pub const API_RETRY_INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries of one API call (5 seconds)
pub const API_RETRY_MAX_INTERVAL_SECS: u64 = 5;

/// Maximum total time spent retrying one API call (30 seconds)
pub const API_RETRY_MAX_ELAPSED_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
pub const API_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
pub const API_RETRY_RANDOMIZATION_FACTOR: f64 = 0.1;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default overall timeout of a cleanup run started from the command line (2 hours)
pub const DEFAULT_CLEANUP_TIMEOUT_SECS: u64 = 2 * 60 * 60;
