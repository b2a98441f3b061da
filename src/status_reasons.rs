// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition reasons and error codes reported for shoot cleanup.
//!
//! The cluster-lifecycle controller surfaces the outcome of each cleanup category as
//! a condition on the managed cluster resource. Reasons are programmatic identifiers
//! in CamelCase; error codes are the stable `ERR_*` identifiers attached to the
//! cluster's last error so operators and automation can react to them.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: ClusterResourcesCleanedUp
//!       status: "False"
//!       reason: CleanupTimedOut
//!       message: "timed out cleaning up customresourcedefinitions: 1 object(s) remaining"
//!       codes:
//!         - ERR_CLEANUP_CLUSTER_RESOURCES
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Condition type describing whether the shoot's resources have been cleaned up
pub const CONDITION_TYPE_CLEANED_UP: &str = "ClusterResourcesCleanedUp";

// ============================================================================
// Condition Reasons
// ============================================================================

/// All cleanup categories converged.
pub const REASON_CLEANUP_SUCCEEDED: &str = "CleanupSucceeded";

/// Objects still remain; the cleanup is still making progress.
pub const REASON_OBJECTS_REMAINING: &str = "ObjectsRemaining";

/// The deadline expired before all objects were gone.
///
/// **Operator action:** inspect the named resource kinds for finalizers owned by
/// controllers that are no longer running.
pub const REASON_CLEANUP_TIMED_OUT: &str = "CleanupTimedOut";

/// The cleanup was cancelled before all objects were gone.
pub const REASON_CLEANUP_CANCELLED: &str = "CleanupCancelled";

/// A Kubernetes API call failed with a non-retryable error.
pub const REASON_CLEANUP_FAILED: &str = "CleanupFailed";

/// A timing annotation or selector was malformed.
pub const REASON_INVALID_CONFIGURATION: &str = "InvalidConfiguration";

// ============================================================================
// Error Codes
// ============================================================================

/// Resources in the shoot cluster could not be cleaned up.
pub const ERROR_CODE_CLEANUP_CLUSTER_RESOURCES: &str = "ERR_CLEANUP_CLUSTER_RESOURCES";

/// The shoot's configuration (annotations) is invalid.
pub const ERROR_CODE_CONFIGURATION_PROBLEM: &str = "ERR_CONFIGURATION_PROBLEM";
