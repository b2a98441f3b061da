// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the cleanup engine.
//!
//! This module provides the error taxonomy the retry driver relies on:
//! - [`CleanError::ObjectsRemaining`] is the transient "keep polling" signal
//! - [`CleanError::Api`] wraps fatal Kubernetes API failures
//! - [`CleanError::TimedOut`] and [`CleanError::Cancelled`] report stragglers when
//!   the surrounding deadline or cancellation fires
//! - [`CleanError::Aggregate`] collects every failing resource kind of a category
//!
//! It also provides [`ApiErrorClass`], the classification of `kube::Error` values
//! used to decide whether a failed API call is ignored, tolerated or fatal.

use crate::status_reasons::{
    ERROR_CODE_CLEANUP_CLUSTER_RESOURCES, ERROR_CODE_CONFIGURATION_PROBLEM,
    REASON_CLEANUP_CANCELLED, REASON_CLEANUP_FAILED, REASON_CLEANUP_TIMED_OUT,
    REASON_INVALID_CONFIGURATION, REASON_OBJECTS_REMAINING,
};
use thiserror::Error;

/// Errors raised while constructing label or field selector requirements.
///
/// These are configuration errors: they are reported when the cleanup policy is
/// assembled, never in the middle of a cleanup run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The label key is not a valid Kubernetes qualified name
    #[error("invalid label key '{key}': {reason}")]
    InvalidKey {
        /// The offending key
        key: String,
        /// Why the key was rejected
        reason: String,
    },

    /// A label value is not a valid Kubernetes label value
    #[error("invalid label value '{value}' for key '{key}': {reason}")]
    InvalidValue {
        /// Key the value belongs to
        key: String,
        /// The offending value
        value: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The number of values does not fit the operator
    #[error("operator '{operator}' on key '{key}' requires {expected}, got {actual} value(s)")]
    InvalidValueCount {
        /// Key of the requirement
        key: String,
        /// Operator of the requirement
        operator: String,
        /// Human readable expectation (e.g. "exactly one value")
        expected: &'static str,
        /// Number of values supplied
        actual: usize,
    },

    /// The field path is not supported by field selectors
    #[error("unsupported field selector path '{field}'")]
    UnsupportedField {
        /// The offending field path
        field: String,
    },

    /// A field selector value is empty
    #[error("empty value for field selector path '{field}'")]
    EmptyFieldValue {
        /// Field path with the empty value
        field: String,
    },
}

/// Classification of Kubernetes API errors.
///
/// Cleanup treats the classes differently: `NotFound` means the work is already
/// done, classes listed as tolerated in the clean options are retried on the next
/// poll, `Transient` errors are retried in place by the API call wrapper, and
/// everything else aborts the affected resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorClass {
    /// HTTP 404 - the object is already gone
    NotFound,
    /// HTTP 409 - concurrent modification (e.g. a controller removing a finalizer)
    Conflict,
    /// HTTP 429, HTTP 5xx or a transport failure
    Transient,
    /// Any other error (permission denied, invalid request, ...)
    Other,
}

impl ApiErrorClass {
    /// Classify a Kubernetes client error.
    #[must_use]
    pub fn of(err: &kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                404 => Self::NotFound,
                409 => Self::Conflict,
                429 | 500..=599 => Self::Transient,
                _ => Self::Other,
            },
            kube::Error::Service(_) => Self::Transient,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for ApiErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::Transient => "Transient",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

fn describe_remaining(remaining: &Option<usize>) -> String {
    match remaining {
        Some(count) => format!("{count} object(s) remaining"),
        None => "no re-list completed, remaining objects unknown".to_string(),
    }
}

/// Errors produced by the cleanup engine.
#[derive(Error, Debug)]
pub enum CleanError {
    /// Objects matching the selector still exist after a cleanup attempt.
    ///
    /// This is the expected, transient outcome of most attempts: the retry driver
    /// keeps polling when it sees it.
    #[error("{count} {resource} object(s) still remaining")]
    ObjectsRemaining {
        /// Plural resource name (e.g. "pods")
        resource: String,
        /// Number of matching objects found by the re-list
        count: usize,
    },

    /// A Kubernetes API call failed with a non-tolerated error.
    #[error("API error while cleaning up {resource}: {source}")]
    Api {
        /// Plural resource name (e.g. "pods")
        resource: String,
        /// The underlying client error
        #[source]
        source: kube::Error,
    },

    /// The deadline elapsed while objects were still remaining.
    #[error("timed out cleaning up {resource}: {}", describe_remaining(.remaining))]
    TimedOut {
        /// Plural resource name (e.g. "pods")
        resource: String,
        /// Number of objects seen by the last successful re-list; `None` if no
        /// re-list finished
        remaining: Option<usize>,
    },

    /// The cleanup was cancelled while objects were still remaining.
    #[error("cancelled cleaning up {resource}: {}", describe_remaining(.remaining))]
    Cancelled {
        /// Plural resource name (e.g. "pods")
        resource: String,
        /// Number of objects seen by the last successful re-list; `None` if no
        /// re-list finished
        remaining: Option<usize>,
    },

    /// A cleanup timing annotation could not be parsed.
    #[error("invalid value '{value}' for annotation '{key}': {problem}")]
    InvalidAnnotation {
        /// Annotation key
        key: String,
        /// Raw annotation value
        value: String,
        /// What is wrong with the value
        problem: String,
    },

    /// The cleanup policy could not be assembled.
    #[error("invalid cleanup selector: {0}")]
    Selector(#[from] SelectorError),

    /// One or more resource kinds of a cleanup category failed.
    #[error("cleanup failed for {} resource kind(s): {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<CleanError>),
}

fn join_errors(errors: &[CleanError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CleanError {
    /// Wrap a client error for the given resource.
    pub fn api(resource: impl Into<String>, source: kube::Error) -> Self {
        Self::Api {
            resource: resource.into(),
            source,
        }
    }

    /// Whether this is the transient "objects remaining" signal.
    #[must_use]
    pub fn is_objects_remaining(&self) -> bool {
        matches!(self, Self::ObjectsRemaining { .. })
    }

    /// Plural resource name this error is about, if it concerns a single kind.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::ObjectsRemaining { resource, .. }
            | Self::Api { resource, .. }
            | Self::TimedOut { resource, .. }
            | Self::Cancelled { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Every resource kind named by this error, flattening aggregates.
    #[must_use]
    pub fn failed_resources(&self) -> Vec<&str> {
        match self {
            Self::Aggregate(errors) => errors.iter().flat_map(Self::failed_resources).collect(),
            other => other.resource().into_iter().collect(),
        }
    }

    /// Status condition reason describing this error.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ObjectsRemaining { .. } => REASON_OBJECTS_REMAINING,
            Self::TimedOut { .. } => REASON_CLEANUP_TIMED_OUT,
            Self::Cancelled { .. } => REASON_CLEANUP_CANCELLED,
            Self::InvalidAnnotation { .. } | Self::Selector(_) => REASON_INVALID_CONFIGURATION,
            Self::Api { .. } | Self::Aggregate(_) => REASON_CLEANUP_FAILED,
        }
    }

    /// Error codes to attach to the managed cluster's last error.
    ///
    /// Stuck objects are reported with `ERR_CLEANUP_CLUSTER_RESOURCES` so that an
    /// operator knows manual intervention (e.g. removing an external finalizer) may
    /// be needed.
    #[must_use]
    pub fn error_codes(&self) -> Vec<&'static str> {
        let mut codes = match self {
            Self::ObjectsRemaining { .. } | Self::TimedOut { .. } | Self::Cancelled { .. } => {
                vec![ERROR_CODE_CLEANUP_CLUSTER_RESOURCES]
            }
            Self::InvalidAnnotation { .. } | Self::Selector(_) => {
                vec![ERROR_CODE_CONFIGURATION_PROBLEM]
            }
            Self::Api { .. } => Vec::new(),
            Self::Aggregate(errors) => errors.iter().flat_map(Self::error_codes).collect(),
        };
        codes.sort_unstable();
        codes.dedup();
        codes
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
