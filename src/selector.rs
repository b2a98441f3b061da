// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label and field selectors deciding which objects are subject to cleanup.
//!
//! This module provides:
//! - [`Requirement`] - a validated label requirement (`key!=value`, `!key`, ...)
//! - [`FieldRequirement`] - a validated field requirement (`metadata.name!=default`)
//! - [`Selector`] - an immutable conjunction of both, evaluable client-side and
//!   renderable into Kubernetes list query parameters
//! - [`CleanupPolicy`] - the exception rules of the shoot cleanup, built once and
//!   passed explicitly to the attribute builder
//!
//! # Example
//!
//! ```rust
//! use botanist::selector::CleanupPolicy;
//!
//! let policy = CleanupPolicy::new().expect("built-in requirements are valid");
//! assert_eq!(
//!     policy.default_selector().label_selector().as_deref(),
//!     Some("gardener.cloud/role!=system-component,shoot.gardener.cloud/no-cleanup!=true")
//! );
//! ```

use crate::errors::SelectorError;
use crate::labels::{
    FIELD_METADATA_NAME, FIELD_METADATA_NAMESPACE, GARDEN_ROLE_LABEL,
    GARDEN_ROLE_SYSTEM_COMPONENT, KUBERNETES_PROVIDER_LABEL, KUBERNETES_PROVIDER_VALUE,
    KUBE_AGGREGATOR_AUTOMANAGED_LABEL, PROTECTED_NAMESPACES, SHOOT_NO_CLEANUP_LABEL,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use std::collections::BTreeMap;
use std::fmt;

/// Maximum length of a label name and of a label value
const MAX_LABEL_NAME_LENGTH: usize = 63;

/// Maximum length of a label key prefix (DNS subdomain)
const MAX_LABEL_PREFIX_LENGTH: usize = 253;

/// Operator of a label requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `key=value`
    Equals,
    /// `key!=value` (also matches objects without the label)
    NotEquals,
    /// `key in (a,b)`
    In,
    /// `key notin (a,b)` (also matches objects without the label)
    NotIn,
    /// `key`
    Exists,
    /// `!key`
    DoesNotExist,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Exists => "exists",
            Self::DoesNotExist => "!",
        };
        f.write_str(symbol)
    }
}

/// A single validated label requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: Vec<String>,
}

impl Requirement {
    /// Create a label requirement.
    ///
    /// # Arguments
    ///
    /// * `key` - Label key, a Kubernetes qualified name (`prefix/name` or `name`)
    /// * `operator` - Comparison operator
    /// * `values` - Values to compare against; the count must fit the operator
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key is not a valid qualified name
    /// - Any value is not a valid label value
    /// - `Equals`/`NotEquals` do not get exactly one value, `In`/`NotIn` get none,
    ///   or `Exists`/`DoesNotExist` get any
    pub fn new(key: &str, operator: Operator, values: &[&str]) -> Result<Self, SelectorError> {
        validate_label_key(key)?;

        let (valid_count, expected) = match operator {
            Operator::Equals | Operator::NotEquals => (values.len() == 1, "exactly one value"),
            Operator::In | Operator::NotIn => (!values.is_empty(), "at least one value"),
            Operator::Exists | Operator::DoesNotExist => (values.is_empty(), "no values"),
        };
        if !valid_count {
            return Err(SelectorError::InvalidValueCount {
                key: key.to_string(),
                operator: operator.to_string(),
                expected,
                actual: values.len(),
            });
        }

        for value in values {
            validate_label_value(key, value)?;
        }

        let mut values: Vec<String> = values.iter().map(ToString::to_string).collect();
        values.sort();
        values.dedup();

        Ok(Self {
            key: key.to_string(),
            operator,
            values,
        })
    }

    /// The label key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The operator.
    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Evaluate the requirement against an object's labels.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let actual = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => actual.is_some_and(|v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => {
                actual.is_none_or(|v| !self.values.contains(v))
            }
            Operator::Exists => actual.is_some(),
            Operator::DoesNotExist => actual.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, self.values[0]),
            Operator::NotEquals => write!(f, "{}!={}", self.key, self.values[0]),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
            Operator::Exists => f.write_str(&self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// Operator of a field requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOperator {
    /// `field=value`
    Equals,
    /// `field!=value`
    NotEquals,
}

/// A single validated field requirement on object metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequirement {
    field: String,
    operator: FieldOperator,
    value: String,
}

impl FieldRequirement {
    /// Create a field requirement.
    ///
    /// Only `metadata.name` and `metadata.namespace` are supported; they are the
    /// fields every resource type accepts in a field selector.
    ///
    /// # Errors
    ///
    /// Returns an error if the field path is not supported or the value is empty.
    pub fn new(field: &str, operator: FieldOperator, value: &str) -> Result<Self, SelectorError> {
        if field != FIELD_METADATA_NAME && field != FIELD_METADATA_NAMESPACE {
            return Err(SelectorError::UnsupportedField {
                field: field.to_string(),
            });
        }
        if value.is_empty() {
            return Err(SelectorError::EmptyFieldValue {
                field: field.to_string(),
            });
        }

        Ok(Self {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        })
    }

    /// Evaluate the requirement against an object's metadata.
    #[must_use]
    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        let actual = if self.field == FIELD_METADATA_NAME {
            meta.name.as_deref()
        } else {
            meta.namespace.as_deref()
        }
        .unwrap_or_default();

        match self.operator {
            FieldOperator::Equals => actual == self.value,
            FieldOperator::NotEquals => actual != self.value,
        }
    }
}

impl fmt::Display for FieldRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            FieldOperator::Equals => write!(f, "{}={}", self.field, self.value),
            FieldOperator::NotEquals => write!(f, "{}!={}", self.field, self.value),
        }
    }
}

/// Immutable conjunction of label and field requirements.
///
/// An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    labels: Vec<Requirement>,
    fields: Vec<FieldRequirement>,
}

impl Selector {
    /// A selector matching every object.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Return a new selector that additionally requires `requirement`.
    #[must_use]
    pub fn and(mut self, requirement: Requirement) -> Self {
        self.labels.push(requirement);
        self
    }

    /// Return a new selector that additionally requires the field `requirement`.
    #[must_use]
    pub fn and_field(mut self, requirement: FieldRequirement) -> Self {
        self.fields.push(requirement);
        self
    }

    /// Label requirements of this selector.
    #[must_use]
    pub fn label_requirements(&self) -> &[Requirement] {
        &self.labels
    }

    /// Field requirements of this selector.
    #[must_use]
    pub fn field_requirements(&self) -> &[FieldRequirement] {
        &self.fields
    }

    /// Evaluate the selector against an object's metadata.
    #[must_use]
    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        let empty = BTreeMap::new();
        let labels = meta.labels.as_ref().unwrap_or(&empty);

        self.labels.iter().all(|r| r.matches(labels))
            && self.fields.iter().all(|r| r.matches(meta))
    }

    /// Render the label requirements as a Kubernetes label selector string.
    ///
    /// Returns `None` if there are no label requirements.
    #[must_use]
    pub fn label_selector(&self) -> Option<String> {
        join_requirements(&self.labels)
    }

    /// Render the field requirements as a Kubernetes field selector string.
    ///
    /// Returns `None` if there are no field requirements.
    #[must_use]
    pub fn field_selector(&self) -> Option<String> {
        join_requirements(&self.fields)
    }

    /// List parameters restricting a list call to objects matching this selector.
    #[must_use]
    pub fn list_params(&self) -> ListParams {
        let mut params = ListParams::default();
        if let Some(labels) = self.label_selector() {
            params = params.labels(&labels);
        }
        if let Some(fields) = self.field_selector() {
            params = params.fields(&fields);
        }
        params
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.label_selector(), self.field_selector()) {
            (None, None) => f.write_str("<everything>"),
            (Some(labels), None) => f.write_str(&labels),
            (None, Some(fields)) => f.write_str(&fields),
            (Some(labels), Some(fields)) => write!(f, "{labels};{fields}"),
        }
    }
}

fn join_requirements<T: fmt::Display>(requirements: &[T]) -> Option<String> {
    if requirements.is_empty() {
        return None;
    }
    Some(
        requirements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

// ============================================================================
// Named Requirements
// ============================================================================

/// Excludes components owned by the lifecycle manager (`gardener.cloud/role!=system-component`).
///
/// # Errors
///
/// Never fails for the built-in constants; returns the construction error otherwise.
pub fn not_system_component() -> Result<Requirement, SelectorError> {
    Requirement::new(
        GARDEN_ROLE_LABEL,
        Operator::NotEquals,
        &[GARDEN_ROLE_SYSTEM_COMPONENT],
    )
}

/// Excludes objects that opted out of cleanup (`shoot.gardener.cloud/no-cleanup!=true`).
///
/// # Errors
///
/// Never fails for the built-in constants; returns the construction error otherwise.
pub fn no_cleanup_prevention() -> Result<Requirement, SelectorError> {
    Requirement::new(SHOOT_NO_CLEANUP_LABEL, Operator::NotEquals, &["true"])
}

/// Excludes the default `kubernetes` service (`provider!=kubernetes`).
///
/// # Errors
///
/// Never fails for the built-in constants; returns the construction error otherwise.
pub fn not_kubernetes_provider() -> Result<Requirement, SelectorError> {
    Requirement::new(
        KUBERNETES_PROVIDER_LABEL,
        Operator::NotEquals,
        &[KUBERNETES_PROVIDER_VALUE],
    )
}

/// Excludes API services maintained by the aggregation layer
/// (`!kube-aggregator.kubernetes.io/automanaged`).
///
/// # Errors
///
/// Never fails for the built-in constants; returns the construction error otherwise.
pub fn not_kube_aggregator_auto_managed() -> Result<Requirement, SelectorError> {
    Requirement::new(
        KUBE_AGGREGATOR_AUTOMANAGED_LABEL,
        Operator::DoesNotExist,
        &[],
    )
}

// ============================================================================
// Cleanup Policy
// ============================================================================

/// The exception rules of the shoot cleanup.
///
/// Built once at startup and passed to the attribute builder; it is never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPolicy {
    default_selector: Selector,
    service_selector: Selector,
    api_service_selector: Selector,
    namespace_selector: Selector,
}

impl CleanupPolicy {
    /// Assemble the policy from the named requirements.
    ///
    /// # Errors
    ///
    /// Returns an error if any requirement fails validation.
    pub fn new() -> Result<Self, SelectorError> {
        let default_selector = Selector::everything()
            .and(not_system_component()?)
            .and(no_cleanup_prevention()?);

        let service_selector = default_selector.clone().and(not_kubernetes_provider()?);

        let api_service_selector = default_selector
            .clone()
            .and(not_kube_aggregator_auto_managed()?);

        let namespace_selector = PROTECTED_NAMESPACES.iter().try_fold(
            default_selector.clone(),
            |selector, name| {
                FieldRequirement::new(FIELD_METADATA_NAME, FieldOperator::NotEquals, name)
                    .map(|r| selector.and_field(r))
            },
        )?;

        Ok(Self {
            default_selector,
            service_selector,
            api_service_selector,
            namespace_selector,
        })
    }

    /// Selector for webhooks, CRDs and workload resources.
    #[must_use]
    pub fn default_selector(&self) -> &Selector {
        &self.default_selector
    }

    /// Selector for services; additionally protects the default `kubernetes` service.
    #[must_use]
    pub fn service_selector(&self) -> &Selector {
        &self.service_selector
    }

    /// Selector for API services; additionally protects aggregator-managed ones.
    #[must_use]
    pub fn api_service_selector(&self) -> &Selector {
        &self.api_service_selector
    }

    /// Selector for namespaces; additionally protects the system namespaces.
    #[must_use]
    pub fn namespace_selector(&self) -> &Selector {
        &self.namespace_selector
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_label_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason: &str| SelectorError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() {
            return Err(invalid("prefix must be non-empty"));
        }
        if prefix.len() > MAX_LABEL_PREFIX_LENGTH {
            return Err(invalid("prefix must be no more than 253 characters"));
        }
        if !is_dns_subdomain(prefix) {
            return Err(invalid(
                "prefix must be a lowercase RFC 1123 subdomain",
            ));
        }
    }

    if name.is_empty() {
        return Err(invalid("name part must be non-empty"));
    }
    if name.len() > MAX_LABEL_NAME_LENGTH {
        return Err(invalid("name part must be no more than 63 characters"));
    }
    if !is_qualified_name_part(name) {
        return Err(invalid(
            "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character",
        ));
    }

    Ok(())
}

fn validate_label_value(key: &str, value: &str) -> Result<(), SelectorError> {
    if value.is_empty() {
        return Ok(());
    }

    let invalid = |reason: &str| SelectorError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.len() > MAX_LABEL_NAME_LENGTH {
        return Err(invalid("must be no more than 63 characters"));
    }
    if !is_qualified_name_part(value) {
        return Err(invalid(
            "must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character",
        ));
    }

    Ok(())
}

fn is_qualified_name_part(s: &str) -> bool {
    let bytes = s.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };

    first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn is_dns_subdomain(s: &str) -> bool {
    s.split('.').all(|label| {
        let bytes = label.as_bytes();
        let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
            return false;
        };

        (first.is_ascii_lowercase() || first.is_ascii_digit())
            && (last.is_ascii_lowercase() || last.is_ascii_digit())
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
    })
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
