// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label, annotation and well-known name constants used by the cleanup engine.
//!
//! Every value in this module is part of the external contract with the managed
//! cluster: selector label keys and annotation keys are matched byte-for-byte by
//! other components and by shoot owners. Renaming one changes which objects survive
//! cluster deletion.

// ============================================================================
// Gardener Labels
// ============================================================================

/// Label carrying the role of an object inside the shoot
pub const GARDEN_ROLE_LABEL: &str = "gardener.cloud/role";

/// Role value for components deployed and owned by the lifecycle manager
pub const GARDEN_ROLE_SYSTEM_COMPONENT: &str = "system-component";

/// Opt-out label; objects carrying it with value `true` are never cleaned up
pub const SHOOT_NO_CLEANUP_LABEL: &str = "shoot.gardener.cloud/no-cleanup";

// ============================================================================
// Kubernetes Labels
// ============================================================================

/// Label set by the API server on the default `kubernetes` service
pub const KUBERNETES_PROVIDER_LABEL: &str = "provider";

/// Value of [`KUBERNETES_PROVIDER_LABEL`] on the default `kubernetes` service
pub const KUBERNETES_PROVIDER_VALUE: &str = "kubernetes";

/// Label marking API services maintained by the aggregation layer itself
pub const KUBE_AGGREGATOR_AUTOMANAGED_LABEL: &str = "kube-aggregator.kubernetes.io/automanaged";

// ============================================================================
// Cleanup Timing Annotations (on the Shoot resource)
// ============================================================================

/// Overrides the finalize window of the webhook cleanup (seconds)
pub const ANNOTATION_CLEANUP_WEBHOOKS_FINALIZE_GRACE_PERIOD_SECONDS: &str =
    "shoot.gardener.cloud/cleanup-webhooks-finalize-grace-period-seconds";

/// Overrides the finalize window of the extended API cleanup (seconds)
pub const ANNOTATION_CLEANUP_EXTENDED_APIS_FINALIZE_GRACE_PERIOD_SECONDS: &str =
    "shoot.gardener.cloud/cleanup-extended-apis-finalize-grace-period-seconds";

/// Overrides the finalize window of the workload resource cleanup (seconds)
pub const ANNOTATION_CLEANUP_KUBERNETES_RESOURCES_FINALIZE_GRACE_PERIOD_SECONDS: &str =
    "shoot.gardener.cloud/cleanup-kubernetes-resources-finalize-grace-period-seconds";

/// Overrides the finalize window of the namespace cleanup (seconds)
pub const ANNOTATION_CLEANUP_NAMESPACES_FINALIZE_GRACE_PERIOD_SECONDS: &str =
    "shoot.gardener.cloud/cleanup-namespaces-finalize-grace-period-seconds";

// ============================================================================
// Protected Namespaces
// ============================================================================

/// Namespace holding objects without an explicit namespace
pub const NAMESPACE_DEFAULT: &str = "default";

/// Namespace of the Kubernetes system components
pub const NAMESPACE_KUBE_SYSTEM: &str = "kube-system";

/// Namespace readable by all users, including unauthenticated ones
pub const NAMESPACE_KUBE_PUBLIC: &str = "kube-public";

/// Namespace holding node heartbeat leases
pub const NAMESPACE_KUBE_NODE_LEASE: &str = "kube-node-lease";

/// Namespaces that are never deleted by the cleanup
pub const PROTECTED_NAMESPACES: [&str; 4] = [
    NAMESPACE_DEFAULT,
    NAMESPACE_KUBE_SYSTEM,
    NAMESPACE_KUBE_PUBLIC,
    NAMESPACE_KUBE_NODE_LEASE,
];

// ============================================================================
// Field Selector Paths
// ============================================================================

/// Field selector path of an object's name
pub const FIELD_METADATA_NAME: &str = "metadata.name";

/// Field selector path of an object's namespace
pub const FIELD_METADATA_NAMESPACE: &str = "metadata.namespace";
