// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `operation.rs`

#[cfg(test)]
mod tests {
    use super::super::{clean_and_ensure_gone, finalize_stuck};
    use crate::cleanup::fake::{object, FakeCluster};
    use crate::cleanup::target::CleanTarget;
    use crate::cleanup::{CleanOptions, ResourceKind};
    use crate::errors::{ApiErrorClass, CleanError};
    use crate::selector::{CleanupPolicy, Selector};
    use std::time::Duration;

    fn options() -> CleanOptions {
        CleanOptions::new(Some(300), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_empty_collection_converges() {
        let cluster = FakeCluster::new();
        let pods = cluster.target(ResourceKind::Pods);

        clean_and_ensure_gone(&*pods, &Selector::everything(), &options())
            .await
            .unwrap();

        assert_eq!(pods.delete_collection_calls(), 1);
        assert_eq!(pods.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_system_component_survives() {
        let policy = CleanupPolicy::new().unwrap();
        let cluster = FakeCluster::new();
        let deployments = cluster.target(ResourceKind::Deployments);
        deployments.insert(object(
            "resource-manager",
            Some("kube-system"),
            &[("gardener.cloud/role", "system-component")],
            &[],
        ));
        deployments.insert(object("web", Some("shop"), &[], &[]));

        clean_and_ensure_gone(
            &*deployments,
            policy.default_selector(),
            &options(),
        )
        .await
        .unwrap();

        assert_eq!(deployments.names(), vec!["kube-system/resource-manager"]);
    }

    #[tokio::test]
    async fn test_finalizers_leave_objects_remaining() {
        let cluster = FakeCluster::new();
        let pods = cluster.target(ResourceKind::Pods);
        pods.insert(object("stuck", Some("shop"), &[], &["example.com/block"]));
        pods.insert(object("gone", Some("shop"), &[], &[]));

        let err = clean_and_ensure_gone(&*pods, &Selector::everything(), &options())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CleanError::ObjectsRemaining { ref resource, count: 1 } if resource == "pods"
        ));
        assert!(pods.get("shop/stuck").unwrap().is_terminating());
    }

    #[tokio::test]
    async fn test_grace_period_is_passed_to_deletes() {
        let cluster = FakeCluster::new();
        let jobs = cluster.target(ResourceKind::Jobs);

        clean_and_ensure_gone(&*jobs, &Selector::everything(), &options())
            .await
            .unwrap();

        assert_eq!(jobs.grace_periods(), vec![Some(300)]);
    }

    #[tokio::test]
    async fn test_per_object_delete_skips_terminating_objects() {
        let cluster = FakeCluster::new();
        let services = cluster.target(ResourceKind::Services);
        services.set_collection_delete(false);
        services.insert(object("frontend", Some("shop"), &[], &["example.com/lb"]));
        services.insert(object("backend", Some("shop"), &[], &[]));

        let first = clean_and_ensure_gone(&*services, &Selector::everything(), &options())
            .await
            .unwrap_err();
        assert!(first.is_objects_remaining());
        assert_eq!(services.delete_calls(), 2);

        let second = clean_and_ensure_gone(&*services, &Selector::everything(), &options())
            .await
            .unwrap_err();
        assert!(second.is_objects_remaining());
        assert_eq!(
            services.delete_calls(),
            2,
            "terminating objects must not be deleted again"
        );
    }

    #[tokio::test]
    async fn test_not_found_on_delete_is_ignored() {
        let cluster = FakeCluster::new();
        let pods = cluster.target(ResourceKind::Pods);
        pods.fail_deletes(1, 404, "NotFound");

        clean_and_ensure_gone(&*pods, &Selector::everything(), &options())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_resource_type_counts_as_empty() {
        let cluster = FakeCluster::new();
        let snapshots = cluster.target(ResourceKind::VolumeSnapshots);
        snapshots.fail_deletes(1, 404, "NotFound");
        snapshots.fail_lists(1, 404, "NotFound");

        clean_and_ensure_gone(&*snapshots, &Selector::everything(), &options())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tolerated_conflict_continues_to_relist() {
        let cluster = FakeCluster::new();
        let namespaces = cluster.target(ResourceKind::Namespaces);
        namespaces.insert(object("shop", None, &[], &[]));
        namespaces.fail_deletes(1, 409, "Conflict");

        let options = options().tolerating(ApiErrorClass::Conflict);
        let err = clean_and_ensure_gone(&*namespaces, &Selector::everything(), &options)
            .await
            .unwrap_err();
        assert!(err.is_objects_remaining());

        clean_and_ensure_gone(&*namespaces, &Selector::everything(), &options)
            .await
            .unwrap();
        assert!(namespaces.names().is_empty());
    }

    #[tokio::test]
    async fn test_untolerated_conflict_is_fatal() {
        let cluster = FakeCluster::new();
        let namespaces = cluster.target(ResourceKind::Namespaces);
        namespaces.insert(object("shop", None, &[], &[]));
        namespaces.fail_deletes(1, 409, "Conflict");

        let err = clean_and_ensure_gone(&*namespaces, &Selector::everything(), &options())
            .await
            .unwrap_err();

        assert!(matches!(err, CleanError::Api { ref resource, .. } if resource == "namespaces"));
    }

    #[tokio::test]
    async fn test_forbidden_list_is_fatal() {
        let cluster = FakeCluster::new();
        let crds = cluster.target(ResourceKind::CustomResourceDefinitions);
        crds.fail_lists(1, 403, "Forbidden");

        let err = clean_and_ensure_gone(&*crds, &Selector::everything(), &options())
            .await
            .unwrap_err();

        assert!(!err.is_objects_remaining());
        assert_eq!(err.resource(), Some("customresourcedefinitions"));
    }

    #[tokio::test]
    async fn test_repeated_cleanup_is_idempotent() {
        let cluster = FakeCluster::new();
        let pods = cluster.target(ResourceKind::Pods);
        pods.insert(object("web", Some("shop"), &[], &[]));

        for _ in 0..3 {
            clean_and_ensure_gone(&*pods, &Selector::everything(), &options())
                .await
                .unwrap();
        }
        assert!(pods.names().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_stuck_only_touches_terminating_objects() {
        let cluster = FakeCluster::new();
        let crds = cluster.target(ResourceKind::CustomResourceDefinitions);
        crds.insert(object("stuck.example.com", None, &[], &["example.com/block"]));
        crds.insert(object("live.example.com", None, &[], &["example.com/block"]));

        crds.delete(&crds.get("stuck.example.com").unwrap(), Some(0))
            .await
            .unwrap();

        let finalized = finalize_stuck(&*crds, &Selector::everything(), &options())
            .await
            .unwrap();

        assert_eq!(finalized, 1);
        assert_eq!(crds.names(), vec!["live.example.com"]);
        assert_eq!(crds.finalize_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_stuck_tolerates_configured_errors() {
        let cluster = FakeCluster::new();
        let namespaces = cluster.target(ResourceKind::Namespaces);
        namespaces.insert(object("shop", None, &[], &["kubernetes"]));
        namespaces
            .delete(&namespaces.get("shop").unwrap(), None)
            .await
            .unwrap();
        namespaces.fail_finalizes(1, 409, "Conflict");

        let options = options().tolerating(ApiErrorClass::Conflict);
        let finalized = finalize_stuck(&*namespaces, &Selector::everything(), &options)
            .await
            .unwrap();
        assert_eq!(finalized, 0);

        let finalized = finalize_stuck(&*namespaces, &Selector::everything(), &options)
            .await
            .unwrap();
        assert_eq!(finalized, 1);
        assert!(namespaces.names().is_empty());
    }
}
