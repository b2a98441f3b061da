// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `target.rs`

#[cfg(test)]
mod tests {
    use super::super::{CleanObject, CleanTarget, KubeTargets, NamespaceTarget, TargetResolver};
    use crate::cleanup::fake::{mock_client, object};
    use crate::cleanup::operation::clean_and_ensure_gone;
    use crate::cleanup::{CleanOptions, ResourceKind};
    use crate::errors::{ApiErrorClass, CleanError};
    use crate::selector::{CleanupPolicy, Selector};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn list(kind: &str, api_version: &str, items: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": {},
            "items": items,
        }))
    }

    fn status(code: u16, reason: &str) -> ResponseTemplate {
        ResponseTemplate::new(code).set_body_json(json!({
            "apiVersion": "v1",
            "kind": "Status",
            "metadata": {},
            "status": "Failure",
            "message": format!("{reason} from mock server"),
            "reason": reason,
            "code": code,
        }))
    }

    fn options() -> CleanOptions {
        CleanOptions::new(Some(0), Duration::from_secs(300))
    }

    #[test]
    fn test_clean_object_state() {
        let live = object("web", Some("shop"), &[], &["example.com/block"]);
        assert_eq!(live.display_name(), "shop/web");
        assert!(!live.is_terminating());
        assert!(!live.is_stuck());

        let mut terminating = live.clone();
        terminating.meta.deletion_timestamp =
            Some(serde_json::from_value(json!("2026-01-01T00:00:00Z")).unwrap());
        assert!(terminating.is_stuck());

        let cluster_scoped = object("widgets.example.com", None, &[], &[]);
        assert_eq!(cluster_scoped.display_name(), "widgets.example.com");
    }

    #[tokio::test]
    async fn test_resolver_covers_every_kind() {
        let server = MockServer::start().await;
        let targets = KubeTargets::new(mock_client(&server));

        for kind in ResourceKind::ALL {
            let target = targets.resolve(kind);
            assert_eq!(target.resource(), kind.plural());
            let collection = !matches!(kind, ResourceKind::Services | ResourceKind::Namespaces);
            assert_eq!(
                target.supports_delete_collection(),
                collection,
                "{kind} delete collection support"
            );
        }
    }

    #[tokio::test]
    async fn test_list_sends_selectors_across_namespaces() {
        let server = MockServer::start().await;
        let policy = CleanupPolicy::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/v1/pods"))
            .and(query_param(
                "labelSelector",
                "gardener.cloud/role!=system-component,shoot.gardener.cloud/no-cleanup!=true",
            ))
            .respond_with(list(
                "PodList",
                "v1",
                json!([
                    { "metadata": { "name": "web", "namespace": "shop", "finalizers": ["example.com/a"] } },
                    { "metadata": { "name": "db", "namespace": "data" } },
                ]),
            ))
            .mount(&server)
            .await;

        let pods = KubeTargets::new(mock_client(&server)).resolve(ResourceKind::Pods);
        let objects = pods.list(policy.default_selector()).await.unwrap();

        let names: Vec<String> = objects.iter().map(CleanObject::display_name).collect();
        assert_eq!(names, vec!["shop/web", "data/db"]);
        assert_eq!(objects[0].finalizers, vec!["example.com/a"]);
    }

    #[tokio::test]
    async fn test_cluster_scoped_delete_collection() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/apis/apiextensions.k8s.io/v1/customresourcedefinitions"))
            .respond_with(list(
                "CustomResourceDefinitionList",
                "apiextensions.k8s.io/v1",
                json!([]),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let crds =
            KubeTargets::new(mock_client(&server)).resolve(ResourceKind::CustomResourceDefinitions);
        crds.delete_collection(&Selector::everything(), Some(0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_namespaced_delete_collection_fans_out_per_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/apps/v1/deployments"))
            .respond_with(list(
                "DeploymentList",
                "apps/v1",
                json!([
                    { "metadata": { "name": "web", "namespace": "shop" } },
                    { "metadata": { "name": "api", "namespace": "shop" } },
                    { "metadata": { "name": "db", "namespace": "data" } },
                ]),
            ))
            .mount(&server)
            .await;
        for namespace in ["shop", "data"] {
            Mock::given(method("DELETE"))
                .and(path(format!("/apis/apps/v1/namespaces/{namespace}/deployments")))
                .and(body_partial_json(json!({ "gracePeriodSeconds": 300 })))
                .respond_with(list("DeploymentList", "apps/v1", json!([])))
                .expect(1)
                .mount(&server)
                .await;
        }

        let deployments = KubeTargets::new(mock_client(&server)).resolve(ResourceKind::Deployments);
        deployments
            .delete_collection(&Selector::everything(), Some(300))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_finalize_clears_metadata_finalizers() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/namespaces/shop/pods/web"))
            .and(header("content-type", "application/merge-patch+json"))
            .and(body_json(json!({ "metadata": { "finalizers": null } })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "metadata": { "name": "web", "namespace": "shop" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let pods = KubeTargets::new(mock_client(&server)).resolve(ResourceKind::Pods);
        pods.finalize(&object("web", Some("shop"), &[], &["example.com/block"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_finalize_patch_is_retried_after_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/apis/apps/v1/namespaces/shop/deployments/web"))
            .respond_with(status(503, "ServiceUnavailable"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/apis/apps/v1/namespaces/shop/deployments/web"))
            .and(body_json(json!({ "metadata": { "finalizers": null } })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "metadata": { "name": "web", "namespace": "shop" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let deployments =
            KubeTargets::new(mock_client(&server)).resolve(ResourceKind::Deployments);
        deployments
            .finalize(&object("web", Some("shop"), &[], &["example.com/block"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/batch/v1/jobs"))
            .respond_with(status(503, "ServiceUnavailable"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/apis/batch/v1/jobs"))
            .respond_with(list("JobList", "batch/v1", json!([])))
            .mount(&server)
            .await;

        let jobs = KubeTargets::new(mock_client(&server)).resolve(ResourceKind::Jobs);
        let objects = jobs.list(&Selector::everything()).await.unwrap();

        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn test_permanent_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/apiregistration.k8s.io/v1/apiservices"))
            .respond_with(status(403, "Forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let api_services = KubeTargets::new(mock_client(&server)).resolve(ResourceKind::ApiServices);
        let err = api_services.list(&Selector::everything()).await.unwrap_err();

        assert_eq!(ApiErrorClass::of(&err), ApiErrorClass::Other);
    }

    #[tokio::test]
    async fn test_missing_snapshot_api_counts_as_clean() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/snapshot.storage.k8s.io/v1/volumesnapshots"))
            .respond_with(status(404, "NotFound"))
            .mount(&server)
            .await;

        let snapshots =
            KubeTargets::new(mock_client(&server)).resolve(ResourceKind::VolumeSnapshots);
        clean_and_ensure_gone(snapshots.as_ref(), &Selector::everything(), &options())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_namespace_list_reports_spec_finalizers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces"))
            .respond_with(list(
                "NamespaceList",
                "v1",
                json!([{
                    "metadata": { "name": "shop", "finalizers": ["example.com/guard"] },
                    "spec": { "finalizers": ["kubernetes"] },
                }]),
            ))
            .mount(&server)
            .await;

        let namespaces = NamespaceTarget::new(mock_client(&server));
        let objects = namespaces.list(&Selector::everything()).await.unwrap();

        assert_eq!(objects.len(), 1);
        assert_eq!(
            objects[0].finalizers,
            vec!["example.com/guard", "kubernetes"]
        );
    }

    #[tokio::test]
    async fn test_namespace_finalize_uses_finalize_subresource() {
        let server = MockServer::start().await;
        let namespace = json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {
                "name": "shop",
                "finalizers": ["example.com/guard"],
                "deletionTimestamp": "2026-01-01T00:00:00Z",
            },
            "spec": { "finalizers": ["kubernetes"] },
        });
        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces/shop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(namespace.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/namespaces/shop/finalize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(namespace.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/namespaces/shop"))
            .and(body_json(json!({ "metadata": { "finalizers": null } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(namespace))
            .expect(1)
            .mount(&server)
            .await;

        let namespaces = NamespaceTarget::new(mock_client(&server));
        namespaces
            .finalize(&object("shop", None, &[], &["kubernetes"]))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let put = requests
            .iter()
            .find(|request| request.method == "PUT")
            .unwrap();
        let body: serde_json::Value = put.body_json().unwrap();
        assert_eq!(body["metadata"]["name"], "shop");
        assert!(body["spec"].get("finalizers").is_none());
    }

    #[tokio::test]
    async fn test_namespace_conflict_surfaces_to_operation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces"))
            .respond_with(list(
                "NamespaceList",
                "v1",
                json!([{ "metadata": { "name": "shop" } }]),
            ))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/namespaces/shop"))
            .respond_with(status(409, "Conflict"))
            .mount(&server)
            .await;

        let namespaces = NamespaceTarget::new(mock_client(&server));
        let tolerant = options().tolerating(ApiErrorClass::Conflict);
        let err = clean_and_ensure_gone(&namespaces, &Selector::everything(), &tolerant)
            .await
            .unwrap_err();

        assert!(matches!(err, CleanError::ObjectsRemaining { count: 1, .. }));
    }
}
