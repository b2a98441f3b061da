// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster access for the cleanup engine.
//!
//! The engine never talks to `kube::Api` directly. It goes through [`CleanTarget`],
//! one instance per resource kind, resolved by a [`TargetResolver`]. [`KubeTargets`]
//! is the resolver backed by a real API server:
//!
//! - typed k8s-openapi resources use [`KubeTarget`]
//! - API groups without typed bindings (API services, volume snapshots) use
//!   [`DynamicTarget`]
//! - namespaces use [`NamespaceTarget`], which finalizes through the `finalize`
//!   subresource
//!
//! Every API call is wrapped in [`retry_api_call`] so transient server errors are
//! retried before they reach the cleanup operation.

use crate::cleanup::pagination::list_all_paginated;
use crate::cleanup::retry::retry_api_call;
use crate::cleanup::ResourceKind;
use crate::constants::{
    APIREGISTRATION_API_GROUP, APIREGISTRATION_API_VERSION, NAMESPACE_FINALIZE_SUBRESOURCE,
    SNAPSHOT_API_GROUP, SNAPSHOT_API_VERSION,
};
use crate::selector::Selector;
use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    Namespace, PersistentVolumeClaim, Pod, ReplicationController, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ApiResource, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::core::GroupVersionKind;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// A listed object as seen by the cleanup engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanObject {
    /// Object metadata as returned by the API server
    pub meta: ObjectMeta,
    /// Every token blocking the object's removal (`metadata.finalizers`, plus
    /// `spec.finalizers` for namespaces)
    pub finalizers: Vec<String>,
}

impl CleanObject {
    /// Build from metadata, taking the finalizers from `metadata.finalizers`.
    #[must_use]
    pub fn from_meta(meta: ObjectMeta) -> Self {
        let finalizers = meta.finalizers.clone().unwrap_or_default();
        Self { meta, finalizers }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.meta.namespace.as_deref()
    }

    /// `namespace/name` for namespaced objects, `name` otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.namespace() {
            Some(namespace) => format!("{namespace}/{}", self.name()),
            None => self.name().to_string(),
        }
    }

    /// Whether deletion has been requested (deletion timestamp set).
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.meta.deletion_timestamp.is_some()
    }

    /// Terminating but held back by at least one finalizer.
    #[must_use]
    pub fn is_stuck(&self) -> bool {
        self.is_terminating() && !self.finalizers.is_empty()
    }
}

/// Capability set the cleanup engine needs for one resource kind.
#[async_trait]
pub trait CleanTarget: Send + Sync {
    /// Plural resource name, used in logs, metrics and errors.
    fn resource(&self) -> &str;

    /// Whether a single delete-collection request can be used instead of one
    /// delete per object.
    fn supports_delete_collection(&self) -> bool;

    /// List every object matching the selector, across all namespaces.
    async fn list(&self, selector: &Selector) -> Result<Vec<CleanObject>, kube::Error>;

    /// Delete one object.
    async fn delete(
        &self,
        object: &CleanObject,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), kube::Error>;

    /// Delete every object matching the selector.
    async fn delete_collection(
        &self,
        selector: &Selector,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), kube::Error>;

    /// Remove every finalizer of the object so the API server can drop it.
    async fn finalize(&self, object: &CleanObject) -> Result<(), kube::Error>;
}

/// Maps resource kinds to the targets that clean them.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, kind: ResourceKind) -> Arc<dyn CleanTarget>;
}

impl<T: TargetResolver + ?Sized> TargetResolver for Arc<T> {
    fn resolve(&self, kind: ResourceKind) -> Arc<dyn CleanTarget> {
        (**self).resolve(kind)
    }
}

fn delete_params(grace_period_seconds: Option<u32>) -> DeleteParams {
    DeleteParams {
        grace_period_seconds,
        ..Default::default()
    }
}

fn clear_finalizers_patch() -> Patch<serde_json::Value> {
    Patch::Merge(json!({ "metadata": { "finalizers": null } }))
}

type ApiFactory<K> = Arc<dyn Fn(Client, Option<&str>) -> Api<K> + Send + Sync>;

/// [`CleanTarget`] for any resource reachable through `kube::Api`.
pub struct KubeTarget<K> {
    client: Client,
    resource: String,
    namespaced: bool,
    collection_delete: bool,
    api_for: ApiFactory<K>,
}

/// [`CleanTarget`] for resources without typed bindings.
pub type DynamicTarget = KubeTarget<DynamicObject>;

impl<K> KubeTarget<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + 'static,
{
    /// Target for a namespaced typed resource, cleaned across all namespaces.
    #[must_use]
    pub fn namespaced(client: Client) -> Self {
        let api_for: ApiFactory<K> =
            Arc::new(|client: Client, namespace: Option<&str>| match namespace {
                Some(namespace) => Api::namespaced(client, namespace),
                None => Api::all(client),
            });
        Self {
            client,
            resource: K::plural(&()).to_string(),
            namespaced: true,
            collection_delete: true,
            api_for,
        }
    }
}

impl<K> KubeTarget<K>
where
    K: Resource<DynamicType = ()> + 'static,
{
    /// Target for a cluster-scoped typed resource.
    #[must_use]
    pub fn cluster(client: Client) -> Self {
        let api_for: ApiFactory<K> =
            Arc::new(|client: Client, _namespace: Option<&str>| Api::all(client));
        Self {
            client,
            resource: K::plural(&()).to_string(),
            namespaced: false,
            collection_delete: true,
            api_for,
        }
    }
}

impl DynamicTarget {
    /// Target for a resource described by an [`ApiResource`].
    #[must_use]
    pub fn dynamic(client: Client, api_resource: ApiResource, namespaced: bool) -> Self {
        let resource = api_resource.plural.clone();
        let api_for: ApiFactory<DynamicObject> =
            Arc::new(move |client: Client, namespace: Option<&str>| match namespace {
                Some(namespace) => Api::namespaced_with(client, namespace, &api_resource),
                None => Api::all_with(client, &api_resource),
            });
        Self {
            client,
            resource,
            namespaced,
            collection_delete: true,
            api_for,
        }
    }
}

impl<K> KubeTarget<K> {
    /// Delete objects one by one instead of with a delete-collection request.
    ///
    /// Needed for services, which do not support `deletecollection`.
    #[must_use]
    pub fn without_delete_collection(mut self) -> Self {
        self.collection_delete = false;
        self
    }

    fn api(&self, namespace: Option<&str>) -> Api<K> {
        let namespace = if self.namespaced { namespace } else { None };
        (self.api_for)(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> CleanTarget for KubeTarget<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    fn resource(&self) -> &str {
        &self.resource
    }

    fn supports_delete_collection(&self) -> bool {
        self.collection_delete
    }

    async fn list(&self, selector: &Selector) -> Result<Vec<CleanObject>, kube::Error> {
        let api = self.api(None);
        let items = retry_api_call(
            || list_all_paginated(&api, selector.list_params()),
            &format!("list {}", self.resource),
        )
        .await?;

        Ok(items
            .into_iter()
            .map(|item| CleanObject::from_meta(item.meta().clone()))
            .collect())
    }

    async fn delete(
        &self,
        object: &CleanObject,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), kube::Error> {
        let api = self.api(object.namespace());
        let params = delete_params(grace_period_seconds);
        retry_api_call(
            || api.delete(object.name(), &params),
            &format!("delete {} {}", self.resource, object.display_name()),
        )
        .await?;
        Ok(())
    }

    async fn delete_collection(
        &self,
        selector: &Selector,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), kube::Error> {
        let params = delete_params(grace_period_seconds);
        let list_params = selector.list_params();

        if !self.namespaced {
            let api = self.api(None);
            retry_api_call(
                || api.delete_collection(&params, &list_params),
                &format!("delete collection of {}", self.resource),
            )
            .await?;
            return Ok(());
        }

        // deletecollection is only served per namespace for namespaced resources
        let namespaces: BTreeSet<String> = self
            .list(selector)
            .await?
            .into_iter()
            .filter_map(|object| object.meta.namespace)
            .collect();

        for namespace in namespaces {
            let api = self.api(Some(&namespace));
            retry_api_call(
                || api.delete_collection(&params, &list_params),
                &format!("delete collection of {} in {namespace}", self.resource),
            )
            .await?;
        }
        Ok(())
    }

    async fn finalize(&self, object: &CleanObject) -> Result<(), kube::Error> {
        let api = self.api(object.namespace());
        let patch = clear_finalizers_patch();
        let patch_params = PatchParams::default();
        retry_api_call(
            || api.patch(object.name(), &patch_params, &patch),
            &format!("finalize {} {}", self.resource, object.display_name()),
        )
        .await?;
        Ok(())
    }
}

/// [`CleanTarget`] for namespaces.
///
/// A namespace is blocked by its `spec.finalizers` (owned by the namespace
/// controller) as well as by `metadata.finalizers`. Both are reported as finalizers
/// of the listed object, and both are cleared by [`CleanTarget::finalize`].
pub struct NamespaceTarget {
    api: Api<Namespace>,
}

impl NamespaceTarget {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }

    fn clean_object(namespace: Namespace) -> CleanObject {
        let mut object = CleanObject::from_meta(namespace.metadata);
        if let Some(finalizers) = namespace.spec.and_then(|spec| spec.finalizers) {
            object.finalizers.extend(finalizers);
        }
        object
    }
}

#[async_trait]
impl CleanTarget for NamespaceTarget {
    fn resource(&self) -> &str {
        ResourceKind::Namespaces.plural()
    }

    fn supports_delete_collection(&self) -> bool {
        false
    }

    async fn list(&self, selector: &Selector) -> Result<Vec<CleanObject>, kube::Error> {
        let namespaces = retry_api_call(
            || list_all_paginated(&self.api, selector.list_params()),
            "list namespaces",
        )
        .await?;
        Ok(namespaces.into_iter().map(Self::clean_object).collect())
    }

    async fn delete(
        &self,
        object: &CleanObject,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), kube::Error> {
        let params = delete_params(grace_period_seconds);
        retry_api_call(
            || self.api.delete(object.name(), &params),
            &format!("delete namespace {}", object.name()),
        )
        .await?;
        Ok(())
    }

    async fn delete_collection(
        &self,
        selector: &Selector,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), kube::Error> {
        for object in self.list(selector).await? {
            self.delete(&object, grace_period_seconds).await?;
        }
        Ok(())
    }

    async fn finalize(&self, object: &CleanObject) -> Result<(), kube::Error> {
        let name = object.name();
        let mut namespace = retry_api_call(
            || self.api.get(name),
            &format!("get namespace {name}"),
        )
        .await?;

        let has_spec_finalizers = namespace
            .spec
            .as_ref()
            .and_then(|spec| spec.finalizers.as_ref())
            .is_some_and(|finalizers| !finalizers.is_empty());
        if has_spec_finalizers {
            if let Some(spec) = namespace.spec.as_mut() {
                spec.finalizers = None;
            }
            debug!(namespace = %name, "Clearing namespace spec finalizers");
            let post_params = PostParams::default();
            retry_api_call(
                || {
                    self.api.replace_subresource(
                        NAMESPACE_FINALIZE_SUBRESOURCE,
                        name,
                        &post_params,
                        &namespace,
                    )
                },
                &format!("finalize namespace {name}"),
            )
            .await?;
        }

        let has_meta_finalizers = namespace
            .metadata
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| !finalizers.is_empty());
        if has_meta_finalizers {
            let patch = clear_finalizers_patch();
            let patch_params = PatchParams::default();
            retry_api_call(
                || self.api.patch(name, &patch_params, &patch),
                &format!("clear finalizers of namespace {name}"),
            )
            .await?;
        }
        Ok(())
    }
}

/// [`TargetResolver`] backed by a Kubernetes client.
#[derive(Clone)]
pub struct KubeTargets {
    client: Client,
}

impl KubeTargets {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn api_resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

impl TargetResolver for KubeTargets {
    fn resolve(&self, kind: ResourceKind) -> Arc<dyn CleanTarget> {
        let client = self.client.clone();
        match kind {
            ResourceKind::MutatingWebhookConfigurations => {
                Arc::new(KubeTarget::<MutatingWebhookConfiguration>::cluster(client))
            }
            ResourceKind::ValidatingWebhookConfigurations => {
                Arc::new(KubeTarget::<ValidatingWebhookConfiguration>::cluster(client))
            }
            ResourceKind::ApiServices => Arc::new(DynamicTarget::dynamic(
                client,
                api_resource(
                    APIREGISTRATION_API_GROUP,
                    APIREGISTRATION_API_VERSION,
                    "APIService",
                    kind.plural(),
                ),
                false,
            )),
            ResourceKind::CustomResourceDefinitions => {
                Arc::new(KubeTarget::<CustomResourceDefinition>::cluster(client))
            }
            ResourceKind::CronJobs => Arc::new(KubeTarget::<CronJob>::namespaced(client)),
            ResourceKind::DaemonSets => Arc::new(KubeTarget::<DaemonSet>::namespaced(client)),
            ResourceKind::Deployments => Arc::new(KubeTarget::<Deployment>::namespaced(client)),
            ResourceKind::Ingresses => Arc::new(KubeTarget::<Ingress>::namespaced(client)),
            ResourceKind::Jobs => Arc::new(KubeTarget::<Job>::namespaced(client)),
            ResourceKind::Pods => Arc::new(KubeTarget::<Pod>::namespaced(client)),
            ResourceKind::ReplicaSets => Arc::new(KubeTarget::<ReplicaSet>::namespaced(client)),
            ResourceKind::ReplicationControllers => {
                Arc::new(KubeTarget::<ReplicationController>::namespaced(client))
            }
            ResourceKind::Services => {
                Arc::new(KubeTarget::<Service>::namespaced(client).without_delete_collection())
            }
            ResourceKind::StatefulSets => Arc::new(KubeTarget::<StatefulSet>::namespaced(client)),
            ResourceKind::PersistentVolumeClaims => {
                Arc::new(KubeTarget::<PersistentVolumeClaim>::namespaced(client))
            }
            ResourceKind::VolumeSnapshots => Arc::new(DynamicTarget::dynamic(
                client,
                api_resource(
                    SNAPSHOT_API_GROUP,
                    SNAPSHOT_API_VERSION,
                    "VolumeSnapshot",
                    kind.plural(),
                ),
                true,
            )),
            ResourceKind::VolumeSnapshotContents => Arc::new(DynamicTarget::dynamic(
                client,
                api_resource(
                    SNAPSHOT_API_GROUP,
                    SNAPSHOT_API_VERSION,
                    "VolumeSnapshotContent",
                    kind.plural(),
                ),
                false,
            )),
            ResourceKind::Namespaces => Arc::new(NamespaceTarget::new(client)),
        }
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod target_tests;
