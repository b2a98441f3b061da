// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory cluster used by the cleanup unit tests.
//!
//! Objects without finalizers disappear on delete. Objects with finalizers only get a
//! deletion timestamp and stay until they are finalized. Errors can be queued per
//! operation to simulate conflicts and server failures.

use crate::cleanup::target::{CleanObject, CleanTarget, TargetResolver};
use crate::cleanup::ResourceKind;
use crate::selector::Selector;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Build a `kube::Error::Api` with the given HTTP status code.
pub(crate) fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(
        kube::core::Status::failure(&format!("fake {reason} error"), reason)
            .with_code(code)
            .boxed(),
    )
}

/// Build a kube client talking to a wiremock server.
pub(crate) fn mock_client(server: &wiremock::MockServer) -> kube::Client {
    let config = kube::Config::new(server.uri().parse().expect("mock server uri"));
    kube::Client::try_from(config).expect("client for mock server")
}

/// Build an object with labels and finalizers.
pub(crate) fn object(
    name: &str,
    namespace: Option<&str>,
    labels: &[(&str, &str)],
    finalizers: &[&str],
) -> CleanObject {
    let meta = ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(ToString::to_string),
        labels: Some(
            labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ),
        finalizers: if finalizers.is_empty() {
            None
        } else {
            Some(finalizers.iter().map(ToString::to_string).collect())
        },
        ..Default::default()
    };
    CleanObject::from_meta(meta)
}

fn deletion_timestamp() -> Time {
    serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).expect("valid timestamp")
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<String, CleanObject>,
    collection_delete: bool,
    list_errors: VecDeque<(u16, &'static str)>,
    delete_errors: VecDeque<(u16, &'static str)>,
    finalize_errors: VecDeque<(u16, &'static str)>,
    list_calls: usize,
    delete_calls: usize,
    delete_collection_calls: usize,
    finalize_calls: Vec<Instant>,
    grace_periods: Vec<Option<u32>>,
    list_delay: Option<Duration>,
}

/// One in-memory resource collection.
pub(crate) struct FakeTarget {
    resource: &'static str,
    state: Mutex<FakeState>,
}

impl FakeTarget {
    fn new(kind: ResourceKind) -> Self {
        Self {
            resource: kind.plural(),
            state: Mutex::new(FakeState {
                collection_delete: kind != ResourceKind::Namespaces,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state lock")
    }

    pub(crate) fn insert(&self, object: CleanObject) {
        self.state().objects.insert(object.display_name(), object);
    }

    pub(crate) fn set_collection_delete(&self, enabled: bool) {
        self.state().collection_delete = enabled;
    }

    pub(crate) fn fail_lists(&self, times: usize, code: u16, reason: &'static str) {
        self.state()
            .list_errors
            .extend(std::iter::repeat_n((code, reason), times));
    }

    pub(crate) fn fail_deletes(&self, times: usize, code: u16, reason: &'static str) {
        self.state()
            .delete_errors
            .extend(std::iter::repeat_n((code, reason), times));
    }

    pub(crate) fn fail_finalizes(&self, times: usize, code: u16, reason: &'static str) {
        self.state()
            .finalize_errors
            .extend(std::iter::repeat_n((code, reason), times));
    }

    /// Make every list call take this long.
    pub(crate) fn delay_lists(&self, delay: Duration) {
        self.state().list_delay = Some(delay);
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    pub(crate) fn get(&self, display_name: &str) -> Option<CleanObject> {
        self.state().objects.get(display_name).cloned()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.state().delete_calls
    }

    pub(crate) fn delete_collection_calls(&self) -> usize {
        self.state().delete_collection_calls
    }

    /// Instants at which finalize was called.
    pub(crate) fn finalize_calls(&self) -> Vec<Instant> {
        self.state().finalize_calls.clone()
    }

    pub(crate) fn grace_periods(&self) -> Vec<Option<u32>> {
        self.state().grace_periods.clone()
    }

    fn mark_deleted(state: &mut FakeState, key: &str) {
        let Some(object) = state.objects.get_mut(key) else {
            return;
        };
        if object.finalizers.is_empty() {
            state.objects.remove(key);
        } else if object.meta.deletion_timestamp.is_none() {
            object.meta.deletion_timestamp = Some(deletion_timestamp());
        }
    }
}

#[async_trait]
impl CleanTarget for FakeTarget {
    fn resource(&self) -> &str {
        self.resource
    }

    fn supports_delete_collection(&self) -> bool {
        self.state().collection_delete
    }

    async fn list(&self, selector: &Selector) -> Result<Vec<CleanObject>, kube::Error> {
        let delay = self.state().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.list_calls += 1;
        if let Some((code, reason)) = state.list_errors.pop_front() {
            return Err(api_error(code, reason));
        }
        Ok(state
            .objects
            .values()
            .filter(|object| selector.matches(&object.meta))
            .cloned()
            .collect())
    }

    async fn delete(
        &self,
        object: &CleanObject,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), kube::Error> {
        let mut state = self.state();
        state.delete_calls += 1;
        state.grace_periods.push(grace_period_seconds);
        if let Some((code, reason)) = state.delete_errors.pop_front() {
            return Err(api_error(code, reason));
        }
        let key = object.display_name();
        if !state.objects.contains_key(&key) {
            return Err(api_error(404, "NotFound"));
        }
        Self::mark_deleted(&mut state, &key);
        Ok(())
    }

    async fn delete_collection(
        &self,
        selector: &Selector,
        grace_period_seconds: Option<u32>,
    ) -> Result<(), kube::Error> {
        let mut state = self.state();
        state.delete_collection_calls += 1;
        state.grace_periods.push(grace_period_seconds);
        if let Some((code, reason)) = state.delete_errors.pop_front() {
            return Err(api_error(code, reason));
        }
        let keys: Vec<String> = state
            .objects
            .iter()
            .filter(|(_, object)| selector.matches(&object.meta))
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            Self::mark_deleted(&mut state, &key);
        }
        Ok(())
    }

    async fn finalize(&self, object: &CleanObject) -> Result<(), kube::Error> {
        let mut state = self.state();
        state.finalize_calls.push(Instant::now());
        if let Some((code, reason)) = state.finalize_errors.pop_front() {
            return Err(api_error(code, reason));
        }
        let key = object.display_name();
        let Some(stored) = state.objects.get_mut(&key) else {
            return Err(api_error(404, "NotFound"));
        };
        stored.finalizers.clear();
        stored.meta.finalizers = None;
        if stored.meta.deletion_timestamp.is_some() {
            state.objects.remove(&key);
        }
        Ok(())
    }
}

/// In-memory cluster holding one [`FakeTarget`] per resource kind.
#[derive(Default)]
pub(crate) struct FakeCluster {
    targets: Mutex<HashMap<ResourceKind, Arc<FakeTarget>>>,
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The collection for a kind, created empty on first use.
    pub(crate) fn target(&self, kind: ResourceKind) -> Arc<FakeTarget> {
        self.targets
            .lock()
            .expect("fake cluster lock")
            .entry(kind)
            .or_insert_with(|| Arc::new(FakeTarget::new(kind)))
            .clone()
    }
}

impl TargetResolver for FakeCluster {
    fn resolve(&self, kind: ResourceKind) -> Arc<dyn CleanTarget> {
        self.target(kind)
    }
}
