// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pagination helpers for Kubernetes API list operations.
//!
//! Cleanup lists every object matching a selector on each poll, so lists are fetched
//! in pages to bound memory usage and API server load on large shoots.

use crate::constants::KUBE_LIST_PAGE_SIZE;
use kube::{api::ListParams, Api};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Follow continue tokens until every object matching `list_params` is fetched.
///
/// Works for typed resources and for `DynamicObject` alike. Any `limit` set by the
/// caller is replaced by the page size.
///
/// # Example
///
/// ```no_run
/// use k8s_openapi::api::core::v1::Pod;
/// use kube::{Api, Client};
/// use botanist::cleanup::pagination::list_all_paginated;
/// use botanist::selector::CleanupPolicy;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = Client::try_default().await?;
/// let api: Api<Pod> = Api::all(client);
/// let policy = CleanupPolicy::new()?;
///
/// let pods = list_all_paginated(&api, policy.default_selector().list_params()).await?;
/// println!("{} pods left to clean up", pods.len());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns the first client error of any page request.
pub async fn list_all_paginated<K>(
    api: &Api<K>,
    mut list_params: ListParams,
) -> Result<Vec<K>, kube::Error>
where
    K: Clone + DeserializeOwned + Debug,
{
    list_params.limit = Some(KUBE_LIST_PAGE_SIZE);

    let mut items = Vec::new();
    for page in 1usize.. {
        let list = api.list(&list_params).await?;
        let fetched = list.items.len();
        items.extend(list.items);

        debug!(page, fetched, total = items.len(), "Listed page");

        list_params.continue_token = list.metadata.continue_.filter(|token| !token.is_empty());
        if list_params.continue_token.is_none() {
            break;
        }
    }

    Ok(items)
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod pagination_tests;
