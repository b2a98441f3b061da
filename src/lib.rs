// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Botanist - Shoot Cleanup Engine
//!
//! Botanist removes every user-owned resource from a shoot cluster before the cluster
//! is torn down: webhooks, extended APIs, workloads and finally namespaces.
//!
//! ## Overview
//!
//! The library provides a retrying, parallel, multi-resource deletion pipeline:
//!
//! - Exception rules so system components, opted-out objects and protected
//!   namespaces are never touched
//! - Grace-period aware deletion
//! - Bounded polling with escalation to forced finalization
//! - Concurrent cleanup of all kinds of a category with aggregated errors
//!
//! ## Modules
//!
//! - [`selector`] - Label/field selectors and the cleanup exception policy
//! - [`cleanup`] - Clean operation, retry driver, orchestrator and category sequencing
//! - [`errors`] - Error taxonomy and API error classification
//! - [`metrics`] - Prometheus metrics
//! - [`status_reasons`] - Condition reasons and error codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use botanist::cleanup::{Botanist, CleanContext, KubeTargets};
//! use botanist::selector::CleanupPolicy;
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = kube::Client::try_default().await?;
//! let botanist = Botanist::new(
//!     KubeTargets::new(client),
//!     CleanupPolicy::new()?,
//!     BTreeMap::new(),
//! );
//!
//! let ctx = CleanContext::new().with_timeout(Duration::from_secs(3600));
//! botanist.clean_all(&ctx).await?;
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod constants;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod selector;
pub mod status_reasons;
