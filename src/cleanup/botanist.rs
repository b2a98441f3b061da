// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Entry point of the shoot cleanup.
//!
//! [`Botanist`] ties the policy, the shoot's annotations and a target resolver
//! together and runs the cleanup categories in their required order. Webhooks go
//! first so they cannot block the deletion of anything else; namespaces go last
//! because deleting them cascades to whatever is still inside.

use crate::cleanup::attributes::{CleanupAttributes, CleanupCategory};
use crate::cleanup::driver::RetryDriver;
use crate::cleanup::orchestrator::run_all;
use crate::cleanup::target::TargetResolver;
use crate::cleanup::CleanContext;
use crate::errors::CleanError;
use crate::selector::CleanupPolicy;
use crate::status_reasons::{CONDITION_TYPE_CLEANED_UP, REASON_CLEANUP_SUCCEEDED};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info};

/// Runs the cleanup categories of one shoot.
pub struct Botanist<R> {
    resolver: R,
    policy: CleanupPolicy,
    annotations: BTreeMap<String, String>,
    driver: RetryDriver,
}

impl<R: TargetResolver> Botanist<R> {
    #[must_use]
    pub fn new(resolver: R, policy: CleanupPolicy, annotations: BTreeMap<String, String>) -> Self {
        Self {
            resolver,
            policy,
            annotations,
            driver: RetryDriver::default(),
        }
    }

    /// Use a custom retry driver (e.g. a different poll interval).
    #[must_use]
    pub fn with_driver(mut self, driver: RetryDriver) -> Self {
        self.driver = driver;
        self
    }

    /// Delete all mutating and validating webhook configurations.
    ///
    /// # Errors
    ///
    /// See [`Botanist::clean_category`].
    pub async fn clean_webhooks(&self, ctx: &CleanContext) -> Result<(), CleanError> {
        self.clean_category(ctx, CleanupCategory::Webhooks).await
    }

    /// Delete all API services and custom resource definitions.
    ///
    /// # Errors
    ///
    /// See [`Botanist::clean_category`].
    pub async fn clean_extended_apis(&self, ctx: &CleanContext) -> Result<(), CleanError> {
        self.clean_category(ctx, CleanupCategory::ExtendedApis).await
    }

    /// Delete all workloads, services, volume claims and volume snapshots.
    ///
    /// # Errors
    ///
    /// See [`Botanist::clean_category`].
    pub async fn clean_kubernetes_resources(&self, ctx: &CleanContext) -> Result<(), CleanError> {
        self.clean_category(ctx, CleanupCategory::KubernetesResources)
            .await
    }

    /// Delete all namespaces except the system ones.
    ///
    /// # Errors
    ///
    /// See [`Botanist::clean_category`].
    pub async fn clean_shoot_namespaces(&self, ctx: &CleanContext) -> Result<(), CleanError> {
        self.clean_category(ctx, CleanupCategory::Namespaces).await
    }

    /// Clean up every resource kind of one category concurrently.
    ///
    /// # Errors
    ///
    /// - [`CleanError::InvalidAnnotation`] when the category's timing annotation is
    ///   malformed; nothing is deleted in that case
    /// - [`CleanError::Aggregate`] listing every resource kind that failed
    pub async fn clean_category(
        &self,
        ctx: &CleanContext,
        category: CleanupCategory,
    ) -> Result<(), CleanError> {
        let attributes =
            CleanupAttributes::new(&self.policy, &self.annotations).for_category(category)?;

        info!(
            category = %category,
            kinds = attributes.len(),
            "Cleaning up shoot resources"
        );

        let result = run_all(ctx, &self.resolver, &self.driver, &attributes).await;
        match &result {
            Ok(()) => info!(category = %category, "Shoot resources cleaned up"),
            Err(err) => error!(category = %category, error = %err, "Shoot cleanup failed"),
        }
        result
    }

    /// Clean up all categories in order, stopping at the first failing one.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing category.
    pub async fn clean_all(&self, ctx: &CleanContext) -> Result<(), CleanError> {
        for category in CleanupCategory::ALL {
            self.clean_category(ctx, category).await?;
        }
        Ok(())
    }
}

/// Status condition describing the outcome of a cleanup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<String>,
}

impl CleanupCondition {
    #[must_use]
    pub fn from_result(result: &Result<(), CleanError>) -> Self {
        match result {
            Ok(()) => Self {
                type_: CONDITION_TYPE_CLEANED_UP.to_string(),
                status: "True".to_string(),
                reason: REASON_CLEANUP_SUCCEEDED.to_string(),
                message: "All shoot resources have been cleaned up".to_string(),
                codes: Vec::new(),
            },
            Err(err) => Self {
                type_: CONDITION_TYPE_CLEANED_UP.to_string(),
                status: "False".to_string(),
                reason: err.reason().to_string(),
                message: err.to_string(),
                codes: err.error_codes().into_iter().map(String::from).collect(),
            },
        }
    }
}

#[cfg(test)]
#[path = "botanist_tests.rs"]
mod botanist_tests;
