//! Calculation service boundary.
//!
//! The headline numbers (total volume, total weight, suggested container)
//! come either from the local aggregator or from a remote calculation
//! service. Both backends answer with the same `CalculationSummary`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::aggregate::{AggregateResult, aggregate, suggest_container};
use crate::config::CalculationConfig;
use crate::model::{CargoItem, ContainerClass, ContainerSpec};
use crate::types::lenient;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    /// Transport error, non-success status or an unreadable body. Not retried.
    #[error("Remote calculation failed: {0}")]
    RemoteCalculationFailure(String),
    #[error("Calculation backend misconfigured: {0}")]
    Configuration(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CalculationSource {
    Local,
    Remote,
}

/// Headline result shown next to the form and in the report.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalculationSummary {
    pub total_volume_m3: f64,
    pub total_weight_kg: f64,
    pub suggested_container: ContainerClass,
    /// `false` when not even the suggested container takes the cargo
    pub fits: bool,
    pub source: CalculationSource,
}

impl CalculationSummary {
    /// Derives the summary from locally aggregated totals.
    pub fn from_aggregate(result: &AggregateResult) -> Self {
        let suggestion = suggest_container(result.total_volume_m3, result.total_weight_kg);
        Self {
            total_volume_m3: result.total_volume_m3,
            total_weight_kg: result.total_weight_kg,
            suggested_container: suggestion.class,
            fits: suggestion.fits,
            source: CalculationSource::Local,
        }
    }
}

/// Body posted to the remote service.
#[derive(Serialize)]
struct RemoteRequest<'a> {
    items: &'a [CargoItem],
    container: &'a ContainerSpec,
}

/// Remote answer. Older deployments use `cbm` and `suggestedContainer`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteResponse {
    #[serde(alias = "cbm", deserialize_with = "lenient::number")]
    total_volume: f64,
    #[serde(alias = "suggestedContainer")]
    suggested_container_class: String,
    #[serde(default, deserialize_with = "lenient::number")]
    total_weight: f64,
}

impl RemoteResponse {
    fn into_summary(self) -> CalculationSummary {
        // anything that is neither 20ft nor 40ft counts as a high cube
        let class = self
            .suggested_container_class
            .parse()
            .unwrap_or(ContainerClass::FortyHighCube);
        let spec = class.spec();
        CalculationSummary {
            total_volume_m3: self.total_volume,
            total_weight_kg: self.total_weight,
            suggested_container: class,
            fits: self.total_volume <= spec.volume_m3() && self.total_weight <= spec.max_weight,
            source: CalculationSource::Remote,
        }
    }
}

/// HTTP client for the remote calculation service.
#[derive(Debug, Clone)]
pub struct RemoteCalculator {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteCalculator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, CalculationError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(CalculationError::Configuration(
                "remote endpoint must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CalculationError::Configuration(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts the item list once and decodes the answer.
    pub async fn calculate(
        &self,
        items: &[CargoItem],
        container: &ContainerSpec,
    ) -> Result<CalculationSummary, CalculationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RemoteRequest { items, container })
            .send()
            .await
            .map_err(|err| failure("request failed", err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalculationError::RemoteCalculationFailure(format!(
                "service answered with status {status}"
            )));
        }

        let body: RemoteResponse = response
            .json()
            .await
            .map_err(|err| failure("unreadable response", err))?;
        Ok(body.into_summary())
    }
}

fn failure(context: &str, err: reqwest::Error) -> CalculationError {
    tracing::warn!(%err, "{context}");
    CalculationError::RemoteCalculationFailure(format!("{context}: {err}"))
}

/// Where the headline numbers come from.
#[derive(Debug, Clone)]
pub enum CalculationBackend {
    Local,
    Remote(RemoteCalculator),
}

impl CalculationBackend {
    /// Selects the backend from configuration.
    pub fn from_config(config: &CalculationConfig) -> Result<Self, CalculationError> {
        match config.remote_endpoint() {
            Some(endpoint) => Ok(Self::Remote(RemoteCalculator::new(
                endpoint,
                config.timeout(),
            )?)),
            None => Ok(Self::Local),
        }
    }

    pub fn source(&self) -> CalculationSource {
        match self {
            Self::Local => CalculationSource::Local,
            Self::Remote(_) => CalculationSource::Remote,
        }
    }

    pub async fn calculate(
        &self,
        items: &[CargoItem],
        container: &ContainerSpec,
    ) -> Result<CalculationSummary, CalculationError> {
        match self {
            Self::Local => Ok(CalculationSummary::from_aggregate(&aggregate(
                items, container,
            ))),
            Self::Remote(remote) => remote.calculate(items, container).await,
        }
    }
}
