//! Probe measurements and run-level result models

use crate::models::environment::EnvironmentMatrix;
use crate::types::{AppError, EnvironmentOutcome, Protocol, Result};
use serde::{Deserialize, Serialize, Serializer};

/// Measurements from one probe of one protocol under one environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// Whether the primary connection opened
    pub connection_success: bool,
    /// Time from attempt start to open, set only on a successful open
    pub connection_time_ms: Option<f64>,
    /// One latency sample per message received, in arrival order
    pub message_latencies: Vec<f64>,
    /// Error descriptions in the order they occurred
    pub errors: Vec<String>,
    /// Whether the single reconnect attempt opened
    pub reconnect_success: bool,
}

impl ProbeResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean of this probe's latency samples, if any were recorded
    pub fn mean_latency_ms(&self) -> Option<f64> {
        if self.message_latencies.is_empty() {
            None
        } else {
            Some(self.message_latencies.iter().sum::<f64>() / self.message_latencies.len() as f64)
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Both probe results for one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRunResult {
    /// Environment key; serialized as the key of the result mapping
    #[serde(skip_serializing, default)]
    pub name: String,
    pub description: String,
    pub web_socket: ProbeResult,
    pub sse: ProbeResult,
}

impl EnvironmentRunResult {
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D, web_socket: ProbeResult, sse: ProbeResult) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            web_socket,
            sse,
        }
    }

    /// Probe result for a given protocol
    pub fn probe(&self, protocol: Protocol) -> &ProbeResult {
        match protocol {
            Protocol::WebSocket => &self.web_socket,
            Protocol::Sse => &self.sse,
        }
    }

    /// Qualitative outcome from the two connection results
    pub fn outcome(&self) -> EnvironmentOutcome {
        EnvironmentOutcome::classify(self.web_socket.connection_success, self.sse.connection_success)
    }
}

/// Aggregated statistics for one protocol across all environments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSummary {
    pub success_count: u32,
    pub total_count: u32,
    pub mean_latency_ms: f64,
    pub reconnect_rate_percent: f64,
}

impl ProtocolSummary {
    /// Connection success rate as a percentage; 0 when nothing was tested
    pub fn success_rate_percent(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_count as f64 * 100.0
        }
    }
}

/// One summary per protocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub web_socket: ProtocolSummary,
    pub sse: ProtocolSummary,
}

impl RunSummary {
    pub fn protocol(&self, protocol: Protocol) -> &ProtocolSummary {
        match protocol {
            Protocol::WebSocket => &self.web_socket,
            Protocol::Sse => &self.sse,
        }
    }
}

/// Results of a full run over the environment matrix
///
/// `summary` is present only when every environment of the matrix has an
/// entry; [`RunResults::complete`] is the only way to attach one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResults {
    #[serde(serialize_with = "serialize_ordered")]
    environments: Vec<EnvironmentRunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<RunSummary>,
}

impl RunResults {
    /// Results without a summary, e.g. while the run is still in progress
    pub fn partial(environments: Vec<EnvironmentRunResult>) -> Self {
        Self { environments, summary: None }
    }

    /// Results for the whole matrix with the summary computed from them
    pub fn complete(environments: Vec<EnvironmentRunResult>, matrix: &EnvironmentMatrix) -> Result<Self> {
        let recorded: Vec<&str> = environments.iter().map(|e| e.name.as_str()).collect();
        if recorded != matrix.names() {
            return Err(AppError::test_execution(format!(
                "Result set [{}] does not match the environment matrix [{}]",
                recorded.join(", "),
                matrix.names().join(", ")
            )));
        }

        let summary = crate::stats::summarize(&environments);
        Ok(Self { environments, summary: Some(summary) })
    }

    pub fn environments(&self) -> &[EnvironmentRunResult] {
        &self.environments
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentRunResult> {
        self.environments.iter().find(|e| e.name == name)
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

/// Serialize environment results as a JSON object keyed by name, in insertion order
fn serialize_ordered<S>(environments: &[EnvironmentRunResult], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(environments.iter().map(|e| (e.name.as_str(), e)))
}
