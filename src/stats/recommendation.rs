//! Transport strategy recommendation
//!
//! Fixed-threshold rules over the per-protocol summaries, evaluated in order;
//! the first rule that matches decides.

use super::message_error_rate_percent;
use crate::models::{EnvironmentRunResult, ProtocolSummary, RunResults, RunSummary};
use crate::types::{AppError, EnvironmentOutcome, Result};
use serde::Serialize;

/// Minimum WebSocket connection success rate for "WebSocket only"
pub const WS_ONLY_MIN_SUCCESS_RATE: f64 = 85.0;
/// Minimum WebSocket reconnect rate for "WebSocket only"
pub const WS_ONLY_MIN_RECONNECT_RATE: f64 = 90.0;
/// Minimum WebSocket connection success rate for the fallback strategy
pub const FALLBACK_MIN_WS_SUCCESS_RATE: f64 = 70.0;
/// Minimum SSE connection success rate for any strategy relying on SSE
pub const SSE_MIN_SUCCESS_RATE: f64 = 85.0;
/// WebSocket per-message error rate above which a client degrades to SSE
pub const FALLBACK_MAX_WS_MESSAGE_ERROR_RATE: f64 = 10.0;

/// Implementation complexity of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Complexity {
    Low,
    LowToMedium,
    Medium,
    NotApplicable,
}

impl Complexity {
    pub fn label(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::LowToMedium => "low to medium",
            Complexity::Medium => "medium",
            Complexity::NotApplicable => "n/a",
        }
    }
}

/// Recommended transport strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    WebSocketOnly,
    WebSocketWithSseFallback,
    PreferSse,
    BothUnreliable,
}

impl Recommendation {
    /// Apply the rules to the two protocol summaries
    pub fn from_summaries(websocket: &ProtocolSummary, sse: &ProtocolSummary) -> Self {
        let ws_success = websocket.success_rate_percent();
        let sse_success = sse.success_rate_percent();

        if ws_success >= WS_ONLY_MIN_SUCCESS_RATE && websocket.reconnect_rate_percent >= WS_ONLY_MIN_RECONNECT_RATE {
            Recommendation::WebSocketOnly
        } else if ws_success >= FALLBACK_MIN_WS_SUCCESS_RATE && sse_success >= SSE_MIN_SUCCESS_RATE {
            Recommendation::WebSocketWithSseFallback
        } else if sse_success >= SSE_MIN_SUCCESS_RATE {
            Recommendation::PreferSse
        } else {
            Recommendation::BothUnreliable
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Recommendation::WebSocketOnly => "Use WebSocket only",
            Recommendation::WebSocketWithSseFallback => "Use WebSocket with automatic SSE fallback",
            Recommendation::PreferSse => "Prefer SSE",
            Recommendation::BothUnreliable => "Both protocols are unreliable in this environment",
        }
    }

    pub fn rationale(&self) -> &'static str {
        match self {
            Recommendation::WebSocketOnly => "WebSocket performed well across all tested environments",
            Recommendation::WebSocketWithSseFallback => {
                "WebSocket is mostly usable; SSE is reliable enough to serve as the fallback"
            }
            Recommendation::PreferSse => "SSE is more compatible; WebSocket has problems in these environments",
            Recommendation::BothUnreliable => "Re-evaluate the network configuration or the transport choice",
        }
    }

    pub fn complexity(&self) -> Complexity {
        match self {
            Recommendation::WebSocketOnly => Complexity::Low,
            Recommendation::WebSocketWithSseFallback => Complexity::Medium,
            Recommendation::PreferSse => Complexity::LowToMedium,
            Recommendation::BothUnreliable => Complexity::NotApplicable,
        }
    }

    /// Conditions under which a client should switch to the fallback transport
    pub fn degrade_triggers(&self) -> Vec<String> {
        match self {
            Recommendation::WebSocketWithSseFallback => vec![
                "WebSocket connection failure".to_string(),
                format!("WebSocket message error rate above {}%", FALLBACK_MAX_WS_MESSAGE_ERROR_RATE),
            ],
            _ => Vec::new(),
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Recommendation::BothUnreliable)
    }
}

/// Qualitative verdict for one environment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentAssessment {
    pub name: String,
    pub description: String,
    pub outcome: EnvironmentOutcome,
    /// Share of WebSocket messages that failed to parse
    pub websocket_message_error_rate: f64,
    /// Whether a fallback-capable client would have degraded to SSE here
    pub degrade_triggered: bool,
}

impl EnvironmentAssessment {
    pub fn from_result(result: &EnvironmentRunResult) -> Self {
        let error_rate = message_error_rate_percent(&result.web_socket);
        Self {
            name: result.name.clone(),
            description: result.description.clone(),
            outcome: result.outcome(),
            websocket_message_error_rate: error_rate,
            degrade_triggered: !result.web_socket.connection_success
                || error_rate > FALLBACK_MAX_WS_MESSAGE_ERROR_RATE,
        }
    }

    pub fn annotation(&self) -> &'static str {
        self.outcome.annotation()
    }
}

/// Printable report: the recommendation plus the figures it was drawn from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub recommendation: Recommendation,
    pub summary: RunSummary,
    pub environments: Vec<EnvironmentAssessment>,
}

impl Report {
    /// Environments that need attention (SSE only, or neither protocol)
    pub fn problem_environments(&self) -> impl Iterator<Item = &EnvironmentAssessment> {
        self.environments.iter().filter(|e| e.outcome.is_problem())
    }
}

/// Builds reports from completed runs
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn recommend(&self, summary: &RunSummary) -> Recommendation {
        Recommendation::from_summaries(&summary.web_socket, &summary.sse)
    }

    /// Report for a completed run; fails on results without a summary
    pub fn report(&self, results: &RunResults) -> Result<Report> {
        let summary = results
            .summary()
            .ok_or_else(|| AppError::test_execution("Cannot recommend from an incomplete run"))?
            .clone();

        Ok(Report {
            recommendation: self.recommend(&summary),
            environments: results.environments().iter().map(EnvironmentAssessment::from_result).collect(),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnvironmentMatrix, ProbeResult};

    /// Summary with `success` of `total` environments connected
    fn summary(success: u32, total: u32, reconnect_rate: f64) -> ProtocolSummary {
        ProtocolSummary {
            success_count: success,
            total_count: total,
            mean_latency_ms: 0.0,
            reconnect_rate_percent: reconnect_rate,
        }
    }

    #[test]
    fn test_websocket_only_wins_even_when_sse_is_strong() {
        // 90% success, 95% reconnect
        let ws = summary(9, 10, 95.0);
        let sse = summary(10, 10, 100.0);
        assert_eq!(Recommendation::from_summaries(&ws, &sse), Recommendation::WebSocketOnly);
    }

    #[test]
    fn test_prefer_sse_when_websocket_below_fallback_threshold() {
        // WebSocket 60%, SSE 90%
        let ws = summary(6, 10, 100.0);
        let sse = summary(9, 10, 0.0);
        assert_eq!(Recommendation::from_summaries(&ws, &sse), Recommendation::PreferSse);
    }

    #[test]
    fn test_fallback_when_websocket_cannot_reconnect() {
        let ws = summary(4, 4, 50.0);
        let sse = summary(4, 4, 100.0);
        let recommendation = Recommendation::from_summaries(&ws, &sse);

        assert_eq!(recommendation, Recommendation::WebSocketWithSseFallback);
        assert_eq!(recommendation.complexity(), Complexity::Medium);
        assert_eq!(recommendation.degrade_triggers().len(), 2);
        assert!(recommendation.degrade_triggers()[1].contains("10%"));
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        // 85% exactly with 90% reconnect exactly
        let ws = summary(17, 20, 90.0);
        assert_eq!(Recommendation::from_summaries(&ws, &summary(0, 20, 0.0)), Recommendation::WebSocketOnly);

        // 70% WebSocket with 85% SSE
        let ws = summary(7, 10, 0.0);
        let sse = summary(17, 20, 0.0);
        assert_eq!(Recommendation::from_summaries(&ws, &sse), Recommendation::WebSocketWithSseFallback);
    }

    #[test]
    fn test_both_unreliable() {
        let recommendation = Recommendation::from_summaries(&summary(1, 4, 0.0), &summary(3, 4, 100.0));
        assert_eq!(recommendation, Recommendation::BothUnreliable);
        assert!(recommendation.is_warning());
        assert_eq!(recommendation.complexity(), Complexity::NotApplicable);
    }

    #[test]
    fn test_nothing_tested_is_unreliable() {
        let recommendation = Recommendation::from_summaries(&summary(0, 0, 0.0), &summary(0, 0, 0.0));
        assert_eq!(recommendation, Recommendation::BothUnreliable);
    }

    #[test]
    fn test_report_flags_problem_environments() {
        let connected = ProbeResult {
            connection_success: true,
            connection_time_ms: Some(3.0),
            ..Default::default()
        };

        let environments: Vec<_> = EnvironmentMatrix::standard()
            .configurations()
            .iter()
            .map(|c| {
                let ws = if c.is_proxied() { ProbeResult::new() } else { connected.clone() };
                EnvironmentRunResult::new(c.name.clone(), c.description.clone(), ws, connected.clone())
            })
            .collect();

        let results = RunResults::complete(environments, &EnvironmentMatrix::standard()).unwrap();
        let report = RecommendationEngine::new().report(&results).unwrap();

        assert_eq!(report.recommendation, Recommendation::PreferSse);
        let problems: Vec<&str> = report.problem_environments().map(|e| e.name.as_str()).collect();
        assert_eq!(problems, vec!["http-proxy", "https-proxy"]);
        assert!(report.environments[1].degrade_triggered);
        assert!(!report.environments[0].degrade_triggered);
        assert!(report.environments[1].annotation().contains("needs fallback mechanism"));
    }

    #[test]
    fn test_report_requires_summary() {
        let results = RunResults::partial(Vec::new());
        assert!(RecommendationEngine::new().report(&results).is_err());
    }
}
