//! Statistical aggregation of probe results across environments

pub mod recommendation;

pub use recommendation::{
    Complexity, EnvironmentAssessment, Recommendation, RecommendationEngine, Report,
};

use crate::models::{EnvironmentRunResult, ProbeResult, ProtocolSummary, RunSummary};
use crate::types::Protocol;

/// Summarize a complete set of environment results, one summary per protocol
pub fn summarize(environments: &[EnvironmentRunResult]) -> RunSummary {
    RunSummary {
        web_socket: summarize_protocol(environments.iter().map(|e| e.probe(Protocol::WebSocket))),
        sse: summarize_protocol(environments.iter().map(|e| e.probe(Protocol::Sse))),
    }
}

/// Aggregate one protocol's probe results
///
/// The mean latency is taken over every sample of every environment, so an
/// environment that received more messages weighs more.
pub fn summarize_protocol<'a, I>(probes: I) -> ProtocolSummary
where
    I: IntoIterator<Item = &'a ProbeResult>,
{
    let mut summary = ProtocolSummary::default();
    let mut reconnects = 0u32;
    let mut latency_sum = 0.0;
    let mut latency_count = 0usize;

    for probe in probes {
        summary.total_count += 1;
        if probe.connection_success {
            summary.success_count += 1;
        }
        if probe.reconnect_success {
            reconnects += 1;
        }
        latency_sum += probe.message_latencies.iter().sum::<f64>();
        latency_count += probe.message_latencies.len();
    }

    summary.mean_latency_ms = if latency_count > 0 {
        latency_sum / latency_count as f64
    } else {
        0.0
    };
    summary.reconnect_rate_percent = if summary.total_count > 0 {
        reconnects as f64 / summary.total_count as f64 * 100.0
    } else {
        0.0
    };

    summary
}

/// Share of received messages that failed to parse, as a percentage
///
/// Counts `Message parse error` entries against parsed samples plus those
/// failures; 0 when no message arrived.
pub fn message_error_rate_percent(probe: &ProbeResult) -> f64 {
    let parse_failures = probe
        .errors
        .iter()
        .filter(|e| e.starts_with("Message parse error"))
        .count();
    let received = probe.message_latencies.len() + parse_failures;

    if received == 0 {
        0.0
    } else {
        parse_failures as f64 / received as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn probe(success: bool, latencies: &[f64], reconnect: bool) -> ProbeResult {
        ProbeResult {
            connection_success: success,
            connection_time_ms: success.then_some(10.0),
            message_latencies: latencies.to_vec(),
            errors: Vec::new(),
            reconnect_success: reconnect,
        }
    }

    fn environment(name: &str, ws: ProbeResult, sse: ProbeResult) -> EnvironmentRunResult {
        EnvironmentRunResult::new(name, name, ws, sse)
    }

    #[test]
    fn test_two_of_three_environments() {
        let environments = vec![
            environment("a", probe(true, &[10.0, 20.0], true), probe(true, &[5.0], false)),
            environment("b", probe(true, &[30.0], false), probe(false, &[], false)),
            environment("c", probe(false, &[], true), probe(true, &[15.0], true)),
        ];

        let summary = summarize(&environments);

        assert_eq!(summary.web_socket.success_count, 2);
        assert_eq!(summary.web_socket.total_count, 3);
        assert!((summary.web_socket.success_rate_percent() - 66.666_666).abs() < 1e-3);
        assert_eq!(summary.web_socket.mean_latency_ms, 20.0);
        assert!((summary.web_socket.reconnect_rate_percent - 66.666_666).abs() < 1e-3);

        assert_eq!(summary.sse.success_count, 2);
        assert_eq!(summary.sse.mean_latency_ms, 10.0);
        assert!((summary.sse.reconnect_rate_percent - 33.333_333).abs() < 1e-3);
    }

    #[test]
    fn test_no_latency_samples_gives_zero_mean() {
        let environments = vec![environment("a", probe(true, &[], false), probe(false, &[], false))];
        let summary = summarize(&environments);
        assert_eq!(summary.web_socket.mean_latency_ms, 0.0);
        assert_eq!(summary.sse.mean_latency_ms, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize(&[]);
        assert_eq!(summary.web_socket.total_count, 0);
        assert_eq!(summary.web_socket.reconnect_rate_percent, 0.0);
        assert_eq!(summary.web_socket.success_rate_percent(), 0.0);
    }

    #[test]
    fn test_mean_is_over_all_samples() {
        // Per-environment means would give (10 + 40) / 2 = 25
        let environments = vec![
            environment("a", probe(true, &[10.0, 10.0, 10.0], false), ProbeResult::new()),
            environment("b", probe(true, &[40.0], false), ProbeResult::new()),
        ];
        assert_eq!(summarize(&environments).web_socket.mean_latency_ms, 17.5);
    }

    #[test]
    fn test_message_error_rate() {
        let mut result = probe(true, &[1.0, 2.0, 3.0], false);
        assert_eq!(message_error_rate_percent(&result), 0.0);

        result.errors.push("Message parse error: expected value".to_string());
        result.errors.push("Reconnect failed: refused".to_string());
        assert_eq!(message_error_rate_percent(&result), 25.0);

        assert_eq!(message_error_rate_percent(&ProbeResult::new()), 0.0);
    }

    proptest! {
        #[test]
        fn prop_summary_counts_are_bounded(
            flags in proptest::collection::vec((any::<bool>(), any::<bool>(), proptest::collection::vec(0.0f64..5000.0, 0..5)), 0..10)
        ) {
            let environments: Vec<_> = flags
                .iter()
                .enumerate()
                .map(|(i, (ok, reconnect, latencies))| {
                    environment(&format!("env-{}", i), probe(*ok, latencies, *reconnect), ProbeResult::new())
                })
                .collect();

            let summary = summarize(&environments).web_socket;
            prop_assert_eq!(summary.total_count as usize, environments.len());
            prop_assert!(summary.success_count <= summary.total_count);
            prop_assert!((0.0..=100.0).contains(&summary.reconnect_rate_percent));
            prop_assert!((0.0..=100.0).contains(&summary.success_rate_percent()));
            prop_assert!(summary.mean_latency_ms >= 0.0 && summary.mean_latency_ms < 5000.0);
        }
    }
}
