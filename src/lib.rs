//! Transport Compatibility Tester
//!
//! Probes a test server over WebSocket and Server-Sent Events under a matrix
//! of network conditions (direct, HTTP proxy, HTTPS proxy, slow network),
//! aggregates connection, latency and reconnection statistics, and recommends
//! which transport strategy an application should adopt.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod stats;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{NetworkProbeRunner, ProbeRunner, TestRunner};
pub use models::{
    Config, EnvironmentConfig, EnvironmentRunResult, ProbeResult, ProtocolSummary, RunResults,
    RunSummary,
};
pub use probe::{run_sse_probe, run_websocket_probe, ProbeTimings};
pub use stats::{summarize, Recommendation, RecommendationEngine, Report};
pub use output::{OutputFormatter, OutputFormatterFactory, ResultExporter};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
    pub const DEFAULT_OUTPUT_FILE: &str = "websocket-sse-test-results.json";
    pub const DEFAULT_HTTP_PROXY: &str = "localhost:8080";
    pub const DEFAULT_HTTPS_PROXY: &str = "localhost:8443";
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// Version tag written into every exported result document
    pub const TEST_VERSION: &str = "1.0.0";

    /// A still-open WebSocket is closed this long after the attempt started
    pub const FORCED_CLOSE_AFTER: Duration = Duration::from_millis(5000);
    /// Wait between a primary connection ending and the single reconnect
    pub const RECONNECT_GRACE: Duration = Duration::from_millis(1000);
    /// Added to the environment timeout to form the SSE hard timeout
    pub const SSE_TIMEOUT_EXTENSION: Duration = Duration::from_millis(10000);
    /// How long an opened SSE stream is observed before the probe ends it
    pub const SSE_OBSERVATION_WINDOW: Duration = Duration::from_millis(10000);
    /// Longest wait for the server's close handshake after a forced close
    pub const CLOSE_WAIT: Duration = Duration::from_millis(1000);
}
