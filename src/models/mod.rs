//! Data models and structures for the transport compatibility tester

pub mod config;
pub mod environment;
pub mod results;

// Re-export main model types
pub use config::Config;
pub use environment::{list_configurations, EnvironmentConfig, EnvironmentMatrix, ProxyConfig};
pub use results::{EnvironmentRunResult, ProbeResult, ProtocolSummary, RunResults, RunSummary};
