//! Test execution engine
//!
//! Runs both probes against every environment of the matrix, strictly one
//! after the other, and assembles the run results in matrix order.

use crate::error::Result;
use crate::logging::{Logger, ProbeLogger};
use crate::models::{EnvironmentConfig, EnvironmentMatrix, EnvironmentRunResult, ProbeResult, RunResults};
use crate::output::OutputFormatter;
use crate::probe::{run_sse_probe, run_websocket_probe, ProbeTimings};
use async_trait::async_trait;

/// Runs one probe of each protocol for a single environment
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run_websocket(&self, base_url: &str, environment: &EnvironmentConfig) -> ProbeResult;

    async fn run_sse(&self, base_url: &str, environment: &EnvironmentConfig) -> ProbeResult;
}

/// Probe runner that talks to the real server
pub struct NetworkProbeRunner {
    timings: ProbeTimings,
    logger: ProbeLogger,
}

impl NetworkProbeRunner {
    pub fn new(logger: ProbeLogger) -> Self {
        Self::with_timings(ProbeTimings::default(), logger)
    }

    pub fn with_timings(timings: ProbeTimings, logger: ProbeLogger) -> Self {
        Self { timings, logger }
    }

    pub fn timings(&self) -> &ProbeTimings {
        &self.timings
    }
}

#[async_trait]
impl ProbeRunner for NetworkProbeRunner {
    async fn run_websocket(&self, base_url: &str, environment: &EnvironmentConfig) -> ProbeResult {
        run_websocket_probe(base_url, environment, &self.timings, &self.logger).await
    }

    async fn run_sse(&self, base_url: &str, environment: &EnvironmentConfig) -> ProbeResult {
        run_sse_probe(base_url, environment, &self.timings, &self.logger).await
    }
}

/// Drives a full run over the environment matrix
pub struct TestRunner<R: ProbeRunner> {
    runner: R,
    matrix: EnvironmentMatrix,
    logger: Logger,
    formatter: Option<Box<dyn OutputFormatter>>,
}

impl<R: ProbeRunner> TestRunner<R> {
    pub fn new(runner: R, matrix: EnvironmentMatrix, logger: Logger) -> Self {
        Self {
            runner,
            matrix,
            logger,
            formatter: None,
        }
    }

    /// Print progress and per-environment results through `formatter`
    pub fn with_formatter(mut self, formatter: Box<dyn OutputFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn matrix(&self) -> &EnvironmentMatrix {
        &self.matrix
    }

    /// Run every environment in order and attach the summary
    ///
    /// A failing environment never stops the run; its failures are recorded
    /// in its probe results.
    pub async fn run_all(&self, base_url: &str) -> Result<RunResults> {
        let mut environments = Vec::with_capacity(self.matrix.len());

        for environment in self.matrix.configurations() {
            if let Some(formatter) = &self.formatter {
                println!("{}", formatter.format_environment_start(environment)?);
            }

            let operation = format!("environment {}", environment.name);
            let correlation_id = self.logger.start_operation(&operation).await;

            let result = self.run_environment(base_url, environment).await;

            let success = result.web_socket.connection_success || result.sse.connection_success;
            self.logger.end_operation(&correlation_id, &operation, success).await;

            if let Some(formatter) = &self.formatter {
                println!("{}\n", formatter.format_environment_result(&result)?);
            }
            environments.push(result);
        }

        RunResults::complete(environments, &self.matrix)
    }

    async fn run_environment(&self, base_url: &str, environment: &EnvironmentConfig) -> EnvironmentRunResult {
        let web_socket = self.runner.run_websocket(base_url, environment).await;
        let sse = self.runner.run_sse(base_url, environment).await;

        EnvironmentRunResult::new(environment.name.clone(), environment.description.clone(), web_socket, sse)
    }
}
