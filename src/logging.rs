//! Structured logging for the transport compatibility tester
//!
//! Every entry carries the logger name, a level, structured fields and, while
//! an environment run is in progress, that run's correlation ID. Entries are
//! rendered as one console line or one JSON object; warnings and errors go to
//! stderr, everything else to stdout.

use crate::error::AppError;
use crate::models::{Config, ProbeResult};
use crate::types::Protocol;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn painted(&self, use_color: bool) -> String {
        let label = format!("{:>5}", self.label());
        if !use_color {
            return label;
        }
        match self {
            LogLevel::Trace => label.dimmed().to_string(),
            LogLevel::Debug => label.cyan().to_string(),
            LogLevel::Info => label.green().to_string(),
            LogLevel::Warn => label.yellow().to_string(),
            LogLevel::Error => label.red().bold().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    /// One JSON object per line (`--json-logs`)
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub logger: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEntry {
    fn console_line(&self, use_color: bool) -> String {
        let mut line = format!(
            "{} {} [{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level.painted(use_color),
            self.logger,
            self.message
        );

        if let Some(id) = &self.correlation_id {
            line.push_str(&format!(" [{}]", id.get(..8).unwrap_or(id)));
        }

        if !self.fields.is_empty() {
            let fields: Vec<String> = self.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            line.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        line
    }

    fn json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "level": "ERROR", "message": format!("unserializable log entry: {}", e) }).to_string()
        })
    }
}

/// Context shared by a logger and its clones
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    correlation_id: Option<String>,
}

/// Logger writing structured entries to stdout/stderr
///
/// Clones share the same context, so a session ID or correlation ID set
/// through one clone shows up on entries written through the others.
#[derive(Clone)]
pub struct Logger {
    name: String,
    /// `None` silences the logger
    threshold: Option<LogLevel>,
    format: LogFormat,
    use_color: bool,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            threshold: Some(LogLevel::Info),
            format: LogFormat::Console,
            use_color: false,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Logger that writes nothing
    pub fn silent(name: &str) -> Self {
        Self { threshold: None, ..Self::new(name) }
    }

    /// Level follows the run mode: debug, then verbose, otherwise warnings only
    pub fn with_config(name: &str, config: &Config) -> Self {
        let threshold = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            threshold: Some(threshold),
            format: if config.json_logs { LogFormat::Json } else { LogFormat::Console },
            use_color: config.enable_color && !config.json_logs,
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        self.threshold.is_some_and(|threshold| level >= threshold)
    }

    pub async fn set_session_id(&self, session_id: String) {
        self.context.write().await.session_id = Some(session_id);
    }

    /// Start a correlated operation and return its correlation ID
    pub async fn start_operation(&self, operation: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.context.write().await.correlation_id = Some(correlation_id.clone());

        self.info(&format!("Started {}", operation))
            .field("operation", operation)
            .field("phase", "start")
            .log()
            .await;

        correlation_id
    }

    pub async fn end_operation(&self, correlation_id: &str, operation: &str, success: bool) {
        self.info(&format!("Finished {} (success: {})", operation, success))
            .correlation_id(correlation_id)
            .field("operation", operation)
            .field("phase", "end")
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.correlation_id.as_deref() == Some(correlation_id) {
            context.correlation_id = None;
        }
    }

    pub async fn current_correlation_id(&self) -> Option<String> {
        self.context.read().await.correlation_id.clone()
    }

    pub fn entry(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder {
            logger: self,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                logger: self.name.clone(),
                message: message.to_string(),
                correlation_id: None,
                fields: BTreeMap::new(),
            },
        }
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Error, message)
    }

    /// Fill in the shared context and render `entry`, or `None` when filtered out
    async fn render(&self, mut entry: LogEntry) -> Option<String> {
        if !self.enabled(entry.level) {
            return None;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), session_id.clone().into());
        }
        if entry.correlation_id.is_none() {
            entry.correlation_id = context.correlation_id.clone();
        }
        drop(context);

        Some(match self.format {
            LogFormat::Console => entry.console_line(self.use_color),
            LogFormat::Json => entry.json_line(),
        })
    }

    async fn write(&self, entry: LogEntry) {
        let level = entry.level;
        let Some(line) = self.render(entry).await else {
            return;
        };

        if level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", line);
        } else {
            let _ = writeln!(io::stdout(), "{}", line);
        }
    }
}

/// Builder for a single log entry
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), value);
        }
        self
    }

    /// Attach the summary fields of a finished probe
    pub fn probe_result(self, result: &ProbeResult) -> Self {
        self.field("connection_success", result.connection_success)
            .field("connection_time_ms", result.connection_time_ms)
            .field("messages", result.message_latencies.len())
            .field("mean_latency_ms", result.mean_latency_ms())
            .field("error_count", result.error_count())
            .field("reconnect_success", result.reconnect_success)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
    }

    pub async fn log(self) {
        self.logger.write(self.entry).await;
    }
}

/// Logger for the lifecycle events of individual probes
#[derive(Clone)]
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn quiet() -> Self {
        Self::from_logger(Logger::silent("PROBE"))
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub async fn log_attempt(&self, protocol: Protocol, environment: &str, target: &str) {
        self.logger
            .debug(&format!("{} probe connecting to {} ({})", protocol, target, environment))
            .field("protocol", protocol.name())
            .field("environment", environment)
            .field("target", target)
            .log()
            .await;
    }

    pub async fn log_open(&self, protocol: Protocol, environment: &str, elapsed_ms: f64) {
        self.logger
            .debug(&format!("{} connection opened in {:.1}ms ({})", protocol, elapsed_ms, environment))
            .field("protocol", protocol.name())
            .field("environment", environment)
            .field("elapsed_ms", elapsed_ms)
            .log()
            .await;
    }

    pub async fn log_message(&self, protocol: Protocol, environment: &str, payload_len: usize) {
        self.logger
            .trace(&format!("{} message received ({} bytes)", protocol, payload_len))
            .field("protocol", protocol.name())
            .field("environment", environment)
            .field("payload_bytes", payload_len)
            .log()
            .await;
    }

    pub async fn log_failure(&self, protocol: Protocol, environment: &str, detail: &str) {
        self.logger
            .warn(&format!("{} probe error in {}: {}", protocol, environment, detail))
            .field("protocol", protocol.name())
            .field("environment", environment)
            .field("error", detail)
            .log()
            .await;
    }

    pub async fn log_reconnect(&self, protocol: Protocol, environment: &str, success: bool) {
        let (level, outcome) = if success {
            (LogLevel::Debug, "succeeded")
        } else {
            (LogLevel::Warn, "failed")
        };

        self.logger
            .entry(level, &format!("{} reconnect {} ({})", protocol, outcome, environment))
            .field("protocol", protocol.name())
            .field("environment", environment)
            .field("reconnect_success", success)
            .log()
            .await;
    }

    pub async fn log_complete(&self, protocol: Protocol, environment: &str, result: &ProbeResult) {
        self.logger
            .info(&format!("{} probe finished for {}", protocol, environment))
            .field("protocol", protocol.name())
            .field("environment", environment)
            .probe_result(result)
            .log()
            .await;
    }

    pub async fn log_error(&self, error: &AppError, context: &str) {
        self.logger
            .error(&format!("{}: {}", context, error))
            .field("context", context)
            .error_info(error)
            .log()
            .await;
    }
}

/// Creates loggers that share one session ID
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name, &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_probe_logger(&self) -> ProbeLogger {
        ProbeLogger::from_logger(self.create_logger("PROBE").await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(correlation_id: Option<&str>) -> LogEntry {
        let mut fields = BTreeMap::new();
        fields.insert("environment".to_string(), serde_json::json!("direct"));
        fields.insert("attempt".to_string(), serde_json::json!(1));

        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            logger: "RUNNER".to_string(),
            message: "Started environment direct".to_string(),
            correlation_id: correlation_id.map(String::from),
            fields,
        }
    }

    #[test]
    fn test_level_follows_run_mode() {
        let debug = Logger::with_config("T", &Config { debug: true, ..Default::default() });
        assert!(debug.enabled(LogLevel::Debug));
        assert!(!debug.enabled(LogLevel::Trace));

        let verbose = Logger::with_config("T", &Config { verbose: true, ..Default::default() });
        assert!(verbose.enabled(LogLevel::Info));
        assert!(!verbose.enabled(LogLevel::Debug));

        let quiet = Logger::with_config("T", &Config::default());
        assert!(!quiet.enabled(LogLevel::Info));
        assert!(quiet.enabled(LogLevel::Warn));
    }

    #[test]
    fn test_json_logs_disable_color() {
        let config = Config {
            json_logs: true,
            enable_color: true,
            ..Default::default()
        };
        let logger = Logger::with_config("T", &config);
        assert_eq!(logger.format, LogFormat::Json);
        assert!(!logger.use_color);
    }

    #[test]
    fn test_silent_logger_filters_everything() {
        let logger = Logger::silent("T");
        assert!(!logger.enabled(LogLevel::Error));
    }

    #[test]
    fn test_console_line() {
        let line = sample_entry(Some("0123456789abcdef")).console_line(false);

        assert!(line.contains(" INFO [RUNNER] Started environment direct"));
        assert!(line.contains("[01234567]"));
        // fields render in key order
        assert!(line.ends_with("{attempt=1, environment=\"direct\"}"));

        let short = sample_entry(Some("abc")).console_line(false);
        assert!(short.contains("[abc]"));
    }

    #[test]
    fn test_json_line() {
        let parsed: serde_json::Value = serde_json::from_str(&sample_entry(None).json_line()).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["fields"]["environment"], "direct");
        assert!(parsed.get("correlation_id").is_none());
    }

    #[tokio::test]
    async fn test_operation_correlation_applies_to_entries() {
        let logger = Logger::new("RUNNER");
        let correlation_id = logger.start_operation("environment direct").await;
        assert_eq!(logger.current_correlation_id().await.as_deref(), Some(correlation_id.as_str()));

        let line = logger.info("probing").render_now().await.unwrap();
        assert!(line.contains(&correlation_id[..8]));

        logger.end_operation(&correlation_id, "environment direct", true).await;
        assert!(logger.current_correlation_id().await.is_none());
    }

    #[tokio::test]
    async fn test_filtered_entries_are_not_rendered() {
        let logger = Logger::with_config("T", &Config::default());
        assert!(logger.info("hidden").render_now().await.is_none());
        assert!(logger.warn("shown").render_now().await.is_some());
    }

    #[tokio::test]
    async fn test_probe_logger_events() {
        let probe_logger = ProbeLogger::quiet();
        let mut result = ProbeResult::new();
        result.errors.push("Connection timeout".to_string());

        probe_logger.log_attempt(Protocol::WebSocket, "direct", "ws://localhost:3000/ws").await;
        probe_logger.log_open(Protocol::Sse, "direct", 12.5).await;
        probe_logger.log_message(Protocol::Sse, "direct", 64).await;
        probe_logger.log_failure(Protocol::WebSocket, "http-proxy", "connection refused").await;
        probe_logger.log_reconnect(Protocol::WebSocket, "http-proxy", false).await;
        probe_logger.log_complete(Protocol::WebSocket, "http-proxy", &result).await;
        probe_logger.log_error(&AppError::network("unreachable"), "probe").await;

        assert_eq!(probe_logger.logger().name(), "PROBE");
    }

    #[tokio::test]
    async fn test_logger_factory_shares_session() {
        let factory = LoggerFactory::new(Config {
            verbose: true,
            ..Default::default()
        });
        let runner = factory.create_logger("RUNNER").await;
        let probe_logger = factory.create_probe_logger().await;

        for logger in [&runner, probe_logger.logger()] {
            let line = logger.info("hello").render_now().await.unwrap();
            assert!(line.contains(factory.session_id()));
        }
    }

    impl LogEntryBuilder<'_> {
        async fn render_now(self) -> Option<String> {
            self.logger.render(self.entry).await
        }
    }
}
