//! Error handling for the transport compatibility tester
//!
//! Failures inside a probe never surface here: the probe records them as
//! strings in its result. `AppError` covers what can stop the whole run, such
//! as bad configuration or an unwritable results file, plus the transport
//! errors the probes convert before recording them.

use colored::{Color, Colorize};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Exit status of a run stopped by any error
pub const FAILURE_EXIT_CODE: i32 = 1;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connect refused, proxy tunnel failure, TLS handshake failure, ...
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Results export and other file access
    #[error("I/O error: {0}")]
    Io(String),

    /// URLs, JSON payloads, numbers from the environment
    #[error("Parsing error: {0}")]
    Parse(String),

    /// WebSocket handshake or SSE stream violations
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Test execution error: {0}")]
    TestExecution(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol(message.into())
    }

    pub fn test_execution<S: Into<String>>(message: S) -> Self {
        Self::TestExecution(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Short tag used in log fields and console output
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::Timeout(_) => "TIMEOUT",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Protocol(_) => "PROTOCOL",
            Self::TestExecution(_) => "TEST",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// True when running again could succeed without changing anything
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::Protocol(_))
    }

    fn detail(&self) -> &str {
        match self {
            Self::Config(msg)
            | Self::Network(msg)
            | Self::Timeout(msg)
            | Self::Validation(msg)
            | Self::Io(msg)
            | Self::Parse(msg)
            | Self::Protocol(msg)
            | Self::TestExecution(msg)
            | Self::Internal(msg) => msg,
        }
    }

    fn suggestion(&self) -> &'static str {
        match self {
            Self::Config(_) => "Check your .env file and command line arguments.",
            Self::Validation(_) => "Check the server URL and proxy addresses.",
            Self::Network(_) => "Check that the test server and any proxies are running.",
            Self::Timeout(_) => "The server or proxy may be overloaded; try again.",
            Self::Protocol(_) => "Verify the server exposes /ws, /sse and /test.",
            Self::Io(_) => "Check permissions and free space at the output path.",
            Self::Parse(_) => "Check the format of the input data.",
            Self::TestExecution(_) => "Try running the test again.",
            Self::Internal(_) => "This is likely a bug; please report it with the error details.",
        }
    }

    /// Longer explanation with a suggested fix, shown in verbose mode
    pub fn user_friendly_message(&self) -> String {
        format!("{}\n\nSuggestion: {}", self.detail(), self.suggestion())
    }

    fn console_color(&self) -> Color {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => Color::Red,
            Self::Network(_) | Self::Protocol(_) => Color::Yellow,
            Self::Timeout(_) => Color::Blue,
            Self::Io(_) | Self::TestExecution(_) => Color::Cyan,
            Self::Internal(_) => Color::BrightRed,
        }
    }

    /// `[CATEGORY] message`, colored by category when `use_color` is set
    pub fn format_for_console(&self, use_color: bool) -> String {
        if !use_color {
            return format!("[{}] {}", self.category(), self);
        }

        let color = self.console_color();
        format!(
            "[{}] {}",
            self.category().color(color).bold(),
            self.to_string().color(color)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::protocol(error.to_string())
        }
    }
}

impl From<tungstenite::Error> for AppError {
    fn from(error: tungstenite::Error) -> Self {
        match error {
            tungstenite::Error::Io(e) => Self::network(e.to_string()),
            tungstenite::Error::Url(e) => Self::parse(format!("WebSocket URL error: {}", e)),
            tungstenite::Error::Http(response) => {
                Self::protocol(format!("WebSocket handshake rejected with HTTP {}", response.status()))
            }
            other => Self::protocol(other.to_string()),
        }
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prints errors that stopped the run
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Console text for `error`; verbose mode adds the suggestion and a retry hint
    pub fn render(&self, error: &AppError) -> String {
        let mut text = error.format_for_console(self.use_color);

        if self.verbose {
            text.push_str("\n\n");
            text.push_str(&error.user_friendly_message());

            if error.is_recoverable() {
                let hint = "This error might be temporary. You can try running the command again.";
                text.push_str("\n\n");
                if self.use_color {
                    text.push_str(&hint.green().to_string());
                } else {
                    text.push_str(hint);
                }
            }
        }

        text
    }

    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
