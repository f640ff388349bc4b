//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Transport protocols under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Bidirectional WebSocket connection on `/ws`
    WebSocket,
    /// Server-Sent Events stream on `/sse`
    Sse,
}

impl Protocol {
    /// Human-readable protocol name
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::WebSocket => "WebSocket",
            Protocol::Sse => "SSE",
        }
    }

    /// Both protocols in probe order
    pub fn all() -> [Protocol; 2] {
        [Protocol::WebSocket, Protocol::Sse]
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scheme spoken to a forward proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative outcome of one environment, from the pair of connection results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentOutcome {
    /// Both transports connected
    BothOk,
    /// Only WebSocket connected
    WebSocketOnly,
    /// Only SSE connected
    SseOnly,
    /// Neither transport connected
    NeitherOk,
}

impl EnvironmentOutcome {
    /// Classify an environment from the two connection results
    pub fn classify(websocket_ok: bool, sse_ok: bool) -> Self {
        match (websocket_ok, sse_ok) {
            (true, true) => Self::BothOk,
            (true, false) => Self::WebSocketOnly,
            (false, true) => Self::SseOnly,
            (false, false) => Self::NeitherOk,
        }
    }

    /// Short verdict shown next to the environment description
    pub fn annotation(&self) -> &'static str {
        match self {
            Self::BothOk => "both protocols working",
            Self::WebSocketOnly => "WebSocket working, SSE failed - prefer WebSocket",
            Self::SseOnly => "WebSocket failed, SSE working - needs fallback mechanism",
            Self::NeitherOk => "both protocols failed - environment problem",
        }
    }

    /// Whether the environment needs attention from the caller
    pub fn is_problem(&self) -> bool {
        matches!(self, Self::SseOnly | Self::NeitherOk)
    }
}
