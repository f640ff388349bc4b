//! Network plumbing shared by the probes
//!
//! - HTTP client construction per environment (proxy routing, connect timeout)
//! - WebSocket connection, directly or through a `CONNECT` tunnel (TLS to `https` proxies)
//! - Server-Sent Events stream decoding

pub mod sse_stream;
pub mod tunnel;

pub use sse_stream::{open_sse_stream, SseDecoder, SseEvent, SseStream};
pub use tunnel::{connect_websocket, connect_websocket_with, ProxyTls, TunnelStream, WsStream};

use crate::models::EnvironmentConfig;
use crate::types::{AppError, Result};
use reqwest::Client;

/// User agent sent on every HTTP request
pub fn user_agent() -> String {
    format!("{}/{}", crate::PKG_NAME, crate::VERSION)
}

/// HTTP client for one environment
///
/// Traffic goes through the environment's proxy when it has one and never
/// through a proxy picked up from the process environment otherwise. Only
/// the connect phase is bounded; the SSE stream itself is long-lived.
pub fn build_http_client(environment: &EnvironmentConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(environment.timeout())
        .user_agent(user_agent());

    builder = match &environment.proxy {
        Some(proxy) => builder.proxy(
            reqwest::Proxy::all(proxy.url())
                .map_err(|e| AppError::config(format!("Invalid proxy {}: {}", proxy, e)))?,
        ),
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))
}
