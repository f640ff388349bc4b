//! Wire payloads exchanged with the test server

use crate::types::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message kinds understood by the test server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Ping,
    Echo,
    Broadcast,
    LargeData,
}

/// Ping sent on a freshly opened WebSocket
#[derive(Debug, Clone, Serialize)]
pub struct PingMessage {
    pub id: String,
    /// Send time in Unix-epoch milliseconds
    pub timestamp: u64,
    pub content: String,
    pub message_type: MessageType,
}

impl PingMessage {
    pub fn new() -> Self {
        Self {
            id: format!("test-{}", Uuid::new_v4()),
            timestamp: Utc::now().timestamp_millis().max(0) as u64,
            content: "WebSocket compatibility test".to_string(),
            message_type: MessageType::Ping,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for PingMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of the side-channel `POST /test` that makes the server broadcast
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastRequest {
    pub message_type: MessageType,
    pub content: String,
}

impl BroadcastRequest {
    pub fn sse_probe() -> Self {
        Self {
            message_type: MessageType::Broadcast,
            content: "SSE compatibility test".to_string(),
        }
    }
}

/// Any inbound payload; only the send timestamp matters for latency
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub timestamp: f64,
}

/// Current wall-clock time in fractional Unix-epoch milliseconds
pub fn now_epoch_ms() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1000.0
}

/// Latency of an inbound payload received at `received_at_ms`
pub fn latency_from_payload(payload: &str, received_at_ms: f64) -> serde_json::Result<f64> {
    let message: InboundMessage = serde_json::from_str(payload)?;
    Ok(received_at_ms - message.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_wire_shape() {
        let ping = PingMessage::new();
        let json: serde_json::Value = serde_json::from_str(&ping.to_json().unwrap()).unwrap();

        assert_eq!(json["message_type"], "Ping");
        assert!(json["timestamp"].is_u64());
        assert!(json["id"].as_str().unwrap().starts_with("test-"));
        assert_eq!(json["content"], "WebSocket compatibility test");
    }

    #[test]
    fn test_ping_ids_are_unique() {
        assert_ne!(PingMessage::new().id, PingMessage::new().id);
    }

    #[test]
    fn test_broadcast_wire_shape() {
        let json = serde_json::to_value(BroadcastRequest::sse_probe()).unwrap();
        assert_eq!(json["message_type"], "Broadcast");
        assert_eq!(json["content"], "SSE compatibility test");
    }

    #[test]
    fn test_latency_from_server_echo() {
        let payload = r#"{"id":"abc","timestamp":1700000000000,"content":"pong-1","message_type":"Echo"}"#;
        let latency = latency_from_payload(payload, 1_700_000_000_042.5).unwrap();
        assert!((latency - 42.5).abs() < 1e-6);
    }

    #[test]
    fn test_latency_rejects_malformed_payloads() {
        assert!(latency_from_payload("keep-alive", 0.0).is_err());
        assert!(latency_from_payload(r#"{"content":"no timestamp"}"#, 0.0).is_err());
        assert!(latency_from_payload(r#"{"timestamp":"soon"}"#, 0.0).is_err());
    }
}
