//! Probe state machine
//!
//! Every racing source inside a probe (connection I/O, the connection timeout,
//! the forced-close / observation timer, the SSE hard timeout, the reconnect
//! attempt, the broadcast trigger) is reduced to a [`ProbeEvent`]. The machine
//! is the only writer of the [`ProbeResult`]; it answers each event with the
//! [`ProbeAction`]s the driver must perform.
//!
//! Exactly one event moves the machine into [`ProbeState::Resolved`]. From
//! then on every event is ignored, so late timers and callbacks cannot touch
//! the result.

use crate::models::ProbeResult;
use crate::probe::message::latency_from_payload;
use crate::types::Protocol;

/// Lifecycle of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// Primary connection handshake in progress
    Connecting,
    /// Primary connection open and exchanging messages
    Open,
    /// Close requested on the primary connection, waiting for it to end
    Closing,
    /// Primary connection ended; grace delay or reconnect attempt in flight
    Reconnecting,
    /// Result is final
    Resolved,
}

/// Something that happened to the probe
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeEvent {
    /// Primary connection opened `elapsed_ms` after the attempt started
    Opened { elapsed_ms: f64 },
    /// Text payload received on the primary connection
    Message { payload: String, received_at_ms: f64 },
    /// Transport error on the primary connection
    Error(String),
    /// Primary connection ended, for whatever reason
    Closed,
    /// Connection timeout elapsed
    ConnectTimeout,
    /// WebSocket forced-close timer, or end of the SSE observation window
    CloseDue,
    /// SSE hard timeout elapsed
    HardTimeout,
    /// Side-channel broadcast trigger failed
    SideChannelFailed(String),
    /// Reconnect attempt opened
    ReconnectOpened,
    /// Reconnect attempt failed or timed out
    ReconnectFailed(String),
}

/// Work the driver must perform in response to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction {
    /// Send the ping payload on the primary WebSocket
    SendPing,
    /// Fire the side-channel `POST /test`
    TriggerBroadcast,
    /// Start the timer that ends a connection still open: the SSE observation
    /// window, or a WebSocket forced close re-armed after a late open
    ArmObservationWindow,
    /// Close the primary connection gracefully
    Close,
    /// Tear down the primary connection immediately
    Abort,
    /// Wait the grace delay, then attempt one reconnection
    ScheduleReconnect,
    /// Stop the probe and hand out the result
    Resolve,
}

/// State machine shared by the WebSocket and SSE probes
#[derive(Debug, Clone)]
pub struct ProbeMachine {
    protocol: Protocol,
    state: ProbeState,
    result: ProbeResult,
    messages_received: usize,
    close_overdue: bool,
}

impl ProbeMachine {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            state: ProbeState::Connecting,
            result: ProbeResult::new(),
            messages_received: 0,
            close_overdue: false,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ProbeState::Resolved
    }

    pub fn result(&self) -> &ProbeResult {
        &self.result
    }

    /// Messages delivered on the primary connection while it was open
    pub fn messages_received(&self) -> usize {
        self.messages_received
    }

    pub fn into_result(self) -> ProbeResult {
        self.result
    }

    /// Apply one event and return the actions it requires
    pub fn handle(&mut self, event: ProbeEvent) -> Vec<ProbeAction> {
        if self.is_resolved() {
            return Vec::new();
        }

        match self.protocol {
            Protocol::WebSocket => self.handle_websocket(event),
            Protocol::Sse => self.handle_sse(event),
        }
    }

    fn handle_websocket(&mut self, event: ProbeEvent) -> Vec<ProbeAction> {
        use ProbeState::*;

        match (self.state, event) {
            (Connecting, ProbeEvent::Opened { elapsed_ms }) => {
                self.mark_open(elapsed_ms);
                if self.close_overdue {
                    vec![ProbeAction::SendPing, ProbeAction::ArmObservationWindow]
                } else {
                    vec![ProbeAction::SendPing]
                }
            }
            (Open | Closing, ProbeEvent::Message { payload, received_at_ms }) => {
                self.record_message(&payload, received_at_ms);
                Vec::new()
            }
            (_, ProbeEvent::Error(description)) => {
                // The close that follows decides what happens next
                self.result.errors.push(description);
                Vec::new()
            }
            (Connecting | Open | Closing, ProbeEvent::Closed) => {
                self.state = Reconnecting;
                vec![ProbeAction::ScheduleReconnect]
            }
            (Connecting, ProbeEvent::ConnectTimeout) => {
                self.result.errors.push("Connection timeout".to_string());
                self.state = Resolved;
                vec![ProbeAction::Abort, ProbeAction::Resolve]
            }
            (Open, ProbeEvent::CloseDue) => {
                self.state = Closing;
                vec![ProbeAction::Close]
            }
            (Connecting, ProbeEvent::CloseDue) => {
                // Still connecting: the close is re-armed once the connection opens
                self.close_overdue = true;
                Vec::new()
            }
            (_, ProbeEvent::SideChannelFailed(description)) => {
                self.result.errors.push(format!("Broadcast trigger failed: {}", description));
                Vec::new()
            }
            (Reconnecting, ProbeEvent::ReconnectOpened) => self.finish_reconnect(None),
            (Reconnecting, ProbeEvent::ReconnectFailed(reason)) => self.finish_reconnect(Some(reason)),
            _ => Vec::new(),
        }
    }

    fn handle_sse(&mut self, event: ProbeEvent) -> Vec<ProbeAction> {
        use ProbeState::*;

        match (self.state, event) {
            (Connecting, ProbeEvent::Opened { elapsed_ms }) => {
                self.mark_open(elapsed_ms);
                vec![ProbeAction::TriggerBroadcast, ProbeAction::ArmObservationWindow]
            }
            (Open, ProbeEvent::Message { payload, received_at_ms }) => {
                self.record_message(&payload, received_at_ms);
                Vec::new()
            }
            (Connecting | Open, ProbeEvent::Error(detail)) => self.sse_connection_lost(&detail),
            (Connecting | Open, ProbeEvent::Closed) => self.sse_connection_lost("stream closed by server"),
            (Open, ProbeEvent::CloseDue) => {
                self.state = Resolved;
                vec![ProbeAction::Close, ProbeAction::Resolve]
            }
            (Connecting | Reconnecting, ProbeEvent::HardTimeout) => {
                self.result.errors.push("Test timeout".to_string());
                self.state = Resolved;
                vec![ProbeAction::Abort, ProbeAction::Resolve]
            }
            (_, ProbeEvent::SideChannelFailed(description)) => {
                self.result.errors.push(format!("Broadcast trigger failed: {}", description));
                Vec::new()
            }
            (Reconnecting, ProbeEvent::ReconnectOpened) => self.finish_reconnect(None),
            (Reconnecting, ProbeEvent::ReconnectFailed(reason)) => self.finish_reconnect(Some(reason)),
            _ => Vec::new(),
        }
    }

    fn mark_open(&mut self, elapsed_ms: f64) {
        self.result.connection_success = true;
        self.result.connection_time_ms = Some(elapsed_ms);
        self.state = ProbeState::Open;
    }

    fn record_message(&mut self, payload: &str, received_at_ms: f64) {
        self.messages_received += 1;
        match latency_from_payload(payload, received_at_ms) {
            Ok(latency) => self.result.message_latencies.push(latency),
            Err(e) => self.result.errors.push(format!("Message parse error: {}", e)),
        }
    }

    fn sse_connection_lost(&mut self, detail: &str) -> Vec<ProbeAction> {
        self.result.errors.push(format!("SSE connection error: {}", detail));
        self.state = ProbeState::Reconnecting;
        vec![ProbeAction::Abort, ProbeAction::ScheduleReconnect]
    }

    fn finish_reconnect(&mut self, failure: Option<String>) -> Vec<ProbeAction> {
        match failure {
            None => self.result.reconnect_success = true,
            Some(reason) => self.result.errors.push(format!("Reconnect failed: {}", reason)),
        }
        self.state = ProbeState::Resolved;
        vec![ProbeAction::Resolve]
    }
}
