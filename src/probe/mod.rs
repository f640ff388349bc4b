//! WebSocket and SSE probes
//!
//! A probe measures one protocol under one environment. Each probe is driven
//! by a [`machine::ProbeMachine`]; the drivers in [`websocket`] and [`sse`]
//! spawn one task per racing source (connection, timers, reconnect, side
//! channel), funnel their outcomes into a single event channel and execute
//! the actions the machine returns.

pub mod machine;
pub mod message;
pub mod sse;
pub mod websocket;

pub use machine::{ProbeAction, ProbeEvent, ProbeMachine, ProbeState};
pub use sse::run_sse_probe;
pub use websocket::run_websocket_probe;

use crate::defaults;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Fixed probe timings that do not depend on the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTimings {
    /// A WebSocket still open this long after the attempt started is closed
    pub forced_close_after: Duration,
    /// Delay between the primary connection ending and the reconnect attempt
    pub reconnect_grace: Duration,
    /// Added to the environment timeout to form the SSE hard timeout
    pub sse_timeout_extension: Duration,
    /// How long an open SSE stream is observed
    pub sse_observation_window: Duration,
    /// Longest wait for the close handshake after a forced close
    pub close_wait: Duration,
}

impl Default for ProbeTimings {
    fn default() -> Self {
        Self {
            forced_close_after: defaults::FORCED_CLOSE_AFTER,
            reconnect_grace: defaults::RECONNECT_GRACE,
            sse_timeout_extension: defaults::SSE_TIMEOUT_EXTENSION,
            sse_observation_window: defaults::SSE_OBSERVATION_WINDOW,
            close_wait: defaults::CLOSE_WAIT,
        }
    }
}

pub(crate) type EventSender = UnboundedSender<ProbeEvent>;

/// Tasks spawned for one probe; all are aborted when the set is dropped
#[derive(Default)]
pub(crate) struct ProbeTasks {
    connection: Option<JoinHandle<()>>,
    others: Vec<JoinHandle<()>>,
}

impl ProbeTasks {
    pub(crate) fn set_connection(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.connection.replace(handle) {
            previous.abort();
        }
    }

    /// Tear down the primary connection
    pub(crate) fn abort_connection(&mut self) {
        if let Some(handle) = self.connection.take() {
            handle.abort();
        }
    }

    pub(crate) fn push(&mut self, handle: JoinHandle<()>) {
        self.others.push(handle);
    }
}

impl Drop for ProbeTasks {
    fn drop(&mut self) {
        self.abort_connection();
        for handle in self.others.drain(..) {
            handle.abort();
        }
    }
}

/// Deliver `event` after `delay`
pub(crate) fn spawn_timer(delay: Duration, events: &EventSender, event: ProbeEvent) -> JoinHandle<()> {
    let events = events.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = events.send(event);
    })
}

/// Milliseconds elapsed since `start`, with sub-millisecond precision
pub(crate) fn elapsed_ms(start: tokio::time::Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
