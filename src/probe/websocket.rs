//! WebSocket probe driver

use super::machine::{ProbeAction, ProbeEvent, ProbeMachine};
use super::message::{now_epoch_ms, PingMessage};
use super::{elapsed_ms, spawn_timer, EventSender, ProbeTasks, ProbeTimings};
use crate::logging::ProbeLogger;
use crate::models::{EnvironmentConfig, ProbeResult, ProxyConfig};
use crate::transport::{connect_websocket, WsStream};
use crate::types::{AppError, Protocol, Result};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

/// Commands from the driver to the connection task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionCommand {
    SendPing,
    Close,
}

/// WebSocket endpoint for a server base URL: `http` becomes `ws`, `https` becomes `wss`
pub fn websocket_url(base_url: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let rewritten = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        return Err(AppError::validation(format!("Server URL must use http:// or https://: {}", base_url)));
    };

    Ok(format!("{}/ws", rewritten))
}

/// Probe WebSocket support of `base_url` under `environment`
///
/// Connects to `/ws`, sends one ping, records the latency of every text
/// message, closes the connection after the forced-close delay and makes a
/// single reconnection attempt once the connection has ended. A connection
/// opening after the forced-close delay gets the same delay again from its open.
pub async fn run_websocket_probe(
    base_url: &str,
    environment: &EnvironmentConfig,
    timings: &ProbeTimings,
    logger: &ProbeLogger,
) -> ProbeResult {
    let protocol = Protocol::WebSocket;
    let env_name = environment.name.as_str();

    let url = match websocket_url(base_url) {
        Ok(url) => url,
        Err(e) => {
            logger.log_error(&e, "WebSocket probe not started").await;
            let mut result = ProbeResult::new();
            result.errors.push(e.to_string());
            return result;
        }
    };
    logger.log_attempt(protocol, env_name, &url).await;

    let (events, mut inbox) = mpsc::unbounded_channel();
    let (commands, command_rx) = mpsc::unbounded_channel();
    let mut machine = ProbeMachine::new(protocol);
    let mut tasks = ProbeTasks::default();
    let started = Instant::now();

    tasks.set_connection(tokio::spawn(connection_task(
        url.clone(),
        environment.proxy.clone(),
        started,
        timings.close_wait,
        events.clone(),
        command_rx,
    )));
    tasks.push(spawn_timer(environment.timeout(), &events, ProbeEvent::ConnectTimeout));
    tasks.push(spawn_timer(timings.forced_close_after, &events, ProbeEvent::CloseDue));

    while let Some(event) = inbox.recv().await {
        log_event(logger, env_name, &event).await;

        for action in machine.handle(event) {
            match action {
                ProbeAction::SendPing => {
                    let _ = commands.send(ConnectionCommand::SendPing);
                }
                ProbeAction::Close => {
                    let _ = commands.send(ConnectionCommand::Close);
                }
                ProbeAction::Abort => tasks.abort_connection(),
                ProbeAction::ScheduleReconnect => tasks.push(tokio::spawn(reconnect_task(
                    url.clone(),
                    environment.proxy.clone(),
                    timings.reconnect_grace,
                    environment.timeout(),
                    events.clone(),
                ))),
                ProbeAction::ArmObservationWindow => {
                    tasks.push(spawn_timer(timings.forced_close_after, &events, ProbeEvent::CloseDue))
                }
                ProbeAction::Resolve | ProbeAction::TriggerBroadcast => {}
            }
        }

        if machine.is_resolved() {
            break;
        }
    }

    drop(tasks);
    let result = machine.into_result();
    logger.log_complete(protocol, env_name, &result).await;
    result
}

async fn log_event(logger: &ProbeLogger, environment: &str, event: &ProbeEvent) {
    let protocol = Protocol::WebSocket;
    match event {
        ProbeEvent::Opened { elapsed_ms } => logger.log_open(protocol, environment, *elapsed_ms).await,
        ProbeEvent::Message { payload, .. } => logger.log_message(protocol, environment, payload.len()).await,
        ProbeEvent::Error(detail) => logger.log_failure(protocol, environment, detail).await,
        ProbeEvent::ConnectTimeout => logger.log_failure(protocol, environment, "connection timeout").await,
        ProbeEvent::ReconnectOpened => logger.log_reconnect(protocol, environment, true).await,
        ProbeEvent::ReconnectFailed(_) => logger.log_reconnect(protocol, environment, false).await,
        _ => {}
    }
}

/// Own the primary connection for its whole life
///
/// Always ends with `Closed`, except when aborted by the driver.
async fn connection_task(
    url: String,
    proxy: Option<ProxyConfig>,
    started: Instant,
    close_wait: Duration,
    events: EventSender,
    mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
) {
    let mut ws = match connect_websocket(&url, proxy.as_ref()).await {
        Ok(ws) => ws,
        Err(e) => {
            let _ = events.send(ProbeEvent::Error(e.to_string()));
            let _ = events.send(ProbeEvent::Closed);
            return;
        }
    };
    let _ = events.send(ProbeEvent::Opened { elapsed_ms: elapsed_ms(started) });

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ConnectionCommand::SendPing) => {
                    if let Err(e) = send_ping(&mut ws).await {
                        let _ = events.send(ProbeEvent::Error(e.to_string()));
                    }
                }
                Some(ConnectionCommand::Close) => {
                    close_gracefully(&mut ws, close_wait, &events).await;
                    break;
                }
                None => break,
            },
            frame = ws.next() => {
                if !forward_frame(frame, &events) {
                    break;
                }
            }
        }
    }

    let _ = events.send(ProbeEvent::Closed);
}

async fn send_ping(ws: &mut WsStream) -> Result<()> {
    let json = PingMessage::new().to_json()?;
    ws.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Forward one inbound frame; returns false once the connection has ended
fn forward_frame(
    frame: Option<std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>,
    events: &EventSender,
) -> bool {
    match frame {
        Some(Ok(Message::Text(text))) => {
            let _ = events.send(ProbeEvent::Message {
                payload: text.as_str().to_string(),
                received_at_ms: now_epoch_ms(),
            });
            true
        }
        Some(Ok(Message::Close(_))) | None => false,
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            let _ = events.send(ProbeEvent::Error(AppError::from(e).to_string()));
            false
        }
    }
}

/// Start the close handshake and keep delivering messages until it completes
async fn close_gracefully(ws: &mut WsStream, close_wait: Duration, events: &EventSender) {
    if ws.close(None).await.is_err() {
        return;
    }

    let drain = async {
        while forward_frame(ws.next().await, events) {}
    };
    let _ = tokio::time::timeout(close_wait, drain).await;
}

/// Wait the grace delay, then make the single reconnection attempt
async fn reconnect_task(
    url: String,
    proxy: Option<ProxyConfig>,
    grace: Duration,
    timeout: Duration,
    events: EventSender,
) {
    tokio::time::sleep(grace).await;

    match tokio::time::timeout(timeout, connect_websocket(&url, proxy.as_ref())).await {
        Ok(Ok(mut ws)) => {
            // The driver resolves on this event and aborts the task, so close first
            let _ = tokio::time::timeout(timeout, ws.close(None)).await;
            let _ = events.send(ProbeEvent::ReconnectOpened);
        }
        Ok(Err(e)) => {
            let _ = events.send(ProbeEvent::ReconnectFailed(e.to_string()));
        }
        Err(_) => {
            let _ = events.send(ProbeEvent::ReconnectFailed(format!(
                "no connection within {}ms",
                timeout.as_millis()
            )));
        }
    }
}
