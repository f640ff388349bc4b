//! SSE probe driver

use super::machine::{ProbeAction, ProbeEvent, ProbeMachine};
use super::message::{now_epoch_ms, BroadcastRequest};
use super::{elapsed_ms, spawn_timer, EventSender, ProbeTasks, ProbeTimings};
use crate::logging::ProbeLogger;
use crate::models::{EnvironmentConfig, ProbeResult};
use crate::transport::{build_http_client, open_sse_stream};
use crate::types::{AppError, Protocol};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Probe Server-Sent Events support of `base_url` under `environment`
///
/// Opens `/sse`, asks the server to broadcast through `POST /test`, records
/// the latency of every event during the observation window and makes a
/// single reconnection attempt if the stream fails or ends early.
pub async fn run_sse_probe(
    base_url: &str,
    environment: &EnvironmentConfig,
    timings: &ProbeTimings,
    logger: &ProbeLogger,
) -> ProbeResult {
    let protocol = Protocol::Sse;
    let env_name = environment.name.as_str();
    let base = base_url.trim_end_matches('/');
    let stream_url = format!("{}/sse", base);
    let trigger_url = format!("{}/test", base);

    let client = match build_http_client(environment) {
        Ok(client) => client,
        Err(e) => {
            logger.log_error(&e, "SSE probe not started").await;
            let mut result = ProbeResult::new();
            result.errors.push(format!("SSE connection error: {}", e));
            return result;
        }
    };
    logger.log_attempt(protocol, env_name, &stream_url).await;

    let (events, mut inbox) = mpsc::unbounded_channel();
    let mut machine = ProbeMachine::new(protocol);
    let mut tasks = ProbeTasks::default();
    let started = Instant::now();

    tasks.set_connection(tokio::spawn(stream_task(
        client.clone(),
        stream_url.clone(),
        environment.timeout(),
        started,
        events.clone(),
    )));
    tasks.push(spawn_timer(
        environment.timeout() + timings.sse_timeout_extension,
        &events,
        ProbeEvent::HardTimeout,
    ));

    while let Some(event) = inbox.recv().await {
        log_event(logger, env_name, &event).await;

        for action in machine.handle(event) {
            match action {
                ProbeAction::TriggerBroadcast => tasks.push(tokio::spawn(trigger_broadcast(
                    client.clone(),
                    trigger_url.clone(),
                    environment.timeout(),
                    events.clone(),
                ))),
                ProbeAction::ArmObservationWindow => {
                    tasks.push(spawn_timer(timings.sse_observation_window, &events, ProbeEvent::CloseDue))
                }
                ProbeAction::Close | ProbeAction::Abort => tasks.abort_connection(),
                ProbeAction::ScheduleReconnect => tasks.push(tokio::spawn(reconnect_task(
                    client.clone(),
                    stream_url.clone(),
                    timings.reconnect_grace,
                    environment.timeout(),
                    events.clone(),
                ))),
                ProbeAction::Resolve | ProbeAction::SendPing => {}
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
    let protocol = Protocol::Sse;
    match event {
        ProbeEvent::Opened { elapsed_ms } => logger.log_open(protocol, environment, *elapsed_ms).await,
        ProbeEvent::Message { payload, .. } => logger.log_message(protocol, environment, payload.len()).await,
        ProbeEvent::Error(detail) | ProbeEvent::SideChannelFailed(detail) => {
            logger.log_failure(protocol, environment, detail).await
        }
        ProbeEvent::HardTimeout => logger.log_failure(protocol, environment, "test timeout").await,
        ProbeEvent::ReconnectOpened => logger.log_reconnect(protocol, environment, true).await,
        ProbeEvent::ReconnectFailed(_) => logger.log_reconnect(protocol, environment, false).await,
        _ => {}
    }
}

/// Own the primary event stream until it fails, ends or is aborted
async fn stream_task(client: Client, url: String, open_timeout: Duration, started: Instant, events: EventSender) {
    let mut stream = match open_sse_stream(&client, &url, open_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = events.send(ProbeEvent::Error(e.to_string()));
            return;
        }
    };
    let _ = events.send(ProbeEvent::Opened { elapsed_ms: elapsed_ms(started) });

    loop {
        match stream.next_event().await {
            Some(Ok(event)) => {
                let _ = events.send(ProbeEvent::Message {
                    payload: event.data,
                    received_at_ms: now_epoch_ms(),
                });
            }
            Some(Err(e)) => {
                let _ = events.send(ProbeEvent::Error(e.to_string()));
                return;
            }
            None => {
                let _ = events.send(ProbeEvent::Closed);
                return;
            }
        }
    }
}

/// Ask the server to broadcast a message to every SSE client
async fn trigger_broadcast(client: Client, url: String, timeout: Duration, events: EventSender) {
    let request = client.post(&url).json(&BroadcastRequest::sse_probe()).timeout(timeout).send();

    let failure = match request.await {
        Ok(response) if response.status().is_success() => None,
        Ok(response) => Some(format!("HTTP {}", response.status())),
        Err(e) => Some(AppError::from(e).to_string()),
    };

    if let Some(reason) = failure {
        let _ = events.send(ProbeEvent::SideChannelFailed(reason));
    }
}

/// Wait the grace delay, then make the single reconnection attempt
async fn reconnect_task(client: Client, url: String, grace: Duration, open_timeout: Duration, events: EventSender) {
    tokio::time::sleep(grace).await;

    let event = match open_sse_stream(&client, &url, open_timeout).await {
        Ok(_stream) => ProbeEvent::ReconnectOpened,
        Err(e) => ProbeEvent::ReconnectFailed(e.to_string()),
    };
    let _ = events.send(event);
}
