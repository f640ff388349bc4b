//! Server-Sent Events stream decoding
//!
//! [`SseDecoder`] turns raw body chunks into events following the
//! `text/event-stream` line format: `data`, `event`, `id` and `retry` fields,
//! `:` comment lines, and a blank line dispatching the pending event. Chunk
//! boundaries may fall anywhere, including inside a UTF-8 sequence.

use crate::types::{AppError, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use std::collections::VecDeque;
use std::time::Duration;

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field; `None` means the default `message` type
    pub event: Option<String>,
    /// Concatenated `data:` lines joined with `\n`
    pub data: String,
    /// Last event ID seen on the stream
    pub id: Option<String>,
    /// Reconnection time requested by the server, in milliseconds
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Event type, with the default applied
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: String,
    event: Option<String>,
    last_id: Option<String>,
    retry: Option<u64>,
    started: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk and return every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Number of buffered bytes not yet terminated by a newline
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = if self.started {
            line
        } else {
            self.started = true;
            line.strip_prefix('\u{feff}').unwrap_or(line)
        };

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(retry) = value.parse() {
                    self.retry = Some(retry);
                }
            }
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        Some(SseEvent {
            event: event.filter(|e| !e.is_empty()),
            data,
            id: self.last_id.clone(),
            retry: self.retry,
        })
    }
}

/// Open event stream over an HTTP response body
pub struct SseStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
}

impl SseStream {
    /// Next event; `None` once the server ends the stream
    pub async fn next_event(&mut self) -> Option<Result<SseEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }

            match self.body.next().await? {
                Ok(chunk) => self.pending.extend(self.decoder.push(&chunk)),
                Err(e) => return Some(Err(AppError::network(format!("SSE stream read failed: {}", e)))),
            }
        }
    }
}

/// `GET` an event stream and wait for its response head
///
/// The request fails when no response arrives within `open_timeout`, on a
/// non-2xx status, or when the body is not `text/event-stream`.
pub async fn open_sse_stream(client: &Client, url: &str, open_timeout: Duration) -> Result<SseStream> {
    let request = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send();

    let response = tokio::time::timeout(open_timeout, request)
        .await
        .map_err(|_| AppError::timeout(format!("No response from {} within {}ms", url, open_timeout.as_millis())))??;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::protocol(format!("SSE endpoint {} returned HTTP {}", url, status)));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("text/event-stream") {
        return Err(AppError::protocol(format!(
            "SSE endpoint {} returned content type '{}'",
            url, content_type
        )));
    }

    let body = response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed();

    Ok(SseStream {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
    })
}
