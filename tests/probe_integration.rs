//! Probe integration tests against local servers
//!
//! WebSocket probes run against an in-process `tokio-tungstenite` echo server,
//! optionally behind a minimal `CONNECT` proxy spoken to in plain TCP or TLS.
//! SSE probes run against `wiremock` and against a raw TCP server that keeps
//! the stream open.

use futures::{SinkExt, StreamExt};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use transport_compat_tester::{
    logging::ProbeLogger,
    models::{EnvironmentConfig, ProxyConfig},
    run_sse_probe, run_websocket_probe,
    transport::{connect_websocket, connect_websocket_with, ProxyTls},
    types::ProxyScheme,
    ProbeTimings,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_timings() -> ProbeTimings {
    ProbeTimings {
        forced_close_after: Duration::from_millis(300),
        reconnect_grace: Duration::from_millis(50),
        sse_timeout_extension: Duration::from_millis(1000),
        sse_observation_window: Duration::from_millis(300),
        close_wait: Duration::from_millis(200),
    }
}

fn environment(proxy: Option<ProxyConfig>) -> EnvironmentConfig {
    EnvironmentConfig {
        name: "local".to_string(),
        description: "Local test server".to_string(),
        proxy,
        timeout_ms: 2000,
        delay_ms: None,
    }
}

fn echo_ws_url(base: &str) -> String {
    format!("{}/ws", base.replacen("http://", "ws://", 1))
}

/// Base URL of a local port nobody listens on
async fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// WebSocket server echoing every text frame back unchanged
async fn start_echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() && ws.send(message).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    format!("http://{}", addr)
}

/// WebSocket echo server that counts the close frames it receives
async fn start_close_counting_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let closes = Arc::new(AtomicUsize::new(0));
    let counter = closes.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        counter.fetch_add(1, Ordering::SeqCst);
                    } else if message.is_text() && ws.send(message).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (format!("http://{}", addr), closes)
}

/// Read an HTTP request head from `stream`
async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&head).to_string()
}

/// Forward proxy that only understands `CONNECT`
async fn start_connect_proxy() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut client, _)) = listener.accept().await {
            tokio::spawn(async move {
                let head = read_head(&mut client).await;
                let target = head.split_whitespace().nth(1).unwrap_or_default().to_string();
                let Ok(mut upstream) = TcpStream::connect(&target).await else {
                    let _ = client.write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n").await;
                    return;
                };
                let _ = client.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n").await;
                let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
            });
        }
    });

    port
}

/// `CONNECT` proxy behind TLS with a self-signed `localhost` certificate
///
/// Returns the proxy port and the certificate clients need to trust.
async fn start_tls_connect_proxy() -> (u16, CertificateDer<'static>) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let certificate = cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![certificate.clone()], key)
        .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(mut client) = acceptor.accept(tcp).await else {
                    return;
                };
                let head = read_head(&mut client).await;
                let target = head.split_whitespace().nth(1).unwrap_or_default().to_string();
                let Ok(mut upstream) = TcpStream::connect(&target).await else {
                    let _ = client.write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n").await;
                    let _ = client.flush().await;
                    return;
                };
                let _ = client.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n").await;
                let _ = client.flush().await;
                let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
            });
        }
    });

    (port, certificate)
}

/// Server that accepts TCP connections and never answers the upgrade request
async fn start_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    format!("http://{}", addr)
}

/// SSE server that sends one event and then holds the stream open
async fn start_holding_sse_server(timestamp_ms: u64) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let head = read_head(&mut stream).await;
                if head.starts_with("POST") {
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}")
                        .await;
                    return;
                }

                let event = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\n\r\n\
                     data: {{\"timestamp\":{},\"content\":\"hello\",\"message_type\":\"Broadcast\"}}\n\n",
                    timestamp_ms
                );
                let _ = stream.write_all(event.as_bytes()).await;
                tokio::time::sleep(Duration::from_secs(10)).await;
            });
        }
    });

    format!("http://{}", addr)
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

#[tokio::test]
async fn test_websocket_probe_against_echo_server() {
    let base = start_echo_server().await;
    let result = run_websocket_probe(&base, &environment(None), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(result.connection_success, "errors: {:?}", result.errors);
    assert!(result.connection_time_ms.unwrap() >= 0.0);
    assert_eq!(result.message_latencies.len(), 1);
    assert!(result.message_latencies[0] < 2000.0);
    assert!(result.reconnect_success, "errors: {:?}", result.errors);
}

#[tokio::test]
async fn test_websocket_probe_through_connect_proxy() {
    let base = start_echo_server().await;
    let proxy = ProxyConfig::new(ProxyScheme::Http, "127.0.0.1", start_connect_proxy().await);

    let result = run_websocket_probe(&base, &environment(Some(proxy)), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(result.connection_success, "errors: {:?}", result.errors);
    assert_eq!(result.message_latencies.len(), 1);
    assert!(result.reconnect_success);
}

#[tokio::test]
async fn test_websocket_probe_against_closed_port() {
    let base = closed_base_url().await;
    let result = run_websocket_probe(&base, &environment(None), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(!result.connection_success);
    assert!(result.connection_time_ms.is_none());
    assert!(result.message_latencies.is_empty());
    assert!(!result.reconnect_success);
    assert!(result.errors.iter().any(|e| e.starts_with("Reconnect failed")));
}

#[tokio::test]
async fn test_websocket_through_tls_connect_proxy() {
    let url = echo_ws_url(&start_echo_server().await);
    let (port, certificate) = start_tls_connect_proxy().await;
    let proxy = ProxyConfig::new(ProxyScheme::Https, "localhost", port);
    let proxy_tls = ProxyTls::trusting([certificate]).unwrap();

    let mut ws = connect_websocket_with(&url, Some(&proxy), &proxy_tls).await.unwrap();
    ws.send(Message::Text("over tls".into())).await.unwrap();
    let reply = ws.next().await.unwrap().unwrap();
    assert_eq!(reply.into_text().unwrap().as_str(), "over tls");
}

#[tokio::test]
async fn test_untrusted_tls_proxy_fails_the_handshake() {
    let url = echo_ws_url(&start_echo_server().await);
    let (port, _certificate) = start_tls_connect_proxy().await;
    let proxy = ProxyConfig::new(ProxyScheme::Https, "localhost", port);

    let err = connect_websocket(&url, Some(&proxy)).await.unwrap_err();
    assert!(err.to_string().contains("TLS handshake"), "{}", err);
}

#[tokio::test]
async fn test_websocket_probe_times_out_on_silent_server() {
    let base = start_silent_server().await;
    let mut short_timeout = environment(None);
    short_timeout.timeout_ms = 600;

    let started = std::time::Instant::now();
    let result = run_websocket_probe(&base, &short_timeout, &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(!result.connection_success);
    assert!(result.connection_time_ms.is_none());
    assert_eq!(result.errors, vec!["Connection timeout".to_string()]);
    assert!(!result.reconnect_success);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_websocket_probe_closes_both_connections() {
    let (base, closes) = start_close_counting_server().await;
    let result = run_websocket_probe(&base, &environment(None), &fast_timings(), &ProbeLogger::quiet()).await;
    assert!(result.reconnect_success, "errors: {:?}", result.errors);

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while closes.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_websocket_probe_through_dead_proxy() {
    let base = start_echo_server().await;
    let dead_proxy_port = closed_base_url().await.rsplit(':').next().unwrap().parse().unwrap();
    let proxy = ProxyConfig::new(ProxyScheme::Http, "127.0.0.1", dead_proxy_port);

    let result = run_websocket_probe(&base, &environment(Some(proxy)), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(!result.connection_success);
    assert!(!result.errors.is_empty());
}

#[tokio::test]
async fn test_sse_probe_with_stream_closed_by_server() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {{\"timestamp\":{},\"content\":\"hello\"}}\n\ndata: not json\n\n",
        now_ms()
    );
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "sent"})))
        .mount(&server)
        .await;

    let result = run_sse_probe(&server.uri(), &environment(None), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(result.connection_success);
    assert_eq!(result.message_latencies.len(), 1);
    assert!(result.errors.iter().any(|e| e.starts_with("Message parse error")));
    assert!(result
        .errors
        .iter()
        .any(|e| e == "SSE connection error: stream closed by server"));
    assert!(result.reconnect_success);
}

#[tokio::test]
async fn test_sse_probe_rejects_wrong_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
        .mount(&server)
        .await;

    let result = run_sse_probe(&server.uri(), &environment(None), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(!result.connection_success);
    assert!(!result.reconnect_success);
    assert!(result.errors[0].starts_with("SSE connection error"));
    assert!(result.errors.iter().any(|e| e.starts_with("Reconnect failed")));
}

#[tokio::test]
async fn test_sse_probe_observation_window_ends_open_stream() {
    let base = start_holding_sse_server(now_ms()).await;

    let started = std::time::Instant::now();
    let result = run_sse_probe(&base, &environment(None), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(result.connection_success, "errors: {:?}", result.errors);
    assert_eq!(result.message_latencies.len(), 1);
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert!(!result.reconnect_success);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_sse_probe_survives_failing_broadcast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(": keep-alive\n\n", "text/event-stream"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = run_sse_probe(&server.uri(), &environment(None), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(result.connection_success);
    assert!(result.message_latencies.is_empty());
    assert!(result.reconnect_success);
}

#[tokio::test]
async fn test_sse_probe_against_closed_port() {
    let base = closed_base_url().await;
    let result = run_sse_probe(&base, &environment(None), &fast_timings(), &ProbeLogger::quiet()).await;

    assert!(!result.connection_success);
    assert!(result.connection_time_ms.is_none());
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].starts_with("SSE connection error"));
    assert!(result.errors[1].starts_with("Reconnect failed"));
}
