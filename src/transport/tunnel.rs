//! WebSocket connections, optionally through an HTTP `CONNECT` proxy tunnel
//!
//! The leg to the proxy follows the proxy's scheme: plain TCP for `http`
//! proxies, TLS for `https` proxies. TLS toward a `wss://` target runs inside
//! the tunnel either way.

use crate::models::ProxyConfig;
use crate::types::{AppError, ProxyScheme, Result};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// WebSocket stream returned for both direct and tunneled connections
pub type WsStream = WebSocketStream<MaybeTlsStream<TunnelStream>>;

/// Upper bound on the size of a proxy's `CONNECT` response head
const MAX_CONNECT_RESPONSE: usize = 8 * 1024;

/// Byte stream under a WebSocket: a direct socket, a plain tunnel or a tunnel
/// through a TLS session with the proxy
#[derive(Debug)]
pub enum TunnelStream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl AsyncRead for TunnelStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_read(cx, buf),
            Self::Tls(tls) => Pin::new(tls.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TunnelStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_write(cx, buf),
            Self::Tls(tls) => Pin::new(tls.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_flush(cx),
            Self::Tls(tls) => Pin::new(tls.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_shutdown(cx),
            Self::Tls(tls) => Pin::new(tls.as_mut()).poll_shutdown(cx),
        }
    }
}

/// TLS client settings for the leg to an `https` proxy
#[derive(Clone)]
pub struct ProxyTls {
    connector: TlsConnector,
}

impl ProxyTls {
    /// Trust the bundled web PKI roots
    pub fn webpki() -> Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(roots)
    }

    /// Trust only the given certificates
    pub fn trusting<I>(certificates: I) -> Result<Self>
    where
        I: IntoIterator<Item = CertificateDer<'static>>,
    {
        let mut roots = RootCertStore::empty();
        for certificate in certificates {
            roots
                .add(certificate)
                .map_err(|e| AppError::config(format!("Invalid proxy CA certificate: {}", e)))?;
        }
        Self::with_roots(roots)
    }

    fn with_roots(roots: RootCertStore) -> Result<Self> {
        let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| AppError::internal(format!("TLS setup failed: {}", e)))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self { connector: TlsConnector::from(Arc::new(config)) })
    }

    async fn handshake(&self, proxy: &ProxyConfig, tcp: TcpStream) -> Result<TunnelStream> {
        let server_name = ServerName::try_from(proxy.host.clone())
            .map_err(|e| AppError::config(format!("Invalid proxy host {}: {}", proxy.host, e)))?;

        let tls = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| AppError::network(format!("TLS handshake with proxy {} failed: {}", proxy, e)))?;

        Ok(TunnelStream::Tls(Box::new(tls)))
    }
}

impl std::fmt::Debug for ProxyTls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyTls").finish_non_exhaustive()
    }
}

/// Open a WebSocket to `url`, through `proxy` when given
///
/// An `https` proxy's certificate is checked against the web PKI roots.
pub async fn connect_websocket(url: &str, proxy: Option<&ProxyConfig>) -> Result<WsStream> {
    let stream = open_stream(url, proxy, None).await?;
    handshake_websocket(url, stream).await
}

/// Open a WebSocket to `url`, using `proxy_tls` for the leg to an `https` proxy
pub async fn connect_websocket_with(url: &str, proxy: Option<&ProxyConfig>, proxy_tls: &ProxyTls) -> Result<WsStream> {
    let stream = open_stream(url, proxy, Some(proxy_tls)).await?;
    handshake_websocket(url, stream).await
}

async fn open_stream(url: &str, proxy: Option<&ProxyConfig>, proxy_tls: Option<&ProxyTls>) -> Result<TunnelStream> {
    let target = target_authority(url)?;
    match proxy {
        None => TcpStream::connect(&target)
            .await
            .map(TunnelStream::Plain)
            .map_err(|e| AppError::network(format!("Connection to {} failed: {}", target, e))),
        Some(proxy) => match (proxy.scheme, proxy_tls) {
            (ProxyScheme::Https, Some(tls)) => open_tls_tunnel(proxy, &target, tls).await,
            (ProxyScheme::Https, None) => open_tls_tunnel(proxy, &target, &ProxyTls::webpki()?).await,
            (ProxyScheme::Http, _) => open_tunnel(proxy, &target).await.map(TunnelStream::Plain),
        },
    }
}

async fn handshake_websocket(url: &str, stream: TunnelStream) -> Result<WsStream> {
    let (ws, _response) = tokio_tungstenite::client_async_tls(url, stream).await?;
    Ok(ws)
}

/// `host:port` of a `ws://` or `wss://` URL, with the scheme's default port filled in
pub fn target_authority(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::parse(format!("WebSocket URL has no host: {}", url)))?;
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| AppError::parse(format!("WebSocket URL has no port: {}", url)))?;

    // IPv6 literals keep their brackets
    Ok(format!("{}:{}", host, port))
}

async fn connect_proxy(proxy: &ProxyConfig) -> Result<TcpStream> {
    TcpStream::connect(proxy.authority())
        .await
        .map_err(|e| AppError::network(format!("Proxy {} unreachable: {}", proxy, e)))
}

/// Ask a plain `http` proxy to open a tunnel to `target` and return the connected socket
pub async fn open_tunnel(proxy: &ProxyConfig, target: &str) -> Result<TcpStream> {
    let mut tcp = connect_proxy(proxy).await?;
    request_tunnel(&mut tcp, proxy, target).await?;
    Ok(tcp)
}

/// Same as [`open_tunnel`], with the `CONNECT` exchange inside a TLS session with the proxy
pub async fn open_tls_tunnel(proxy: &ProxyConfig, target: &str, proxy_tls: &ProxyTls) -> Result<TunnelStream> {
    let tcp = connect_proxy(proxy).await?;
    let mut stream = proxy_tls.handshake(proxy, tcp).await?;
    request_tunnel(&mut stream, proxy, target).await?;
    Ok(stream)
}

async fn request_tunnel<S>(stream: &mut S, proxy: &ProxyConfig, target: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = format!(
        "CONNECT {target} HTTP/1.1\r\nHost: {target}\r\nUser-Agent: {agent}\r\nProxy-Connection: keep-alive\r\n\r\n",
        target = target,
        agent = super::user_agent(),
    );
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let head = read_response_head(stream).await?;
    let status = parse_status_code(&head)?;
    if !(200..300).contains(&status) {
        return Err(AppError::network(format!(
            "Proxy {} refused tunnel to {} with HTTP {}",
            proxy, target, status
        )));
    }

    Ok(())
}

/// Read up to and including the blank line ending the response head
///
/// Reads one byte at a time so nothing past the head is consumed; the bytes
/// after it belong to the tunneled connection.
async fn read_response_head<S: AsyncRead + Unpin>(stream: &mut S) -> Result<String> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];

    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_CONNECT_RESPONSE {
            return Err(AppError::protocol("Proxy CONNECT response head too large"));
        }
        let read = stream.read(&mut byte).await?;
        if read == 0 {
            return Err(AppError::network("Proxy closed the connection during CONNECT"));
        }
        head.push(byte[0]);
    }

    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Status code from an HTTP/1.x status line
pub fn parse_status_code(head: &str) -> Result<u16> {
    let status_line = head.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();

    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/1.") => code
            .parse()
            .map_err(|_| AppError::protocol(format!("Invalid proxy status line: {}", status_line))),
        _ => Err(AppError::protocol(format!("Invalid proxy status line: {}", status_line))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[test]
    fn test_target_authority_defaults() {
        assert_eq!(target_authority("ws://localhost:3000/ws").unwrap(), "localhost:3000");
        assert_eq!(target_authority("ws://example.com/ws").unwrap(), "example.com:80");
        assert_eq!(target_authority("wss://example.com/ws").unwrap(), "example.com:443");
        assert_eq!(target_authority("ws://[::1]:9000/ws").unwrap(), "[::1]:9000");
        assert!(target_authority("not a url").is_err());
    }

    #[test]
    fn test_parse_status_code() {
        assert_eq!(parse_status_code("HTTP/1.1 200 Connection established\r\n\r\n").unwrap(), 200);
        assert_eq!(parse_status_code("HTTP/1.0 407 Proxy Authentication Required\r\n").unwrap(), 407);
        assert!(parse_status_code("SSH-2.0-OpenSSH\r\n").is_err());
        assert!(parse_status_code("").is_err());
    }

    async fn fake_proxy(response: &'static str) -> (ProxyConfig, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        (ProxyConfig::new(ProxyScheme::Http, "127.0.0.1", port), handle)
    }

    #[tokio::test]
    async fn test_tunnel_established() {
        let (proxy, handle) = fake_proxy("HTTP/1.1 200 Connection established\r\n\r\n").await;

        let tunnel = open_tunnel(&proxy, "example.com:80").await;
        assert!(tunnel.is_ok());

        let request = handle.await.unwrap();
        assert!(request.starts_with("CONNECT example.com:80 HTTP/1.1\r\n"));
        assert!(request.contains("Host: example.com:80\r\n"));
    }

    #[tokio::test]
    async fn test_tunnel_refused() {
        let (proxy, _handle) = fake_proxy("HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n").await;

        let err = open_tunnel(&proxy, "example.com:80").await.unwrap_err();
        assert_eq!(err.category(), "NETWORK");
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_unreachable_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let proxy = ProxyConfig::new(ProxyScheme::Http, "127.0.0.1", port);
        assert!(open_tunnel(&proxy, "example.com:80").await.is_err());
    }

    #[tokio::test]
    async fn test_https_proxy_leg_starts_with_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let first_byte = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut byte = [0u8; 1];
            socket.read_exact(&mut byte).await.unwrap();
            byte[0]
        });

        let proxy = ProxyConfig::new(ProxyScheme::Https, "127.0.0.1", port);
        let tls = ProxyTls::webpki().unwrap();
        let attempt = open_tls_tunnel(&proxy, "example.com:80", &tls);
        let _ = tokio::time::timeout(Duration::from_secs(2), attempt).await;

        // 0x16 opens a TLS handshake record; a plaintext CONNECT would start with 'C'
        assert_eq!(first_byte.await.unwrap(), 0x16);
    }

    #[tokio::test]
    async fn test_http_proxy_leg_stays_plaintext() {
        let (proxy, handle) = fake_proxy("HTTP/1.1 200 Connection established\r\n\r\n").await;

        let stream = open_stream("ws://example.com/ws", Some(&proxy), None).await.unwrap();
        assert!(matches!(stream, TunnelStream::Plain(_)));
        assert!(handle.await.unwrap().starts_with("CONNECT example.com:80"));
    }

    #[test]
    fn test_trusting_rejects_garbage_certificate() {
        let err = ProxyTls::trusting([CertificateDer::from(vec![1u8, 2, 3])]).unwrap_err();
        assert_eq!(err.category(), "CONFIG");
    }
}
