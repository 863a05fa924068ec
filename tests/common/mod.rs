#![allow(dead_code)]

use pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rcgen::{CertificateParams, KeyPair};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

pub const OK: &str = "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
pub const CHUNKED: &str =
    "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
pub const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nnot found";
/// Promises more body than it sends, then hangs up.
pub const TRUNCATED: &str = "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshort";

pub fn redirect_to(location: &str) -> String {
    format!(
        "HTTP/1.1 301 Moved Permanently\r\nLocation: {}\r\nContent-Length: 5\r\n\r\nmoved",
        location
    )
}

/// Loopback HTTP/1.1 server answering every request on a connection with the
/// same canned response after `delay`.
pub struct TestServer {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start(response: impl Into<String>, delay: Duration) -> Self {
        Self::spawn(response.into(), delay, None).await
    }

    /// Same as [`start`](Self::start) but behind TLS with a self-signed
    /// certificate for `localhost`. Returns the certificate in PEM form.
    pub async fn start_tls(response: impl Into<String>, delay: Duration) -> (Self, String) {
        let (acceptor, pem) = self_signed_acceptor();
        (
            Self::spawn(response.into(), delay, Some(acceptor)).await,
            pem,
        )
    }

    async fn spawn(response: String, delay: Duration, tls: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let served = Arc::new(AtomicUsize::new(0));
        let response: Arc<str> = response.into();
        let (accept_count, serve_count) = (accepted.clone(), served.clone());

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                accept_count.fetch_add(1, Ordering::SeqCst);
                let tls = tls.clone();
                let response = response.clone();
                let served = serve_count.clone();
                tokio::spawn(async move {
                    match tls {
                        Some(acceptor) => {
                            if let Ok(stream) = acceptor.accept(stream).await {
                                serve(stream, &response, delay, &served).await;
                            }
                        }
                        None => serve(stream, &response, delay, &served).await,
                    }
                });
            }
        });

        Self {
            addr,
            accepted,
            served,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn https_url(&self, path: &str) -> String {
        format!("https://localhost:{}{}", self.addr.port(), path)
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Responses written so far.
    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

async fn serve<S>(mut stream: S, response: &str, delay: Duration, served: &AtomicUsize)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut pending = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&chunk[..n]);
        while let Some(end) = head_end(&pending) {
            pending.drain(..end);
            tokio::time::sleep(delay).await;
            if stream.write_all(response.as_bytes()).await.is_err() {
                return;
            }
            let _ = stream.flush().await;
            served.fetch_add(1, Ordering::SeqCst);
            if response.contains("Connection: close") {
                let _ = stream.shutdown().await;
                return;
            }
        }
    }
}

/// Offset just past the first `\r\n\r\n` in `buf`.
fn head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

fn self_signed_acceptor() -> (TlsAcceptor, String) {
    let key_pair = KeyPair::generate().unwrap();
    let cert = CertificateParams::new(vec!["localhost".to_string()])
        .unwrap()
        .self_signed(&key_pair)
        .unwrap();
    let pem = cert.pem();
    let cert_der: CertificateDer<'static> = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .unwrap();
    (TlsAcceptor::from(Arc::new(config)), pem)
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Loopback proxy relaying every connection to `upstream`, whatever host the
/// client asked for. `CONNECT` requests are answered with 200 before
/// relaying; anything else is passed through as received. The request head
/// of each connection is kept.
pub struct FakeProxy {
    pub addr: SocketAddr,
    heads: Arc<Mutex<Vec<String>>>,
}

impl FakeProxy {
    pub async fn start(upstream: SocketAddr) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let heads = Arc::new(Mutex::new(Vec::new()));
        let seen = heads.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let seen = seen.clone();
                tokio::spawn(relay(stream, upstream, seen));
            }
        });

        Self { addr, heads }
    }

    /// `http://user:secret@<addr>`
    pub fn url_with_credentials(&self) -> String {
        format!("http://user:secret@{}", self.addr)
    }

    /// First request head of every connection seen so far.
    pub fn heads(&self) -> Vec<String> {
        self.heads.lock().unwrap().clone()
    }
}

async fn relay(mut client: TcpStream, upstream: SocketAddr, seen: Arc<Mutex<Vec<String>>>) {
    let mut pending = Vec::new();
    let mut chunk = [0u8; 4096];
    let end = loop {
        match client.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
        }
        if let Some(end) = head_end(&pending) {
            break end;
        }
    };
    let head = String::from_utf8_lossy(&pending[..end]).into_owned();
    let tunnel = head.starts_with("CONNECT ");
    seen.lock().unwrap().push(head);

    let Ok(mut server) = TcpStream::connect(upstream).await else {
        return;
    };
    if tunnel {
        if client
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .await
            .is_err()
        {
            return;
        }
        pending.drain(..end);
    }
    if server.write_all(&pending).await.is_err() {
        return;
    }
    let _ = tokio::io::copy_bidirectional(&mut client, &mut server).await;
}

/// Value of header `name` in a raw request head, matched case-insensitively.
pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}
