//! Common test helpers for checkmate-probes integration tests
//!
//! Provides:
//! - Local TCP servers that echo, reply from a script or stay silent
//! - wiremock helpers for HTTP endpoints
//! - An HTTPS server whose certificate is signed by a test CA

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ─── TCP Servers ─────────────────────────────────────────────────────────────

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a server that writes every message it reads straight back
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                if let Ok(n) = socket.read(&mut buffer).await {
                    let _ = socket.write_all(&buffer[..n]).await;
                }
            });
        }
    });
    addr
}

/// Start a server that answers the n-th connection with `replies[n]`,
/// repeating the last reply once the script runs out
pub async fn spawn_scripted_server(replies: Vec<&'static str>) -> SocketAddr {
    let (listener, addr) = bind().await;
    let served = Arc::new(AtomicUsize::new(0));
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let index = served.fetch_add(1, Ordering::SeqCst).min(replies.len() - 1);
            let reply = replies[index];
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let _ = socket.write_all(reply.as_bytes()).await;
            });
        }
    });
    addr
}

/// Start a server that accepts connections and reads, but never replies
pub async fn spawn_silent_server() -> SocketAddr {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                while let Ok(n) = socket.read(&mut buffer).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// An address nothing listens on
pub async fn closed_port() -> SocketAddr {
    let (listener, addr) = bind().await;
    drop(listener);
    addr
}

// ─── HTTP Mocks ──────────────────────────────────────────────────────────────

/// Mount a GET endpoint at `route` returning `status` with a JSON body
pub async fn mock_json(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "application/json")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Mount an endpoint that answers `failures` times with 503, then with 200
pub async fn mock_flaky(server: &MockServer, route: &str, failures: u64, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(failures)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

// ─── TLS Server ──────────────────────────────────────────────────────────────

/// CA that signed the HTTPS test server certificate (valid for `localhost`
/// and `127.0.0.1`)
pub const TEST_CA_PEM: &str = include_str!("../fixtures/tls/ca.pem");

const SERVER_CERT_PEM: &[u8] = include_bytes!("../fixtures/tls/server.pem");
const SERVER_KEY_PEM: &[u8] = include_bytes!("../fixtures/tls/server.key");

fn tls_acceptor() -> TlsAcceptor {
    let certs = CertificateDer::pem_slice_iter(SERVER_CERT_PEM)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = PrivateKeyDer::from_pem_slice(SERVER_KEY_PEM).unwrap();

    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Start an HTTPS server answering every request with 200 and `body`
pub async fn spawn_https_server(body: &'static str) -> SocketAddr {
    let (listener, addr) = bind().await;
    let acceptor = tls_acceptor();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // Clients that reject the certificate abort the handshake
                let Ok(mut stream) = acceptor.accept(socket).await else {
                    return;
                };

                let mut request = Vec::new();
                let mut buffer = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buffer).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buffer[..n]),
                    }
                }

                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}
