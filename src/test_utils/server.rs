//! In-process HTTP server for resolver and downloader tests.
//!
//! Serves canned responses from a route table that can be changed while the
//! server is running, and counts requests per path. Every response closes
//! its connection, which keeps the handling to a single read and write.

use reqwest::Url;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone)]
struct Route {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

#[derive(Default)]
struct State {
    routes: HashMap<String, Route>,
    hits: HashMap<String, usize>,
}

/// A local HTTP/1.1 server bound to an ephemeral port.
///
/// The accept loop is aborted when the server is dropped.
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Bind to `127.0.0.1:0` and start serving.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = listener.local_addr().expect("test server address");
        let state = Arc::new(Mutex::new(State::default()));

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = serve(stream, state).await;
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).expect("valid test URL")
    }

    /// Serve `body` with `status` at `path`, replacing any previous route.
    pub fn route(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.insert(path, status, "text/html; charset=utf-8", body.into());
    }

    /// Serve an HTML page with status 200.
    pub fn html(&self, path: &str, body: &str) {
        self.route(path, 200, body);
    }

    /// Serve a binary file with status 200.
    pub fn file(&self, path: &str, bytes: Vec<u8>) {
        self.insert(path, 200, "application/zip", bytes);
    }

    /// Number of requests received for `path` (query string included).
    pub fn hits(&self, path: &str) -> usize {
        self.state.lock().expect("test server state").hits.get(path).copied().unwrap_or(0)
    }

    /// Total number of requests received.
    pub fn total_hits(&self) -> usize {
        self.state.lock().expect("test server state").hits.values().sum()
    }

    fn insert(&self, path: &str, status: u16, content_type: &'static str, body: Vec<u8>) {
        self.state.lock().expect("test server state").routes.insert(
            path.to_string(),
            Route {
                status,
                content_type,
                body,
            },
        );
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buffer = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = stream.read(&mut buffer).await?;
        if read == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buffer[..read]);
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

    let route = {
        let mut state = state.lock().expect("test server state");
        *state.hits.entry(path.clone()).or_insert(0) += 1;
        state.routes.get(&path).cloned()
    };
    let route = route.unwrap_or(Route {
        status: 404,
        content_type: "text/plain",
        body: b"not found".to_vec(),
    });

    let reason = match route.status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        route.status,
        reason,
        route.content_type,
        route.body.len()
    );

    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&route.body).await?;
    stream.shutdown().await
}
