//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves fixed bodies per request path. Unknown paths get 404. Routes can
//! lie about Content-Length and close early (truncated body), or stall
//! before answering (timeouts). Every request is counted.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub body: Arc<Vec<u8>>,
    /// Send only this many body bytes, then close, while declaring the full length.
    pub truncate_at: Option<usize>,
    /// Sleep before answering.
    pub delay: Option<Duration>,
}

impl Route {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body: Arc::new(body),
            truncate_at: None,
            delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Arc::new(b"error".to_vec()),
            truncate_at: None,
            delay: None,
        }
    }

    pub fn truncated(body: Vec<u8>, at: usize) -> Self {
        Self {
            truncate_at: Some(at),
            ..Self::ok(body)
        }
    }

    pub fn delayed(body: Vec<u8>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok(body)
        }
    }
}

pub struct AssetServer {
    pub port: u16,
    hits: Arc<AtomicUsize>,
}

impl AssetServer {
    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(routes: HashMap<String, Route>) -> AssetServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes = Arc::new(routes);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &routes, &counter));
        }
    });
    AssetServer { port, hits }
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>, hits: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(10)));
    let Some(path) = read_request_path(&mut stream) else {
        return;
    };
    hits.fetch_add(1, Ordering::SeqCst);

    let route = routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| Route::status(404));
    if let Some(d) = route.delay {
        thread::sleep(d);
    }
    let reason = match route.status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        route.status,
        reason,
        route.body.len()
    );
    if stream.write_all(header.as_bytes()).is_err() {
        return;
    }
    let send = route
        .truncate_at
        .map(|n| n.min(route.body.len()))
        .unwrap_or(route.body.len());
    let _ = stream.write_all(&route.body[..send]);
    let _ = stream.flush();
}

/// Reads request headers and returns the request target of a GET.
fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 || buf.len() > 64 * 1024 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let text = std::str::from_utf8(&buf).ok()?;
    let mut parts = text.lines().next()?.split_whitespace();
    let method = parts.next()?;
    if !method.eq_ignore_ascii_case("GET") {
        return None;
    }
    parts.next().map(str::to_string)
}
