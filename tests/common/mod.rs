//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, RgbImage};
use image_proxy::config::ProxyConfig;
use image_proxy::http::HttpServer;
use image_proxy::lifecycle::Shutdown;
use image_proxy::transform::{
    EngineError, ImageEngine, OutputFormat, TransformEngine, TransformOptions,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// How the mock origin frames a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length` matching the body.
    Length,
    /// `Transfer-Encoding: chunked`, no declared length.
    Chunked,
    /// `Content-Length` larger than the body; the connection closes early.
    Truncated,
}

/// A response the mock origin sends back.
pub struct OriginReply {
    pub status: u16,
    pub body: Vec<u8>,
    pub framing: Framing,
}

impl OriginReply {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            framing: Framing::Length,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: b"origin says no".to_vec(),
            framing: Framing::Length,
        }
    }

    pub fn framed(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }
}

/// Start a programmable mock origin on an ephemeral port.
///
/// `f` receives the request path. Returns the bound address and a hit counter.
pub async fn start_origin<F, Fut>(f: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OriginReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);

    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = Arc::clone(&f);
                    let counter = Arc::clone(&counter);
                    tokio::spawn(async move {
                        let path = match read_request_path(&mut socket).await {
                            Some(path) => path,
                            None => return,
                        };
                        counter.fetch_add(1, Ordering::SeqCst);
                        let reply = f(path).await;
                        let reason = match reply.status {
                            200 => "OK",
                            404 => "Not Found",
                            500 => "Internal Server Error",
                            _ => "Other",
                        };
                        let length = match reply.framing {
                            Framing::Length => format!("Content-Length: {}", reply.body.len()),
                            Framing::Chunked => "Transfer-Encoding: chunked".to_string(),
                            Framing::Truncated => format!("Content-Length: {}", reply.body.len() + 4096),
                        };
                        let head = format!(
                            "HTTP/1.1 {} {}\r\n{}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                            reply.status, reason, length
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        if reply.framing == Framing::Chunked {
                            for chunk in reply.body.chunks(1024) {
                                let _ = socket.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await;
                                let _ = socket.write_all(chunk).await;
                                let _ = socket.write_all(b"\r\n").await;
                            }
                            let _ = socket.write_all(b"0\r\n\r\n").await;
                        } else {
                            let _ = socket.write_all(&reply.body).await;
                        }
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, hits)
}

/// Origin that always serves the same body.
pub async fn start_static_origin(body: Vec<u8>) -> (SocketAddr, Arc<AtomicUsize>) {
    start_framed_origin(body, Framing::Length).await
}

/// Origin that always serves the same body with the given framing.
pub async fn start_framed_origin(body: Vec<u8>, framing: Framing) -> (SocketAddr, Arc<AtomicUsize>) {
    let body = Arc::new(body);
    start_origin(move |_path| {
        let body = Arc::clone(&body);
        async move { OriginReply::ok(body.as_ref().clone()).framed(framing) }
    })
    .await
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
}

/// A JPEG with noisy pixels, so its encoded size scales with its area.
pub fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut seed: u32 = 0x2545_f491;
    let img = RgbImage::from_fn(width, height, |_, _| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let [r, g, b, _] = seed.to_le_bytes();
        image::Rgb([r, g, b])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .unwrap();
    out
}

/// Config for tests: plain-HTTP origins, no warm-up, no metrics listener.
pub fn test_config(allowed: &[String]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.origin.scheme = "http".into();
    config.origin.timeout_secs = 5;
    config.security.allowed_domains = allowed.to_vec();
    config.transform.warm_up = false;
    config.observability.metrics_enabled = false;
    config
}

/// Engine wrapper counting transform invocations.
pub struct CountingEngine {
    inner: ImageEngine,
    pub calls: AtomicUsize,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self {
            inner: ImageEngine::new(&Default::default()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TransformEngine for CountingEngine {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn supports(&self, format: OutputFormat) -> bool {
        self.inner.supports(format)
    }

    fn transform(&self, bytes: &[u8], options: &TransformOptions) -> Result<Vec<u8>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.transform(bytes, options)
    }
}

/// Engine that sleeps before each transform and records peak concurrency.
pub struct SlowEngine {
    inner: ImageEngine,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowEngine {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: ImageEngine::new(&Default::default()),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Most transforms ever running at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl TransformEngine for SlowEngine {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn supports(&self, format: OutputFormat) -> bool {
        self.inner.supports(format)
    }

    fn transform(&self, bytes: &[u8], options: &TransformOptions) -> Result<Vec<u8>, EngineError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let result = self.inner.transform(bytes, options);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Engine that panics on every input.
pub struct PanickingEngine;

impl TransformEngine for PanickingEngine {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn supports(&self, _format: OutputFormat) -> bool {
        true
    }

    fn transform(&self, _bytes: &[u8], _options: &TransformOptions) -> Result<Vec<u8>, EngineError> {
        panic!("engine exploded");
    }
}

/// A running proxy for a test.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub gate: Arc<image_proxy::admission::AdmissionGate>,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy on an ephemeral port with the given engine.
pub async fn start_proxy(config: ProxyConfig, engine: Arc<dyn TransformEngine>) -> TestProxy {
    let server = HttpServer::with_engine(config, engine).unwrap();
    let gate = server.gate();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy { addr, gate, shutdown }
}

/// HTTP client that never reuses connections between requests.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
