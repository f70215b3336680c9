//! Prometheus scrape endpoint.
//!
//! `PrometheusExporter` keeps the latest exported snapshot behind an
//! `RwLock<Arc<_>>` and serves it over HTTP/1.1. Export swaps the `Arc`;
//! each request clones the `Arc` under the read lock and renders after the
//! lock is released, so a scrape never holds up the next export and never
//! sees a half-replaced snapshot.
//!
//! Each connection carries one exchange and is then closed. Input that does
//! not parse as HTTP/1.x is read, discarded, and answered with the same
//! document.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use inframind_core::{Exporter, ExporterError, MetricsSnapshot};

use crate::prometheus::render_prometheus;

const CONTENT_TYPE_TEXT: &str = "text/plain; version=0.0.4";

/// Upper bound on request bytes inspected or discarded per connection.
const MAX_REQUEST_BYTES: usize = 1024;
const MAX_HEADERS: usize = 32;

/// Lifecycle of the scrape endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeState {
    Stopped,
    Starting,
    Serving,
    Stopping,
}

type LatestSnapshot = Arc<RwLock<Arc<MetricsSnapshot>>>;

#[derive(Debug)]
struct Status {
    state: ServeState,
    local_addr: Option<SocketAddr>,
}

/// Handle to the running accept loop.
struct ServeHandle {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

pub struct PrometheusExporter {
    bind_addr: SocketAddr,
    latest: LatestSnapshot,
    status: Mutex<Status>,
    /// Serializes start/stop; holds the accept loop while serving.
    server: tokio::sync::Mutex<Option<ServeHandle>>,
}

impl PrometheusExporter {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            latest: Arc::new(RwLock::new(Arc::new(MetricsSnapshot::new()))),
            status: Mutex::new(Status {
                state: ServeState::Stopped,
                local_addr: None,
            }),
            server: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServeState {
        self.status().state
    }

    /// Address actually bound while serving (resolves port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.status().local_addr
    }

    /// The most recently exported snapshot.
    pub fn latest(&self) -> Arc<MetricsSnapshot> {
        current_snapshot(&self.latest)
    }

    /// Render the most recently exported snapshot.
    pub fn render(&self) -> String {
        render_prometheus(&self.latest())
    }

    fn status(&self) -> std::sync::MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ServeState, local_addr: Option<SocketAddr>) {
        let mut status = self.status();
        status.state = state;
        status.local_addr = local_addr;
    }
}

#[async_trait]
impl Exporter for PrometheusExporter {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn start(&self) -> Result<(), ExporterError> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            debug!("prometheus exporter already serving");
            return Ok(());
        }

        self.set_state(ServeState::Starting, None);

        let listener = match TcpListener::bind(self.bind_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.set_state(ServeState::Stopped, None);
                return Err(ExporterError::Bind {
                    addr: self.bind_addr,
                    source,
                });
            }
        };
        let local_addr = listener.local_addr().ok();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let latest = self.latest.clone();
        let handle = tokio::spawn(async move {
            accept_loop(listener, latest, shutdown_rx).await;
        });

        *server = Some(ServeHandle {
            handle,
            shutdown_tx,
        });
        self.set_state(ServeState::Serving, local_addr);

        info!(
            addr = %local_addr.unwrap_or(self.bind_addr),
            "prometheus exporter listening on /metrics"
        );
        Ok(())
    }

    async fn stop(&self) {
        let mut server = self.server.lock().await;
        let Some(slot) = server.take() else {
            return;
        };

        let local_addr = self.local_addr();
        self.set_state(ServeState::Stopping, local_addr);

        let _ = slot.shutdown_tx.send(true);
        if let Err(e) = slot.handle.await {
            error!(error = %e, "prometheus accept loop panicked");
        }

        self.set_state(ServeState::Stopped, None);
        info!("prometheus exporter stopped");
    }

    async fn export(&self, snapshot: Arc<MetricsSnapshot>) -> Result<(), ExporterError> {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *latest = snapshot;
        Ok(())
    }
}

fn current_snapshot(latest: &RwLock<Arc<MetricsSnapshot>>) -> Arc<MetricsSnapshot> {
    latest
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Accept connections until the shutdown signal fires.
///
/// The listener is dropped when this returns. Each connection task holds its
/// own shutdown receiver: an exchange already under way completes, an idle
/// connection is closed.
async fn accept_loop(
    listener: TcpListener,
    latest: LatestSnapshot,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        tokio::spawn(serve_connection(
                            stream,
                            peer_addr,
                            latest.clone(),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        // Avoid spinning when the process is out of descriptors.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
            _ = shutdown.changed() => {
                debug!("prometheus accept loop shutting down");
                break;
            }
        }
    }
}

/// Serve one exchange, then close.
async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    latest: LatestSnapshot,
    mut shutdown: watch::Receiver<bool>,
) {
    let is_http = tokio::select! {
        peeked = peek_is_http(&stream) => peeked,
        _ = shutdown.changed() => return,
    };

    match is_http {
        Ok(true) => {}
        Ok(false) => {
            debug!(%peer_addr, "non-HTTP request, answering raw");
            if let Err(e) = serve_raw(stream, &latest).await {
                warn!(%peer_addr, error = %e, "connection error");
            }
            return;
        }
        Err(e) => {
            debug!(%peer_addr, error = %e, "connection closed before request");
            return;
        }
    }

    let io = TokioIo::new(stream);
    let svc = service_fn(move |req: Request<Incoming>| {
        let latest = latest.clone();
        async move {
            debug!(%peer_addr, method = %req.method(), path = %req.uri().path(), "scrape");
            Ok::<_, Infallible>(metrics_response(&current_snapshot(&latest)))
        }
    });

    let conn = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(io, svc);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        warn!(%peer_addr, error = %e, "connection error");
    }
}

/// Whether the bytes received so far parse as the start of an HTTP/1.x
/// request. Waits for the first bytes without consuming them.
async fn peek_is_http(stream: &TcpStream) -> std::io::Result<bool> {
    let mut buf = [0u8; MAX_REQUEST_BYTES];
    let n = stream.peek(&mut buf).await?;
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);
    Ok(request.parse(&buf[..n]).is_ok())
}

/// Answer a request hyper would reject: read and discard it, then write
/// the document with a hand-built head.
async fn serve_raw(mut stream: TcpStream, latest: &LatestSnapshot) -> std::io::Result<()> {
    let mut discard = [0u8; MAX_REQUEST_BYTES];
    let _ = stream.read(&mut discard).await?;

    let body = render_prometheus(&current_snapshot(latest));
    let head = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: {CONTENT_TYPE_TEXT}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.shutdown().await
}

/// Every request gets the full document, whatever its method or path.
fn metrics_response(snapshot: &MetricsSnapshot) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(render_prometheus(snapshot))));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TEXT));
    response
}
