//! The responder service.
//!
//! Every accepted connection is served by hyper in its own task. The service
//! reads the POST body, logs it, loads the canned body, waits the configured
//! delay and answers once; keep-alive is off, so the connection then closes.
//! Failures end only the connection they happen on.
//!
//! On shutdown, a connection whose request has been read in full is drained:
//! its response is still sent. Any other connection is abandoned, so a client
//! that never finishes its request cannot hold up shutdown.

use crate::body::{BodySource, FileBodySource};
use crate::config::ServerConfig;
use crate::error::{BindError, ConnectionError};
use crate::request::read_request;
use crate::response::OutboundResponse;
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Pause after a failed `accept` so a persistent error (e.g. out of file
/// descriptors) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Time allowed for a client to send the request line and headers.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for a client to send the declared body.
pub const BODY_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Stub HTTP server returning the configured response to every POST.
pub struct Responder {
    config: Arc<ServerConfig>,
    listener: TcpListener,
    body_source: Arc<dyn BodySource>,
    handle: ShutdownHandle,
    shutdown_rx: watch::Receiver<bool>,
}

/// Stops a running responder. Cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    responded: AtomicU64,
    rejected: AtomicU64,
}

/// Snapshot of connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponderStats {
    /// Connections accepted.
    pub accepted: u64,
    /// Canned responses sent.
    pub responded: u64,
    /// Connections ended without the canned response.
    pub rejected: u64,
}

/// Per-connection view of the shared, read-only state.
#[derive(Clone)]
struct ConnectionContext {
    config: Arc<ServerConfig>,
    body_source: Arc<dyn BodySource>,
    counters: Arc<Counters>,
}

/// Progress of the single exchange on a connection.
#[derive(Debug, Default)]
struct Exchange {
    /// The request body was read in full; the response will follow.
    committed: AtomicBool,
    /// The service produced the canned response.
    canned: AtomicBool,
}

impl Responder {
    /// Bind the listening socket, serving the body from the configured file.
    pub async fn start(config: ServerConfig) -> Result<Self, BindError> {
        let body_source = Arc::new(FileBodySource::new(config.body_path()));
        Self::start_with_source(config, body_source).await
    }

    /// Bind the listening socket with an explicit body source.
    pub async fn start_with_source(
        config: ServerConfig,
        body_source: Arc<dyn BodySource>,
    ) -> Result<Self, BindError> {
        let listener = TcpListener::bind((config.host(), config.port()))
            .await
            .map_err(|source| BindError {
                addr: config.bind_addr(),
                source,
            })?;

        let (tx, shutdown_rx) = watch::channel(false);

        info!(
            addr = %config.bind_addr(),
            status = config.status().as_u16(),
            delay_secs = config.delay_seconds(),
            body = %body_source.describe(),
            "Responder bound"
        );

        Ok(Self {
            config: Arc::new(config),
            listener,
            body_source,
            handle: ShutdownHandle {
                tx: Arc::new(tx),
                counters: Arc::new(Counters::default()),
            },
            shutdown_rx,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle for stopping `serve_forever` from elsewhere.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> ResponderStats {
        self.handle.stats()
    }

    /// Accept and handle connections until shut down.
    ///
    /// On shutdown the listening socket is closed first. Connections whose
    /// request has been read in full get their response before this returns;
    /// the rest are dropped.
    pub async fn serve_forever(self) {
        let Responder {
            config,
            listener,
            body_source,
            handle,
            mut shutdown_rx,
        } = self;

        let ctx = ConnectionContext {
            config,
            body_source,
            counters: handle.counters.clone(),
        };
        let mut connections = JoinSet::new();
        let mut next_id: u64 = 0;

        while !*shutdown_rx.borrow() {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_join_result(joined);
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        next_id += 1;
                        ctx.counters.accepted.fetch_add(1, Ordering::Relaxed);
                        let span = info_span!("connection", id = next_id, peer = %peer);
                        connections.spawn(
                            handle_connection(stream, ctx.clone(), shutdown_rx.clone()).instrument(span),
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        if !connections.is_empty() {
            info!(in_flight = connections.len(), "Listener closed, draining connections");
        }
        while let Some(joined) = connections.join_next().await {
            log_join_result(joined);
        }

        let stats = handle.stats();
        info!(
            accepted = stats.accepted,
            responded = stats.responded,
            rejected = stats.rejected,
            "Responder stopped"
        );
    }
}

impl ShutdownHandle {
    /// Stop accepting connections. Idempotent; may be called before
    /// `serve_forever` starts.
    pub fn shutdown(&self) {
        if !self.tx.send_replace(true) {
            info!("Shutdown requested");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn stats(&self) -> ResponderStats {
        ResponderStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            responded: self.counters.responded.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

fn log_join_result(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Connection task panicked");
        }
    }
}

/// Resolves once shutdown has been requested.
async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        // Sender gone: nobody can request shutdown any more.
        std::future::pending::<()>().await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    ctx: ConnectionContext,
    shutdown_rx: watch::Receiver<bool>,
) {
    debug!("Connection accepted");
    let exchange = Arc::new(Exchange::default());

    let service = {
        let ctx = ctx.clone();
        let exchange = exchange.clone();
        service_fn(move |request| {
            let ctx = ctx.clone();
            let exchange = exchange.clone();
            async move { respond(request, &ctx, &exchange).await }
        })
    };

    let conn = http1::Builder::new()
        .keep_alive(false)
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        biased;

        result = conn.as_mut() => result,
        _ = shutdown_requested(shutdown_rx) => {
            if exchange.committed.load(Ordering::SeqCst) {
                debug!("Finishing response before shutdown");
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            } else {
                debug!("Dropping unfinished request on shutdown");
                ctx.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    };

    match result {
        Ok(()) if exchange.canned.load(Ordering::SeqCst) => {
            ctx.counters.responded.fetch_add(1, Ordering::Relaxed);
            info!(status = ctx.config.status().as_u16(), "Sent response");
        }
        Ok(()) => {
            ctx.counters.rejected.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            ctx.counters.rejected.fetch_add(1, Ordering::Relaxed);
            if e.is_parse() {
                warn!(error = %e, "Rejected unparseable request");
            } else if e.is_timeout() {
                debug!(error = %e, "Client too slow, closing");
            } else {
                debug!(error = %e, "Connection closed");
            }
        }
    }
}

/// Service entry point: one request per connection.
///
/// A non-POST request is answered with 405. Any other failure is logged and
/// returned as an error, which makes hyper close the connection without
/// writing a response.
async fn respond(
    request: Request<Incoming>,
    ctx: &ConnectionContext,
    exchange: &Exchange,
) -> Result<Response<Full<Bytes>>, ConnectionError> {
    match serve_request(request, ctx, exchange).await {
        Ok(response) => Ok(response),
        Err(ConnectionError::MethodNotAllowed(method)) => {
            warn!(method = %method, "Rejected request");
            OutboundResponse::method_not_allowed().into_http()
        }
        Err(err) => {
            match &err {
                e if e.is_misconfiguration() => error!(error = %e, "Closing connection"),
                ConnectionError::Io(e) => debug!(error = %e, "Connection i/o failed"),
                e => warn!(error = %e, "Rejected request"),
            }
            Err(err)
        }
    }
}

async fn serve_request(
    request: Request<Incoming>,
    ctx: &ConnectionContext,
    exchange: &Exchange,
) -> Result<Response<Full<Bytes>>, ConnectionError> {
    let request = tokio::time::timeout(BODY_READ_TIMEOUT, read_request(request, &Method::POST))
        .await
        .map_err(|_| ConnectionError::Malformed("timed out reading body".to_string()))??;
    exchange.committed.store(true, Ordering::SeqCst);

    info!(
        path = %request.target(),
        bytes = request.body.len(),
        body = %request.body_text(),
        "Received request"
    );

    let body = ctx.body_source.load().await?;

    let delay = ctx.config.delay();
    if !delay.is_zero() {
        debug!(delay_secs = delay.as_secs(), "Delaying response");
        tokio::time::sleep(delay).await;
    }

    let response = OutboundResponse::canned(ctx.config.status(), body).into_http()?;
    exchange.canned.store(true, Ordering::SeqCst);
    Ok(response)
}
