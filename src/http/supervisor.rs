//! Bounded-time execution of request handlers.
//!
//! # Invocation flow
//! ```text
//! run(route, handler, params, request)
//!     → deadline = now + budget, fresh cancellation token
//!     → x-route-path header + RequestContext extension
//!     → tokio::spawn(catch_unwind(handler))  ── oneshot ──┐
//!     → select!                                           │
//!         deadline  → cancel token, 504 "timeout"         │
//!         result    ← ────────────────────────────────────┘
//!             Some(envelope) → stamp latency, send
//!             None           → 500 with empty body unless the
//!                              handler wrote a response itself
//! ```
//!
//! # Rules
//! - Exactly one response reaches the transport per request
//! - The handler task is never joined: after a timeout it keeps running
//!   until it finishes on its own. The token only tells it nobody waits
//! - A panic is turned into an error envelope; if the deadline already won,
//!   the envelope is dropped and only counted
//! - Error payloads pass through as-is when they are one of this crate's
//!   error types, `std::io::Error`, `Arc<dyn Error + Send + Sync>` or a boxed
//!   error. `Any` cannot be probed for "some `Error`", so any other concrete
//!   error type is reported as `Unknown error`. Handlers that panic with
//!   their own error types should box them first
//! - A `Box<dyn Error + Send>` is not shareable across threads; it is kept
//!   as a leaf with the same text

use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, Request},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{future::BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::errors::{self, BoxError, ErrChain, Leaf, SharedError, WithStack, Wrapped};
use crate::http::request::{group_query, RequestContext, X_REQUEST_ID, X_ROUTE_PATH};
use crate::http::response::{JsonResponse, ResponseWriter};
use crate::observability::metrics;
use crate::pool::Pools;

/// Budget given to every request unless configured otherwise.
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(30);

/// Body of the gateway-timeout response.
pub const TIMEOUT_BODY: &str = "timeout";

/// A request handler run under a [`Supervisor`].
///
/// The handler may write a response to the [`ResponseWriter`] itself and
/// return `None`; otherwise the returned envelope is sent.
pub trait Handle: Send + Sync + 'static {
    fn call(&self, request: Request, writer: ResponseWriter) -> BoxFuture<'static, Option<JsonResponse>>;
}

impl<F, Fut> Handle for F
where
    F: Fn(Request, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Option<JsonResponse>> + Send + 'static,
{
    fn call(&self, request: Request, writer: ResponseWriter) -> BoxFuture<'static, Option<JsonResponse>> {
        self(request, writer).boxed()
    }
}

/// What a handler panicked with.
#[derive(Debug)]
pub enum PanicPayload {
    /// `panic!` with a message.
    Message(String),
    /// `panic_any` with an error value.
    Error(SharedError),
    Unknown,
}

impl PanicPayload {
    pub fn classify(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<&'static str>() {
            Ok(message) => return Self::Message((*message).to_string()),
            Err(other) => other,
        };
        let payload = match payload.downcast::<String>() {
            Ok(message) => return Self::Message(*message),
            Err(other) => other,
        };
        let payload = match payload.downcast::<SharedError>() {
            Ok(err) => return Self::Error(*err),
            Err(other) => other,
        };
        let payload = match payload.downcast::<BoxError>() {
            Ok(err) => return Self::Error(Arc::from(*err)),
            Err(other) => other,
        };
        let payload = match payload.downcast::<Box<dyn Error + Send>>() {
            Ok(err) => return Self::Error(Arc::new(Leaf::new(err.to_string()))),
            Err(other) => other,
        };
        let payload = match payload.downcast::<io::Error>() {
            Ok(err) => return Self::Error(Arc::new(*err)),
            Err(other) => other,
        };
        let payload = match payload.downcast::<ErrChain>() {
            Ok(err) => return Self::Error(Arc::new(*err)),
            Err(other) => other,
        };
        let payload = match payload.downcast::<WithStack>() {
            Ok(err) => return Self::Error(Arc::new(*err)),
            Err(other) => other,
        };
        let payload = match payload.downcast::<Wrapped>() {
            Ok(err) => return Self::Error(Arc::new(*err)),
            Err(other) => other,
        };
        match payload.downcast::<Leaf>() {
            Ok(err) => Self::Error(Arc::new(*err)),
            Err(_) => Self::Unknown,
        }
    }

    /// The error to report and the text used in the envelope message.
    fn into_error(self, pools: &Arc<Pools>) -> (SharedError, String) {
        match self {
            Self::Message(message) => {
                let err: SharedError = Arc::new(errors::new_in(pools, message.clone()));
                (err, message)
            }
            Self::Error(err) => {
                let text = err.to_string();
                (err, text)
            }
            Self::Unknown => {
                let message = "Unknown error".to_string();
                let err: SharedError = Arc::new(errors::new_in(pools, message.clone()));
                (err, message)
            }
        }
    }
}

/// Envelope reported for a handler that panicked.
pub fn panic_response(
    payload: PanicPayload,
    query: &[(String, String)],
    pools: &Arc<Pools>,
) -> JsonResponse {
    let (err, text) = payload.into_error(pools);
    JsonResponse::new()
        .set_shared_error(Arc::clone(&err))
        .set_message(format!("app panic due to {}", text))
        .set_data(group_query(query))
        .set_log("panic", err)
}

/// Counters kept by a [`Supervisor`].
#[derive(Debug, Default)]
pub struct SupervisorStats {
    completed: AtomicU64,
    timeouts: AtomicU64,
    panics: AtomicU64,
    dropped_panics: AtomicU64,
    nil_responses: AtomicU64,
}

impl SupervisorStats {
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    /// Panics whose envelope arrived after the deadline already answered.
    pub fn dropped_panics(&self) -> u64 {
        self.dropped_panics.load(Ordering::Relaxed)
    }

    pub fn nil_responses(&self) -> u64 {
        self.nil_responses.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

/// Runs handlers under a fixed deadline with panic isolation.
pub struct Supervisor {
    budget: Duration,
    pools: Arc<Pools>,
    stats: Arc<SupervisorStats>,
}

impl Supervisor {
    pub fn new(budget: Duration, pools: Arc<Pools>) -> Self {
        Self {
            budget,
            pools,
            stats: Arc::new(SupervisorStats::default()),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    /// Run one request through `handler`.
    pub async fn run(
        &self,
        route: Arc<str>,
        handler: Arc<dyn Handle>,
        params: HashMap<String, String>,
        mut request: Request,
    ) -> Response {
        let start = Instant::now();
        let deadline = start + self.budget;
        let cancel = CancellationToken::new();
        // Fires on every exit path, the deadline branch fires it early.
        let _cancel_on_exit = cancel.clone().drop_guard();

        let query = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if let Ok(value) = HeaderValue::from_str(&route) {
            request.headers_mut().insert(X_ROUTE_PATH, value);
        }
        request.extensions_mut().insert(RequestContext::new(
            Arc::clone(&route),
            request_id.clone(),
            deadline,
            cancel.clone(),
            params,
            query.clone(),
        ));

        let writer = ResponseWriter::new();
        let (tx, rx) = oneshot::channel::<Option<JsonResponse>>();

        let task = {
            let writer = writer.clone();
            let route = Arc::clone(&route);
            let pools = Arc::clone(&self.pools);
            let stats = Arc::clone(&self.stats);
            async move {
                let outcome = AssertUnwindSafe(async move { handler.call(request, writer).await })
                    .catch_unwind()
                    .await;
                match outcome {
                    // A closed receiver means the deadline answered already.
                    Ok(response) => {
                        let _ = tx.send(response);
                    }
                    Err(payload) => {
                        stats.panics.fetch_add(1, Ordering::Relaxed);
                        metrics::record_panic(&route);
                        let response =
                            panic_response(PanicPayload::classify(payload), &query, &pools);
                        if tx.send(Some(response)).is_err() {
                            stats.dropped_panics.fetch_add(1, Ordering::Relaxed);
                            metrics::record_dropped_panic(&route);
                            tracing::debug!(route = %route, "panic after deadline, envelope dropped");
                        }
                    }
                }
            }
        };
        tokio::spawn(task);

        tokio::select! {
            _ = time::sleep_until(deadline) => {
                cancel.cancel();
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                metrics::record_timeout(&route);
                tracing::warn!(
                    route = %route,
                    request_id = request_id.as_deref().unwrap_or("unknown"),
                    budget = ?self.budget,
                    "handler exceeded deadline"
                );
                writer.write(timeout_response());
            }
            result = rx => {
                match result.ok().flatten() {
                    Some(response) => {
                        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
                        response.set_latency(elapsed).send(&writer);
                    }
                    None if !writer.is_written() => {
                        self.stats.nil_responses.fetch_add(1, Ordering::Relaxed);
                        metrics::record_nil_response(&route);
                        tracing::error!(route = %route, "nil response from the handler");
                        writer.write(empty_response(StatusCode::INTERNAL_SERVER_ERROR));
                    }
                    None => {}
                }
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let response = writer
            .take()
            .unwrap_or_else(|| empty_response(StatusCode::INTERNAL_SERVER_ERROR));
        metrics::record_request(&route, response.status().as_u16(), start);
        response
    }
}

fn timeout_response() -> Response {
    (StatusCode::GATEWAY_TIMEOUT, TIMEOUT_BODY).into_response()
}

fn empty_response(status: StatusCode) -> Response {
    (status, Body::empty()).into_response()
}
