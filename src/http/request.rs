//! Per-request context and request ids.
//!
//! # Responsibilities
//! - Give handlers a read-only view of the deadline, route and parameters
//! - Expose the deadline's cancellation signal for cooperative aborts
//! - Generate unique request IDs (UUID v4)
//!
//! # Design Decisions
//! - The context travels in request extensions, next to the route header
//! - Cancellation is advisory: it tells a handler nobody is waiting anymore

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Request};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tower_http::request_id::{MakeRequestId, RequestId};

/// Header carrying the matched route pattern.
pub const X_ROUTE_PATH: HeaderName = HeaderName::from_static("x-route-path");

/// Header carrying the request id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates a fresh UUID v4 for every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// What a handler may know about the invocation running it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    route: Arc<str>,
    request_id: Option<String>,
    deadline: Instant,
    cancel: CancellationToken,
    params: Arc<HashMap<String, String>>,
    query: Arc<Vec<(String, String)>>,
}

impl RequestContext {
    pub(crate) fn new(
        route: Arc<str>,
        request_id: Option<String>,
        deadline: Instant,
        cancel: CancellationToken,
        params: HashMap<String, String>,
        query: Vec<(String, String)>,
    ) -> Self {
        Self {
            route,
            request_id,
            deadline,
            cancel,
            params: Arc::new(params),
            query: Arc::new(query),
        }
    }

    /// Route pattern the request matched, e.g. `/resorts/{id}`.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True once the supervisor stopped waiting for this request.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the supervisor stopped waiting for this request.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Query pairs in the order they appeared.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Query parameters grouped by key, values in order of appearance.
    pub fn query_values(&self) -> BTreeMap<String, Vec<String>> {
        group_query(&self.query)
    }
}

pub(crate) fn group_query(pairs: &[(String, String)]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in pairs {
        grouped.entry(key.clone()).or_default().push(value.clone());
    }
    grouped
}

/// Access to the [`RequestContext`] of a supervised request.
pub trait RequestContextExt {
    fn context(&self) -> Option<&RequestContext>;
}

impl<B> RequestContextExt for Request<B> {
    fn context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }
}
