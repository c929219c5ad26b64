//! Response envelope and the write-once response sink.
//!
//! # Responsibilities
//! - Carry a handler's data, message, error and latency to the client
//! - Map an error's classification to an HTTP status
//! - Accept at most one response per request
//!
//! # Design Decisions
//! - Clients see only the root cause's text; the full chain (with stacks)
//!   goes to the log entries emitted on send
//! - The sink keeps the first write and rejects the rest

use std::error::Error;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{self, ErrorType, SharedError};

/// Status for a classified error.
pub fn status_for(kind: ErrorType) -> StatusCode {
    match kind {
        ErrorType::BadRequest => StatusCode::BAD_REQUEST,
        ErrorType::NoValidUserFound => StatusCode::UNAUTHORIZED,
        ErrorType::AlreadyRegistered => StatusCode::CONFLICT,
        ErrorType::ForbiddenResource => StatusCode::FORBIDDEN,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON envelope returned by handlers.
#[derive(Debug, Clone, Default)]
pub struct JsonResponse {
    data: Option<serde_json::Value>,
    message: Option<String>,
    error: Option<SharedError>,
    logs: Vec<(String, SharedError)>,
    latency_ms: Option<f64>,
}

#[derive(Serialize)]
struct Body<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<f64>,
}

impl JsonResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_error<E>(self, err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.set_shared_error(Arc::new(err))
    }

    pub fn set_shared_error(mut self, err: SharedError) -> Self {
        self.error = Some(err);
        self
    }

    pub fn set_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach data; values that fail to serialize are stored as `null`.
    pub fn set_data<T: Serialize>(mut self, data: T) -> Self {
        self.data = Some(serde_json::to_value(data).unwrap_or(serde_json::Value::Null));
        self
    }

    /// Record `err` under `key`, logged when the response is sent.
    pub fn set_log(mut self, key: impl Into<String>, err: SharedError) -> Self {
        self.logs.push((key.into(), err));
        self
    }

    pub fn set_latency(mut self, millis: f64) -> Self {
        self.latency_ms = Some(millis);
        self
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&SharedError> {
        self.error.as_ref()
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            None => StatusCode::OK,
            Some(err) => errors::type_of(err.as_ref())
                .map(status_for)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Serialize into `writer`. Returns `false` if a response was already
    /// written there.
    pub fn send(self, writer: &ResponseWriter) -> bool {
        writer.write(self.into_response())
    }
}

impl IntoResponse for JsonResponse {
    fn into_response(self) -> Response {
        for (key, err) in &self.logs {
            tracing::error!(key = %key, error = %err, "handler reported error");
        }
        let status = self.status();
        let body = Body {
            data: self.data.as_ref(),
            message: self.message.as_deref(),
            error: self
                .error
                .as_ref()
                .map(|err| errors::root_cause(err.as_ref()).to_string()),
            latency_ms: self.latency_ms,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Default)]
struct Slot {
    response: Option<Response>,
    written: bool,
}

/// Write-once sink for the response of one request.
///
/// Shared between the supervisor and the handler; whoever writes first wins.
#[derive(Clone, Default)]
pub struct ResponseWriter {
    slot: Arc<Mutex<Slot>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `response` unless one was written before.
    pub fn write(&self, response: Response) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.written {
            return false;
        }
        slot.written = true;
        slot.response = Some(response);
        true
    }

    pub fn is_written(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).written
    }

    /// Hand the written response to the transport. The sink stays marked as
    /// written.
    pub(crate) fn take(&self) -> Option<Response> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .response
            .take()
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("written", &self.is_written())
            .finish()
    }
}
