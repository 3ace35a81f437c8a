//! Request/response middleware
//!
//! Request middleware runs in registration order on every attempt, right
//! before the request is sent. Response middleware runs in registration order
//! on the outcome of that attempt and may rewrite it.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::ApiError;
use super::request::ApiResponse;

const APPLICATION_JSON: &str = "application/json";

/// A single attempt as it is about to go on the wire
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Shared by every attempt of one logical call
    pub request_id: Uuid,
    pub method: Method,
    pub url: String,
    pub endpoint: String,
    pub headers: HeaderMap,
    pub multipart: bool,
    pub attempt: u32,
    pub started: Instant,
}

pub trait RequestMiddleware: Send + Sync {
    /// # Errors
    /// An error aborts the attempt before it is sent.
    fn on_request(&self, request: &mut PreparedRequest) -> Result<(), ApiError>;
}

pub trait ResponseMiddleware: Send + Sync {
    /// # Errors
    /// Whatever the middleware decides the attempt's outcome is.
    fn on_response(
        &self,
        request: &PreparedRequest,
        outcome: Result<ApiResponse, ApiError>,
    ) -> Result<ApiResponse, ApiError>;
}

/// Ordered middleware chain composed by the request executor
#[derive(Clone, Default)]
pub struct Pipeline {
    request: Vec<Arc<dyn RequestMiddleware>>,
    response: Vec<Arc<dyn ResponseMiddleware>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("request", &self.request.len())
            .field("response", &self.response.len())
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON headers plus request logging
    pub fn standard() -> Self {
        let logger = Arc::new(RequestLogger);
        let mut pipeline = Self::new();
        pipeline.push_request(Arc::new(JsonHeaders));
        pipeline.push_request(logger.clone());
        pipeline.push_response(logger);
        pipeline
    }

    pub fn push_request(&mut self, middleware: Arc<dyn RequestMiddleware>) {
        self.request.push(middleware);
    }

    pub fn push_response(&mut self, middleware: Arc<dyn ResponseMiddleware>) {
        self.response.push(middleware);
    }

    pub(crate) fn before(&self, request: &mut PreparedRequest) -> Result<(), ApiError> {
        self.request.iter().try_for_each(|middleware| middleware.on_request(request))
    }

    pub(crate) fn after(
        &self,
        request: &PreparedRequest,
        outcome: Result<ApiResponse, ApiError>,
    ) -> Result<ApiResponse, ApiError> {
        self.response
            .iter()
            .fold(outcome, |outcome, middleware| middleware.on_response(request, outcome))
    }
}

/// Sets `Accept` and, except for multipart bodies, `Content-Type` to JSON
///
/// Multipart requests keep the transport's own boundary header.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHeaders;

impl RequestMiddleware for JsonHeaders {
    fn on_request(&self, request: &mut PreparedRequest) -> Result<(), ApiError> {
        let json = HeaderValue::from_static(APPLICATION_JSON);
        request.headers.entry(ACCEPT).or_insert_with(|| json.clone());
        if request.multipart {
            request.headers.remove(CONTENT_TYPE);
        } else {
            request.headers.entry(CONTENT_TYPE).or_insert(json);
        }
        Ok(())
    }
}

/// Emits `request_start`, `request_end`, and `request_error` events
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl RequestMiddleware for RequestLogger {
    fn on_request(&self, request: &mut PreparedRequest) -> Result<(), ApiError> {
        info!(
            request_id = %request.request_id,
            method = %request.method,
            url = %request.url,
            attempt = request.attempt,
            "request_start"
        );
        Ok(())
    }
}

impl ResponseMiddleware for RequestLogger {
    fn on_response(
        &self,
        request: &PreparedRequest,
        outcome: Result<ApiResponse, ApiError>,
    ) -> Result<ApiResponse, ApiError> {
        let elapsed_ms = request.started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(response) => info!(
                request_id = %request.request_id,
                status = response.status.as_u16(),
                elapsed_ms,
                "request_end"
            ),
            Err(err) => warn!(
                request_id = %request.request_id,
                kind = ?err.category(),
                status = err.status(),
                elapsed_ms,
                error = %err,
                "request_error"
            ),
        }
        outcome
    }
}
