//! Request execution with endpoint failover, retries, and token refresh
//!
//! One call is a sequence of rounds. A round walks the endpoint list in
//! order and moves to the next candidate only on a connectivity failure
//! (network, timeout, 5xx); any other error means the server was reached and
//! ends the round. Retryable requests get further rounds per the
//! [`RetryPolicy`]. A 401 goes through the [`RefreshCoordinator`] once per
//! call, after which the same request is re-issued with the new token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use tracing::{debug, info, instrument, warn};
use tradepost_common::{RetryDecision, RetryPolicy};
use tradepost_core::{RefreshCoordinator, TokenInspector, TokenStore};
use tradepost_domain::EndpointList;
use uuid::Uuid;

use super::errors::ApiError;
use super::middleware::{Pipeline, PreparedRequest};
use super::request::{ApiResponse, RequestBody, RequestDescriptor};
use crate::http::HttpClient;

/// Knobs the executor reads from client configuration
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub refresh_skew_secs: i64,
    pub proactive_refresh: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            refresh_skew_secs: 0,
            proactive_refresh: false,
        }
    }
}

pub struct RequestExecutor {
    http: HttpClient,
    endpoints: EndpointList,
    store: Arc<dyn TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    inspector: TokenInspector,
    pipeline: Pipeline,
    settings: ExecutorSettings,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("endpoints", &self.endpoints)
            .field("pipeline", &self.pipeline)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Tracks whether this call has already been through the refresh path
struct CallState {
    request_id: Uuid,
    refreshed: bool,
}

impl RequestExecutor {
    pub fn new(
        http: HttpClient,
        endpoints: EndpointList,
        store: Arc<dyn TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
        inspector: TokenInspector,
    ) -> Self {
        Self {
            http,
            endpoints,
            store,
            coordinator,
            inspector,
            pipeline: Pipeline::standard(),
            settings: ExecutorSettings::default(),
        }
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ExecutorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn endpoints(&self) -> &EndpointList {
        &self.endpoints
    }

    /// Issue `descriptor` until it succeeds or a terminal error is reached
    ///
    /// # Errors
    /// Returns the classified [`ApiError`] of the last attempt.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty, method = %descriptor.method, path = %descriptor.path))]
    pub async fn execute(&self, mut descriptor: RequestDescriptor) -> Result<ApiResponse, ApiError> {
        let mut call = CallState { request_id: Uuid::new_v4(), refreshed: false };
        tracing::Span::current().record("request_id", tracing::field::display(call.request_id));

        if self.settings.proactive_refresh && !descriptor.skip_auth_refresh {
            self.refresh_if_expired(&mut call).await?;
        }

        loop {
            let err = match self.round(&descriptor, &mut call).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !descriptor.retryable {
                return Err(err);
            }

            match self.settings.retry.decide(descriptor.attempt, &err) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        attempt = descriptor.attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request failed, retrying"
                    );
                    self.settings.retry.wait(delay).await;
                    descriptor.attempt += 1;
                }
                RetryDecision::Stop => return Err(err),
            }
        }
    }

    async fn refresh_if_expired(&self, call: &mut CallState) -> Result<(), ApiError> {
        let Some(token) = self.store.access_token() else {
            return Ok(());
        };
        if self.inspector.is_expired(&token, self.settings.refresh_skew_secs) {
            debug!("access token expired, refreshing before dispatch");
            call.refreshed = true;
            self.coordinator.refresh(Some(&token)).await?;
        }
        Ok(())
    }

    async fn round(
        &self,
        descriptor: &RequestDescriptor,
        call: &mut CallState,
    ) -> Result<ApiResponse, ApiError> {
        let mut last_error = None;

        for (index, base) in self.endpoints.iter().enumerate() {
            if let Some(previous) = &last_error {
                info!(endpoint = base, index, error = %previous, "endpoint_fallback");
            }

            let token = if descriptor.anonymous { None } else { self.store.access_token() };
            let mut outcome = self.dispatch(descriptor, base, token.as_deref(), call).await;

            if matches!(&outcome, Err(err) if err.requires_refresh())
                && !descriptor.skip_auth_refresh
                && !call.refreshed
            {
                call.refreshed = true;
                let fresh = self.coordinator.refresh(token.as_deref()).await?;
                debug!("re-issuing request with refreshed token");
                outcome = self.dispatch(descriptor, base, Some(&fresh), call).await;
            }

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if err.is_connectivity() => last_error = Some(err),
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::Config("no endpoints configured".into())))
    }

    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        base: &str,
        token: Option<&str>,
        call: &CallState,
    ) -> Result<ApiResponse, ApiError> {
        let mut prepared = PreparedRequest {
            request_id: call.request_id,
            method: descriptor.method.clone(),
            url: EndpointList::join(base, &descriptor.path),
            endpoint: base.to_string(),
            headers: descriptor.headers.clone(),
            multipart: descriptor.is_multipart(),
            attempt: descriptor.attempt,
            started: Instant::now(),
        };

        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::Unauthorized("stored access token is not a valid header".into()))?;
            prepared.headers.insert(AUTHORIZATION, value);
        }

        self.pipeline.before(&mut prepared)?;
        let outcome = self.send(descriptor, &prepared).await;
        self.pipeline.after(&prepared, outcome)
    }

    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        prepared: &PreparedRequest,
    ) -> Result<ApiResponse, ApiError> {
        let timeout = self.settings.timeout;
        let mut builder = self
            .http
            .request(prepared.method.clone(), prepared.url.as_str())
            .headers(prepared.headers.clone());

        builder = match &descriptor.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(
                serde_json::to_vec(value).map_err(|err| ApiError::Serialization(err.to_string()))?,
            ),
            RequestBody::Multipart(upload) => builder.multipart(upload.to_form()?),
        };

        let response = self.http.send_with_timeout(builder, timeout).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| super::classify::classify_transport(&err, timeout))?;

        if status.is_success() {
            Ok(ApiResponse { status, headers, body: body.to_vec(), endpoint: prepared.endpoint.clone() })
        } else {
            Err(super::classify::classify_status(status, &body))
        }
    }
}
