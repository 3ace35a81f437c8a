//! API client facade
//!
//! Composes the token store, refresh coordinator, and request executor into
//! one object constructed at startup. Every call goes through
//! [`RequestExecutor`], so bearer tokens, endpoint failover, retries, and
//! single-flight refresh apply uniformly.

use std::sync::Arc;

use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use tradepost_common::{Clock, RetryPolicy, SystemClock};
use tradepost_core::{
    RefreshCoordinator, SessionListener, TokenInspector, TokenRefresher, TokenStore,
};
use tradepost_domain::{AuthResponse, ClientConfig, Credentials, EndpointList, Session, UserProfile};

use super::auth::HttpTokenRefresher;
use super::errors::ApiError;
use super::executor::{ExecutorSettings, RequestExecutor};
use super::middleware::{Pipeline, RequestMiddleware, ResponseMiddleware};
use super::request::{ApiResponse, MultipartUpload, RequestDescriptor};
use crate::http::HttpClient;
use crate::storage::KeyValueTokenStore;

const USER_AGENT: &str = concat!("tradepost-client/", env!("CARGO_PKG_VERSION"));

/// Resilient API client
pub struct ApiClient {
    config: ClientConfig,
    http: HttpClient,
    store: Arc<dyn TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    inspector: TokenInspector,
    executor: RequestExecutor,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client with an in-memory session store
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the endpoint list is invalid or the
    /// HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::builder().config(config).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Execute a GET request
    ///
    /// # Errors
    /// Returns the classified error if the request fails or the response
    /// cannot be deserialized.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(RequestDescriptor::get(path)).await
    }

    /// Execute a POST request; not retried unless sent through
    /// [`ApiClient::request`] with `retryable(true)`
    ///
    /// # Errors
    /// Returns the classified error if the request fails or the response
    /// cannot be deserialized.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::post(path).json(body)?).await
    }

    /// # Errors
    /// See [`ApiClient::post`].
    #[instrument(skip_all, fields(path = %path))]
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::put(path).json(body)?).await
    }

    /// # Errors
    /// See [`ApiClient::post`].
    #[instrument(skip_all, fields(path = %path))]
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(RequestDescriptor::patch(path).json(body)?).await
    }

    /// # Errors
    /// See [`ApiClient::post`].
    #[instrument(skip_all, fields(path = %path))]
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(RequestDescriptor::delete(path)).await
    }

    /// Upload a file as `multipart/form-data`
    ///
    /// The JSON content type is not sent so the transport can set the
    /// boundary header.
    ///
    /// # Errors
    /// See [`ApiClient::post`].
    #[instrument(skip_all, fields(path = %path, file = %upload.file_name))]
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        path: &str,
        upload: MultipartUpload,
    ) -> Result<T, ApiError> {
        self.request(RequestDescriptor::post(path).multipart(upload)).await
    }

    /// Execute a descriptor and deserialize the body
    ///
    /// # Errors
    /// See [`ApiClient::send`].
    pub async fn request<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, ApiError> {
        self.send(descriptor).await?.json()
    }

    /// Execute a descriptor and return the raw response
    ///
    /// # Errors
    /// Returns the classified error of the final attempt.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<ApiResponse, ApiError> {
        self.executor.execute(descriptor).await
    }

    /// Health check for API
    ///
    /// One bounded-timeout GET per endpoint, in order, never retried and
    /// never authenticated. Only HTTP 200 counts as healthy.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> bool {
        let timeout = self.config.health_timeout();

        for base in self.executor.endpoints().iter() {
            let url = EndpointList::join(base, &self.config.health_path);
            debug!(url = %url, "Health check");

            let request = self.http.request(Method::GET, url.as_str()).header(ACCEPT, "application/json");
            match self.http.send_with_timeout(request, timeout).await {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    info!(endpoint = base, "API is healthy");
                    return true;
                }
                Ok(resp) => warn!(endpoint = base, status = %resp.status(), "API returned non-success status"),
                Err(e) => warn!(endpoint = base, error = %e, "Health check failed"),
            }
        }

        false
    }

    /// Authenticate and store the resulting session
    ///
    /// A 401 here means bad credentials and never enters the refresh path.
    ///
    /// # Errors
    /// Returns the classified error of the login call, or
    /// `ApiError::Storage` if the session could not be persisted.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let descriptor =
            RequestDescriptor::post(self.config.login_path.as_str()).anonymous().json(credentials)?;
        let response: AuthResponse = self.request(descriptor).await?;

        let session = response.into_session(None);
        self.store.set_session(&session)?;
        info!("login succeeded");
        Ok(session)
    }

    /// Tell the server (best effort) and clear the local session
    ///
    /// # Errors
    /// Returns `ApiError::Storage` if the session could not be cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        if self.store.access_token().is_some() {
            let descriptor = RequestDescriptor::post(self.config.logout_path.as_str()).skip_auth_refresh();
            if let Err(err) = self.send(descriptor).await {
                debug!(error = %err, "logout call failed, clearing local session anyway");
            }
        }

        self.store.clear()?;
        info!("logged out");
        Ok(())
    }

    /// Access token present and not expired
    pub fn is_authenticated(&self) -> bool {
        self.store
            .access_token()
            .is_some_and(|token| !self.inspector.is_expired(&token, self.config.refresh_skew_secs))
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.store.user()
    }

    pub fn session(&self) -> Option<Session> {
        self.store.session()
    }
}

/// Builder for API client
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn TokenStore>>,
    listener: Option<Arc<dyn SessionListener>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    clock: Option<Arc<dyn Clock>>,
    http: Option<HttpClient>,
    request_middleware: Vec<Arc<dyn RequestMiddleware>>,
    response_middleware: Vec<Arc<dyn ResponseMiddleware>>,
}

impl ApiClientBuilder {
    /// Set the client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Session persistence; defaults to an in-memory store
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Notified when the session expires for good (e.g. to show a login screen)
    pub fn listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Replace the HTTP refresh call
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Clock used for token expiry
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Runs after the built-in JSON headers and logger
    pub fn request_middleware(mut self, middleware: Arc<dyn RequestMiddleware>) -> Self {
        self.request_middleware.push(middleware);
        self
    }

    /// Runs after the built-in logger
    pub fn response_middleware(mut self, middleware: Arc<dyn ResponseMiddleware>) -> Self {
        self.response_middleware.push(middleware);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the endpoint list is invalid or the
    /// HTTP client cannot be created.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        let endpoints = EndpointList::from_config(&config)?;

        let http = match self.http {
            Some(http) => http,
            None => HttpClient::builder()
                .timeout(config.request_timeout())
                .user_agent(USER_AGENT)
                .build()?,
        };

        let store: Arc<dyn TokenStore> =
            self.store.unwrap_or_else(|| Arc::new(KeyValueTokenStore::in_memory()) as Arc<dyn TokenStore>);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let inspector = TokenInspector::new(clock).with_missing_expiry(config.missing_expiry);

        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpTokenRefresher::new(
                http.clone(),
                endpoints.clone(),
                config.refresh_path.as_str(),
                config.request_timeout(),
            )) as Arc<dyn TokenRefresher>
        });

        let retry = &config.retry;
        let mut coordinator = RefreshCoordinator::new(Arc::clone(&store), refresher).with_retry_policy(
            RetryPolicy::new(config.refresh_max_attempts, retry.base_delay(), retry.max_delay()),
        );
        if let Some(listener) = self.listener {
            coordinator = coordinator.with_listener(listener);
        }
        let coordinator = Arc::new(coordinator);

        let mut pipeline = Pipeline::standard();
        for middleware in self.request_middleware {
            pipeline.push_request(middleware);
        }
        for middleware in self.response_middleware {
            pipeline.push_response(middleware);
        }

        let settings = ExecutorSettings {
            timeout: config.request_timeout(),
            retry: RetryPolicy::new(retry.max_attempts, retry.base_delay(), retry.max_delay()),
            refresh_skew_secs: config.refresh_skew_secs,
            proactive_refresh: config.proactive_refresh,
        };

        let executor = RequestExecutor::new(
            http.clone(),
            endpoints,
            Arc::clone(&store),
            Arc::clone(&coordinator),
            inspector.clone(),
        )
        .with_pipeline(pipeline)
        .with_settings(settings);

        Ok(ApiClient { config, http, store, coordinator, inspector, executor })
    }
}
