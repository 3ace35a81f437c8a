//! HTTP implementation of the token refresh port
//!
//! Posts `{ "refreshToken": ... }` to the refresh path and expects
//! `{ token, refreshToken?, user? }` back. The call never carries an
//! `Authorization` header and never goes through the request executor, so a
//! rejected refresh cannot trigger another refresh.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, instrument, warn};
use tradepost_core::{RefreshError, TokenRefresher};
use tradepost_domain::{AuthResponse, EndpointList};

use crate::http::HttpClient;

#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http: HttpClient,
    endpoints: EndpointList,
    refresh_path: String,
    timeout: Duration,
}

impl HttpTokenRefresher {
    pub fn new(
        http: HttpClient,
        endpoints: EndpointList,
        refresh_path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self { http, endpoints, refresh_path: refresh_path.into(), timeout }
    }

    async fn post_refresh(&self, base: &str, refresh_token: &str) -> Result<AuthResponse, RefreshError> {
        let url = EndpointList::join(base, &self.refresh_path);
        let request = self
            .http
            .request(Method::POST, url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&json!({ "refreshToken": refresh_token }));

        let response = self
            .http
            .send_with_timeout(request, self.timeout)
            .await
            .map_err(|err| RefreshError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected { status: status.as_u16() });
        }

        response.json::<AuthResponse>().await.map_err(|err| {
            RefreshError::InvalidResponse(format!("refresh response is not a session: {err}"))
        })
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    /// Tries each endpoint in order; only connectivity failures (transport
    /// errors, 5xx) move on to the next one.
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, RefreshError> {
        let mut last_error = RefreshError::Transport("no endpoints configured".into());

        for base in self.endpoints.iter() {
            match self.post_refresh(base, refresh_token).await {
                Ok(response) => {
                    debug!(endpoint = base, "refresh accepted");
                    return Ok(response);
                }
                Err(err @ RefreshError::Transport(_)) => {
                    warn!(endpoint = base, error = %err, "refresh endpoint unreachable");
                    last_error = err;
                }
                Err(RefreshError::Rejected { status }) if status >= 500 => {
                    warn!(endpoint = base, status, "refresh endpoint failing");
                    last_error = RefreshError::Rejected { status };
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn refresher(bases: &[String]) -> HttpTokenRefresher {
        HttpTokenRefresher::new(
            HttpClient::new().unwrap(),
            EndpointList::new(bases).unwrap(),
            "/auth/refresh",
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn posts_refresh_token_and_parses_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({ "refreshToken": "R1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "T2",
                "refreshToken": "R2",
                "user": { "id": "u1", "email": "ada@example.com" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = refresher(&[server.uri()]).refresh("R1").await.unwrap();

        assert_eq!(response.token, "T2");
        assert_eq!(response.refresh_token.as_deref(), Some("R2"));
        assert_eq!(response.user.map(|u| u.id), Some("u1".to_string()));
    }

    #[tokio::test]
    async fn never_sends_authorization() {
        let server = MockServer::start().await;
        Mock::given(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "T2" })))
            .mount(&server)
            .await;

        assert!(refresher(&[server.uri()]).refresh("R1").await.is_ok());
    }

    #[tokio::test]
    async fn rejection_is_not_retried_on_other_endpoints() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "T2" })))
            .expect(0)
            .mount(&fallback)
            .await;

        let result = refresher(&[primary.uri(), fallback.uri()]).refresh("R1").await;

        assert_eq!(result.unwrap_err(), RefreshError::Rejected { status: 401 });
    }

    #[tokio::test]
    async fn server_error_falls_over_to_next_endpoint() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "T2" })))
            .expect(1)
            .mount(&fallback)
            .await;

        let response = refresher(&[primary.uri(), fallback.uri()]).refresh("R1").await.unwrap();

        assert_eq!(response.token, "T2");
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let result = refresher(&[server.uri()]).refresh("R1").await;

        assert!(matches!(result, Err(RefreshError::InvalidResponse(_))));
    }
}
