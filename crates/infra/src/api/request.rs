//! Request descriptors and raw responses

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::errors::ApiError;

/// Body of an outbound request
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartUpload),
}

/// A file upload, rebuilt into a fresh multipart form for every attempt
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    pub field_name: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
    /// Extra text fields sent alongside the file
    pub fields: Vec<(String, String)>,
}

impl MultipartUpload {
    pub fn new(field_name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            bytes,
            mime_type: None,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub(crate) fn to_form(&self) -> Result<Form, ApiError> {
        let mut part = Part::bytes(self.bytes.clone()).file_name(self.file_name.clone());
        if let Some(mime) = &self.mime_type {
            part = part
                .mime_str(mime)
                .map_err(|err| ApiError::Config(format!("invalid mime type '{mime}': {err}")))?;
        }

        let form = self
            .fields
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()));

        Ok(form.part(self.field_name.clone(), part))
    }
}

/// One logical API call
///
/// Immutable once issued except for `attempt`, which the executor bumps on
/// every retry.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub headers: HeaderMap,
    /// Safe to repeat on connectivity failures
    pub retryable: bool,
    /// Zero-based retry counter
    pub attempt: u32,
    /// Do not enter the refresh path on 401 (login, logout)
    pub skip_auth_refresh: bool,
    /// Send without an `Authorization` header
    pub anonymous: bool,
}

impl RequestDescriptor {
    /// GET and HEAD are retryable by default; other verbs must opt in.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let retryable = method == Method::GET || method == Method::HEAD;
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
            retryable,
            attempt: 0,
            skip_auth_refresh: false,
            anonymous: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    ///
    /// # Errors
    /// Returns `ApiError::Serialization` if `body` cannot be represented as
    /// JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|err| ApiError::Serialization(err.to_string()))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    #[must_use]
    pub fn multipart(mut self, upload: MultipartUpload) -> Self {
        self.body = RequestBody::Multipart(upload);
        self
    }

    /// Add a header; invalid names or values are rejected
    ///
    /// # Errors
    /// Returns `ApiError::Config` for a malformed header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| ApiError::Config(format!("invalid header name '{name}': {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| ApiError::Config(format!("invalid header value: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Opt a mutating request in (or a read out) of automatic retries
    #[must_use]
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    #[must_use]
    pub fn skip_auth_refresh(mut self) -> Self {
        self.skip_auth_refresh = true;
        self
    }

    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self.skip_auth_refresh = true;
        self
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

/// Successful response, fully buffered
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Base URL of the endpoint that answered
    pub endpoint: String,
}

impl ApiResponse {
    /// Deserialize the body; 204/205 deserialize from JSON `null`
    ///
    /// # Errors
    /// Returns `ApiError::Serialization` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.status == StatusCode::NO_CONTENT || self.status == StatusCode::RESET_CONTENT {
            // 204 and 205 never carry a body
            return serde_json::from_value(Value::Null).map_err(|_| {
                ApiError::Serialization(format!(
                    "No content response ({}), but response type cannot be deserialized from empty body",
                    self.status.as_u16()
                ))
            });
        }

        serde_json::from_slice(&self.body)
            .map_err(|err| ApiError::Serialization(format!("Failed to parse response: {err}")))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
