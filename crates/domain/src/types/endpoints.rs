//! Ordered candidate base URLs

use url::Url;

use crate::config::ClientConfig;
use crate::errors::{Result, TradepostError};

/// Ordered, non-empty, de-duplicated list of base URLs
///
/// Static per client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointList {
    bases: Vec<String>,
}

impl EndpointList {
    /// Build a list from raw base URLs, preserving order and dropping duplicates
    ///
    /// # Errors
    /// Returns `TradepostError::Config` if the list is empty or a URL is not
    /// an absolute http(s) URL.
    pub fn new<I, S>(bases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for base in bases {
            let base = normalize(base.as_ref())?;
            if !normalized.contains(&base) {
                normalized.push(base);
            }
        }

        if normalized.is_empty() {
            return Err(TradepostError::Config("endpoint list is empty".to_string()));
        }

        Ok(Self { bases: normalized })
    }

    /// Primary, HTTP twin (if enabled), fallback, secondary
    ///
    /// # Errors
    /// Returns `TradepostError::Config` for malformed URLs.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut bases = vec![config.api_url.clone()];

        if config.http_fallback {
            let mut primary = Url::parse(&config.api_url)?;
            if primary.scheme() == "https" {
                primary
                    .set_scheme("http")
                    .map_err(|()| TradepostError::Config("cannot derive http fallback".into()))?;
                bases.push(primary.to_string());
            }
        }

        bases.extend(config.fallback_api_url.iter().cloned());
        bases.extend(config.secondary_api_url.iter().cloned());

        Self::new(bases)
    }

    pub fn primary(&self) -> &str {
        &self.bases[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.bases.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Join a base URL and an API path without doubling or dropping slashes
    pub fn join(base: &str, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

fn normalize(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim())?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TradepostError::Config(format!("unsupported scheme '{other}' in {raw}")))
        }
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
