//! Network access for the engine.
//!
//! [`Network`] is the seam between the cache logic and the transport: the
//! strategy engine and lifecycle controller only ever see the trait, and
//! [`FetchClient`] implements it over reqwest.
//!
//! ### Response types
//! - Same-origin responses and navigations are `basic`
//! - Cross-origin `cors` requests yield `cors`
//! - Other cross-origin requests yield `opaque`
//!
//! No request timeout is imposed here; a stalled transfer is left to the
//! transport's own limits.

#[cfg(test)]
pub(crate) mod scripted;
pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::Instant;

pub use self::url::{UrlError, resolve};

use tilecache_core::{AppConfig, ConfigError, Error, Request, RequestMode, Response, ResponseType};

/// Issues a request over the network and buffers the response.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch a request.
    ///
    /// Any HTTP status is a successful fetch; only transport failures are
    /// errors.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "tilecache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Origin the application is served from
    pub app_origin: ::url::Url,
}

impl FetchConfig {
    /// Derive fetch settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            max_redirects: 5,
            app_origin: config.app_origin_url()?,
        })
    }
}

/// reqwest-backed [`Network`] implementation.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }
}

/// Whether a declared content length is over the byte limit.
///
/// A length that does not fit in `usize` is always over.
fn exceeds_limit(len: u64, max_bytes: usize) -> bool {
    usize::try_from(len).map_or(true, |n| n > max_bytes)
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        if request.mode == RequestMode::SameOrigin && request.url.origin() != self.config.app_origin.origin() {
            return Err(Error::Network(format!("same-origin request to cross-origin URL {}", request.url)));
        }

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let response = self
            .http
            .request(method, request.url.as_str())
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {e}", request.url)))?;

        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && exceeds_limit(len, self.config.max_bytes)
        {
            return Err(Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let response_type = ResponseType::for_request(request, &final_url, &self.config.app_origin.origin());

        tracing::debug!(
            url = %request.url,
            status,
            response_type = %response_type,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(Response { url: final_url, status, response_type, headers, body })
    }
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FetchClient {
        let config = FetchConfig::from_app_config(&AppConfig {
            app_origin: "https://maps.example.com".into(),
            ..Default::default()
        })
        .unwrap();
        FetchClient::new(config).unwrap()
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let config = FetchConfig::from_app_config(&AppConfig::default()).unwrap();
        assert_eq!(config.user_agent, "tilecache/0.1");
        assert_eq!(config.max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.app_origin.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_content_length_limit() {
        assert!(!exceeds_limit(1024, 1024));
        assert!(exceeds_limit(1025, 1024));
        assert!(exceeds_limit(u64::MAX, usize::MAX - 1));
    }

    #[tokio::test]
    async fn test_same_origin_mode_rejects_cross_origin() {
        let client = client();
        let request = Request::parse("https://tile.example.org/1/0/0.png").unwrap().with_mode(RequestMode::SameOrigin);
        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
