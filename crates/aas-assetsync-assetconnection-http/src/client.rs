//! Thin HTTP client shared by the providers of one connection.

use crate::config::HttpAssetConnectionConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use url::Url;

/// HTTP client resolving provider paths against a base URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a client from the connection configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL or a header is malformed, or if the
    /// underlying client cannot be created.
    pub fn new(config: &HttpAssetConnectionConfig) -> Result<Self, HttpError> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpError::Init(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HttpError::Init(format!("invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = &config.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| HttpError::Init(format!("invalid bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| HttpError::Init(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Absolute URL of a provider path.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Url`] if `path` cannot be joined.
    pub fn url(&self, path: &str) -> Result<Url, HttpError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(format!("{path}: {e}")))
    }

    /// `GET` a resource and return its body.
    ///
    /// # Errors
    ///
    /// Returns error on network failures or non-success status codes.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>, HttpError> {
        let url = self.url(path)?;
        tracing::debug!(url = %url, "GET asset resource");
        self.execute(self.client.get(url)).await
    }

    /// Send a JSON body with `method` and return the response body.
    ///
    /// # Errors
    ///
    /// Returns error on network failures or non-success status codes.
    pub async fn send(&self, method: Method, path: &str, body: String) -> Result<Vec<u8>, HttpError> {
        let url = self.url(path)?;
        tracing::debug!(url = %url, method = %method, body_len = body.len(), "Sending to asset resource");
        let request = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.execute(request).await
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, HttpError> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HttpError::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| HttpError::Request(e.to_string()))
    }
}

/// Parse the base URL so relative paths join below it.
fn parse_base_url(input: &str) -> Result<Url, HttpError> {
    let mut url = Url::parse(input).map_err(|e| HttpError::Url(format!("{input}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HttpError::Url(format!(
            "{input}: unsupported scheme {}",
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Errors that can occur with the HTTP client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    /// Client initialization failed
    #[error("client init error: {0}")]
    Init(String),
    /// Malformed URL
    #[error("invalid URL: {0}")]
    Url(String),
    /// Request failed
    #[error("request error: {0}")]
    Request(String),
    /// Non-success response
    #[error("API error {status}: {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}
