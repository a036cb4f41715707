//! HTTP transport for the Admin API
//!
//! The rate-limited client only needs "send this request, give me status,
//! Retry-After and body", so that is all [`ApiTransport`] exposes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::infrastructure::config::ShopifyConfig;
use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};

pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Request relative to the API root, e.g. `products.json?limit=5`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            path: path.into(),
            body: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Raw Retry-After header value, if any
    pub retry_after: Option<String>,
    /// Parsed JSON body; `Value::Null` for empty or non-JSON bodies
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            retry_after: None,
            body,
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Perform one HTTP exchange. Only connection-level failures are errors;
    /// every HTTP status comes back as a response.
    async fn send(&self, request: &ApiRequest) -> PipelineResult<ApiResponse>;
}

/// Production transport backed by reqwest
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &ShopifyConfig) -> PipelineResult<Self> {
        if !config.is_configured() {
            return Err(PipelineError::setup("Shopify shop URL and access token are required"));
        }

        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(config.access_token.trim())
            .map_err(|e| PipelineError::setup(format!("Invalid access token header: {e}")))?;
        token.set_sensitive(true);
        headers.insert(ACCESS_TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("catalog-sync/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| PipelineError::setup(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> PipelineResult<ApiResponse> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| PipelineError::transport(format!("{} {}: {e}", request.method, request.path)))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::transport(format!("Failed to read response body: {e}")))?;
        debug!("{} {} -> {}", request.method, request.path, status);

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_fail_setup() {
        match ReqwestTransport::new(&ShopifyConfig::default()) {
            Err(PipelineError::SetupFailure { .. }) => {}
            other => panic!("expected setup failure, got {:?}", other.map(|t| t.base_url().to_string())),
        }
    }

    #[test]
    fn configured_transport_targets_admin_api() {
        let config = ShopifyConfig {
            shop_url: "demo".to_string(),
            access_token: "shpat_test".to_string(),
            ..ShopifyConfig::default()
        };
        let transport = ReqwestTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "https://demo.myshopify.com/admin/api/2024-01");
    }
}
