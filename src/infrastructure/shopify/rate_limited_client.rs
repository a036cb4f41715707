//! Rate-limited Admin API client
//!
//! Calls are serialized through one lock: each call waits until the minimum
//! interval since the previous call has passed, and a 429 response is retried
//! once after the server-provided wait.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::infrastructure::config::ShopifyConfig;
use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};
use crate::infrastructure::shopify::transport::{ApiRequest, ApiResponse, ApiTransport};

pub const TOO_MANY_REQUESTS: u16 = 429;

/// Retries granted after a 429 before the throttle is surfaced
const MAX_THROTTLE_RETRIES: u32 = 1;

pub struct RateLimitedApiClient<T> {
    transport: T,
    min_interval: Duration,
    default_retry_after: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<T: ApiTransport> RateLimitedApiClient<T> {
    pub fn new(transport: T, min_interval: Duration, default_retry_after: Duration) -> Self {
        Self {
            transport,
            min_interval,
            default_retry_after,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_config(transport: T, config: &ShopifyConfig) -> Self {
        Self::new(
            transport,
            Duration::from_millis(config.min_request_interval_ms),
            seconds(config.default_retry_after_seconds).unwrap_or(Duration::from_secs(2)),
        )
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn get(&self, path: &str) -> PipelineResult<Value> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> PipelineResult<Value> {
        self.execute(ApiRequest::post(path, body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> PipelineResult<Value> {
        self.execute(ApiRequest::put(path, body)).await
    }

    pub async fn delete(&self, path: &str) -> PipelineResult<Value> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Send `request`, returning the JSON body of a 2xx response.
    pub async fn execute(&self, request: ApiRequest) -> PipelineResult<Value> {
        let mut last_call = self.last_call.lock().await;
        let mut throttle_retries = 0;

        loop {
            if let Some(previous) = *last_call {
                let elapsed = previous.elapsed();
                if elapsed < self.min_interval {
                    sleep(self.min_interval - elapsed).await;
                }
            }

            let sent = self.transport.send(&request).await;
            *last_call = Some(Instant::now());
            let response = sent?;

            if response.status == TOO_MANY_REQUESTS {
                let wait = self.retry_after(&response);
                if throttle_retries >= MAX_THROTTLE_RETRIES {
                    warn!("⚠️  Still throttled on {} {}, giving up", request.method, request.path);
                    return Err(PipelineError::Throttled {
                        retry_after: wait,
                        path: request.path.clone(),
                    });
                }
                throttle_retries += 1;
                warn!("⏳ Throttled on {} {}, retrying in {:?}", request.method, request.path, wait);
                sleep(wait).await;
                continue;
            }

            if !response.is_success() {
                return Err(PipelineError::RemoteRejected {
                    method: request.method.to_string(),
                    path: request.path.clone(),
                    status: response.status,
                    message: error_message(&response.body),
                });
            }

            debug!("{} {} succeeded ({})", request.method, request.path, response.status);
            return Ok(response.body);
        }
    }

    fn retry_after(&self, response: &ApiResponse) -> Duration {
        response
            .retry_after
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .and_then(seconds)
            .unwrap_or(self.default_retry_after)
    }
}

fn seconds(value: f64) -> Option<Duration> {
    (value.is_finite() && value >= 0.0).then(|| Duration::from_secs_f64(value))
}

/// Admin API errors arrive as `{"errors": ...}`; fall back to the whole body.
fn error_message(body: &Value) -> String {
    match body.get("errors") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => match body {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}
