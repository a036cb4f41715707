//! Shopify Admin REST API integration
//!
//! Layering: [`ApiTransport`] performs raw HTTP, [`RateLimitedApiClient`]
//! adds pacing and throttle handling, [`ShopifyApi`] exposes typed
//! endpoints, and [`ProductMapper`] builds the product payload.

pub mod api;
pub mod product_mapper;
pub mod rate_limited_client;
pub mod transport;

pub use api::{RemoteProduct, ShopInfo, ShopifyApi};
pub use product_mapper::{NewProduct, ProductMapper};
pub use rate_limited_client::RateLimitedApiClient;
pub use transport::{ApiRequest, ApiResponse, ApiTransport, HttpMethod, ReqwestTransport};

use crate::infrastructure::config::ShopifyConfig;
use crate::infrastructure::pipeline_error::PipelineResult;

/// Production API stack for the given store configuration.
pub fn connect(config: &ShopifyConfig) -> PipelineResult<ShopifyApi<ReqwestTransport>> {
    let transport = ReqwestTransport::new(config)?;
    Ok(ShopifyApi::new(RateLimitedApiClient::from_config(transport, config)))
}
