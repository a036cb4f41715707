//! Typed Admin API endpoints used by the sync pipeline

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};
use crate::infrastructure::shopify::product_mapper::NewProduct;
use crate::infrastructure::shopify::rate_limited_client::RateLimitedApiClient;
use crate::infrastructure::shopify::transport::ApiTransport;

/// Admin API page size ceiling
pub const MAX_PAGE_SIZE: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopInfo {
    pub name: String,
    #[serde(default)]
    pub myshopify_domain: Option<String>,
}

pub struct ShopifyApi<T> {
    client: RateLimitedApiClient<T>,
}

impl<T: ApiTransport> ShopifyApi<T> {
    pub const fn new(client: RateLimitedApiClient<T>) -> Self {
        Self { client }
    }

    pub const fn client(&self) -> &RateLimitedApiClient<T> {
        &self.client
    }

    /// Connection check; fails when credentials or shop are wrong.
    pub async fn shop(&self) -> PipelineResult<ShopInfo> {
        let body = self.client.get("shop.json").await?;
        let shop: ShopInfo = field(body, "shop")?;
        info!("✅ Connected to shop: {}", shop.name);
        Ok(shop)
    }

    /// Path of the exact-title search, title form-encoded
    pub fn search_path(title: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(title.as_bytes()).collect();
        format!("products.json?title={encoded}&limit=1")
    }

    pub async fn find_by_title(&self, title: &str) -> PipelineResult<Option<RemoteProduct>> {
        let body = self.client.get(&Self::search_path(title)).await?;
        let products: Vec<RemoteProduct> = field(body, "products")?;
        Ok(products.into_iter().next())
    }

    pub async fn create_product(&self, product: &NewProduct) -> PipelineResult<RemoteProduct> {
        let body = self
            .client
            .post("products.json", json!({ "product": product }))
            .await?;
        field(body, "product")
    }

    pub async fn delete_product(&self, id: u64) -> PipelineResult<()> {
        self.client.delete(&format!("products/{id}.json")).await.map(|_| ())
    }

    pub async fn list_products(&self, limit: usize) -> PipelineResult<Vec<RemoteProduct>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let body = self.client.get(&format!("products.json?limit={limit}")).await?;
        field(body, "products")
    }
}

fn field<D: serde::de::DeserializeOwned>(mut body: Value, key: &str) -> PipelineResult<D> {
    let value = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| PipelineError::Serialization {
            message: format!("response has no '{key}' field"),
        })?;
    Ok(serde_json::from_value(value)?)
}
