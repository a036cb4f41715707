//! Remote duplicate check before creating a product

use std::sync::Arc;

use tracing::{debug, warn};

use crate::infrastructure::shopify::{ApiTransport, RemoteProduct, ShopifyApi};

/// Looks up existing store products by exact title.
///
/// Only the title is compared, so a renamed product or a second item with
/// the same name is not told apart.
pub struct UploadDeduplicator<T> {
    api: Arc<ShopifyApi<T>>,
}

impl<T: ApiTransport> UploadDeduplicator<T> {
    pub const fn new(api: Arc<ShopifyApi<T>>) -> Self {
        Self { api }
    }

    /// First remote product carrying `title`. Lookup errors count as no match.
    pub async fn find_existing(&self, title: &str) -> Option<RemoteProduct> {
        if title.trim().is_empty() {
            return None;
        }
        match self.api.find_by_title(title).await {
            Ok(Some(product)) => {
                debug!("'{}' already exists as product {}", title, product.id);
                Some(product)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Duplicate lookup for '{}' failed, treating as new: {}", title, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::shopify::{HttpMethod, RateLimitedApiClient};
    use crate::test_utils::{json_response, search_result, ScriptedTransport};
    use serde_json::json;
    use std::time::Duration;

    fn deduplicator(transport: ScriptedTransport) -> UploadDeduplicator<ScriptedTransport> {
        let client = RateLimitedApiClient::new(transport, Duration::ZERO, Duration::from_secs(2));
        UploadDeduplicator::new(Arc::new(ShopifyApi::new(client)))
    }

    #[tokio::test]
    async fn returns_first_match() {
        let transport = ScriptedTransport::new();
        transport.on(HttpMethod::Get, "products.json?title=", vec![search_result(&[(42, "Pump")])]);
        let found = deduplicator(transport).find_existing("Pump").await;
        assert_eq!(found.map(|p| p.id), Some(42));
    }

    #[tokio::test]
    async fn lookup_errors_count_as_no_match() {
        let transport = ScriptedTransport::new();
        transport.on(
            HttpMethod::Get,
            "products.json?title=",
            vec![json_response(500, json!({"errors": "Internal Server Error"}))],
        );
        assert!(deduplicator(transport).find_existing("Pump").await.is_none());
    }

    #[tokio::test]
    async fn blank_title_skips_the_lookup() {
        let dedup = deduplicator(ScriptedTransport::new());
        assert!(dedup.find_existing("  ").await.is_none());
        assert!(dedup.api.client().transport().requests().is_empty());
    }
}
