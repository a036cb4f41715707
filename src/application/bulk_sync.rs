//! Bulk upload of extracted records to the store
//!
//! Records are processed strictly in order, one API call at a time. A record
//! that fails is recorded and the batch moves on; only a failed setup marks
//! the whole batch failed without touching the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::application::events::RunContext;
use crate::application::upload_deduplicator::UploadDeduplicator;
use crate::domain::events::RunPhase;
use crate::domain::product_record::ProductRecord;
use crate::domain::sync_result::{SyncAction, SyncResult};
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};
use crate::infrastructure::shopify::{ApiTransport, ProductMapper, ShopifyApi};

pub struct BulkSyncOrchestrator<T> {
    api: Arc<ShopifyApi<T>>,
    deduplicator: UploadDeduplicator<T>,
    mapper: ProductMapper,
    item_delay: Duration,
    check_connection: bool,
}

impl<T: ApiTransport> BulkSyncOrchestrator<T> {
    pub fn new(api: Arc<ShopifyApi<T>>, config: &SyncConfig) -> Self {
        Self {
            deduplicator: UploadDeduplicator::new(Arc::clone(&api)),
            api,
            mapper: ProductMapper::from_config(config),
            item_delay: Duration::from_millis(config.item_delay_ms),
            check_connection: config.check_connection,
        }
    }

    /// Sync `records` in order. Cancellation is honored between items; the
    /// item in flight always finishes.
    pub async fn sync(&self, records: Vec<ProductRecord>, ctx: &RunContext) -> SyncResult {
        let total = records.len();
        ctx.status(RunPhase::Sync, format!("Starting sync of {total} records"));

        if self.check_connection {
            if let Err(e) = self.api.shop().await {
                let setup = PipelineError::setup(format!("store connection check failed: {e}"));
                return fail_all(records, &setup, ctx);
            }
        }

        let mut result = SyncResult::new();
        let mut cancelled = false;

        for (index, record) in records.into_iter().enumerate() {
            if ctx.is_cancelled() {
                cancelled = true;
                break;
            }
            if index > 0 {
                tokio::select! {
                    () = ctx.cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    () = sleep(self.item_delay) => {}
                }
            }

            let outcome = self.sync_one(&record).await;
            let message = match &outcome {
                Ok((id, SyncAction::Created)) => format!("created (id {id})"),
                Ok((id, SyncAction::Skipped)) => format!("skipped, already exists (id {id})"),
                Err(e) => format!("failed: {e}"),
            };
            ctx.status(
                RunPhase::Sync,
                format!("[{}/{}] {}: {}", index + 1, total, record.name, message),
            );

            match outcome {
                Ok((remote_id, action)) => result.record_success(record, remote_id, action),
                Err(e) => {
                    warn!("❌ '{}' failed: {}", record.name, e);
                    result.record_failure(record, e.to_string());
                }
            }
        }

        result.finish(cancelled);
        if cancelled {
            info!("🛑 Sync cancelled after {} of {} records", result.total(), total);
        }
        ctx.status(RunPhase::Sync, result.summary_line());
        result
    }

    async fn sync_one(&self, record: &ProductRecord) -> PipelineResult<(u64, SyncAction)> {
        if let Some(existing) = self.deduplicator.find_existing(&record.name).await {
            info!("⏭️ '{}' exists as product {}, skipping", record.name, existing.id);
            return Ok((existing.id, SyncAction::Skipped));
        }
        let product = self.mapper.map(record);
        let created = self.api.create_product(&product).await?;
        info!("✅ Created '{}' as product {}", record.name, created.id);
        Ok((created.id, SyncAction::Created))
    }
}

/// Result for a batch that never reached the store: every record failed with `error`.
pub fn fail_all(records: Vec<ProductRecord>, error: &PipelineError, ctx: &RunContext) -> SyncResult {
    warn!("❌ Sync could not start: {}", error);
    ctx.status(RunPhase::Sync, format!("Sync could not start: {error}"));

    let mut result = SyncResult::new();
    for record in records {
        result.record_failure(record, error.to_string());
    }
    result.finish(false);
    ctx.status(RunPhase::Sync, result.summary_line());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::shopify::{HttpMethod, RateLimitedApiClient};
    use crate::test_utils::{created_product, json_response, search_result, RecordingSink, ScriptedTransport};
    use serde_json::json;

    fn orchestrator(transport: ScriptedTransport, config: SyncConfig) -> BulkSyncOrchestrator<ScriptedTransport> {
        let client = RateLimitedApiClient::new(transport, Duration::ZERO, Duration::from_secs(2));
        BulkSyncOrchestrator::new(Arc::new(ShopifyApi::new(client)), &config)
    }

    fn quick_config() -> SyncConfig {
        SyncConfig {
            item_delay_ms: 10,
            check_connection: false,
            ..SyncConfig::default()
        }
    }

    fn record(name: &str) -> ProductRecord {
        ProductRecord::new(format!("catalog_{name}"), name, "Industrie Heizung", "Heizungspumpen")
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_create_is_recorded_and_the_batch_continues() {
        let transport = ScriptedTransport::new();
        transport.on(HttpMethod::Get, "products.json?title=", vec![search_result(&[])]);
        transport.on(
            HttpMethod::Post,
            "products.json",
            vec![
                json_response(422, json!({"errors": {"title": ["can't be blank"]}})),
                created_product(7, "B"),
            ],
        );
        let sink = Arc::new(RecordingSink::new());

        let result = orchestrator(transport, quick_config())
            .sync(vec![record("A"), record("B")], &RunContext::new(sink.clone()))
            .await;

        assert_eq!((result.total(), result.success_count(), result.error_count()), (2, 1, 1));
        assert!(result.failed()[0].error.contains("422"));
        assert_eq!(result.successful()[0].remote_id, 7);
        assert!(result.is_consistent());

        let statuses = sink.statuses();
        assert!(statuses.iter().any(|s| s.starts_with("[1/2] A: failed")));
        assert!(statuses.iter().any(|s| s.starts_with("[2/2] B: created")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connection_check_fails_every_record_without_searching() {
        let transport = ScriptedTransport::new();
        transport.on(HttpMethod::Get, "shop.json", vec![json_response(401, json!({"errors": "Invalid API key"}))]);
        let sync = orchestrator(
            transport,
            SyncConfig {
                check_connection: true,
                ..quick_config()
            },
        );

        let result = sync
            .sync(vec![record("A"), record("B")], &RunContext::new(Arc::new(RecordingSink::new())))
            .await;

        assert_eq!((result.total(), result.error_count()), (2, 2));
        assert!(result.failed().iter().all(|f| f.error.starts_with("Setup failed")));
        assert_eq!(sync.api.client().transport().requests().len(), 1);
    }
}
