//! Entry points that run a phase on its own task
//!
//! Each phase reports a terminal status and exactly one `on_done`, whether it
//! ran to completion, was cancelled, or could not start.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::application::bulk_sync::{fail_all, BulkSyncOrchestrator};
use crate::application::catalog_navigator::CatalogNavigator;
use crate::application::events::RunContext;
use crate::domain::events::{RunPhase, RunSummary};
use crate::domain::product_record::ProductRecord;
use crate::domain::sync_result::SyncResult;
use crate::infrastructure::browser::BrowserDriver;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::pipeline_error::PipelineResult;
use crate::infrastructure::shopify::{ApiTransport, ShopifyApi};

/// Run catalog extraction on a dedicated task. A browser session that failed
/// to start is reported as a failed extraction.
pub fn spawn_extraction<D>(
    driver: PipelineResult<Arc<D>>,
    config: &AppConfig,
    max_count: usize,
    ctx: RunContext,
) -> JoinHandle<Vec<ProductRecord>>
where
    D: BrowserDriver + 'static,
    D::Element: 'static,
{
    let navigator = driver.and_then(|driver| CatalogNavigator::new(driver, &config.catalog, &config.selectors));

    tokio::spawn(async move {
        let navigator = match navigator {
            Ok(navigator) => navigator,
            Err(e) => {
                error!(run_id = %ctx.run_id, "❌ Extraction could not start: {}", e);
                ctx.status(RunPhase::Extraction, format!("Extraction could not start: {e}"));
                ctx.sink.on_done(&RunSummary::Failed {
                    phase: RunPhase::Extraction,
                    message: e.to_string(),
                });
                return Vec::new();
            }
        };

        info!(run_id = %ctx.run_id, "🚀 Extraction started (up to {} items)", max_count);
        ctx.status(RunPhase::Extraction, format!("Extracting up to {max_count} items"));
        let records = navigator.extract(max_count, &ctx).await;
        let cancelled = ctx.is_cancelled();

        ctx.status(
            RunPhase::Extraction,
            format!(
                "Extraction finished: {} records{}",
                records.len(),
                if cancelled { " (cancelled)" } else { "" }
            ),
        );
        ctx.sink.on_done(&RunSummary::Extraction {
            records: records.clone(),
            cancelled,
        });
        records
    })
}

/// Run the bulk sync on a dedicated task. A failed client setup marks every record failed.
pub fn spawn_sync<T>(
    api: PipelineResult<ShopifyApi<T>>,
    config: &SyncConfig,
    records: Vec<ProductRecord>,
    ctx: RunContext,
) -> JoinHandle<SyncResult>
where
    T: ApiTransport + 'static,
{
    let config = config.clone();

    tokio::spawn(async move {
        let result = match api {
            Ok(api) => {
                BulkSyncOrchestrator::new(Arc::new(api), &config)
                    .sync(records, &ctx)
                    .await
            }
            Err(e) => fail_all(records, &e, &ctx),
        };
        info!(run_id = %ctx.run_id, "🏁 {}", result.summary_line());
        ctx.sink.on_done(&RunSummary::Sync(result.clone()));
        result
    })
}
