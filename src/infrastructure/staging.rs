//! JSON staging file between extraction and sync
//!
//! A pretty-printed UTF-8 array of records. Loading goes through the record
//! deserializer, so derived fields are rebuilt from the stored text.

use std::path::Path;

use tokio::fs;
use tracing::info;

use crate::domain::product_record::ProductRecord;
use crate::infrastructure::pipeline_error::PipelineResult;

pub async fn save_records(path: &Path, records: &[ProductRecord]) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(records)?;
    fs::write(path, content).await?;
    info!("💾 Saved {} records to {:?}", records.len(), path);
    Ok(())
}

pub async fn load_records(path: &Path) -> PipelineResult<Vec<ProductRecord>> {
    let content = fs::read_to_string(path).await?;
    let records: Vec<ProductRecord> = serde_json::from_str(&content)?;
    info!("📂 Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}
