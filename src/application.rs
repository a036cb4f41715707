//! Application layer module
//!
//! Orchestrates the extraction and sync pipelines on top of the browser and
//! store boundaries from the infrastructure layer.

pub mod bulk_sync;
pub mod catalog_navigator;
pub mod detail_page_extractor;
pub mod events;
pub mod pipeline;
pub mod upload_deduplicator;

pub use bulk_sync::{fail_all, BulkSyncOrchestrator};
pub use catalog_navigator::CatalogNavigator;
pub use detail_page_extractor::{DetailPageExtractor, ExtractionState};
pub use events::{ChannelEventSink, RunContext, TracingEventSink};
pub use pipeline::{spawn_extraction, spawn_sync};
pub use upload_deduplicator::UploadDeduplicator;
