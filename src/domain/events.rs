//! Event types for one-way progress reporting
//!
//! Pipelines never return control to their caller mid-run; everything the
//! caller sees while a run is in flight goes through an [`EventSink`].

use serde::{Deserialize, Serialize};

use crate::domain::product_record::ProductRecord;
use crate::domain::sync_result::SyncResult;

/// Which pipeline produced an event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Extraction,
    Sync,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extraction => write!(f, "extraction"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

/// Terminal outcome of a run, delivered exactly once through `on_done`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunSummary {
    Extraction {
        records: Vec<ProductRecord>,
        cancelled: bool,
    },
    Sync(SyncResult),
    /// The phase could not start at all
    Failed { phase: RunPhase, message: String },
}

impl RunSummary {
    pub const fn phase(&self) -> RunPhase {
        match self {
            Self::Extraction { .. } => RunPhase::Extraction,
            Self::Sync(_) => RunPhase::Sync,
            Self::Failed { phase, .. } => *phase,
        }
    }
}

/// Events as they travel over a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Status { phase: RunPhase, message: String },
    Item { record: Box<ProductRecord> },
    Done { summary: Box<RunSummary> },
}

impl RunEvent {
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Status { .. } => "run-status",
            Self::Item { .. } => "run-item",
            Self::Done { .. } => "run-done",
        }
    }
}

/// Receiver of pipeline progress. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn on_status(&self, phase: RunPhase, message: &str);

    fn on_item(&self, record: &ProductRecord);

    fn on_done(&self, summary: &RunSummary);
}
