//! Event delivery for running pipelines
//!
//! [`RunContext`] carries the cancellation token and the event sink into a
//! pipeline. Sinks forward events to a channel for a caller on another task,
//! or straight to the log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::events::{EventSink, RunEvent, RunPhase, RunSummary};
use crate::domain::product_record::ProductRecord;

/// Run-scoped state handed to a pipeline
#[derive(Clone)]
pub struct RunContext {
    /// Correlates log lines of one run
    pub run_id: String,
    pub cancel: CancellationToken,
    pub sink: Arc<dyn EventSink>,
}

impl RunContext {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_token(CancellationToken::new(), sink)
    }

    pub fn with_token(cancel: CancellationToken, sink: Arc<dyn EventSink>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            cancel,
            sink,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn status(&self, phase: RunPhase, message: impl AsRef<str>) {
        self.sink.on_status(phase, message.as_ref());
    }
}

/// Sink that forwards every event to an unbounded channel
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<RunEvent>,
    /// Whether event emission is enabled
    enabled: AtomicBool,
}

impl ChannelEventSink {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<RunEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sink = Arc::new(Self {
            sender,
            enabled: AtomicBool::new(true),
        });
        (sink, receiver)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        debug!("Event emission {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn emit(&self, event: RunEvent) {
        if !self.is_enabled() {
            return;
        }
        let name = event.event_name();
        if self.sender.send(event).is_err() {
            debug!("Dropped {} event: receiver closed", name);
        }
    }
}

impl EventSink for ChannelEventSink {
    fn on_status(&self, phase: RunPhase, message: &str) {
        self.emit(RunEvent::Status {
            phase,
            message: message.to_string(),
        });
    }

    fn on_item(&self, record: &ProductRecord) {
        self.emit(RunEvent::Item {
            record: Box::new(record.clone()),
        });
    }

    fn on_done(&self, summary: &RunSummary) {
        self.emit(RunEvent::Done {
            summary: Box::new(summary.clone()),
        });
    }
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn on_status(&self, phase: RunPhase, message: &str) {
        info!("[{}] {}", phase, message);
    }

    fn on_item(&self, record: &ProductRecord) {
        info!(
            "📦 {} ({} images, {} videos, {} spec tables)",
            record.name,
            record.images().len(),
            record.videos().len(),
            record.technical_specifications().len()
        );
    }

    fn on_done(&self, summary: &RunSummary) {
        match summary {
            RunSummary::Extraction { records, cancelled } => {
                info!("✅ Extraction finished: {} records{}", records.len(), if *cancelled { " (cancelled)" } else { "" });
            }
            RunSummary::Sync(result) => info!("✅ {}", result.summary_line()),
            RunSummary::Failed { phase, message } => info!("❌ {} could not start: {}", phase, message),
        }
    }
}
