//! Domain module - records, sync outcomes and run events
//!
//! Everything here is free of I/O: the pipelines in `application` fill these
//! types, and `infrastructure` moves them over the wire or onto disk.

pub mod description;
pub mod events;
pub mod product_record;
pub mod sync_result;

pub use description::{compose, is_boilerplate, ADVANTAGES_HEADING};
pub use events::{EventSink, RunEvent, RunPhase, RunSummary};
pub use product_record::{CardData, ExtractionStatus, ProductRecord, TechnicalSpecTable};
pub use sync_result::{FailedItem, SyncAction, SyncResult, SyncedItem};
