//! HTML parsing for catalog pages
//!
//! Selector lists come from [`CatalogSelectors`]; parsers compile them once
//! and evaluate them as ordered cascades against page snapshots.

pub mod config;
pub mod detail_snapshot;
pub mod selector_cascade;
pub mod spec_tables;

pub use config::CatalogSelectors;
pub use detail_snapshot::{DetailPageParser, DetailText};
pub use selector_cascade::{compile_selectors, Extracted, Resolved, SelectorCascade};
pub use spec_tables::SpecTableParser;
