//! catalog-sync - catalog extraction and Shopify bulk sync
//!
//! Drives a browser through a manufacturer catalog, turns every detail page
//! into a [`domain::ProductRecord`], and uploads the records to a Shopify
//! store with rate limiting and duplicate detection.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;
