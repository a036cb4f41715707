//! Infrastructure layer: browser automation, parsing, the Shopify API,
//! configuration, logging and the staging file.

pub mod browser;
pub mod config;
pub mod logging;
pub mod parsing;
pub mod pipeline_error;
pub mod shopify;
pub mod staging;

pub use browser::{BrowserDriver, WebDriverSession};
pub use config::{AppConfig, ConfigManager};
pub use logging::{init_logging, init_logging_with_config};
pub use parsing::{CatalogSelectors, DetailPageParser, SelectorCascade, SpecTableParser};
pub use pipeline_error::{PipelineError, PipelineResult};
pub use shopify::{ApiTransport, RateLimitedApiClient, ShopifyApi};
