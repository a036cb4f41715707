//! Configuration infrastructure
//!
//! Settings are layered: built-in defaults, then the JSON config file, then
//! `CATALOG_SYNC_*` environment variables (nested keys separated by `__`),
//! then the short legacy variables such as `SHOPIFY_ACCESS_TOKEN`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::infrastructure::parsing::CatalogSelectors;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub selectors: CatalogSelectors,
    pub browser: BrowserConfig,
    pub shopify: ShopifyConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Catalog entry point and extraction pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Listing page every run starts from
    pub listing_url: String,

    /// Base for resolving relative links and media sources
    pub base_url: String,

    pub category: String,
    pub subcategory: String,

    /// Upper bound of cards processed per run
    pub max_items: usize,

    /// Wait after each navigation before reading the page
    pub page_load_delay_ms: u64,

    /// Pause between two cards
    pub card_delay_ms: u64,

    /// Upper bound for the carousel viewer to show a clicked thumbnail
    pub carousel_wait_ms: u64,

    pub carousel_poll_ms: u64,

    /// Open the first variant row to read technical tables
    pub open_first_variant: bool,

    /// Write a PNG of every detail page
    pub screenshots: bool,

    pub screenshot_dir: Option<PathBuf>,
}

/// WebDriver session settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub timeout_seconds: u64,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
}

/// Destination store connection
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShopifyConfig {
    /// `myshop`, `myshop.myshopify.com` or a full https URL
    pub shop_url: String,
    pub access_token: String,
    pub api_version: String,
    pub min_request_interval_ms: u64,

    /// Wait used when a 429 response carries no Retry-After header
    pub default_retry_after_seconds: f64,

    pub request_timeout_seconds: u64,
}

/// Bulk sync behavior and product mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Pause between two records
    pub item_delay_ms: u64,

    /// Verify the store connection before the first record
    pub check_connection: bool,

    pub vendor: String,
    pub product_status: String,
    pub max_images: usize,
    pub metafield_namespace: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,

    /// Directory for log files; the app data directory when unset
    pub log_dir: Option<PathBuf>,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,
    pub auto_cleanup_logs: bool,
    pub keep_only_latest: bool,

    /// Module-specific level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            listing_url: defaults::LISTING_URL.to_string(),
            base_url: defaults::BASE_URL.to_string(),
            category: defaults::CATEGORY.to_string(),
            subcategory: defaults::SUBCATEGORY.to_string(),
            max_items: defaults::MAX_ITEMS,
            page_load_delay_ms: defaults::PAGE_LOAD_DELAY_MS,
            card_delay_ms: defaults::CARD_DELAY_MS,
            carousel_wait_ms: defaults::CAROUSEL_WAIT_MS,
            carousel_poll_ms: defaults::CAROUSEL_POLL_MS,
            open_first_variant: true,
            screenshots: false,
            screenshot_dir: None,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: defaults::WEBDRIVER_URL.to_string(),
            headless: true,
            timeout_seconds: defaults::BROWSER_TIMEOUT_SECONDS,
            window_width: 1920,
            window_height: 1080,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            shop_url: String::new(),
            access_token: String::new(),
            api_version: defaults::SHOPIFY_API_VERSION.to_string(),
            min_request_interval_ms: defaults::MIN_REQUEST_INTERVAL_MS,
            default_retry_after_seconds: defaults::DEFAULT_RETRY_AFTER_SECONDS,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("shop_url", &self.shop_url)
            .field("access_token", &if self.access_token.is_empty() { "" } else { "***" })
            .field("api_version", &self.api_version)
            .field("min_request_interval_ms", &self.min_request_interval_ms)
            .field("default_retry_after_seconds", &self.default_retry_after_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl ShopifyConfig {
    pub fn is_configured(&self) -> bool {
        !self.shop_url.trim().is_empty() && !self.access_token.trim().is_empty()
    }

    /// Admin API root, e.g. `https://myshop.myshopify.com/admin/api/2024-01`
    pub fn api_base_url(&self) -> String {
        let shop = self.shop_url.trim().trim_end_matches('/');
        let origin = if shop.starts_with("http://") || shop.starts_with("https://") {
            shop.to_string()
        } else if shop.ends_with(".myshopify.com") {
            format!("https://{shop}")
        } else {
            format!("https://{shop}.myshopify.com")
        };
        format!("{}/admin/api/{}", origin, self.api_version)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: defaults::SYNC_ITEM_DELAY_MS,
            check_connection: true,
            vendor: defaults::VENDOR.to_string(),
            product_status: defaults::PRODUCT_STATUS.to_string(),
            max_images: defaults::MAX_IMAGES,
            metafield_namespace: defaults::METAFIELD_NAMESPACE.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            log_dir: None,
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: true,
            keep_only_latest: false,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("fantoccini".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters.insert("catalog_sync_lib".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl AppConfig {
    /// Build the layered configuration. A missing file is not an error.
    pub fn load_layered(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&Self::default()).context("Failed to seed default configuration")?,
        );
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Short variable names kept for existing deployments.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SHOPIFY_SHOP_URL").filter(|v| !v.is_empty()) {
            self.shopify.shop_url = v;
        }
        if let Some(v) = lookup("SHOPIFY_ACCESS_TOKEN").filter(|v| !v.is_empty()) {
            self.shopify.access_token = v;
        }
        if let Some(v) = lookup("HEADLESS_MODE") {
            self.browser.headless = matches!(v.to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(v) = lookup("BROWSER_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.browser.timeout_seconds = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.listing_url.trim().is_empty() {
            anyhow::bail!("catalog.listing_url must not be empty");
        }
        url::Url::parse(&self.catalog.listing_url)
            .with_context(|| format!("catalog.listing_url is not a valid URL: {}", self.catalog.listing_url))?;
        if self.browser.timeout_seconds == 0 {
            anyhow::bail!("browser.timeout_seconds must be greater than 0");
        }
        if self.shopify.min_request_interval_ms == 0 {
            anyhow::bail!("shopify.min_request_interval_ms must be greater than 0");
        }
        if self.shopify.request_timeout_seconds == 0 {
            anyhow::bail!("shopify.request_timeout_seconds must be greater than 0");
        }
        if self.catalog.carousel_poll_ms == 0 {
            anyhow::bail!("catalog.carousel_poll_ms must be greater than 0");
        }
        Ok(())
    }
}

/// Configuration manager for locating, loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    /// Get application data directory (logs, staging files, screenshots)
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(data_dir)
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Write the default file on first run, then load the layered configuration.
    pub async fn initialize_on_first_run(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("🎉 First run detected - writing default configuration");
            self.save_config(&AppConfig::default()).await?;
        }
        self.load_config().await
    }

    /// Load the layered configuration. A corrupted file is backed up and replaced by defaults.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)
                .await
                .context("Failed to read configuration file")?;
            if let Err(parse_error) = serde_json::from_str::<AppConfig>(&content) {
                warn!("⚠️  Configuration file is not valid: {}", parse_error);
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }
                self.save_config(&AppConfig::default())
                    .await
                    .context("Failed to save default configuration")?;
            }
        }

        let cfg = AppConfig::load_layered(Some(&self.config_path))?;
        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(cfg)
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;
        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("🔄 Resetting configuration to defaults");
        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;
        Ok(default_config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "catalog-sync";
    pub const CONFIG_FILE_NAME: &str = "catalog_sync_config.json";
    pub const ENV_PREFIX: &str = "CATALOG_SYNC";

    pub const LISTING_URL: &str =
        "https://wilo.com/de/de/Katalog/de/anwendung/industrie/heizung/heizung";
    pub const BASE_URL: &str = "https://wilo.com";
    pub const CATEGORY: &str = "Industrie Heizung";
    pub const SUBCATEGORY: &str = "Heizungspumpen";
    pub const MAX_ITEMS: usize = 10;

    pub const PAGE_LOAD_DELAY_MS: u64 = 5000;
    pub const CARD_DELAY_MS: u64 = 2000;
    pub const CAROUSEL_WAIT_MS: u64 = 3000;
    pub const CAROUSEL_POLL_MS: u64 = 200;

    pub const WEBDRIVER_URL: &str = "http://localhost:4444";
    pub const BROWSER_TIMEOUT_SECONDS: u64 = 30;
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    pub const SHOPIFY_API_VERSION: &str = "2024-01";
    pub const MIN_REQUEST_INTERVAL_MS: u64 = 500;
    pub const DEFAULT_RETRY_AFTER_SECONDS: f64 = 2.0;
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const SYNC_ITEM_DELAY_MS: u64 = 500;
    pub const VENDOR: &str = "Wilo";
    pub const PRODUCT_STATUS: &str = "draft";
    pub const MAX_IMAGES: usize = 10;
    pub const METAFIELD_NAMESPACE: &str = "wilo";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_MAX_FILES: u32 = 5;
}

/// URL helpers
pub mod utils {
    use url::Url;

    /// Resolve a link or media source against the page it was found on.
    ///
    /// Protocol-relative sources get `https:`; anything unparseable is returned unchanged.
    pub fn resolve_url(base: &str, raw: &str) -> String {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("http://") || raw.starts_with("https://") {
            return raw.to_string();
        }
        if let Some(rest) = raw.strip_prefix("//") {
            return format!("https://{rest}");
        }
        Url::parse(base)
            .and_then(|b| b.join(raw))
            .map_or_else(|_| raw.to_string(), |u| u.to_string())
    }
}
