use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use catalog_sync_lib::application::{spawn_extraction, spawn_sync, RunContext, TracingEventSink};
use catalog_sync_lib::domain::ProductRecord;
use catalog_sync_lib::infrastructure::browser::BrowserDriver;
use catalog_sync_lib::infrastructure::staging::{load_records, save_records};
use catalog_sync_lib::infrastructure::{init_logging_with_config, shopify, AppConfig, ConfigManager, WebDriverSession};

const DEFAULT_STAGING_FILE: &str = "catalog_records.json";

#[derive(Parser, Debug)]
#[command(name = "catalog-sync", version, about = "Extract catalog items and sync them into a Shopify store")]
struct Cli {
    /// JSON config file; defaults to the per-user config, created on first run
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract items from the catalog into a staging file
    Extract {
        #[arg(long)]
        max_items: Option<usize>,
        #[arg(long, default_value = DEFAULT_STAGING_FILE)]
        output: PathBuf,
    },
    /// Upload a staging file to the store
    Sync {
        #[arg(long, default_value = DEFAULT_STAGING_FILE)]
        input: PathBuf,
    },
    /// Extract, stage and sync in one go
    Run {
        #[arg(long)]
        max_items: Option<usize>,
        #[arg(long, default_value = DEFAULT_STAGING_FILE)]
        output: PathBuf,
    },
    /// Verify configuration and store credentials
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).await?;
    init_logging_with_config(&config.logging)?;
    info!("🚀 catalog-sync {} starting", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let ctx = RunContext::with_token(cancel, Arc::new(TracingEventSink));

    match cli.command {
        Command::Extract { max_items, output } => {
            let records = extract(&config, max_items, ctx).await?;
            save_records(&output, &records).await?;
        }
        Command::Sync { input } => {
            let records = load_records(&input)
                .await
                .with_context(|| format!("Failed to read staging file {}", input.display()))?;
            sync(&config, records, ctx).await?;
        }
        Command::Run { max_items, output } => {
            let records = extract(&config, max_items, ctx.clone()).await?;
            save_records(&output, &records).await?;
            if ctx.is_cancelled() {
                warn!("Cancelled during extraction, skipping sync");
            } else {
                sync(&config, records, ctx).await?;
            }
        }
        Command::Check => check(&config).await?,
    }
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_layered(Some(path)),
        None => {
            let manager = ConfigManager::new()?;
            manager.initialize_on_first_run().await?;
            AppConfig::load_layered(Some(manager.config_path()))
        }
    }
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C received, finishing the current item");
            token.cancel();
        }
    });
}

async fn extract(config: &AppConfig, max_items: Option<usize>, ctx: RunContext) -> Result<Vec<ProductRecord>> {
    let max_count = max_items.unwrap_or(config.catalog.max_items);
    let (driver, session) = match WebDriverSession::connect(&config.browser).await {
        Ok(session) => {
            let session = Arc::new(session);
            (Ok(Arc::clone(&session)), Some(session))
        }
        Err(e) => (Err(e), None),
    };

    let result = spawn_extraction(driver, config, max_count, ctx).await;
    let Some(session) = session else {
        bail!("Failed to start browser session");
    };
    if let Err(e) = session.quit().await {
        warn!("Browser session did not close cleanly: {}", e);
    }
    result.context("Extraction task panicked")
}

async fn sync(config: &AppConfig, records: Vec<ProductRecord>, ctx: RunContext) -> Result<()> {
    let api = shopify::connect(&config.shopify);
    let result = spawn_sync(api, &config.sync, records, ctx)
        .await
        .context("Sync task panicked")?;

    for failed in result.failed() {
        warn!("❌ {}: {}", failed.record.name, failed.error);
    }
    println!("{}", result.summary_line());
    Ok(())
}

async fn check(config: &AppConfig) -> Result<()> {
    println!("Listing URL:  {}", config.catalog.listing_url);
    println!("WebDriver:    {}", config.browser.webdriver_url);
    println!("Store API:    {}", config.shopify.api_base_url());

    let api = shopify::connect(&config.shopify)?;
    let shop = api.shop().await.context("Store connection failed")?;
    println!("Connected to: {}", shop.name);
    Ok(())
}
