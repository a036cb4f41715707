//! WebDriver-backed browser session (chromedriver / geckodriver via fantoccini)

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::infrastructure::browser::BrowserDriver;
use crate::infrastructure::config::BrowserConfig;
use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};

const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView({block: 'center'});";
const PROGRAMMATIC_CLICK: &str = "arguments[0].click();";

pub struct WebDriverSession {
    client: Client,
    navigation_timeout: Duration,
}

impl WebDriverSession {
    /// Connect to a running WebDriver server.
    pub async fn connect(config: &BrowserConfig) -> PipelineResult<Self> {
        info!("🔗 Connecting to WebDriver at {}", config.webdriver_url);
        let client = ClientBuilder::native()
            .capabilities(Self::capabilities(config))
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| PipelineError::setup(format!("WebDriver connection failed: {e}")))?;

        if let Err(e) = client
            .set_window_size(config.window_width, config.window_height)
            .await
        {
            warn!("Could not set window size: {}", e);
        }

        Ok(Self {
            client,
            navigation_timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    fn capabilities(config: &BrowserConfig) -> serde_json::Map<String, serde_json::Value> {
        let mut chrome_args = vec![
            format!("--window-size={},{}", config.window_width, config.window_height),
            format!("--user-agent={}", config.user_agent),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
        ];
        let mut firefox_args = Vec::new();
        if config.headless {
            chrome_args.push("--headless=new".to_string());
            firefox_args.push("-headless".to_string());
        }

        let mut caps = serde_json::Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
        caps.insert("moz:firefoxOptions".to_string(), json!({ "args": firefox_args }));
        caps
    }

    async fn run_script(&self, script: &str, element: &Element) -> PipelineResult<()> {
        let arg = serde_json::to_value(element)?;
        self.client
            .execute(script, vec![arg])
            .await
            .map(|_| ())
            .map_err(|e| map_cmd_error("execute script", &e))
    }
}

/// WebDriver reports staleness as an error string; everything else is a generic driver failure.
fn map_cmd_error(context: &str, e: &CmdError) -> PipelineError {
    let message = e.to_string();
    if message.to_lowercase().contains("stale element") {
        PipelineError::stale(format!("{context}: {message}"))
    } else {
        PipelineError::driver(format!("{context}: {message}"))
    }
}

#[async_trait]
impl BrowserDriver for WebDriverSession {
    type Element = Element;

    async fn navigate(&self, url: &str) -> PipelineResult<()> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.navigation_timeout, self.client.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PipelineError::navigation_failure(url, e.to_string())),
            Err(_) => Err(PipelineError::navigation_failure(
                url,
                format!("timed out after {:?}", self.navigation_timeout),
            )),
        }
    }

    async fn current_url(&self) -> PipelineResult<String> {
        self.client
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(|e| map_cmd_error("current url", &e))
    }

    async fn find_elements(&self, selector: &str) -> PipelineResult<Vec<Element>> {
        self.client
            .find_all(Locator::Css(selector))
            .await
            .map_err(|e| map_cmd_error(selector, &e))
    }

    async fn find_elements_in(&self, parent: &Element, selector: &str) -> PipelineResult<Vec<Element>> {
        parent
            .find_all(Locator::Css(selector))
            .await
            .map_err(|e| map_cmd_error(selector, &e))
    }

    async fn click(&self, element: &Element) -> PipelineResult<()> {
        if let Err(e) = self.run_script(SCROLL_INTO_VIEW, element).await {
            if matches!(e, PipelineError::StaleReference { .. }) {
                return Err(e);
            }
            debug!("Scroll into view failed: {}", e);
        }
        match element.click().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mapped = map_cmd_error("click", &e);
                if matches!(mapped, PipelineError::StaleReference { .. }) {
                    return Err(mapped);
                }
                debug!("Native click failed ({}), using programmatic click", e);
                self.run_script(PROGRAMMATIC_CLICK, element).await
            }
        }
    }

    async fn attribute(&self, element: &Element, name: &str) -> PipelineResult<Option<String>> {
        element.attr(name).await.map_err(|e| map_cmd_error(name, &e))
    }

    async fn tag_name(&self, element: &Element) -> PipelineResult<String> {
        element
            .tag_name()
            .await
            .map(|t| t.to_lowercase())
            .map_err(|e| map_cmd_error("tag name", &e))
    }

    async fn text(&self, element: &Element) -> PipelineResult<String> {
        element.text().await.map_err(|e| map_cmd_error("text", &e))
    }

    async fn page_source(&self) -> PipelineResult<String> {
        self.client.source().await.map_err(|e| map_cmd_error("page source", &e))
    }

    async fn back(&self) -> PipelineResult<()> {
        self.client.back().await.map_err(|e| map_cmd_error("back", &e))
    }

    async fn screenshot(&self, path: &Path) -> PipelineResult<()> {
        let png = self
            .client
            .screenshot()
            .await
            .map_err(|e| map_cmd_error("screenshot", &e))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, png).await?;
        Ok(())
    }

    async fn quit(&self) -> PipelineResult<()> {
        info!("Quitting WebDriver session");
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| map_cmd_error("close", &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_flag_reaches_both_browsers() {
        let caps = WebDriverSession::capabilities(&BrowserConfig::default());
        let chrome = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(chrome.iter().any(|a| a == "--headless=new"));
        assert_eq!(caps["moz:firefoxOptions"]["args"][0], "-headless");

        let visible = WebDriverSession::capabilities(&BrowserConfig {
            headless: false,
            ..BrowserConfig::default()
        });
        assert!(visible["moz:firefoxOptions"]["args"].as_array().unwrap().is_empty());
    }
}
