//! Browser automation boundary
//!
//! Extraction only talks to a [`BrowserDriver`]. The production
//! implementation drives a WebDriver session; tests use an in-memory fake.
//! Element handles belong to the page they were found on and go stale as
//! soon as a click navigates away.

pub mod webdriver_session;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::infrastructure::pipeline_error::PipelineResult;

pub use webdriver_session::WebDriverSession;

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Element: Clone + Send + Sync + std::fmt::Debug;

    async fn navigate(&self, url: &str) -> PipelineResult<()>;

    async fn current_url(&self) -> PipelineResult<String>;

    async fn find_elements(&self, selector: &str) -> PipelineResult<Vec<Self::Element>>;

    async fn find_elements_in(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> PipelineResult<Vec<Self::Element>>;

    /// Scroll into view, click, and fall back to a programmatic click when
    /// the native click is intercepted.
    async fn click(&self, element: &Self::Element) -> PipelineResult<()>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> PipelineResult<Option<String>>;

    /// Lower-case element name, e.g. `img` or `iframe`
    async fn tag_name(&self, element: &Self::Element) -> PipelineResult<String>;

    async fn text(&self, element: &Self::Element) -> PipelineResult<String>;

    async fn page_source(&self) -> PipelineResult<String>;

    async fn back(&self) -> PipelineResult<()>;

    async fn screenshot(&self, path: &Path) -> PipelineResult<()>;

    async fn quit(&self) -> PipelineResult<()>;
}

/// Poll `probe` until it yields a value or `timeout` elapses.
pub async fn wait_until<T, F, Fut>(timeout: Duration, poll: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(poll).await;
    }
}

/// Elements of the first selector in `selectors` that matches anything,
/// searched inside `parent` when given. Failing selectors are skipped.
pub async fn find_with_fallback<D>(
    driver: &D,
    parent: Option<&D::Element>,
    selectors: &[String],
) -> Option<(String, Vec<D::Element>)>
where
    D: BrowserDriver + ?Sized,
{
    for selector in selectors {
        let found = match parent {
            Some(parent) => driver.find_elements_in(parent, selector).await,
            None => driver.find_elements(selector).await,
        };
        match found {
            Ok(elements) if !elements.is_empty() => return Some((selector.clone(), elements)),
            Ok(_) => {}
            Err(e) => debug!("Selector '{}' failed: {}", selector, e),
        }
    }
    None
}

/// First non-empty attribute among `names`
pub async fn first_attribute<D>(driver: &D, element: &D::Element, names: &[&str]) -> Option<String>
where
    D: BrowserDriver + ?Sized,
{
    for name in names {
        if let Ok(Some(value)) = driver.attribute(element, name).await {
            if !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}
