//! Listing page traversal
//!
//! Walks the catalog listing card by card. Card handles go stale whenever a
//! detail page is opened, so the card list is queried again on every
//! iteration and no handle outlives its iteration.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::application::detail_page_extractor::DetailPageExtractor;
use crate::application::events::RunContext;
use crate::domain::events::RunPhase;
use crate::domain::product_record::{CardData, ProductRecord};
use crate::infrastructure::browser::{find_with_fallback, first_attribute, BrowserDriver};
use crate::infrastructure::config::utils::resolve_url;
use crate::infrastructure::config::CatalogConfig;
use crate::infrastructure::parsing::CatalogSelectors;
use crate::infrastructure::pipeline_error::PipelineResult;

pub struct CatalogNavigator<D: BrowserDriver + ?Sized> {
    driver: Arc<D>,
    extractor: DetailPageExtractor<D>,
    selectors: CatalogSelectors,
    listing_url: String,
    base_url: String,
    page_load_delay: Duration,
    card_delay: Duration,
}

impl<D: BrowserDriver + ?Sized> CatalogNavigator<D> {
    pub fn new(driver: Arc<D>, config: &CatalogConfig, selectors: &CatalogSelectors) -> PipelineResult<Self> {
        Ok(Self {
            extractor: DetailPageExtractor::new(Arc::clone(&driver), config, selectors)?,
            driver,
            selectors: selectors.clone(),
            listing_url: config.listing_url.clone(),
            base_url: config.base_url.clone(),
            page_load_delay: Duration::from_millis(config.page_load_delay_ms),
            card_delay: Duration::from_millis(config.card_delay_ms),
        })
    }

    /// Extract up to `max_count` records, in listing order.
    ///
    /// Never fails: per-item problems are logged and the walk moves on; an
    /// unreachable listing page or too few cards end it early.
    pub async fn extract(&self, max_count: usize, ctx: &RunContext) -> Vec<ProductRecord> {
        let mut records = Vec::new();
        if max_count == 0 {
            return records;
        }

        ctx.status(RunPhase::Extraction, format!("Opening catalog listing {}", self.listing_url));
        if let Err(e) = self.driver.navigate(&self.listing_url).await {
            warn!("❌ Listing page unreachable: {}", e);
            ctx.status(RunPhase::Extraction, format!("Listing page unreachable: {e}"));
            return records;
        }
        sleep(self.page_load_delay).await;

        for index in 0..max_count {
            if ctx.is_cancelled() {
                info!("🛑 Extraction cancelled after {} records", records.len());
                break;
            }
            if index > 0 {
                sleep(self.card_delay).await;
            }

            let Some((selector, cards)) =
                find_with_fallback(&*self.driver, None, &self.selectors.card_container).await
            else {
                info!("No cards found on the listing page");
                break;
            };
            let Some(card) = cards.get(index) else {
                info!("Listing shows only {} cards, stopping at {}", cards.len(), index);
                break;
            };
            debug!("Card {}/{} via '{}'", index + 1, cards.len(), selector);

            let position = index + 1;
            ctx.status(RunPhase::Extraction, format!("Processing item {position}/{max_count}"));
            match self.process_card(card, position).await {
                Ok(Some(record)) => {
                    ctx.sink.on_item(&record);
                    records.push(record);
                }
                Ok(None) => warn!("⚠️ Item {} skipped", position),
                Err(e) => {
                    warn!("⚠️ Item {} failed: {}", position, e);
                    self.extractor.ensure_on_listing().await;
                }
            }
        }

        records
    }

    async fn process_card(&self, card: &D::Element, position: usize) -> PipelineResult<Option<ProductRecord>> {
        let card_data = self.read_card(card, position).await?;
        Ok(self.extractor.extract(card, &card_data).await)
    }

    /// Thumbnail and direct link of a card. Reading the card itself first
    /// surfaces a stale handle as an item error.
    async fn read_card(&self, card: &D::Element, position: usize) -> PipelineResult<CardData> {
        let mut data = CardData::new(position);
        data.container_target = self
            .driver
            .attribute(card, "data-href")
            .await?
            .filter(|target| !target.trim().is_empty())
            .map(|target| resolve_url(&self.base_url, &target));

        if let Some((_, images)) = find_with_fallback(&*self.driver, Some(card), &self.selectors.card_image).await {
            if let Some(image) = images.first() {
                if let Some(src) = first_attribute(&*self.driver, image, &["src", "data-src"]).await {
                    data.thumbnail_url = resolve_url(&self.base_url, &src);
                }
            }
        }

        if let Some((_, links)) = find_with_fallback(&*self.driver, Some(card), &self.selectors.card_link).await {
            if let Some(link) = links.first() {
                data.detail_link = first_attribute(&*self.driver, link, &["href"])
                    .await
                    .map(|href| resolve_url(&self.base_url, &href));
            }
        }

        debug!(
            "Card {}: link {:?}, container target {:?}, thumbnail '{}'",
            position, data.detail_link, data.container_target, data.thumbnail_url
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{detail_page, listing_page, FakeBrowser, FixtureCard, RecordingSink};

    const LISTING: &str = "https://catalog.test/listing";

    fn config() -> CatalogConfig {
        CatalogConfig {
            listing_url: LISTING.to_string(),
            base_url: "https://catalog.test".to_string(),
            page_load_delay_ms: 10,
            card_delay_ms: 10,
            carousel_wait_ms: 50,
            carousel_poll_ms: 10,
            ..CatalogConfig::default()
        }
    }

    fn catalog(count: usize) -> Arc<FakeBrowser> {
        let browser = Arc::new(FakeBrowser::new());
        let cards: Vec<FixtureCard> = (1..=count)
            .map(|i| FixtureCard::linked(&format!("https://catalog.test/p/{i}"), &format!("/img/{i}.jpg")))
            .collect();
        browser.add_page(LISTING, listing_page(&cards));
        for i in 1..=count {
            browser.add_page(
                &format!("https://catalog.test/p/{i}"),
                detail_page(&format!("Pump {i}"), "A short description", &[], "", None),
            );
        }
        browser
    }

    #[tokio::test(start_paused = true)]
    async fn stops_early_when_fewer_cards_exist() {
        let browser = catalog(2);
        let sink = Arc::new(RecordingSink::new());
        let navigator = CatalogNavigator::new(browser, &config(), &CatalogSelectors::default()).unwrap();

        let records = navigator.extract(5, &RunContext::new(sink.clone())).await;

        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Pump 1", "Pump 2"]);
        assert_eq!(sink.items().len(), 2);
        assert_eq!(records[1].card_thumbnail_url, "https://catalog.test/img/2.jpg");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_items_never_touches_the_browser() {
        let browser = catalog(2);
        let navigator = CatalogNavigator::new(browser.clone(), &config(), &CatalogSelectors::default()).unwrap();

        let records = navigator.extract(0, &RunContext::new(Arc::new(RecordingSink::new()))).await;

        assert!(records.is_empty());
        assert!(browser.navigations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_listing_returns_nothing() {
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(LISTING, "<html><body><p>maintenance</p></body></html>");
        let navigator = CatalogNavigator::new(browser, &config(), &CatalogSelectors::default()).unwrap();

        let records = navigator.extract(3, &RunContext::new(Arc::new(RecordingSink::new()))).await;
        assert!(records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn card_reading_resolves_the_container_target() {
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(
            LISTING,
            listing_page(&[
                FixtureCard::container_only("/p/1", "/img/1.jpg"),
                FixtureCard::linked("https://catalog.test/p/2", "/img/2.jpg"),
            ]),
        );
        let navigator = CatalogNavigator::new(browser.clone(), &config(), &CatalogSelectors::default()).unwrap();
        browser.navigate(LISTING).await.unwrap();
        let cards = browser.find_elements("div.card.cl-overview").await.unwrap();

        let first = navigator.read_card(&cards[0], 1).await.unwrap();
        assert_eq!(first.container_target.as_deref(), Some("https://catalog.test/p/1"));
        assert_eq!(first.detail_link, None);

        let second = navigator.read_card(&cards[1], 2).await.unwrap();
        assert_eq!(second.container_target, None);
        assert_eq!(second.detail_link.as_deref(), Some("https://catalog.test/p/2"));
    }
}
