//! Detail page extraction
//!
//! Opens one card's detail page and walks it through a fixed sequence of
//! steps. Every step after navigation degrades to partial data instead of
//! failing the item; only a detail page that never opens yields no record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::product_record::{record_id, CardData, ProductRecord};
use crate::infrastructure::browser::{find_with_fallback, first_attribute, wait_until, BrowserDriver};
use crate::infrastructure::config::utils::resolve_url;
use crate::infrastructure::config::CatalogConfig;
use crate::infrastructure::parsing::{CatalogSelectors, DetailPageParser, SpecTableParser};
use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};

const SCREENSHOT_DIR: &str = "screenshots";

/// Progress through one detail page. Any state may jump to `Returned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Idle,
    Navigating,
    TitleResolved,
    MediaCollected,
    TextCollected,
    SpecsCollected,
    Returned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "iframe" | "video" => Self::Video,
            _ => Self::Image,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveMedia {
    src: String,
    kind: MediaKind,
}

/// Timing and placement settings taken from [`CatalogConfig`]
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub listing_url: String,
    pub category: String,
    pub subcategory: String,
    pub page_load_delay: Duration,
    pub carousel_wait: Duration,
    pub carousel_poll: Duration,
    pub open_first_variant: bool,
    pub screenshot_dir: Option<PathBuf>,
}

impl ExtractionSettings {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            listing_url: config.listing_url.clone(),
            category: config.category.clone(),
            subcategory: config.subcategory.clone(),
            page_load_delay: Duration::from_millis(config.page_load_delay_ms),
            carousel_wait: Duration::from_millis(config.carousel_wait_ms),
            carousel_poll: Duration::from_millis(config.carousel_poll_ms.max(1)),
            open_first_variant: config.open_first_variant,
            screenshot_dir: config.screenshots.then(|| {
                config
                    .screenshot_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(SCREENSHOT_DIR))
            }),
        }
    }
}

pub struct DetailPageExtractor<D: BrowserDriver + ?Sized> {
    driver: Arc<D>,
    settings: ExtractionSettings,
    selectors: CatalogSelectors,
    text_parser: DetailPageParser,
    spec_parser: SpecTableParser,
}

impl<D: BrowserDriver + ?Sized> DetailPageExtractor<D> {
    /// Fails only when a configured selector does not compile.
    pub fn new(driver: Arc<D>, config: &CatalogConfig, selectors: &CatalogSelectors) -> PipelineResult<Self> {
        Ok(Self {
            driver,
            settings: ExtractionSettings::from_config(config),
            selectors: selectors.clone(),
            text_parser: DetailPageParser::new(selectors)?,
            spec_parser: SpecTableParser::new(selectors)?,
        })
    }

    pub const fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Extract the detail page behind `card`. `None` when the page could not be opened.
    pub async fn extract(&self, card: &D::Element, card_data: &CardData) -> Option<ProductRecord> {
        let position = card_data.position;
        let mut state = ExtractionState::Idle;

        advance(&mut state, ExtractionState::Navigating, position);
        if let Err(e) = self.open_detail(card, card_data).await {
            warn!("❌ Item {}: detail page did not open: {}", position, e);
            advance(&mut state, ExtractionState::Returned, position);
            self.ensure_on_listing().await;
            return None;
        }
        sleep(self.settings.page_load_delay).await;

        let source = self.snapshot().await;
        let name = self
            .text_parser
            .parse_title(&source)
            .unwrap_or_else(|| card_data.temporary_name.clone());
        let mut record = ProductRecord::new(
            record_id(position, Utc::now()),
            name,
            self.settings.category.clone(),
            self.settings.subcategory.clone(),
        );
        record.card_thumbnail_url = card_data.thumbnail_url.clone();
        record.source_url = self.driver.current_url().await.unwrap_or_default();
        advance(&mut state, ExtractionState::TitleResolved, position);

        self.capture_screenshot(position).await;

        if let Err(e) = self.collect_media(&mut record).await {
            warn!("⚠️ Item {}: media collection incomplete: {}", position, e);
            record.mark_partial();
        }
        advance(&mut state, ExtractionState::MediaCollected, position);

        let source = self.snapshot().await;
        let text = self.text_parser.parse_text(&source, &record.name);
        record.set_text(text.short, text.advantages, text.long);
        advance(&mut state, ExtractionState::TextCollected, position);

        if self.settings.open_first_variant {
            if let Err(e) = self.collect_specs(&mut record).await {
                warn!("⚠️ Item {}: technical data incomplete: {}", position, e);
                record.mark_partial();
            }
            advance(&mut state, ExtractionState::SpecsCollected, position);
        }

        self.ensure_on_listing().await;
        advance(&mut state, ExtractionState::Returned, position);

        info!(
            "✅ Item {}: '{}' ({} images, {} videos, {} spec tables)",
            position,
            record.name,
            record.images().len(),
            record.videos().len(),
            record.technical_specifications().len()
        );
        Some(record)
    }

    /// Navigate back to the listing page unless the browser is already there.
    pub async fn ensure_on_listing(&self) {
        let listing = &self.settings.listing_url;
        if let Ok(current) = self.driver.current_url().await {
            if current == *listing {
                return;
            }
        }
        match self.driver.navigate(listing).await {
            Ok(()) => sleep(self.settings.page_load_delay).await,
            Err(e) => warn!("Could not return to listing page: {}", e),
        }
    }

    /// Direct link first, then the card container. Success means the address changed.
    async fn open_detail(&self, card: &D::Element, card_data: &CardData) -> PipelineResult<()> {
        let before = self.driver.current_url().await?;

        if card_data.detail_link.is_some() {
            let link = find_with_fallback(&*self.driver, Some(card), &self.selectors.card_link)
                .await
                .and_then(|(_, links)| links.into_iter().next());
            if let Some(link) = link {
                match self.driver.click(&link).await {
                    Ok(()) if self.wait_for_navigation(&before).await => return Ok(()),
                    Ok(()) => debug!("Item {}: link click did not navigate", card_data.position),
                    Err(e) => debug!("Item {}: link click failed: {}", card_data.position, e),
                }
            }
        }

        self.driver.click(card).await?;
        if self.wait_for_navigation(&before).await {
            return Ok(());
        }

        if let Some(target) = &card_data.container_target {
            debug!("Item {}: card click did not navigate, opening {}", card_data.position, target);
            self.driver.navigate(target).await?;
            if self.wait_for_navigation(&before).await {
                return Ok(());
            }
        }

        let target = card_data
            .detail_link
            .as_deref()
            .or(card_data.container_target.as_deref())
            .unwrap_or(&before);
        Err(PipelineError::navigation_failure(
            target,
            "page address did not change after clicking the card",
        ))
    }

    async fn wait_for_navigation(&self, before: &str) -> bool {
        wait_until(self.settings.page_load_delay, self.settings.carousel_poll, || async move {
            match self.driver.current_url().await {
                Ok(url) if url != before => Some(()),
                _ => None,
            }
        })
        .await
        .is_some()
    }

    async fn snapshot(&self) -> String {
        self.driver.page_source().await.unwrap_or_else(|e| {
            warn!("Could not read page source: {}", e);
            String::new()
        })
    }

    async fn capture_screenshot(&self, position: usize) {
        let Some(dir) = &self.settings.screenshot_dir else {
            return;
        };
        let path = dir.join(format!("catalog_product_{position}_page.png"));
        match self.driver.screenshot(&path).await {
            Ok(()) => debug!("📸 Saved {:?}", path),
            Err(e) => warn!("Screenshot failed for item {}: {}", position, e),
        }
    }

    /// Click through the carousel and record each media item it shows.
    ///
    /// Per-thumbnail errors do not stop the walk; the first one is returned
    /// once every thumbnail has been tried.
    async fn collect_media(&self, record: &mut ProductRecord) -> PipelineResult<()> {
        let page_url = self.driver.current_url().await?;

        let thumbnails = match find_with_fallback(&*self.driver, None, &self.selectors.media_thumbnails).await {
            Some((selector, thumbnails)) => {
                debug!("Found {} carousel thumbnails via '{}'", thumbnails.len(), selector);
                thumbnails
            }
            None => {
                if let Some(media) = self.active_media().await? {
                    add_media(record, &page_url, &media);
                }
                return Ok(());
            }
        };

        let mut first_error = None;
        for (index, thumbnail) in thumbnails.iter().enumerate() {
            match self.show_thumbnail(thumbnail).await {
                Ok(Some(media)) => add_media(record, &page_url, &media),
                Ok(None) => debug!("Thumbnail {} exposes no source", index + 1),
                Err(e) => {
                    debug!("Thumbnail {} failed: {}", index + 1, e);
                    let stale = matches!(e, PipelineError::StaleReference { .. });
                    first_error.get_or_insert(e);
                    if stale {
                        break;
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn show_thumbnail(&self, thumbnail: &D::Element) -> PipelineResult<Option<ActiveMedia>> {
        let previous = self.active_media().await?.map(|m| m.src);
        self.driver.click(thumbnail).await?;

        let changed = wait_until(self.settings.carousel_wait, self.settings.carousel_poll, || {
            let previous = previous.clone();
            async move {
                match self.active_media().await {
                    Ok(Some(media)) if Some(&media.src) != previous.as_ref() => Some(media),
                    _ => None,
                }
            }
        })
        .await;
        if changed.is_some() {
            return Ok(changed);
        }

        // Viewer never switched: the thumbnail itself carries the image.
        if let Some(src) = first_attribute(&*self.driver, thumbnail, &["src", "data-src"]).await {
            return Ok(Some(ActiveMedia {
                src,
                kind: MediaKind::Image,
            }));
        }
        let inner = self.driver.find_elements_in(thumbnail, "img").await?;
        match inner.first() {
            Some(img) => Ok(first_attribute(&*self.driver, img, &["src", "data-src"])
                .await
                .map(|src| ActiveMedia {
                    src,
                    kind: MediaKind::Image,
                })),
            None => Ok(None),
        }
    }

    async fn active_media(&self) -> PipelineResult<Option<ActiveMedia>> {
        let Some((_, elements)) = find_with_fallback(&*self.driver, None, &self.selectors.active_media).await else {
            return Ok(None);
        };
        let Some(element) = elements.first() else {
            return Ok(None);
        };
        let tag = self.driver.tag_name(element).await?;
        let src = first_attribute(&*self.driver, element, &["src", "data-src"]).await;
        Ok(src.map(|src| ActiveMedia {
            src,
            kind: MediaKind::from_tag(&tag),
        }))
    }

    /// Open the variant tab, follow the first row and read its data tables.
    ///
    /// A page without a variant tab or rows simply has no tables.
    async fn collect_specs(&self, record: &mut ProductRecord) -> PipelineResult<()> {
        let Some((_, tabs)) = find_with_fallback(&*self.driver, None, &self.selectors.spec_tab).await else {
            debug!("No variant tab on '{}'", record.name);
            return Ok(());
        };
        if let Some(tab) = tabs.first() {
            self.driver.click(tab).await?;
        }

        let link = wait_until(self.settings.carousel_wait, self.settings.carousel_poll, || async move {
            find_with_fallback(&*self.driver, None, &self.selectors.variant_row_link)
                .await
                .and_then(|(_, links)| links.into_iter().next())
        })
        .await;
        let Some(link) = link else {
            debug!("No variant rows on '{}'", record.name);
            return Ok(());
        };

        self.driver.click(&link).await?;
        sleep(self.settings.page_load_delay).await;

        let source = self.driver.page_source().await?;
        let tables = self.spec_parser.parse(&source);
        debug!("Found {} technical data tables", tables.len());
        for table in tables {
            record.add_spec_table(table);
        }
        Ok(())
    }
}

fn advance(state: &mut ExtractionState, next: ExtractionState, position: usize) {
    debug!("Item {}: {:?} -> {:?}", position, state, next);
    *state = next;
}

fn add_media(record: &mut ProductRecord, page_url: &str, media: &ActiveMedia) {
    let url = resolve_url(page_url, &media.src);
    let added = match media.kind {
        MediaKind::Image => record.add_image(url),
        MediaKind::Video => record.add_video(url),
    };
    if !added {
        debug!("Skipped duplicate media {}", media.src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product_record::ExtractionStatus;
    use crate::test_utils::{detail_page, FakeBrowser};

    const LISTING: &str = "https://catalog.test/listing";
    const DETAIL: &str = "https://catalog.test/products/stratos";

    fn config() -> CatalogConfig {
        CatalogConfig {
            listing_url: LISTING.to_string(),
            base_url: "https://catalog.test".to_string(),
            page_load_delay_ms: 10,
            card_delay_ms: 10,
            carousel_wait_ms: 100,
            carousel_poll_ms: 10,
            ..CatalogConfig::default()
        }
    }

    fn listing_with_link() -> String {
        format!(
            r#"<html><body><div class="card cl-overview h-100 rebrush">
                 <img src="/img/stratos.jpg"><a class="stretched-link" href="{DETAIL}"></a>
               </div></body></html>"#
        )
    }

    async fn first_card(browser: &FakeBrowser) -> crate::test_utils::FakeElement {
        browser.navigate(LISTING).await.unwrap();
        browser
            .find_elements("div.card.cl-overview")
            .await
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    fn linked_card_data() -> CardData {
        CardData {
            detail_link: Some(DETAIL.to_string()),
            thumbnail_url: "https://catalog.test/img/stratos.jpg".to_string(),
            ..CardData::new(1)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn carousel_items_are_classified_by_element_type() {
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(LISTING, listing_with_link());
        let page = |active: &str| {
            format!(
                r#"<html><body><h1 class="m-0">Wilo-Stratos</h1>
                     <div class="cl-image-preview">
                       <div role="listitem" data-fake-state="s1"><img src="/thumb/1.jpg"></div>
                       <div role="listitem" data-fake-state="s2"><img src="/thumb/2.jpg"></div>
                     </div>
                     <div class="carousel-item active">{active}</div></body></html>"#
            )
        };
        browser.add_page(DETAIL, page(r#"<img src="/media/start.jpg">"#));
        browser.add_page_state(DETAIL, "s1", page(r#"<img src="/media/pump.jpg">"#));
        browser.add_page_state(DETAIL, "s2", page(r#"<iframe src="https://video.test/embed/1"></iframe>"#));

        let extractor = DetailPageExtractor::new(browser.clone(), &config(), &CatalogSelectors::default()).unwrap();
        let card = first_card(&browser).await;
        let record = extractor.extract(&card, &linked_card_data()).await.unwrap();

        assert_eq!(record.name, "Wilo-Stratos");
        assert_eq!(record.images(), ["https://catalog.test/media/pump.jpg"]);
        assert_eq!(record.videos(), ["https://video.test/embed/1"]);
        assert_eq!(record.source_url, DETAIL);
        assert_eq!(record.status, ExtractionStatus::Extracted);
        assert_eq!(browser.navigations().last().map(String::as_str), Some(LISTING));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_viewer_falls_back_to_thumbnail_source() {
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(LISTING, listing_with_link());
        browser.add_page(
            DETAIL,
            r#"<html><body><h1>Plain</h1>
                 <div class="cl-image-preview"><div role="listitem" data-fake-click="noop"><img data-src="//cdn.test/t.jpg"></div></div>
               </body></html>"#,
        );

        let extractor = DetailPageExtractor::new(browser.clone(), &config(), &CatalogSelectors::default()).unwrap();
        let card = first_card(&browser).await;
        let record = extractor.extract(&card, &linked_card_data()).await.unwrap();

        assert_eq!(record.images(), ["https://cdn.test/t.jpg"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_thumbnail_click_marks_record_partial() {
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(LISTING, listing_with_link());
        browser.add_page(
            DETAIL,
            r#"<html><body><h1>Broken carousel</h1>
                 <div class="cl-image-preview"><div role="listitem" data-fake-click="fail"></div></div>
               </body></html>"#,
        );

        let extractor = DetailPageExtractor::new(browser.clone(), &config(), &CatalogSelectors::default()).unwrap();
        let card = first_card(&browser).await;
        let record = extractor.extract(&card, &linked_card_data()).await.unwrap();

        assert_eq!(record.status, ExtractionStatus::PartiallyExtracted);
        assert_eq!(record.name, "Broken carousel");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_title_uses_placeholder_and_no_navigation_yields_none() {
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(LISTING, listing_with_link());
        browser.add_page(DETAIL, "<html><body><p>no heading</p></body></html>");
        let extractor = DetailPageExtractor::new(browser.clone(), &config(), &CatalogSelectors::default()).unwrap();

        let card = first_card(&browser).await;
        let record = extractor.extract(&card, &linked_card_data()).await.unwrap();
        assert_eq!(record.name, "Item 1");

        // A card without a link or container target never leaves the listing.
        browser.add_page(LISTING, r#"<div class="card cl-overview"><span>dead</span></div>"#);
        let card = first_card(&browser).await;
        assert!(extractor.extract(&card, &CardData::new(2)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn inert_card_is_opened_through_its_container_target() {
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(
            LISTING,
            format!(
                r#"<html><body><div class="card cl-overview" data-href="{DETAIL}" data-fake-click="noop">
                     <img src="/img/stratos.jpg"></div></body></html>"#
            ),
        );
        browser.add_page(DETAIL, "<html><body><h1 class=\"m-0\">Wilo-Stratos PICO</h1></body></html>");
        let extractor = DetailPageExtractor::new(browser.clone(), &config(), &CatalogSelectors::default()).unwrap();

        let card = first_card(&browser).await;
        let card_data = CardData {
            container_target: Some(DETAIL.to_string()),
            ..CardData::new(1)
        };
        let record = extractor.extract(&card, &card_data).await.unwrap();

        assert_eq!(record.name, "Wilo-Stratos PICO");
        assert_eq!(record.source_url, DETAIL);
        assert!(browser.navigations().contains(&DETAIL.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn first_variant_row_provides_spec_tables() {
        let variant = "https://catalog.test/products/stratos/variant-1";
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(LISTING, listing_with_link());
        browser.add_page(
            DETAIL,
            detail_page(
                "Wilo-Stratos MAXO",
                "Smart pump for heating systems",
                &["Highest energy efficiency in its class"],
                "A long description paragraph that is clearly longer than fifty characters.",
                Some(variant),
            ),
        );
        browser.add_page(
            variant,
            r#"<html><body>
                 <table class="cl-technical-data"><thead><tr><th>Motor</th></tr></thead>
                   <tbody><tr><td>Nennleistung</td><td>40 W</td></tr><tr><td>Drehzahl</td><td>4800 1/min</td></tr></tbody></table>
               </body></html>"#,
        );

        let extractor = DetailPageExtractor::new(browser.clone(), &config(), &CatalogSelectors::default()).unwrap();
        let card = first_card(&browser).await;
        let record = extractor.extract(&card, &linked_card_data()).await.unwrap();

        assert_eq!(record.short_description(), "Smart pump for heating systems");
        assert_eq!(record.advantages(), ["Highest energy efficiency in its class"]);
        let tables = record.technical_specifications();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].title, "Motor");
        assert_eq!(tables[0].data.get("Drehzahl").map(String::as_str), Some("4800 1/min"));
        assert!(browser.navigations().contains(&variant.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn screenshots_are_named_by_position() {
        let browser = Arc::new(FakeBrowser::new());
        browser.add_page(LISTING, listing_with_link());
        browser.add_page(DETAIL, "<html><body><h1>Shot</h1></body></html>");
        let config = CatalogConfig {
            screenshots: true,
            screenshot_dir: Some(PathBuf::from("shots")),
            ..config()
        };

        let extractor = DetailPageExtractor::new(browser.clone(), &config, &CatalogSelectors::default()).unwrap();
        let card = first_card(&browser).await;
        extractor.extract(&card, &linked_card_data()).await.unwrap();

        assert_eq!(browser.screenshots(), vec![PathBuf::from("shots/catalog_product_1_page.png")]);
    }
}
