//! End-to-end extraction runs against an in-memory catalog
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use catalog_sync_lib::application::{spawn_extraction, RunContext};
use catalog_sync_lib::domain::{EventSink, ExtractionStatus, ProductRecord, RunPhase, RunSummary};
use catalog_sync_lib::infrastructure::config::{AppConfig, CatalogConfig};
use catalog_sync_lib::infrastructure::pipeline_error::PipelineError;
use catalog_sync_lib::test_utils::{detail_page, listing_page, FakeBrowser, FixtureCard, RecordingSink};

const LISTING: &str = "https://catalog.test/katalog/heizung";

fn config() -> AppConfig {
    AppConfig {
        catalog: CatalogConfig {
            listing_url: LISTING.to_string(),
            base_url: "https://catalog.test".to_string(),
            page_load_delay_ms: 50,
            card_delay_ms: 20,
            carousel_wait_ms: 100,
            carousel_poll_ms: 10,
            ..CatalogConfig::default()
        },
        ..AppConfig::default()
    }
}

fn detail_url(i: usize) -> String {
    format!("https://catalog.test/produkte/pumpe-{i}")
}

fn add_detail(browser: &FakeBrowser, i: usize) {
    browser.add_page(
        &detail_url(i),
        detail_page(
            &format!("Wilo-Pumpe {i}"),
            "Hocheffizienz-Heizungspumpe",
            &["Bis zu 80 % Energieeinsparung gegenüber ungeregelten Pumpen"],
            "",
            None,
        ),
    );
}

fn catalog(cards: &[FixtureCard]) -> Arc<FakeBrowser> {
    let browser = Arc::new(FakeBrowser::new());
    browser.add_page(LISTING, listing_page(cards));
    for i in 1..=cards.len() {
        add_detail(&browser, i);
    }
    browser
}

fn linked(i: usize) -> FixtureCard {
    FixtureCard::linked(&detail_url(i), &format!("/media/thumb-{i}.jpg"))
}

#[tokio::test(start_paused = true)]
async fn card_without_direct_link_is_opened_through_its_container() {
    let browser = catalog(&[
        linked(1),
        FixtureCard::container_only(&detail_url(2), "/media/thumb-2.jpg"),
    ]);
    let sink = Arc::new(RecordingSink::new());

    let records = spawn_extraction(Ok(browser.clone()), &config(), 2, RunContext::new(sink.clone()))
        .await
        .unwrap();

    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Wilo-Pumpe 1", "Wilo-Pumpe 2"]);
    assert_eq!(records[1].source_url, detail_url(2));
    assert_eq!(records[1].card_thumbnail_url, "https://catalog.test/media/thumb-2.jpg");
    assert!(records.iter().all(|r| r.status == ExtractionStatus::Extracted));
    assert!(records.iter().all(|r| r.id.starts_with("catalog_")));

    assert_eq!(sink.items(), records);
    assert_eq!(
        sink.done(),
        vec![RunSummary::Extraction {
            records: records.clone(),
            cancelled: false
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn never_returns_more_than_requested() {
    for (requested, expected) in [(0, 0), (1, 1), (3, 3), (7, 3)] {
        let browser = catalog(&[linked(1), linked(2), linked(3)]);
        let sink = Arc::new(RecordingSink::new());

        let records = spawn_extraction(Ok(browser), &config(), requested, RunContext::new(sink.clone()))
            .await
            .unwrap();

        assert_eq!(records.len(), expected, "requested {requested}");
        assert_eq!(sink.done().len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn card_that_never_opens_does_not_stop_the_walk() {
    let browser = Arc::new(FakeBrowser::new());
    let dead = FixtureCard::container_only("", "/media/dead.jpg");
    browser.add_page(LISTING, listing_page(&[linked(1), dead, linked(3)]));
    add_detail(&browser, 1);
    add_detail(&browser, 3);

    let records = spawn_extraction(Ok(browser), &config(), 3, RunContext::new(Arc::new(RecordingSink::new())))
        .await
        .unwrap();

    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Wilo-Pumpe 1", "Wilo-Pumpe 3"]);
}

#[tokio::test(start_paused = true)]
async fn broken_carousel_yields_a_partial_record() {
    let browser = catalog(&[linked(1)]);
    browser.add_page(
        &detail_url(1),
        r#"<html><body><h1 class="m-0">Wilo-Yonos</h1>
             <div class="cl-image-preview"><div role="listitem" data-fake-click="fail"></div></div>
             <div class="pl-md-8"><p>Nassläufer-Hocheffizienzpumpe</p></div>
           </body></html>"#,
    );

    let records = spawn_extraction(Ok(browser), &config(), 1, RunContext::new(Arc::new(RecordingSink::new())))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ExtractionStatus::PartiallyExtracted);
    assert_eq!(records[0].short_description(), "Nassläufer-Hocheffizienzpumpe");
}

#[tokio::test]
async fn browser_setup_failure_still_ends_the_run() {
    let sink = Arc::new(RecordingSink::new());

    let records = spawn_extraction::<FakeBrowser>(
        Err(PipelineError::setup("session not created")),
        &config(),
        3,
        RunContext::new(sink.clone()),
    )
    .await
    .unwrap();

    assert!(records.is_empty());
    assert!(matches!(
        sink.done().as_slice(),
        [RunSummary::Failed {
            phase: RunPhase::Extraction,
            ..
        }]
    ));
    assert_eq!(sink.statuses().len(), 1);
}

/// Cancels the run as soon as the first record arrives
struct CancelAfterFirstItem {
    token: CancellationToken,
    inner: RecordingSink,
}

impl EventSink for CancelAfterFirstItem {
    fn on_status(&self, phase: RunPhase, message: &str) {
        self.inner.on_status(phase, message);
    }

    fn on_item(&self, record: &ProductRecord) {
        self.inner.on_item(record);
        self.token.cancel();
    }

    fn on_done(&self, summary: &RunSummary) {
        self.inner.on_done(summary);
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_records_already_extracted() {
    let browser = catalog(&[linked(1), linked(2), linked(3)]);
    let token = CancellationToken::new();
    let sink = Arc::new(CancelAfterFirstItem {
        token: token.clone(),
        inner: RecordingSink::new(),
    });

    let records = spawn_extraction(Ok(browser), &config(), 3, RunContext::with_token(token, sink.clone()))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(matches!(
        sink.inner.done().as_slice(),
        [RunSummary::Extraction { cancelled: true, .. }]
    ));
    assert!(sink
        .inner
        .statuses()
        .last()
        .is_some_and(|s| s.ends_with("(cancelled)")));
}
