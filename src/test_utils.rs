//! Test utilities for catalog-sync
//!
//! In-process stand-ins for the two external systems:
//! - [`FakeBrowser`] serves fixed HTML pages and mimics element staleness
//! - [`ScriptedTransport`] answers API requests from queued responses
//! - [`RecordingSink`] captures every pipeline event

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::domain::events::{EventSink, RunEvent, RunPhase, RunSummary};
use crate::domain::product_record::ProductRecord;
use crate::infrastructure::browser::BrowserDriver;
use crate::infrastructure::config::utils::resolve_url;
use crate::infrastructure::parsing::selector_cascade::element_text;
use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};
use crate::infrastructure::shopify::transport::{ApiRequest, ApiResponse, ApiTransport, HttpMethod};

const DEFAULT_STATE: &str = "default";

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// Snapshot of an element taken when it was found.
///
/// Handles remember the navigation generation they were created in; any use
/// after the page changed fails with [`PipelineError::StaleReference`].
#[derive(Debug, Clone)]
pub struct FakeElement {
    generation: u64,
    tag: String,
    attrs: HashMap<String, String>,
    text: String,
    outer_html: String,
}

impl FakeElement {
    fn from_ref(element: &ElementRef<'_>, generation: u64) -> Self {
        Self {
            generation,
            tag: element.value().name().to_lowercase(),
            attrs: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: element_text(element),
            outer_html: element.html(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct BrowserState {
    /// url -> (state name -> html)
    pages: HashMap<String, HashMap<String, String>>,
    current_url: Option<String>,
    current_state: String,
    generation: u64,
    history: Vec<String>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    screenshots: Vec<PathBuf>,
    closed: bool,
}

impl BrowserState {
    fn source(&self) -> String {
        self.current_url
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .and_then(|states| states.get(&self.current_state))
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string())
    }

    fn go(&mut self, url: &str, record_history: bool) {
        if record_history {
            if let Some(previous) = self.current_url.take() {
                self.history.push(previous);
            }
        }
        self.current_url = Some(url.to_string());
        self.current_state = DEFAULT_STATE.to_string();
        self.generation += 1;
        self.navigations.push(url.to_string());
    }

    fn check_fresh(&self, element: &FakeElement) -> PipelineResult<()> {
        if element.generation == self.generation {
            Ok(())
        } else {
            Err(PipelineError::stale(format!("<{}> from a previous page", element.tag)))
        }
    }
}

/// Browser driver over in-memory HTML pages.
///
/// Click behavior is driven by attributes on the clicked element:
/// - `data-fake-click="fail"`: the click errors
/// - `data-fake-click="noop"`: the click succeeds without effect
/// - `data-fake-state="name"`: switches the current page to another state without navigating
/// - `href` / `data-href`: navigates (relative values resolve against the current URL)
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<BrowserState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, html: impl Into<String>) -> &Self {
        self.add_page_state(url, DEFAULT_STATE, html)
    }

    pub fn add_page_state(&self, url: &str, state: &str, html: impl Into<String>) -> &Self {
        self.lock()
            .pages
            .entry(url.to_string())
            .or_default()
            .insert(state.to_string(), html.into());
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock().screenshots.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn select(html: &Html, selector: &str, generation: u64) -> PipelineResult<Vec<FakeElement>> {
        let parsed = Selector::parse(selector)
            .map_err(|e| PipelineError::invalid_selector(selector, e.to_string()))?;
        Ok(html
            .select(&parsed)
            .map(|e| FakeElement::from_ref(&e, generation))
            .collect())
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> PipelineResult<()> {
        self.lock().go(url, true);
        Ok(())
    }

    async fn current_url(&self) -> PipelineResult<String> {
        Ok(self.lock().current_url.clone().unwrap_or_default())
    }

    async fn find_elements(&self, selector: &str) -> PipelineResult<Vec<FakeElement>> {
        let (source, generation) = {
            let state = self.lock();
            (state.source(), state.generation)
        };
        Self::select(&Html::parse_document(&source), selector, generation)
    }

    async fn find_elements_in(&self, parent: &FakeElement, selector: &str) -> PipelineResult<Vec<FakeElement>> {
        self.lock().check_fresh(parent)?;
        Self::select(&Html::parse_fragment(&parent.outer_html), selector, parent.generation)
    }

    async fn click(&self, element: &FakeElement) -> PipelineResult<()> {
        let mut state = self.lock();
        state.check_fresh(element)?;
        state.clicks.push(element.outer_html.clone());

        match element.attr("data-fake-click") {
            Some("fail") => return Err(PipelineError::driver("element click intercepted")),
            Some("noop") => return Ok(()),
            _ => {}
        }
        if let Some(next) = element.attr("data-fake-state") {
            state.current_state = next.to_string();
            return Ok(());
        }
        let target = element
            .attr("href")
            .or_else(|| element.attr("data-href"))
            .filter(|t| !t.trim().is_empty());
        if let Some(target) = target {
            let base = state.current_url.clone().unwrap_or_default();
            let url = resolve_url(&base, target);
            state.go(&url, true);
        }
        Ok(())
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> PipelineResult<Option<String>> {
        self.lock().check_fresh(element)?;
        Ok(element.attr(name).map(str::to_string))
    }

    async fn tag_name(&self, element: &FakeElement) -> PipelineResult<String> {
        self.lock().check_fresh(element)?;
        Ok(element.tag.clone())
    }

    async fn text(&self, element: &FakeElement) -> PipelineResult<String> {
        self.lock().check_fresh(element)?;
        Ok(element.text.clone())
    }

    async fn page_source(&self) -> PipelineResult<String> {
        Ok(self.lock().source())
    }

    async fn back(&self) -> PipelineResult<()> {
        let mut state = self.lock();
        let previous = state
            .history
            .pop()
            .ok_or_else(|| PipelineError::navigation_failure("history", "no previous page"))?;
        state.go(&previous, false);
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> PipelineResult<()> {
        self.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn quit(&self) -> PipelineResult<()> {
        self.lock().closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Catalog fixtures
// ---------------------------------------------------------------------------

/// One card on a fixture listing page
#[derive(Debug, Clone)]
pub struct FixtureCard {
    pub detail_url: String,
    /// Render an `a.stretched-link`; otherwise the card itself carries `data-href`
    pub direct_link: bool,
    pub thumbnail: String,
}

impl FixtureCard {
    pub fn linked(detail_url: &str, thumbnail: &str) -> Self {
        Self {
            detail_url: detail_url.to_string(),
            direct_link: true,
            thumbnail: thumbnail.to_string(),
        }
    }

    pub fn container_only(detail_url: &str, thumbnail: &str) -> Self {
        Self {
            direct_link: false,
            ..Self::linked(detail_url, thumbnail)
        }
    }
}

pub fn listing_page(cards: &[FixtureCard]) -> String {
    let cards: String = cards
        .iter()
        .enumerate()
        .map(|(i, card)| {
            let (container_attr, link) = if card.direct_link {
                (String::new(), format!(r#"<a class="stretched-link" href="{}"></a>"#, card.detail_url))
            } else {
                (format!(r#" data-href="{}""#, card.detail_url), String::new())
            };
            format!(
                r#"<div class="card cl-overview h-100 rebrush"{container_attr}>
                     <img src="{}">
                     <div class="card-footer"><h3>Card {}</h3></div>
                     {link}
                   </div>"#,
                card.thumbnail,
                i + 1
            )
        })
        .collect();
    format!("<html><body><div class=\"row\">{cards}</div></body></html>")
}

/// Detail page with the usual text blocks and an optional variant table link
pub fn detail_page(title: &str, short: &str, advantages: &[&str], long: &str, variant_url: Option<&str>) -> String {
    let advantages: String = advantages.iter().map(|a| format!("<li>{a}</li>")).collect();
    let variants = variant_url.map_or_else(String::new, |url| {
        format!(
            r##"<a href="#variants" data-fake-click="noop">Varianten</a>
                <div id="variants"><table><tbody><tr><td><a href="{url}">Variante 1</a></td></tr></tbody></table></div>"##
        )
    });
    format!(
        r#"<html><body>
             <h1 class="m-0">{title}</h1>
             <div class="pl-md-8"><p>{short}</p></div>
             <div class="cl-your-advantages"><ul>{advantages}</ul></div>
             <div class="text-module"><div class="text-wrapper"><p>{long}</p></div></div>
             {variants}
           </body></html>"#
    )
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

struct Route {
    method: HttpMethod,
    prefix: String,
    responses: VecDeque<ApiResponse>,
}

/// Transport answering from queued responses, matched by method and the
/// longest path prefix. The last queued response of a route repeats forever.
/// Unmatched requests get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    log: Mutex<Vec<(ApiRequest, Instant)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: HttpMethod, prefix: &str, responses: Vec<ApiResponse>) -> &Self {
        lock(&self.routes).push(Route {
            method,
            prefix: prefix.to_string(),
            responses: responses.into(),
        });
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.log).iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        lock(&self.log).iter().map(|(_, t)| *t).collect()
    }

    pub fn count(&self, method: HttpMethod, prefix: &str) -> usize {
        lock(&self.log)
            .iter()
            .filter(|(r, _)| r.method == method && r.path.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> PipelineResult<ApiResponse> {
        lock(&self.log).push((request.clone(), Instant::now()));

        let mut routes = lock(&self.routes);
        let route = routes
            .iter_mut()
            .filter(|r| r.method == request.method && request.path.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());
        let response = match route {
            Some(route) if route.responses.len() > 1 => route.responses.pop_front(),
            Some(route) => route.responses.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(|| json_response(404, json!({"errors": "Not Found"}))))
    }
}

pub fn json_response(status: u16, body: Value) -> ApiResponse {
    ApiResponse::new(status, body)
}

pub fn throttled_response(retry_after: Option<&str>) -> ApiResponse {
    ApiResponse {
        status: 429,
        retry_after: retry_after.map(str::to_string),
        body: json!({"errors": "Exceeded 2 calls per second for api client. Reduce request rates to resume uninterrupted service."}),
    }
}

/// Shopify-style body for a created product
pub fn created_product(id: u64, title: &str) -> ApiResponse {
    json_response(201, json!({"product": {"id": id, "title": title, "status": "draft"}}))
}

pub fn search_result(matches: &[(u64, &str)]) -> ApiResponse {
    let products: Vec<Value> = matches.iter().map(|(id, title)| json!({"id": id, "title": title})).collect();
    json_response(200, json!({ "products": products }))
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Sink that keeps every event for later assertions
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        lock(&self.events).clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Status { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn items(&self) -> Vec<ProductRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Item { record } => Some(*record),
                _ => None,
            })
            .collect()
    }

    pub fn done(&self) -> Vec<RunSummary> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Done { summary } => Some(*summary),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn on_status(&self, phase: RunPhase, message: &str) {
        lock(&self.events).push(RunEvent::Status {
            phase,
            message: message.to_string(),
        });
    }

    fn on_item(&self, record: &ProductRecord) {
        lock(&self.events).push(RunEvent::Item {
            record: Box::new(record.clone()),
        });
    }

    fn on_done(&self, summary: &RunSummary) {
        lock(&self.events).push(RunEvent::Done {
            summary: Box::new(summary.clone()),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
