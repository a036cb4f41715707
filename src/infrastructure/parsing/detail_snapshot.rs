//! Text extraction from a detail page snapshot
//!
//! Works on the page source captured after navigation. Parsing is
//! synchronous and returns owned values, so the parsed document never lives
//! across an await point.

use scraper::{ElementRef, Html, Selector};

use crate::domain::description::is_boilerplate;
use crate::infrastructure::parsing::config::CatalogSelectors;
use crate::infrastructure::parsing::selector_cascade::{
    compile_selectors, element_text, text_list_strategies, SelectorCascade,
};
use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};

pub const SHORT_MIN_CHARS: usize = 10;
pub const ADVANTAGE_MIN_CHARS: usize = 20;
pub const LONG_MIN_CHARS: usize = 50;

/// Text fields read from one detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailText {
    pub short: String,
    pub advantages: Vec<String>,
    pub long: String,
}

pub struct DetailPageParser {
    title: Vec<(String, Selector)>,
    short: Vec<(String, Selector)>,
    advantages: Vec<(String, Selector)>,
    long: Vec<(String, Selector)>,
    advantages_heading_text: String,
    heading: Selector,
    list_item: Selector,
}

impl DetailPageParser {
    pub fn new(selectors: &CatalogSelectors) -> PipelineResult<Self> {
        Ok(Self {
            title: compile_selectors(&selectors.title)?,
            short: compile_selectors(&selectors.short_description)?,
            advantages: compile_selectors(&selectors.advantages)?,
            long: compile_selectors(&selectors.long_description)?,
            advantages_heading_text: selectors.advantages_heading_text.to_lowercase(),
            heading: parse_static("h2, h3, h4")?,
            list_item: parse_static("li")?,
        })
    }

    /// First non-empty heading text, tried in selector order.
    pub fn parse_title(&self, source: &str) -> Option<String> {
        let html = Html::parse_document(source);
        let mut cascade = SelectorCascade::new("title");
        for (label, selector) in &self.title {
            cascade = cascade.then(label.clone(), move |html: &Html| {
                html.select(selector).next().map(|e| element_text(&e))
            });
        }
        cascade.resolve(&html).map(|r| r.value)
    }

    /// Short text, advantages and long text, excluding the title and site boilerplate.
    pub fn parse_text(&self, source: &str, title: &str) -> DetailText {
        let html = Html::parse_document(source);
        let title = title.trim();
        let usable = move |text: &str, min: usize| {
            text.chars().count() > min && text != title && !is_boilerplate(text)
        };

        let short = text_list_strategies(SelectorCascade::new("short_description"), &self.short, move |t| {
            usable(t, SHORT_MIN_CHARS)
        })
        .resolve_or_else(&html, Vec::new);

        let advantages = text_list_strategies(SelectorCascade::new("advantages"), &self.advantages, move |t| {
            usable(t, ADVANTAGE_MIN_CHARS)
        })
        .then("heading sibling list", |html: &Html| {
            Some(
                self.advantages_after_heading(html)
                    .into_iter()
                    .filter(|t| usable(t, ADVANTAGE_MIN_CHARS))
                    .collect(),
            )
        })
        .resolve_or_else(&html, Vec::new);

        let long = text_list_strategies(SelectorCascade::new("long_description"), &self.long, move |t| {
            usable(t, LONG_MIN_CHARS)
        })
        .resolve_or_else(&html, Vec::new);

        DetailText {
            short: dedup(short).join(" "),
            advantages: dedup(advantages),
            long: dedup(long).join("\n\n"),
        }
    }

    /// List items of the first sibling block following a heading that mentions advantages.
    fn advantages_after_heading(&self, html: &Html) -> Vec<String> {
        for heading in html.select(&self.heading) {
            if !element_text(&heading).to_lowercase().contains(&self.advantages_heading_text) {
                continue;
            }
            for sibling in heading.next_siblings().filter_map(ElementRef::wrap) {
                let items: Vec<String> = sibling
                    .select(&self.list_item)
                    .map(|li| element_text(&li))
                    .collect();
                if !items.is_empty() {
                    return items;
                }
            }
        }
        Vec::new()
    }
}

fn parse_static(selector: &str) -> PipelineResult<Selector> {
    Selector::parse(selector).map_err(|e| PipelineError::invalid_selector(selector, e.to_string()))
}

fn dedup(texts: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(texts.len());
    for text in texts {
        if !unique.contains(&text) {
            unique.push(text);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <h1 class="m-0">Wilo-Stratos MAXO</h1>
          <div class="pl-md-8">
            <p>Wilo-Stratos MAXO</p>
            <p>Smarte Nassläufer-Pumpe für Heizung</p>
            <p>kurz</p>
          </div>
          <div class="cl-your-advantages"><ul>
            <li>Optimale Systemeffizienz durch Regelungsfunktionen</li>
            <li>zu kurz</li>
          </ul></div>
          <div class="text-module"><div class="text-wrapper">
            <p>Die Pumpe bietet   eine intuitive Bedienung und hohe Effizienz im Betrieb der Anlage.</p>
            <p>Die Pumpe bietet eine intuitive Bedienung und hohe Effizienz im Betrieb der Anlage.</p>
            <p>Über Wilo: Wilo ist ein führender Hersteller von Pumpen und Pumpensystemen weltweit.</p>
          </div></div>
        </body></html>"#;

    fn parser() -> DetailPageParser {
        DetailPageParser::new(&CatalogSelectors::default()).unwrap()
    }

    #[test]
    fn title_prefers_primary_heading() {
        assert_eq!(parser().parse_title(PAGE).as_deref(), Some("Wilo-Stratos MAXO"));
        let generic = "<h1>Generic</h1>";
        assert_eq!(parser().parse_title(generic).as_deref(), Some("Generic"));
        assert_eq!(parser().parse_title("<div></div>"), None);
    }

    #[test]
    fn text_fields_apply_length_title_and_boilerplate_filters() {
        let text = parser().parse_text(PAGE, "Wilo-Stratos MAXO");
        assert_eq!(text.short, "Smarte Nassläufer-Pumpe für Heizung");
        assert_eq!(
            text.advantages,
            vec!["Optimale Systemeffizienz durch Regelungsfunktionen".to_string()]
        );
        assert_eq!(
            text.long,
            "Die Pumpe bietet eine intuitive Bedienung und hohe Effizienz im Betrieb der Anlage."
        );
    }

    #[test]
    fn advantages_fall_back_to_heading_sibling() {
        let page = r"
            <h3>Ihre Vorteile</h3>
            <div><ul><li>Hoher Wirkungsgrad über den gesamten Kennlinienbereich</li></ul></div>";
        let text = parser().parse_text(page, "Pump");
        assert_eq!(text.advantages.len(), 1);
        assert!(text.short.is_empty());
        assert!(text.long.is_empty());
    }
}
