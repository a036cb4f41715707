//! Ordered fallback extraction
//!
//! A [`SelectorCascade`] holds labelled strategies and evaluates them in
//! order until one produces a non-blank value. Strategies are plain closures,
//! so the same cascade type serves CSS selectors, sibling walks and anything
//! else that reads a parsed page.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};

/// Values a strategy can produce; blank values make the cascade move on
pub trait Extracted {
    fn is_blank(&self) -> bool;
}

impl Extracted for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<T> Extracted for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

type Strategy<'a, I, T> = Box<dyn Fn(&I) -> Option<T> + 'a>;

/// Result of a successful cascade, with the label of the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub strategy: String,
}

pub struct SelectorCascade<'a, I: ?Sized, T> {
    field: &'static str,
    strategies: Vec<(String, Strategy<'a, I, T>)>,
}

impl<'a, I: ?Sized, T: Extracted> SelectorCascade<'a, I, T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    #[must_use]
    pub fn then(mut self, label: impl Into<String>, strategy: impl Fn(&I) -> Option<T> + 'a) -> Self {
        self.strategies.push((label.into(), Box::new(strategy)));
        self
    }

    pub fn labels(&self) -> Vec<String> {
        self.strategies.iter().map(|(label, _)| label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// First non-blank result, or `None` when every strategy came up empty.
    pub fn resolve(&self, input: &I) -> Option<Resolved<T>> {
        for (label, strategy) in &self.strategies {
            match strategy(input) {
                Some(value) if !value.is_blank() => {
                    debug!("Resolved {} via '{}'", self.field, label);
                    return Some(Resolved {
                        value,
                        strategy: label.clone(),
                    });
                }
                _ => {}
            }
        }
        debug!("No strategy matched for {} ({} tried)", self.field, self.strategies.len());
        None
    }

    /// Like [`Self::resolve`] but reports a miss as [`PipelineError::SelectorMiss`].
    pub fn require(&self, input: &I) -> PipelineResult<Resolved<T>> {
        self.resolve(input)
            .ok_or_else(|| PipelineError::selector_miss(self.field, &self.labels()))
    }

    pub fn resolve_or_else(&self, input: &I, fallback: impl FnOnce() -> T) -> T {
        self.resolve(input).map_or_else(fallback, |r| r.value)
    }
}

/// Compile a fallback list, skipping invalid entries.
///
/// Fails only when the list is non-empty and none of its selectors compile.
pub fn compile_selectors(selector_strings: &[String]) -> PipelineResult<Vec<(String, Selector)>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push((selector_str.clone(), selector)),
            Err(e) => {
                warn!("Failed to compile selector '{}': {}", selector_str, e);
                errors.push(format!("'{selector_str}': {e}"));
            }
        }
    }

    if selectors.is_empty() && !selector_strings.is_empty() {
        return Err(PipelineError::invalid_selector(
            &selector_strings.join(" | "),
            format!("no valid selectors compiled: {}", errors.join(", ")),
        ));
    }

    Ok(selectors)
}

/// Whitespace-collapsed text content of an element
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Adds one strategy per compiled selector, each collecting the texts of all matches
/// that pass `keep`.
pub fn text_list_strategies<'a>(
    mut cascade: SelectorCascade<'a, Html, Vec<String>>,
    selectors: &'a [(String, Selector)],
    keep: impl Fn(&str) -> bool + Clone + 'a,
) -> SelectorCascade<'a, Html, Vec<String>> {
    for (label, selector) in selectors {
        let keep = keep.clone();
        cascade = cascade.then(label.clone(), move |html: &Html| {
            let texts: Vec<String> = html
                .select(selector)
                .map(|e| element_text(&e))
                .filter(|t| keep(t))
                .collect();
            Some(texts)
        });
    }
    cascade
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_blank_strategy_wins() {
        let cascade: SelectorCascade<'_, str, String> = SelectorCascade::new("title")
            .then("empty", |_| Some(String::new()))
            .then("none", |_| None)
            .then("echo", |s: &str| Some(s.to_uppercase()))
            .then("never", |_| Some("unreachable".to_string()));

        let resolved = cascade.resolve("pump").unwrap();
        assert_eq!(resolved.value, "PUMP");
        assert_eq!(resolved.strategy, "echo");
    }

    #[test]
    fn miss_reports_every_label() {
        let cascade: SelectorCascade<'_, str, Vec<String>> = SelectorCascade::new("advantages")
            .then("a", |_| Some(vec![]))
            .then("b", |_| None);

        match cascade.require("x") {
            Err(PipelineError::SelectorMiss { field, tried_selectors }) => {
                assert_eq!(field, "advantages");
                assert_eq!(tried_selectors, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(cascade.resolve_or_else("x", || vec!["fallback".to_string()]), vec!["fallback"]);
    }

    #[test]
    fn compile_skips_invalid_but_fails_when_none_compile() {
        let ok = compile_selectors(&["h1".to_string(), "[[".to_string()]).unwrap();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].0, "h1");

        assert!(matches!(
            compile_selectors(&["[[".to_string()]),
            Err(PipelineError::InvalidSelector { .. })
        ));
        assert!(compile_selectors(&[]).unwrap().is_empty());
    }

    #[test]
    fn text_list_falls_through_to_next_selector() {
        let html = Html::parse_document(
            "<div class='b'><p>short</p><p>long enough   text</p></div>",
        );
        let selectors = compile_selectors(&["div.a p".to_string(), "div.b p".to_string()]).unwrap();
        let cascade = text_list_strategies(SelectorCascade::new("paragraphs"), &selectors, |t| t.len() > 5);
        let resolved = cascade.resolve(&html).unwrap();
        assert_eq!(resolved.strategy, "div.b p");
        assert_eq!(resolved.value, vec!["long enough text".to_string()]);
    }
}
