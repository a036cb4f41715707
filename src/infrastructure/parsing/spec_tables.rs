//! Technical data tables on the variant sub-page

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::domain::product_record::TechnicalSpecTable;
use crate::infrastructure::parsing::config::CatalogSelectors;
use crate::infrastructure::parsing::selector_cascade::{compile_selectors, element_text};
use crate::infrastructure::pipeline_error::{PipelineError, PipelineResult};

pub struct SpecTableParser {
    tables: Vec<(String, Selector)>,
    titles: Vec<(String, Selector)>,
    body_rows: Selector,
    any_rows: Selector,
    cells: Selector,
}

impl SpecTableParser {
    pub fn new(selectors: &CatalogSelectors) -> PipelineResult<Self> {
        let fixed = |s: &str| {
            Selector::parse(s).map_err(|e| PipelineError::invalid_selector(s, e.to_string()))
        };
        Ok(Self {
            tables: compile_selectors(&selectors.spec_table)?,
            titles: compile_selectors(&selectors.spec_table_title)?,
            body_rows: fixed("tbody > tr")?,
            any_rows: fixed("tr")?,
            cells: fixed("th, td")?,
        })
    }

    /// Every table with at least one usable row, in document order.
    ///
    /// Tables without a title cell are named "Technical Data Table {n}" where
    /// `n` is the 1-based position among the matched tables.
    pub fn parse(&self, source: &str) -> Vec<TechnicalSpecTable> {
        let html = Html::parse_document(source);
        let Some((label, matched)) = self.select_tables(&html) else {
            debug!("No technical data tables on page");
            return Vec::new();
        };
        debug!("Found {} technical data tables via '{}'", matched.len(), label);

        matched
            .iter()
            .enumerate()
            .filter_map(|(i, table)| {
                let title = self
                    .table_title(table)
                    .unwrap_or_else(|| format!("Technical Data Table {}", i + 1));
                let mut spec = TechnicalSpecTable::new(title);
                for (key, value) in self.table_rows(table) {
                    spec.data.insert(key, value);
                }
                (!spec.data.is_empty()).then_some(spec)
            })
            .collect()
    }

    fn select_tables<'a>(&'a self, html: &'a Html) -> Option<(&'a str, Vec<ElementRef<'a>>)> {
        self.tables.iter().find_map(|(label, selector)| {
            let found: Vec<_> = html.select(selector).collect();
            (!found.is_empty()).then_some((label.as_str(), found))
        })
    }

    fn table_title(&self, table: &ElementRef<'_>) -> Option<String> {
        self.titles.iter().find_map(|(_, selector)| {
            table
                .select(selector)
                .map(|e| element_text(&e))
                .find(|t| !t.is_empty())
        })
    }

    fn table_rows(&self, table: &ElementRef<'_>) -> Vec<(String, String)> {
        let mut rows: Vec<ElementRef<'_>> = table.select(&self.body_rows).collect();
        if rows.is_empty() {
            rows = table.select(&self.any_rows).collect();
        }
        rows.iter()
            .filter_map(|row| {
                let cells: Vec<String> = row.select(&self.cells).map(|c| element_text(&c)).collect();
                if cells.len() < 2 {
                    return None;
                }
                let (key, value) = (cells[0].trim(), cells[1].trim());
                (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> SpecTableParser {
        SpecTableParser::new(&CatalogSelectors::default()).unwrap()
    }

    #[test]
    fn titled_and_untitled_tables() {
        let page = r"
            <table>
              <thead><tr><th colspan='2'>Hydraulische Daten</th></tr></thead>
              <tbody>
                <tr><td>Max. Förderhöhe</td><td>12 m</td></tr>
                <tr><td>Max. Volumenstrom</td><td>40 m³/h</td></tr>
                <tr><td>Nur eine Zelle</td></tr>
                <tr><td></td><td>ohne Schlüssel</td></tr>
              </tbody>
            </table>
            <table><tbody><tr><td>Netzanschluss</td><td>1~230 V</td></tr></tbody></table>
            <table><tbody><tr><td>leer</td></tr></tbody></table>";

        let tables = parser().parse(page);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].title, "Hydraulische Daten");
        assert_eq!(
            tables[0].data.iter().collect::<Vec<_>>(),
            vec![
                (&"Max. Förderhöhe".to_string(), &"12 m".to_string()),
                (&"Max. Volumenstrom".to_string(), &"40 m³/h".to_string()),
            ]
        );
        assert_eq!(tables[1].title, "Technical Data Table 2");
    }

    #[test]
    fn page_without_tables_yields_nothing() {
        assert!(parser().parse("<div>keine Daten</div>").is_empty());
    }
}
