//! Selector configuration for catalog extraction
//!
//! Every field is an ordered fallback list. The first selector that yields a
//! usable result wins, so markup drift on the catalog site only needs a new
//! entry here, not a code change.

use serde::{Deserialize, Serialize};

/// CSS selectors for the listing page, detail page and variant sub-page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogSelectors {
    /// Item cards on the listing page
    pub card_container: Vec<String>,

    /// Direct link inside a card
    pub card_link: Vec<String>,

    /// Thumbnail image inside a card
    pub card_image: Vec<String>,

    /// Detail page heading
    pub title: Vec<String>,

    /// Clickable carousel thumbnail tiles
    pub media_thumbnails: Vec<String>,

    /// Media element currently shown in the main viewer
    pub active_media: Vec<String>,

    /// Short description paragraphs
    pub short_description: Vec<String>,

    /// Advantage bullets
    pub advantages: Vec<String>,

    /// Heading text that introduces an advantages list when no dedicated container exists
    pub advantages_heading_text: String,

    /// Long description blocks
    pub long_description: Vec<String>,

    /// Tab control revealing the variant table
    pub spec_tab: Vec<String>,

    /// Item link in a variant table row
    pub variant_row_link: Vec<String>,

    /// Technical data tables on the variant page
    pub spec_table: Vec<String>,

    /// Title cell of a technical data table
    pub spec_table_title: Vec<String>,
}

fn owned(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| (*s).to_string()).collect()
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            card_container: owned(&[
                "div.card.cl-overview.h-100.rebrush",
                "div.card.cl-overview",
                ".cl-overview",
            ]),
            card_link: owned(&["a.stretched-link", "a[class*='stretched']", "a[href]"]),
            card_image: owned(&[".card-img-top img", "img"]),
            title: owned(&["h1.m-0", "h1"]),
            media_thumbnails: owned(&[
                ".cl-image-preview [role='listitem']",
                ".cl-image-preview img",
                "div[role='listitem']",
            ]),
            active_media: owned(&[
                ".carousel-item.active img",
                ".carousel-item.active iframe",
                ".carousel-item.active video",
                ".cl-media-stage img",
                ".cl-media-stage iframe",
            ]),
            short_description: owned(&[
                "div.pl-md-8 p",
                "div.pl-md-8 h3",
                "div.product-info p",
                "div.description p",
            ]),
            advantages: owned(&[
                "div.cl-your-advantages ul li",
                "div.cl-your-advantages li",
            ]),
            advantages_heading_text: "Vorteile".to_string(),
            long_description: owned(&[
                ".text-module .text-wrapper p",
                ".page-module .text-wrapper",
                ".two-cols-section .text-module",
            ]),
            spec_tab: owned(&[
                "a[href='#variants']",
                "[data-bs-target='#variants']",
                "a[data-toggle='tab'][href*='variant']",
            ]),
            variant_row_link: owned(&[
                "#variants table tbody tr a[href]",
                ".cl-variant-table tbody tr a[href]",
                "table tbody tr a[href]",
            ]),
            spec_table: owned(&[
                "table.cl-technical-data",
                ".technical-data table",
                "table",
            ]),
            spec_table_title: owned(&["thead th", "caption"]),
        }
    }
}
