use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::description::compose;

/// How completely a detail page was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    #[default]
    Extracted,
    /// A media or specification step hit a driver error; remaining fields are still valid
    PartiallyExtracted,
}

/// One technical data table from the variant sub-page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalSpecTable {
    pub title: String,
    pub data: IndexMap<String, String>,
}

impl TechnicalSpecTable {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data: IndexMap::new(),
        }
    }
}

/// Minimal data read from a listing card before opening its detail page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardData {
    /// 1-based position on the listing page
    pub position: usize,
    pub temporary_name: String,
    pub thumbnail_url: String,
    pub detail_link: Option<String>,
    /// Address the card container itself points at (`data-href`)
    pub container_target: Option<String>,
}

impl CardData {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            temporary_name: placeholder_name(position),
            ..Self::default()
        }
    }
}

/// Name used when a detail page exposes no usable heading
pub fn placeholder_name(position: usize) -> String {
    format!("Item {position}")
}

/// Run-unique identifier: "catalog_" + 1-based position + "_" + unix seconds
pub fn record_id(position: usize, at: DateTime<Utc>) -> String {
    format!("catalog_{}_{}", position, at.timestamp())
}

/// One extracted catalog item.
///
/// The text fields are only reachable through [`ProductRecord::set_text`],
/// which keeps `composed_description` in step with them. Media lists and
/// specification titles stay duplicate-free through their `add_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredProductRecord")]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub card_thumbnail_url: String,
    images: Vec<String>,
    videos: Vec<String>,
    short_description: String,
    long_description: String,
    advantages: Vec<String>,
    composed_description: String,
    technical_specifications: Vec<TechnicalSpecTable>,
    pub source_url: String,
    pub extracted_at: DateTime<Utc>,
    pub status: ExtractionStatus,
}

impl ProductRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            subcategory: subcategory.into(),
            card_thumbnail_url: String::new(),
            images: Vec::new(),
            videos: Vec::new(),
            short_description: String::new(),
            long_description: String::new(),
            advantages: Vec::new(),
            composed_description: String::new(),
            technical_specifications: Vec::new(),
            source_url: String::new(),
            extracted_at: Utc::now(),
            status: ExtractionStatus::Extracted,
        }
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn videos(&self) -> &[String] {
        &self.videos
    }

    pub fn short_description(&self) -> &str {
        &self.short_description
    }

    pub fn long_description(&self) -> &str {
        &self.long_description
    }

    pub fn advantages(&self) -> &[String] {
        &self.advantages
    }

    pub fn composed_description(&self) -> &str {
        &self.composed_description
    }

    pub fn technical_specifications(&self) -> &[TechnicalSpecTable] {
        &self.technical_specifications
    }

    /// Appends an image URL unless it is empty or already known. Returns whether it was added.
    pub fn add_image(&mut self, url: impl Into<String>) -> bool {
        push_unique(&mut self.images, url.into())
    }

    pub fn add_video(&mut self, url: impl Into<String>) -> bool {
        push_unique(&mut self.videos, url.into())
    }

    /// Replaces the three text fields and re-derives the composed description.
    ///
    /// Text identical to the record name is dropped so a heading never doubles
    /// as a description.
    pub fn set_text(&mut self, short: String, advantages: Vec<String>, long: String) {
        let name = self.name.trim();
        self.short_description = if short.trim() == name { String::new() } else { short };
        self.long_description = if long.trim() == name { String::new() } else { long };
        self.advantages = advantages.into_iter().filter(|a| a.trim() != name).collect();
        self.recompose();
    }

    /// Adds a table, suffixing its title with " (k)" when the title is already taken.
    pub fn add_spec_table(&mut self, mut table: TechnicalSpecTable) {
        if table.data.is_empty() {
            return;
        }
        let base = table.title.clone();
        let mut k = 2;
        while self.technical_specifications.iter().any(|t| t.title == table.title) {
            table.title = format!("{base} ({k})");
            k += 1;
        }
        self.technical_specifications.push(table);
    }

    pub fn mark_partial(&mut self) {
        self.status = ExtractionStatus::PartiallyExtracted;
    }

    fn recompose(&mut self) {
        self.composed_description = compose(
            &self.short_description,
            &self.advantages,
            &self.long_description,
        );
    }
}

fn push_unique(list: &mut Vec<String>, url: String) -> bool {
    if url.is_empty() || list.contains(&url) {
        return false;
    }
    list.push(url);
    true
}

/// On-disk shape of a record; converting it back re-derives every derived field.
#[derive(Deserialize)]
struct StoredProductRecord {
    id: String,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    subcategory: String,
    #[serde(default)]
    card_thumbnail_url: String,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    videos: Vec<String>,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    long_description: String,
    #[serde(default)]
    advantages: Vec<String>,
    #[serde(default)]
    technical_specifications: Vec<TechnicalSpecTable>,
    #[serde(default)]
    source_url: String,
    #[serde(default = "Utc::now")]
    extracted_at: DateTime<Utc>,
    #[serde(default)]
    status: ExtractionStatus,
}

impl From<StoredProductRecord> for ProductRecord {
    fn from(stored: StoredProductRecord) -> Self {
        let mut record = Self::new(stored.id, stored.name, stored.category, stored.subcategory);
        record.card_thumbnail_url = stored.card_thumbnail_url;
        for url in stored.images {
            record.add_image(url);
        }
        for url in stored.videos {
            record.add_video(url);
        }
        for table in stored.technical_specifications {
            record.add_spec_table(table);
        }
        record.source_url = stored.source_url;
        record.extracted_at = stored.extracted_at;
        record.status = stored.status;
        record.set_text(stored.short_description, stored.advantages, stored.long_description);
        record
    }
}
