//! Maps an extracted record onto the Admin API product schema

use serde::Serialize;

use crate::domain::description::escape_html;
use crate::domain::product_record::{ProductRecord, TechnicalSpecTable};
use crate::infrastructure::config::SyncConfig;

pub const SKU_MAX_LEN: usize = 50;
const SKU_CATEGORY_LEN: usize = 4;
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const TRUSTED_IMAGE_HOST: &str = "wilo.com";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
    pub title: String,
    pub body_html: String,
    pub vendor: String,
    pub product_type: String,
    pub tags: String,
    pub status: String,
    pub variants: Vec<NewVariant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<NewImage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metafields: Vec<NewMetafield>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVariant {
    pub title: String,
    pub price: String,
    pub sku: String,
    pub inventory_management: String,
    pub inventory_quantity: i64,
    pub requires_shipping: bool,
    pub taxable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewImage {
    pub src: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMetafield {
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub struct ProductMapper {
    vendor: String,
    status: String,
    max_images: usize,
    namespace: String,
}

impl ProductMapper {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            vendor: config.vendor.clone(),
            status: config.product_status.clone(),
            max_images: config.max_images,
            namespace: config.metafield_namespace.clone(),
        }
    }

    pub fn map(&self, record: &ProductRecord) -> NewProduct {
        let mut body_html = record.composed_description().to_string();
        let specs = spec_section_html(record.technical_specifications());
        if !specs.is_empty() {
            if !body_html.is_empty() {
                body_html.push('\n');
            }
            body_html.push_str(&specs);
        }

        NewProduct {
            title: record.name.clone(),
            body_html,
            vendor: self.vendor.clone(),
            product_type: record.subcategory.clone(),
            tags: tags(&[&self.vendor, &record.category, &record.subcategory]),
            status: self.status.clone(),
            variants: vec![NewVariant {
                title: "Default".to_string(),
                price: "0.00".to_string(),
                sku: synthesize_sku(&self.vendor, &record.name, &record.category),
                inventory_management: "shopify".to_string(),
                inventory_quantity: 0,
                requires_shipping: true,
                taxable: true,
            }],
            images: self.images(record),
            metafields: self.metafields(record),
        }
    }

    /// Card thumbnail first, then gallery images; invalid and duplicate URLs dropped.
    fn images(&self, record: &ProductRecord) -> Vec<NewImage> {
        let candidates = std::iter::once(record.card_thumbnail_url.as_str())
            .chain(record.images().iter().map(String::as_str));
        let mut images: Vec<NewImage> = Vec::new();
        for src in candidates {
            if images.len() >= self.max_images {
                break;
            }
            if !is_valid_image_url(src) || images.iter().any(|i| i.src == src) {
                continue;
            }
            let alt = if images.is_empty() && src == record.card_thumbnail_url {
                format!("{} - Product Image", record.name)
            } else {
                format!("{} - Image {}", record.name, images.len() + 1)
            };
            images.push(NewImage {
                src: src.to_string(),
                alt,
            });
        }
        images
    }

    fn metafields(&self, record: &ProductRecord) -> Vec<NewMetafield> {
        let extracted_at = record.extracted_at.to_rfc3339();
        [
            ("category", record.category.as_str()),
            ("subcategory", record.subcategory.as_str()),
            ("source_url", record.source_url.as_str()),
            ("extracted_at", extracted_at.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| NewMetafield {
            namespace: self.namespace.clone(),
            key: key.to_string(),
            value: value.to_string(),
            kind: "single_line_text_field".to_string(),
        })
        .collect()
    }
}

/// `VENDOR-CATE-PRODUCT-NAME`, restricted to `[A-Z0-9_-]` and at most 50 characters.
pub fn synthesize_sku(vendor: &str, name: &str, category: &str) -> String {
    let category: String = category
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(SKU_CATEGORY_LEN)
        .collect();
    let raw = [vendor, category.as_str(), name]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join("-"))
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase();

    let mut sku = String::with_capacity(raw.len());
    for c in raw.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_') {
        if c == '-' && sku.ends_with('-') {
            continue;
        }
        sku.push(c);
    }
    sku.truncate(SKU_MAX_LEN);
    sku.trim_end_matches('-').to_string()
}

/// Absolute http(s) URL that either names an image file or is served by the catalog host.
pub fn is_valid_image_url(src: &str) -> bool {
    let Ok(url) = url::Url::parse(src) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    let path = url.path().to_lowercase();
    let has_image_extension = path
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext));
    has_image_extension || host == TRUSTED_IMAGE_HOST || host.ends_with(".wilo.com")
}

/// `<h3>` heading plus one `<h4>` and key/value list per table
pub fn spec_section_html(tables: &[TechnicalSpecTable]) -> String {
    if tables.is_empty() {
        return String::new();
    }
    let mut parts = vec!["<h3>Technical Specifications</h3>".to_string()];
    for table in tables {
        parts.push(format!("<h4>{}</h4>", escape_html(&table.title)));
        parts.push("<ul>".to_string());
        for (key, value) in &table.data {
            parts.push(format!(
                "<li><strong>{}:</strong> {}</li>",
                escape_html(key),
                escape_html(value)
            ));
        }
        parts.push("</ul>".to_string());
    }
    parts.join("\n")
}

fn tags(parts: &[&str]) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if !unique.contains(&part) {
            unique.push(part);
        }
    }
    unique.join(", ")
}
