use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scrapers::SourceKind;

/// A catalog record as stored in the site's products JSON file.
///
/// Unknown fields (category, description, image urls and whatever else the
/// site adds) are carried through `extra` so a full-file rewrite never
/// loses them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub price_display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Product {
    /// Identifier scheme shared with the subscription store: external id
    /// (ASIN/SKU) when present, product name otherwise.
    pub fn product_key(&self) -> &str {
        self.external_id.as_deref().unwrap_or(&self.name)
    }
}

/// Human-facing display string derived from a numeric price. The catalog's
/// display field is always regenerated from the number, never edited.
pub fn format_price_display(price: f64) -> String {
    format!("${price:.2}")
}

/// Last-observed price record, one per product key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    pub price: f64,
    pub price_display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<DateTime<Utc>>,
}

/// The price-history JSON file. Rewritten in full at the end of every run,
/// with the run-completion timestamp in `checked_at`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub products: HashMap<String, PriceHistory>,
}

/// Per-run working copy of one checkable product: catalog record merged
/// with its history record (history wins for price, so repeated runs
/// compare against the last observed price, not the catalog's).
#[derive(Debug, Clone)]
pub struct WorklistEntry {
    pub key: String,
    pub name: String,
    pub url: String,
    pub source: SourceKind,
    pub external_id: Option<String>,
    pub price: f64,
    pub price_display: String,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_changed: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_key_prefers_external_id() {
        let product: Product = serde_json::from_str(
            r#"{"name":"Widget","price":20.0,"url":"https://example.com","externalId":"X1"}"#,
        )
        .unwrap();
        assert_eq!(product.product_key(), "X1");

        let unnamed: Product =
            serde_json::from_str(r#"{"name":"Widget","url":"https://example.com"}"#).unwrap();
        assert_eq!(unnamed.product_key(), "Widget");
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = r#"{"name":"Antenna","priceDisplay":"$12.99","price":12.99,"url":"https://example.com/a","category":"antennas","inStock":true}"#;
        let product: Product = serde_json::from_str(raw).unwrap();
        assert_eq!(product.extra.get("category").unwrap(), "antennas");

        let rewritten = serde_json::to_string(&product).unwrap();
        let reparsed: Product = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(reparsed.extra.get("inStock").unwrap(), true);
    }

    #[test]
    fn test_format_price_display() {
        assert_eq!(format_price_display(18.0), "$18.00");
        assert_eq!(format_price_display(7.456), "$7.46");
    }
}
