use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::SourceKind;

lazy_static! {
    // "$1,234.56" — currency token with exactly two decimal digits
    static ref DOLLAR_TOKEN: Regex = Regex::new(r"\$\s?(\d{1,3}(?:,\d{3})*\.\d{2})").unwrap();

    // First numeric token inside an element's text, e.g. "24.99" in "US $24.99 each"
    static ref NUMERIC_TOKEN: Regex = Regex::new(r"(\d+(?:,\d{3})*(?:\.\d{1,2})?)").unwrap();
}

// Ordered selector tables per source family. Data, not control flow: adding a
// new storefront layout means appending a selector, not touching extraction.
const AMAZON_SELECTORS: &[&str] = &[
    "#corePrice_feature_div span.a-offscreen",
    "#corePriceDisplay_desktop_feature_div span.a-offscreen",
    "span.a-price span.a-offscreen",
    "#priceblock_ourprice",
    "#priceblock_dealprice",
    "#price_inside_buybox",
];

const SHOPIFY_SELECTORS: &[&str] = &[
    ".price__regular .price-item--regular",
    ".price .price-item--sale",
    "[data-product-price]",
    ".product__price",
    ".price .money",
    "meta[property='og:price:amount']",
];

const SEEED_SELECTORS: &[&str] = &[
    ".product-price .price",
    ".price_sale",
    "[itemprop='price']",
    "span.price",
    "meta[property='og:price:amount']",
];

const GENERIC_SELECTORS: &[&str] = &[
    "[itemprop='price']",
    "meta[property='og:price:amount']",
    "meta[property='product:price:amount']",
    ".product-price",
    ".price",
];

// Plausible retail range for the generic minimum-token heuristic, exclusive
// on both ends. Filters out shipping lines and bundle totals.
const GENERIC_MIN_PRICE: f64 = 5.0;
const GENERIC_MAX_PRICE: f64 = 500.0;

fn selectors_for(source: SourceKind) -> &'static [&'static str] {
    match source {
        SourceKind::Amazon => AMAZON_SELECTORS,
        SourceKind::Shopify => SHOPIFY_SELECTORS,
        SourceKind::Seeed => SEEED_SELECTORS,
        SourceKind::Generic => GENERIC_SELECTORS,
    }
}

/// Extract a best-effort price from a product page.
///
/// Strategy order, first success wins:
/// 1. The source family's selector table, against the parsed document.
/// 2. A regex scan of the raw markup for `$`-formatted tokens.
/// 3. Generic sources only: the minimum token in the plausible retail
///    range, which favors the buy box over accessory mentions.
///
/// "No price found" is an expected outcome (anti-bot pages, layout
/// changes) and is reported as `None`, never as an error.
pub fn extract_price(html: &str, source: SourceKind) -> Option<f64> {
    let document = Html::parse_document(html);

    for selector_str in selectors_for(source) {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                if let Some(price) = price_from_element(&element) {
                    return Some(price);
                }
            }
        }
    }

    match source {
        SourceKind::Generic => minimum_plausible_token(html),
        _ => first_dollar_token(html),
    }
}

/// Pull a numeric price out of an element: its text first, then a
/// `content` attribute for `<meta>`-style carriers.
fn price_from_element(element: &ElementRef) -> Option<f64> {
    let text: String = element.text().collect::<Vec<_>>().join(" ");
    if let Some(price) = parse_price_token(&text) {
        return Some(price);
    }
    element
        .value()
        .attr("content")
        .and_then(parse_price_token)
}

/// Parse the first numeric token in a string, stripping thousands
/// separators. Returns None for zero or negative values.
pub fn parse_price_token(text: &str) -> Option<f64> {
    let cap = NUMERIC_TOKEN.captures(text)?;
    let cleaned = cap[1].replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(value) if value > 0.0 => Some(value),
        _ => None,
    }
}

fn first_dollar_token(html: &str) -> Option<f64> {
    let cap = DOLLAR_TOKEN.captures(html)?;
    parse_price_token(&cap[1])
}

fn minimum_plausible_token(html: &str) -> Option<f64> {
    DOLLAR_TOKEN
        .captures_iter(html)
        .filter_map(|cap| parse_price_token(&cap[1]))
        .filter(|v| *v > GENERIC_MIN_PRICE && *v < GENERIC_MAX_PRICE)
        .fold(None, |min: Option<f64>, v| match min {
            Some(m) if m <= v => Some(m),
            _ => Some(v),
        })
}
