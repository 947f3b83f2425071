pub mod fetcher;
pub mod price_extractor;

use serde::{Deserialize, Serialize};

/// Source family of a product page. Determines which extraction strategy
/// table applies and how long to wait between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Amazon marketplace listings (ASIN-addressed).
    Amazon,
    /// Shopify storefronts (RAK Wireless, LILYGO and similar vendor shops).
    Shopify,
    /// Seeed Studio's own store platform.
    Seeed,
    /// Anything else with a fetchable page.
    Generic,
}

impl SourceKind {
    pub fn is_marketplace(&self) -> bool {
        matches!(self, SourceKind::Amazon)
    }
}

const SHOPIFY_HOSTS: &[&str] = &[
    "rakwireless.com",
    "lilygo.cc",
    "rokland.com",
    "muzi.works",
    "myshopify.com",
];

/// Classify a product URL into a source family by its host.
///
/// Single point of classification: everything that selects an extraction
/// strategy or a request delay matches on the returned variant.
pub fn classify_source(url: &str) -> SourceKind {
    let host = match reqwest::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(h) => h.to_lowercase(),
            None => return SourceKind::Generic,
        },
        Err(_) => return SourceKind::Generic,
    };

    if host.contains("amazon.") || host == "amzn.to" {
        return SourceKind::Amazon;
    }
    if SHOPIFY_HOSTS.iter().any(|h| host.ends_with(h)) {
        return SourceKind::Shopify;
    }
    if host.ends_with("seeedstudio.com") {
        return SourceKind::Seeed;
    }
    SourceKind::Generic
}

/// Hosts that are community links rather than product pages. Products
/// pointing here are skipped, not treated as fetch failures.
const NON_COMMERCE_HOSTS: &[&str] = &[
    "discord.gg",
    "discord.com",
    "t.me",
    "reddit.com",
    "github.com",
    "facebook.com",
];

pub fn is_non_commerce_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => {
                let host = host.to_lowercase();
                NON_COMMERCE_HOSTS
                    .iter()
                    .any(|h| host == *h || host.ends_with(&format!(".{h}")))
            }
            None => true,
        },
        Err(_) => true,
    }
}

/// Small fixed pool of desktop user agents; one is drawn at random per
/// request so the batch does not present a uniform fingerprint.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
];

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Delay after each marketplace (Amazon) fetch.
    pub marketplace_delay_ms: u64,
    /// Delay after every other fetch.
    pub default_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            marketplace_delay_ms: 3000,
            default_delay_ms: 1500,
        }
    }
}

impl FetchConfig {
    pub fn delay_ms_for(&self, source: SourceKind) -> u64 {
        if source.is_marketplace() {
            self.marketplace_delay_ms
        } else {
            self.default_delay_ms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_source() {
        assert_eq!(
            classify_source("https://www.amazon.com/dp/B0ABCD1234"),
            SourceKind::Amazon
        );
        assert_eq!(
            classify_source("https://store.rakwireless.com/products/rak19007"),
            SourceKind::Shopify
        );
        assert_eq!(
            classify_source("https://lilygo.cc/products/t-beam"),
            SourceKind::Shopify
        );
        assert_eq!(
            classify_source("https://www.seeedstudio.com/SenseCAP-T1000.html"),
            SourceKind::Seeed
        );
        assert_eq!(
            classify_source("https://example.com/antenna"),
            SourceKind::Generic
        );
        assert_eq!(classify_source("not a url"), SourceKind::Generic);
    }

    #[test]
    fn test_non_commerce_urls() {
        assert!(is_non_commerce_url("https://discord.gg/meshtastic"));
        assert!(is_non_commerce_url("https://www.reddit.com/r/meshtastic"));
        assert!(!is_non_commerce_url("https://www.amazon.com/dp/B0ABCD1234"));
        assert!(is_non_commerce_url(""));
    }

    #[test]
    fn test_delay_is_longer_for_marketplace() {
        let config = FetchConfig::default();
        assert!(config.delay_ms_for(SourceKind::Amazon) > config.delay_ms_for(SourceKind::Shopify));
        assert_eq!(
            config.delay_ms_for(SourceKind::Generic),
            config.default_delay_ms
        );
    }
}
