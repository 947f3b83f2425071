use chrono::Utc;
use tokio::time::{sleep, Duration};

use crate::models::product::{
    format_price_display, PriceHistory, PriceHistoryFile, Product, WorklistEntry,
};
use crate::models::report::{CheckOutcome, PriceChange, RunReport, SkipReason};
use crate::scrapers::fetcher::PageFetch;
use crate::scrapers::price_extractor::extract_price;
use crate::scrapers::{classify_source, is_non_commerce_url, FetchConfig, SourceKind};
use crate::services::notifier::Notifier;

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Minimum relative change before a new price is recorded at all.
    pub change_threshold: f64,
    /// Relative change beyond which a scrape is treated as corrupt and
    /// never reconciled into the catalog.
    pub implausible_change_cap: f64,
    pub fetch: FetchConfig,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            change_threshold: 0.05,
            implausible_change_cap: 0.80,
            fetch: FetchConfig::default(),
        }
    }
}

/// Build the per-run worklist by merging the catalog with the price
/// history. History wins for price and display, so each run compares
/// against the last observed price rather than the catalog's belief.
///
/// Products with no resolvable fetch URL or no positive cached price are
/// ineligible and silently left out.
pub fn build_worklist(catalog: &[Product], history: &PriceHistoryFile) -> Vec<WorklistEntry> {
    let mut entries = Vec::new();

    for product in catalog {
        let Some(url) = fetch_url(product) else {
            tracing::debug!("{} has no fetchable URL, ineligible", product.name);
            continue;
        };

        let key = product.product_key().to_string();
        let historical = history.products.get(&key);

        let (price, price_display) = match historical {
            Some(h) if h.price > 0.0 => (h.price, h.price_display.clone()),
            _ => match product.price {
                Some(p) if p > 0.0 => (p, product.price_display.clone()),
                _ => {
                    tracing::debug!("{} has no known price, ineligible", product.name);
                    continue;
                }
            },
        };

        entries.push(WorklistEntry {
            source: product.source.unwrap_or_else(|| classify_source(&url)),
            key,
            name: product.name.clone(),
            external_id: product.external_id.clone(),
            price,
            price_display,
            last_checked: historical.and_then(|h| h.last_checked).or(product.last_checked),
            last_changed: historical.and_then(|h| h.last_changed).or(product.last_changed),
            url,
        });
    }

    entries
}

fn fetch_url(product: &Product) -> Option<String> {
    if product.url.starts_with("http") {
        return Some(product.url.clone());
    }
    // ASIN-only records resolve to the canonical marketplace page.
    product
        .external_id
        .as_ref()
        .map(|asin| format!("https://www.amazon.com/dp/{asin}"))
}

fn skip_reason(entry: &WorklistEntry) -> Option<SkipReason> {
    if entry.price_display.trim_start().starts_with("From") {
        return Some(SkipReason::VariantPricing);
    }
    if entry.price_display.to_lowercase().contains("contact") {
        return Some(SkipReason::ContactOnlyPricing);
    }
    if is_non_commerce_url(&entry.url) {
        return Some(SkipReason::NonCommerceUrl);
    }
    None
}

/// Run one price-check batch over the worklist: sequential fetches with a
/// per-source delay, never concurrent. Entries are updated in place;
/// accepted changes are collected on the returned report for the caller
/// to reconcile.
pub async fn run_price_check(
    entries: &mut [WorklistEntry],
    fetcher: &dyn PageFetch,
    notifier: &Notifier,
    config: &CheckerConfig,
) -> RunReport {
    let mut report = RunReport::default();
    let total = entries.len();

    for (index, entry) in entries.iter_mut().enumerate() {
        tracing::info!("[{}/{}] Checking: {}", index + 1, total, entry.name);

        if let Some(reason) = skip_reason(entry) {
            report.record(&entry.key, CheckOutcome::Skipped { reason });
            continue;
        }

        let html = match fetcher.fetch_page(&entry.url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", entry.name, e);
                report.record(
                    &entry.key,
                    CheckOutcome::FetchFailed {
                        reason: e.to_string(),
                    },
                );
                pace(config, entry.source).await;
                continue;
            }
        };

        match extract_price(&html, entry.source) {
            None => {
                tracing::info!("No price found for {}, keeping cached price", entry.name);
                entry.last_checked = Some(Utc::now());
                report.record(&entry.key, CheckOutcome::NoPriceFound);
            }
            Some(new_price) => {
                let old_price = entry.price;
                let pct_change = (new_price - old_price).abs() / old_price;

                if pct_change > config.change_threshold {
                    tracing::info!(
                        "{}: {} -> {} ({:.1}% change)",
                        entry.name,
                        format_price_display(old_price),
                        format_price_display(new_price),
                        pct_change * 100.0
                    );

                    let now = Utc::now();
                    entry.price = new_price;
                    entry.price_display = format_price_display(new_price);
                    entry.last_changed = Some(now);
                    entry.last_checked = Some(now);

                    report.changes.push(PriceChange {
                        key: entry.key.clone(),
                        name: entry.name.clone(),
                        url: entry.url.clone(),
                        external_id: entry.external_id.clone(),
                        old_price,
                        new_price,
                        pct_change,
                    });
                    report.record(
                        &entry.key,
                        CheckOutcome::Changed {
                            old_price,
                            new_price,
                            pct_change,
                        },
                    );

                    // Only drops alert subscribers; rises are recorded
                    // silently.
                    if new_price < old_price {
                        let drop_pct = (old_price - new_price) / old_price;
                        let stats = notifier
                            .notify_price_drop(entry, old_price, new_price, drop_pct)
                            .await;
                        report.notifications_sent += stats.sent;
                        report.notifications_attempted += stats.attempted;
                    }
                } else {
                    entry.last_checked = Some(Utc::now());
                    report.record(&entry.key, CheckOutcome::Unchanged { pct_change });
                }
            }
        }

        pace(config, entry.source).await;
    }

    tracing::info!("Price check complete: {}", report.summary());
    report
}

async fn pace(config: &CheckerConfig, source: SourceKind) {
    let delay = config.fetch.delay_ms_for(source);
    if delay > 0 {
        sleep(Duration::from_millis(delay)).await;
    }
}

/// Merge accepted changes back into the catalog, guarded by the
/// implausibility cap: swings beyond it are scraper corruption (wrong
/// element, interstitial page, currency confusion), not price movement,
/// and are dropped with a warning. This is the only path that mutates
/// catalog price fields.
pub fn reconcile(catalog: &mut [Product], changes: &[PriceChange], cap: f64) -> usize {
    let mut updated = 0;

    for change in changes {
        if change.pct_change > cap {
            tracing::warn!(
                "Rejecting implausible {:.0}% swing for {} ({} -> {})",
                change.pct_change * 100.0,
                change.name,
                format_price_display(change.old_price),
                format_price_display(change.new_price)
            );
            continue;
        }

        let position = catalog
            .iter()
            .position(|p| change.external_id.is_some() && p.external_id == change.external_id)
            .or_else(|| catalog.iter().position(|p| p.url == change.url));

        match position {
            Some(i) => {
                let now = Utc::now();
                let product = &mut catalog[i];
                product.price = Some(change.new_price);
                product.price_display = format_price_display(change.new_price);
                product.last_changed = Some(now);
                product.last_checked = Some(now);
                updated += 1;
            }
            None => {
                tracing::warn!("No catalog match for changed product {}", change.name);
            }
        }
    }

    updated
}

/// Rebuild the history file from the worklist after a run. Entries carry
/// the raw observed prices, including ones reconciliation rejected:
/// history records what was seen, the catalog what is believed sellable.
/// Products not in this run's worklist keep their previous records.
pub fn build_history(entries: &[WorklistEntry], previous: &PriceHistoryFile) -> PriceHistoryFile {
    let mut products = previous.products.clone();

    for entry in entries {
        products.insert(
            entry.key.clone(),
            PriceHistory {
                price: entry.price,
                price_display: entry.price_display.clone(),
                last_checked: entry.last_checked,
                last_changed: entry.last_changed,
            },
        );
    }

    PriceHistoryFile {
        checked_at: previous.checked_at,
        products,
    }
}
