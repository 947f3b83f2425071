use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotenvy::dotenv;
use sea_orm::Database;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use meshparts_checker::jobs::price_check::{
    build_history, build_worklist, reconcile, run_price_check, CheckerConfig,
};
use meshparts_checker::scrapers::fetcher::PageFetcher;
use meshparts_checker::services::catalog_store::{load_catalog, save_catalog};
use meshparts_checker::services::email::{EmailDelivery, EmailService};
use meshparts_checker::services::history_store::{load_history, save_history};
use meshparts_checker::services::notifier::Notifier;

/// Printed to stdout iff at least one catalog price was reconciled; the
/// deploy step greps for it to decide whether to republish the site.
const UPDATED_SENTINEL: &str = "PRICES_UPDATED";

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv().ok();

    let catalog_path =
        PathBuf::from(env::var("CATALOG_PATH").unwrap_or_else(|_| "data/products.json".into()));
    let history_path = PathBuf::from(
        env::var("PRICE_HISTORY_PATH").unwrap_or_else(|_| "data/price-history.json".into()),
    );

    // Missing or corrupt catalog is the one fatal condition: nothing has
    // been written yet, so abort before any work.
    let mut catalog = match load_catalog(&catalog_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("Fatal: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Loaded {} catalog products", catalog.len());

    let history = load_history(&history_path);
    let config = CheckerConfig::default();

    let fetcher = match PageFetcher::new(&config.fetch) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            tracing::error!("Fatal: cannot build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let notifier = build_notifier().await;

    let mut worklist = build_worklist(&catalog, &history);
    tracing::info!(
        "Checking {} of {} products",
        worklist.len(),
        catalog.len()
    );

    let report = run_price_check(&mut worklist, &fetcher, &notifier, &config).await;

    let updated = reconcile(&mut catalog, &report.changes, config.implausible_change_cap);

    // History is rewritten unconditionally; it records what was observed
    // this run whether or not the catalog accepted it.
    let mut new_history = build_history(&worklist, &history);
    if let Err(e) = save_history(&history_path, &mut new_history) {
        tracing::error!("Failed to write price history: {}", e);
    }

    if updated > 0 {
        if let Err(e) = save_catalog(&catalog_path, &catalog) {
            tracing::error!("Failed to write catalog: {}", e);
        } else {
            tracing::info!("Reconciled {} price changes into the catalog", updated);
            println!("{UPDATED_SENTINEL}");
            return;
        }
    }

    println!("Price check complete: {}", report.summary());
}

/// Wire up the notification fan-out from the environment. Anything
/// missing (no subscription DB, no delivery credential) disables alerts
/// with a warning; it never fails the batch.
async fn build_notifier() -> Notifier {
    let db_path = env::var("ALERTS_DB_PATH").unwrap_or_else(|_| "data/alerts.db".into());
    let db = if Path::new(&db_path).exists() {
        match Database::connect(format!("sqlite://{db_path}")).await {
            Ok(db) => Some(db),
            Err(e) => {
                tracing::warn!("Cannot open subscription store {}: {}", db_path, e);
                None
            }
        }
    } else {
        tracing::warn!("No subscription store at {}, alerts disabled", db_path);
        None
    };

    let email: Option<Arc<dyn EmailDelivery>> = match env::var("EMAIL_API_KEY") {
        Ok(api_key) if !api_key.is_empty() => {
            let base_url =
                env::var("EMAIL_API_URL").unwrap_or_else(|_| "https://api.resend.com".into());
            Some(Arc::new(EmailService::new(api_key, base_url)))
        }
        _ => {
            tracing::warn!("EMAIL_API_KEY not set, alerts disabled");
            None
        }
    };

    let from_address = env::var("EMAIL_FROM")
        .unwrap_or_else(|_| "MeshParts Alerts <alerts@meshparts.example>".into());
    let site_base_url =
        env::var("SITE_BASE_URL").unwrap_or_else(|_| "https://meshparts.example".into());
    let affiliate_tag = env::var("AFFILIATE_TAG").ok().filter(|t| !t.is_empty());

    Notifier::new(db, email, from_address, site_base_url, affiliate_tag)
}
