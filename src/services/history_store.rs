use std::path::Path;

use chrono::Utc;

use crate::models::product::PriceHistoryFile;
use crate::services::catalog_store::write_atomically;

/// Read the price-history file. Absent on first run, which is not an
/// error: the worklist falls back to catalog prices and the first run
/// seeds the file. A corrupt history is discarded with a warning rather
/// than aborting the batch.
pub fn load_history(path: &Path) -> PriceHistoryFile {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => {
            tracing::info!("No price history at {}, starting fresh", path.display());
            return PriceHistoryFile::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(
                "Price history at {} is unreadable ({}), starting fresh",
                path.display(),
                e
            );
            PriceHistoryFile::default()
        }
    }
}

/// Rewrite the history file in full, stamping the run-completion time.
/// Always called at run end, whether or not anything changed: history
/// records what was last observed, not what the catalog believes.
pub fn save_history(
    path: &Path,
    history: &mut PriceHistoryFile,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    history.checked_at = Some(Utc::now());
    write_atomically(path, &serde_json::to_string_pretty(history)?)
}
