use std::fs;
use std::path::Path;

use crate::models::product::Product;

/// Read the catalog file. A missing or unparseable catalog is the one
/// fatal startup condition of the whole job.
pub fn load_catalog(path: &Path) -> Result<Vec<Product>, Box<dyn std::error::Error + Send + Sync>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("cannot read catalog {}: {e}", path.display()))?;
    let products: Vec<Product> = serde_json::from_str(&raw)
        .map_err(|e| format!("cannot parse catalog {}: {e}", path.display()))?;
    Ok(products)
}

/// Rewrite the catalog in full. Written once, at the very end of a run,
/// and only when reconciliation accepted at least one change.
///
/// The write goes to a sibling temp file first and is renamed into place,
/// so a terminated run never leaves a half-written catalog.
pub fn save_catalog(
    path: &Path,
    products: &[Product],
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    write_atomically(path, &serde_json::to_string_pretty(products)?)
}

pub(crate) fn write_atomically(
    path: &Path,
    contents: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)
        .map_err(|e| format!("cannot write {}: {e}", tmp.display()))?;
    fs::rename(&tmp, path)
        .map_err(|e| format!("cannot replace {}: {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("meshparts-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_catalog_round_trip() {
        let path = temp_path("catalog-rt");
        let products: Vec<Product> = serde_json::from_str(
            r#"[{"name":"Widget","priceDisplay":"$20.00","price":20.0,"url":"https://example.com/w","externalId":"X1"}]"#,
        )
        .unwrap();

        save_catalog(&path, &products).unwrap();
        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].product_key(), "X1");
        assert_eq!(loaded[0].price, Some(20.0));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_catalog_is_an_error() {
        assert!(load_catalog(Path::new("/nonexistent/products.json")).is_err());
    }

    #[test]
    fn test_corrupt_catalog_is_an_error() {
        let path = temp_path("catalog-corrupt");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_catalog(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}
