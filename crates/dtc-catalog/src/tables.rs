//! Code table loading
//!
//! A table file is JSON, either a flat `{"P1234": "description"}` map or
//! the same map nested under a `codes` key. Brand tables live in one
//! directory as `<brand key>.json`.

use crate::brand::BrandKey;
use crate::error::CatalogError;
use obd_protocol::CodeTable;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn table_from_json(value: Value) -> Option<CodeTable> {
    let Value::Object(mut root) = value else {
        return None;
    };

    let entries = match root.remove("codes") {
        Some(Value::Object(codes)) => codes,
        Some(other) => {
            root.insert("codes".to_string(), other);
            root
        }
        None => root,
    };

    Some(
        entries
            .into_iter()
            .map(|(code, desc)| {
                let desc = match desc {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (code, desc)
            })
            .collect(),
    )
}

/// Load one table file
pub fn load_table_file(path: &Path) -> Result<CodeTable, CatalogError> {
    let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&text).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    table_from_json(value).ok_or_else(|| CatalogError::NotAnObject(path.to_path_buf()))
}

/// Built-in generic descriptions, extended by an optional file
pub fn load_generic_table(extra: Option<&Path>) -> Result<CodeTable, CatalogError> {
    let mut table = CodeTable::generic();
    if let Some(path) = extra {
        let loaded = load_table_file(path)?;
        info!("Loaded {} generic descriptions from {}", loaded.len(), path.display());
        table.merge(loaded);
    }
    Ok(table)
}

/// Brand tables, loaded on first use and kept for the session
#[derive(Debug, Default)]
pub struct BrandTables {
    dir: PathBuf,
    loaded: HashMap<BrandKey, CodeTable>,
}

impl BrandTables {
    /// Tables read from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: HashMap::new(),
        }
    }

    /// Install a table directly instead of reading it from disk
    pub fn insert(&mut self, brand: &str, table: CodeTable) {
        self.loaded.insert(BrandKey::new(brand), table);
    }

    /// Table directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The brand's table; empty if it has no usable file
    pub fn table(&mut self, key: &BrandKey) -> &CodeTable {
        let dir = &self.dir;
        self.loaded
            .entry(key.clone())
            .or_insert_with(|| Self::read_brand(dir, key))
    }

    fn read_brand(dir: &Path, key: &BrandKey) -> CodeTable {
        if key.is_empty() {
            return CodeTable::new();
        }

        let path = dir.join(format!("{}.json", key));
        if !path.exists() {
            debug!("No code table for brand {}", key);
            return CodeTable::new();
        }

        match load_table_file(&path) {
            Ok(table) => {
                info!("Loaded {} codes for brand {}", table.len(), key);
                table
            }
            Err(e) => {
                warn!("Ignoring code table for {}: {}", key, e);
                CodeTable::new()
            }
        }
    }

    /// Brands with a table file, display-cased and sorted
    pub fn available_brands(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut brands: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                Some(BrandKey::new(stem).display_name())
            })
            .collect();
        brands.sort();
        brands.dedup();
        brands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn brand_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("volkswagen.json"),
            r#"{"codes": {"P1296": "Cooling system malfunction", "P1602": "Power supply low voltage"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("bmw.json"),
            r#"{"P1083": "Fuel control mixture lean", "P1188": 42}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        dir
    }

    #[test]
    fn test_nested_and_flat_layouts() {
        let dir = brand_dir();
        let mut tables = BrandTables::new(dir.path());

        let vw = tables.table(&BrandKey::new("Volkswagen"));
        assert_eq!(vw.len(), 2);
        assert_eq!(vw.get("P1296"), Some("Cooling system malfunction"));

        let bmw = tables.table(&BrandKey::new("bmw"));
        assert_eq!(bmw.get("P1083"), Some("Fuel control mixture lean"));
        assert_eq!(bmw.get("P1188"), Some("42"));
    }

    #[test]
    fn test_missing_or_broken_brand_is_empty() {
        let dir = brand_dir();
        let mut tables = BrandTables::new(dir.path());
        assert!(tables.table(&BrandKey::new("Lada")).is_empty());
        assert!(tables.table(&BrandKey::new("broken")).is_empty());
        assert!(tables.table(&BrandKey::new("")).is_empty());
    }

    #[test]
    fn test_brand_cannot_leave_table_dir() {
        let root = tempfile::tempdir().unwrap();
        let tables_dir = root.path().join("tables");
        fs::create_dir(&tables_dir).unwrap();
        fs::write(root.path().join("secret.json"), r#"{"P1000": "outside"}"#).unwrap();

        let mut tables = BrandTables::new(tables_dir.clone());
        assert!(tables.table(&BrandKey::new("../secret")).is_empty());
    }

    #[test]
    fn test_table_cached_after_first_load() {
        let dir = brand_dir();
        let mut tables = BrandTables::new(dir.path());
        assert_eq!(tables.table(&BrandKey::new("bmw")).len(), 2);
        fs::remove_file(dir.path().join("bmw.json")).unwrap();
        assert_eq!(tables.table(&BrandKey::new("BMW")).len(), 2);
    }

    #[test]
    fn test_available_brands() {
        let dir = brand_dir();
        let tables = BrandTables::new(dir.path());
        assert_eq!(tables.available_brands(), vec!["Bmw", "Broken", "Volkswagen"]);
        assert!(BrandTables::new("/nonexistent/tables").available_brands().is_empty());
    }

    #[test]
    fn test_generic_table_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generic.json");
        fs::write(&path, r#"{"P0301": "Misfire, cylinder 1", "P2096": "Post catalyst too lean"}"#)
            .unwrap();

        let table = load_generic_table(Some(&path)).unwrap();
        assert_eq!(table.get("P0301"), Some("Misfire, cylinder 1"));
        assert_eq!(table.get("P2096"), Some("Post catalyst too lean"));
        assert!(table.get("P0420").is_some());
    }

    #[test]
    fn test_explicit_file_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_table_file(&dir.path().join("missing.json")),
            Err(CatalogError::Io { .. })
        ));

        let list = dir.path().join("list.json");
        fs::write(&list, "[1, 2]").unwrap();
        assert!(matches!(load_table_file(&list), Err(CatalogError::NotAnObject(_))));
    }
}
