//! Catalog Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading a table the caller asked for by path
///
/// Brand tables are never loaded through this path: a missing or broken
/// brand file degrades to an empty table instead.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File could not be read
    #[error("Cannot read code table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not JSON
    #[error("Invalid code table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON that is neither a flat map nor a map under `codes`
    #[error("Code table {0} is not an object")]
    NotAnObject(PathBuf),
}
