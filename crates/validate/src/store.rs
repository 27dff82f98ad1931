//! JSON persistence for results and plain-text persistence for reports.
//!
//! A failed save never touches the in-memory result; callers may retry or
//! fall back to printing it.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::result::ValidationResult;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

async fn write_text(path: &Path, contents: &str) -> Result<(), PersistenceError> {
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    fs::write(path, contents).await.map_err(write_err)
}

pub async fn save_result(result: &ValidationResult, path: &Path) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(result).map_err(PersistenceError::Encode)?;
    write_text(path, &json).await?;
    info!(path = %path.display(), "Validation result saved");
    Ok(())
}

pub async fn load_result(path: &Path) -> Result<ValidationResult, PersistenceError> {
    let json = fs::read_to_string(path)
        .await
        .map_err(|source| PersistenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&json).map_err(|source| PersistenceError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn save_report(report: &str, path: &Path) -> Result<(), PersistenceError> {
    write_text(path, report).await?;
    info!(path = %path.display(), "Report saved");
    Ok(())
}

/// `docs/guide.md` -> `docs/guide_validation.json`.
pub fn default_result_path(document: &Path) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    document.with_file_name(format!("{stem}_validation.json"))
}
