use std::path::Path;
use tokio::fs;

use crate::IngestError;
use crate::document::Document;

const SUPPORTED_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "xml", "html"];

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String, IngestError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        if !SUPPORTED_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()) {
            return Err(IngestError::UnsupportedFormat(extension.to_string()));
        }

        fs::read_to_string(path)
            .await
            .map_err(|source| IngestError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    pub async fn read_document(path: &Path) -> Result<Document, IngestError> {
        let text = Self::read_file(path).await?;
        Ok(Document::new(path.to_string_lossy(), text))
    }
}
