pub mod chunk;
pub mod chunker;
pub mod document;
pub mod reader;
pub mod scope;

pub use chunk::Chunk;
pub use chunker::{
    Chunker, ParagraphSplitter, SectionSplitter, SentenceSplitter, SplitStrategy, WholeDocument,
    split,
};
pub use document::Document;
pub use reader::FileReader;
pub use scope::Scope;

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid scope '{0}' (expected one of: full, section, paragraph, sentence)")]
    InvalidScope(String),

    #[error("unsupported file format: '{0}'")]
    UnsupportedFormat(String),

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}
