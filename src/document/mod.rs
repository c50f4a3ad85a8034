mod chunker;
mod loader;
mod ocr;

pub use chunker::{TextChunker, DEFAULT_SEPARATORS};
pub use loader::{DocumentLoader, SourceFormat};
pub use ocr::{default_extractor, TextExtractor, UnavailableExtractor};
#[cfg(feature = "ocr")]
pub use ocr::TesseractExtractor;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type SourceMetadata = BTreeMap<String, String>;

/// Text of one PDF page or one OCR'd image.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextUnit {
    pub content: String,
    pub source_metadata: SourceMetadata,
}

impl RawTextUnit {
    pub fn new(content: impl Into<String>, source_metadata: SourceMetadata) -> Self {
        Self {
            content: content.into(),
            source_metadata,
        }
    }
}

/// A bounded, contiguous slice of one [`RawTextUnit`]; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_metadata: SourceMetadata,
    pub chunk_index: usize,
}

impl Chunk {
    pub fn page(&self) -> Option<&str> {
        self.source_metadata.get("page").map(String::as_str)
    }
}
