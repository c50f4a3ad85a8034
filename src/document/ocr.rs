use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;

/// Single-pass optical character recognition over an image file.
///
/// Implementations are called from the blocking thread pool.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, image_path: &Path) -> Result<String>;
}

/// Extractor used when the crate is built without the `ocr` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableExtractor;

impl TextExtractor for UnavailableExtractor {
    fn extract_text(&self, _image_path: &Path) -> Result<String> {
        Err(anyhow!(
            "image text extraction is not available in this build (enable the `ocr` feature)"
        ))
    }
}

#[cfg(feature = "ocr")]
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    language: String,
}

#[cfg(feature = "ocr")]
impl TesseractExtractor {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

#[cfg(feature = "ocr")]
impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new("eng")
    }
}

#[cfg(feature = "ocr")]
impl TextExtractor for TesseractExtractor {
    fn extract_text(&self, image_path: &Path) -> Result<String> {
        let path = image_path
            .to_str()
            .ok_or_else(|| anyhow!("image path is not valid UTF-8: {}", image_path.display()))?;
        tesseract::ocr(path, &self.language).map_err(|e| anyhow!("tesseract failed: {}", e))
    }
}

pub fn default_extractor() -> Arc<dyn TextExtractor> {
    #[cfg(feature = "ocr")]
    {
        Arc::new(TesseractExtractor::default())
    }
    #[cfg(not(feature = "ocr"))]
    {
        Arc::new(UnavailableExtractor)
    }
}
