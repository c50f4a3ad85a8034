use super::ocr::{default_extractor, TextExtractor};
use super::{RawTextUnit, SourceMetadata};
use crate::error::{RagError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Image,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(SourceFormat::Pdf),
            "png" | "jpg" | "jpeg" => Ok(SourceFormat::Image),
            _ => Err(RagError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Turns a PDF or an image into raw text units.
#[derive(Clone)]
pub struct DocumentLoader {
    ocr: Arc<dyn TextExtractor>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(default_extractor())
    }
}

impl DocumentLoader {
    pub fn new(ocr: Arc<dyn TextExtractor>) -> Self {
        Self { ocr }
    }

    pub async fn load(&self, source: &Path) -> Result<Vec<RawTextUnit>> {
        SourceFormat::from_path(source)?;
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| RagError::unreadable(source, e))?;
        self.load_from_bytes(source, bytes).await
    }

    /// Same as [`DocumentLoader::load`] for content the caller has already read.
    pub async fn load_from_bytes(&self, source: &Path, bytes: Vec<u8>) -> Result<Vec<RawTextUnit>> {
        let format = SourceFormat::from_path(source)?;
        let units = match format {
            SourceFormat::Pdf => load_pdf(source.to_path_buf(), bytes).await?,
            SourceFormat::Image => self.load_image(source.to_path_buf(), bytes).await?,
        };
        log::info!("Loaded {} text units from {}", units.len(), source.display());
        Ok(units)
    }

    async fn load_image(&self, path: PathBuf, bytes: Vec<u8>) -> Result<Vec<RawTextUnit>> {
        let decoded = image::load_from_memory(&bytes).map_err(|e| RagError::unreadable(&path, e))?;
        log::debug!(
            "Running OCR on {} ({}x{})",
            path.display(),
            decoded.width(),
            decoded.height()
        );
        drop(decoded);

        let ocr = Arc::clone(&self.ocr);
        let ocr_path = path.clone();
        let text = tokio::task::spawn_blocking(move || ocr.extract_text(&ocr_path))
            .await
            .map_err(|e| RagError::unreadable(&path, format!("OCR task failed: {}", e)))?
            .map_err(|e| RagError::unreadable(&path, e))?;

        let mut metadata = SourceMetadata::new();
        metadata.insert("source".to_string(), path.display().to_string());
        Ok(vec![RawTextUnit::new(text, metadata)])
    }
}

async fn load_pdf(path: PathBuf, bytes: Vec<u8>) -> Result<Vec<RawTextUnit>> {
    // The PDF decoder can panic on malformed input; the join error catches it.
    let pages = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .await
        .map_err(|e| RagError::unreadable(&path, format!("PDF decoder failed: {}", e)))?
        .map_err(|e| RagError::unreadable(&path, e))?;

    let total_pages = pages.len().to_string();
    let source = path.display().to_string();
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, content)| {
            let mut metadata = SourceMetadata::new();
            metadata.insert("source".to_string(), source.clone());
            metadata.insert("page".to_string(), page.to_string());
            metadata.insert("total_pages".to_string(), total_pages.clone());
            RawTextUnit::new(content, metadata)
        })
        .collect())
}
