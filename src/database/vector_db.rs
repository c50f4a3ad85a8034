use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::providers::{EmbeddingProvider, RetryPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub document_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    format_version: u32,
    manifest: IndexManifest,
    entries: Vec<IndexedChunk>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub batch_size: usize,
    pub document_fingerprint: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            document_fingerprint: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Exact cosine-similarity index over chunk embeddings, persisted as one JSON file.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexedChunk>,
    norms: Vec<f32>,
}

impl VectorIndex {
    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        embedding_model: &str,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::Index(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let entries: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();

        let manifest = IndexManifest {
            embedding_model: embedding_model.to_string(),
            dimension: entries.first().map(|e| e.embedding.len()).unwrap_or(0),
            chunk_count: entries.len(),
            document_fingerprint: None,
            created_at: Utc::now(),
        };
        Self::assemble(manifest, entries)
    }

    fn assemble(manifest: IndexManifest, entries: Vec<IndexedChunk>) -> Result<Self> {
        if entries.is_empty() {
            return Err(RagError::Index(
                "document contains no extractable text to index".to_string(),
            ));
        }
        if manifest.dimension == 0 {
            return Err(RagError::Index("embeddings have zero dimension".to_string()));
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != manifest.dimension) {
            return Err(RagError::Index(format!(
                "inconsistent embedding dimension: expected {}, found {}",
                manifest.dimension,
                bad.embedding.len()
            )));
        }
        let norms = entries.iter().map(|e| l2_norm(&e.embedding)).collect();
        Ok(Self {
            manifest,
            entries,
            norms,
        })
    }

    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.manifest.document_fingerprint = fingerprint;
        self
    }

    /// Embeds `chunks` batch by batch, in order, and builds the index in memory.
    pub async fn build(
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::Index(
                "document contains no extractable text to index".to_string(),
            ));
        }

        let batch_size = options.batch_size.max(1);
        let mut embeddings = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            log::debug!("Embedding batch {} ({} chunks)", batch_no + 1, texts.len());
            let vectors = options
                .retry
                .execute("embedding request", || embedder.embed(&texts))
                .await
                .map_err(RagError::EmbeddingService)?;
            if vectors.len() != texts.len() {
                return Err(RagError::EmbeddingService(
                    crate::error::ServiceFailure::invalid_response(format!(
                        "requested {} embeddings, received {}",
                        texts.len(),
                        vectors.len()
                    )),
                ));
            }
            embeddings.extend(vectors);
        }

        let index = Self::from_embeddings(chunks.to_vec(), embeddings, embedder.model_name())?
            .with_fingerprint(options.document_fingerprint.clone());
        log::info!(
            "Built vector index: {} chunks, dimension {}",
            index.len(),
            index.dimension()
        );
        Ok(index)
    }

    /// Returns the index persisted at `path` when there is one, ignoring `chunks`;
    /// otherwise embeds `chunks`, persists the new index to `path` and returns it.
    pub async fn build_or_load(
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
        path: &Path,
        options: &BuildOptions,
    ) -> Result<Self> {
        if Self::exists(path) {
            let index = Self::load(path).await?;
            log::info!(
                "Reusing persisted index at {} ({} chunks); {} new chunks not embedded",
                path.display(),
                index.len(),
                chunks.len()
            );
            return Ok(index);
        }

        let index = Self::build(chunks, embedder, options).await?;
        index.save(path).await?;
        Ok(index)
    }

    pub fn exists(path: &Path) -> bool {
        path.join(INDEX_FILE).is_file()
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let file = path.join(INDEX_FILE);
        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|e| RagError::Index(format!("cannot read {}: {}", file.display(), e)))?;
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)?;
        if persisted.format_version != FORMAT_VERSION {
            return Err(RagError::Index(format!(
                "unsupported index format version {} in {}",
                persisted.format_version,
                file.display()
            )));
        }
        Self::assemble(persisted.manifest, persisted.entries)
    }

    /// Writes the index through a temporary file so a crash never leaves a torn store.
    pub async fn save(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        let persisted = PersistedIndex {
            format_version: FORMAT_VERSION,
            manifest: self.manifest.clone(),
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec(&persisted)?;
        let tmp = path.join(format!("{}.tmp", INDEX_FILE));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path.join(INDEX_FILE)).await?;
        log::info!("Saved vector index to {}", path.display());
        Ok(())
    }

    /// Removes the persisted store. Returns whether anything was deleted.
    pub async fn delete(path: &Path) -> Result<bool> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                log::info!("Deleted persisted index at {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// The store at `path`, or `None` when no store exists.
    pub async fn load_existing(path: &Path) -> Result<Option<Self>> {
        if !Self::exists(path) {
            return Ok(None);
        }
        Self::load(path).await.map(Some)
    }

    /// Top `k` chunks by cosine similarity, best first. Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dimension() {
            return Err(RagError::Index(format!(
                "query embedding has dimension {}, index expects {}",
                query.len(),
                self.dimension()
            )));
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (entry, norm))| (i, cosine(query, query_norm, &entry.embedding, *norm)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}
