use crate::database::{ScoredChunk, VectorIndex};
use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::providers::{EmbeddingProvider, RetryPolicy};
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 4;

/// Embeds a question and looks up its nearest chunks in a [`VectorIndex`].
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            retry: RetryPolicy::default(),
            k: DEFAULT_TOP_K,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn search(&self, index: &VectorIndex, query: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .search_scored(index, query, self.k)
            .await?
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }

    pub async fn search_scored(
        &self,
        index: &VectorIndex,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if index.manifest().embedding_model != self.embedder.model_name() {
            log::warn!(
                "Index was built with '{}' but queries use '{}'",
                index.manifest().embedding_model,
                self.embedder.model_name()
            );
        }

        let query_embedding = self
            .retry
            .execute("query embedding", || self.embedder.embed_query(query))
            .await
            .map_err(RagError::EmbeddingService)?;

        let results = index.search(&query_embedding, k)?;
        log::debug!(
            "Retrieved {} chunks (best score {:?})",
            results.len(),
            results.first().map(|r| r.score)
        );
        Ok(results)
    }
}
