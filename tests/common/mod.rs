//! Shared fakes and fixtures for the pipeline integration tests.
//!
//! The fake providers are deterministic so retrieval order and answers can be
//! asserted without a network.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rag_assistant::config::{IndexConfig, IndexReusePolicy};
use rag_assistant::document::{DocumentLoader, TextExtractor};
use rag_assistant::error::ServiceFailure;
use rag_assistant::providers::{
    CompletionProvider, CompletionRequest, EmbeddingProvider, FragmentStream, RetryPolicy,
    ServiceResult,
};
use rag_assistant::{RagSession, SessionBuilder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const DIMENSION: usize = 64;

/// Hashed bag-of-words vectors: identical texts embed identically and shared
/// words raise cosine similarity.
pub struct BagOfWordsEmbedder {
    pub calls: AtomicUsize,
    name: String,
    reachable_calls: Option<usize>,
}

impl Default for BagOfWordsEmbedder {
    fn default() -> Self {
        Self::named("bag-of-words")
    }
}

impl BagOfWordsEmbedder {
    pub fn named(name: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            name: name.to_string(),
            reachable_calls: None,
        }
    }

    /// Answers the first `calls` requests, then behaves like an unreachable endpoint.
    pub fn reachable_for(calls: usize) -> Self {
        Self {
            reachable_calls: Some(calls),
            ..Self::default()
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % DIMENSION] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reachable_calls.is_some_and(|limit| call >= limit) {
            return Err(ServiceFailure::connectivity("error sending request: connection refused"));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Refuses every connection, like an unreachable endpoint.
pub struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    async fn embed(&self, _texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
        Err(ServiceFailure::connectivity("error sending request: connection refused"))
    }

    fn model_name(&self) -> &str {
        "unreachable"
    }
}

/// Echoes the question and the context it was given, streamed word by word.
#[derive(Default)]
pub struct EchoCompletion {
    pub calls: AtomicUsize,
}

impl EchoCompletion {
    pub fn reply(request: &CompletionRequest) -> String {
        let context = request
            .system
            .split("----------------\n")
            .nth(1)
            .unwrap_or_default();
        format!("Question: {} Context: {}", request.prompt, context)
    }
}

#[async_trait]
impl CompletionProvider for EchoCompletion {
    async fn complete(&self, request: &CompletionRequest) -> ServiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::reply(request))
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> ServiceResult<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fragments: Vec<ServiceResult<String>> = Self::reply(request)
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// Streams a few fragments, then the connection drops.
pub struct DroppingCompletion;

#[async_trait]
impl CompletionProvider for DroppingCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> ServiceResult<String> {
        Err(ServiceFailure::connectivity("connection reset by peer"))
    }

    async fn complete_stream(&self, _request: &CompletionRequest) -> ServiceResult<FragmentStream> {
        Ok(stream::iter(vec![
            Ok("The zoo ".to_string()),
            Ok("keeps ".to_string()),
            Err(ServiceFailure::connectivity("connection reset by peer")),
            Ok("three elephants.".to_string()),
        ])
        .boxed())
    }

    fn model_name(&self) -> &str {
        "dropping"
    }
}

/// OCR stand-in: returns the contents of the `.txt` file next to the image.
pub struct SidecarText;

impl TextExtractor for SidecarText {
    fn extract_text(&self, image_path: &Path) -> anyhow::Result<String> {
        Ok(std::fs::read_to_string(image_path.with_extension("txt"))?)
    }
}

/// Writes a PNG whose OCR text is `text`. `size` varies the image bytes.
pub fn write_image_document(dir: &Path, name: &str, size: u32, text: &str) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::new(size, size)
        .save(&path)
        .expect("Failed to write test image");
    std::fs::write(path.with_extension("txt"), text).expect("Failed to write OCR sidecar");
    path
}

pub struct TestEnv {
    pub dir: TempDir,
    pub embedder: Arc<BagOfWordsEmbedder>,
    pub completion: Arc<EchoCompletion>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
            embedder: Arc::new(BagOfWordsEmbedder::default()),
            completion: Arc::new(EchoCompletion::default()),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.path().join("faiss_index")
    }

    pub fn session(&self, policy: IndexReusePolicy) -> RagSession {
        self.builder(self.embedder.clone(), policy)
            .build()
            .expect("Failed to build session")
    }

    pub fn builder(
        &self,
        embedder: Arc<dyn EmbeddingProvider>,
        policy: IndexReusePolicy,
    ) -> SessionBuilder {
        self.builder_with(embedder, self.completion.clone(), policy)
    }

    pub fn builder_with(
        &self,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        policy: IndexReusePolicy,
    ) -> SessionBuilder {
        SessionBuilder::new(embedder, completion)
            .loader(DocumentLoader::new(Arc::new(SidecarText)))
            .index(IndexConfig {
                path: self.index_path(),
                reuse_policy: policy,
                ..IndexConfig::default()
            })
            .retry(
                RetryPolicy::new(0, Duration::from_secs(5))
                    .with_backoff(Duration::from_millis(1), Duration::from_millis(1)),
            )
    }
}
