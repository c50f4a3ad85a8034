use crate::config::{AppConfig, ChunkingConfig, GenerationSettings, IndexConfig, IndexReusePolicy};
use crate::database::{document_fingerprint, BuildOptions, VectorIndex};
use crate::document::{DocumentLoader, SourceFormat, TextChunker};
use crate::error::{RagError, Result};
use crate::llm::{AnswerGenerator, AnswerResult, AnswerStream, Retriever};
use crate::providers::{CompletionProvider, EmbeddingProvider, OpenAIProvider, RetryPolicy};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::Path;
use std::sync::Arc;

pub const NO_DOCUMENT_MESSAGE: &str = "Please upload and process a document first.";
pub const WELCOME_MESSAGE: &str =
    "Welcome to the AI Document Assistant! Upload a PDF or an image to get started.";

/// The document whose index answers questions in this session.
#[derive(Debug, Clone)]
pub struct ActiveDocument {
    pub name: String,
    pub index: Arc<VectorIndex>,
}

/// What happened while processing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedDocument {
    pub name: String,
    pub text_units: usize,
    pub chunks: usize,
    pub indexed_chunks: usize,
    pub reused_index: bool,
}

impl ProcessedDocument {
    pub fn confirmation(&self) -> String {
        format!(
            "I've processed *{}*. You can now ask questions about it!",
            self.name
        )
    }
}

pub struct SessionBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    loader: DocumentLoader,
    chunking: ChunkingConfig,
    generation: GenerationSettings,
    index: IndexConfig,
    retry: Option<RetryPolicy>,
}

impl SessionBuilder {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            embedder,
            completion,
            loader: DocumentLoader::default(),
            chunking: ChunkingConfig::default(),
            generation: GenerationSettings::default(),
            index: IndexConfig::default(),
            retry: None,
        }
    }

    pub fn loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    pub fn index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    /// Overrides the retry/timeout policy for every remote call the session makes.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> Result<RagSession> {
        let chunker = TextChunker::from_config(&self.chunking)?;
        let retry = self.retry.unwrap_or_else(|| {
            RetryPolicy::new(self.generation.max_retries, self.generation.request_timeout)
        });
        let retriever = Retriever::new(Arc::clone(&self.embedder))
            .with_k(self.index.top_k)
            .with_retry(retry.clone());
        let generator =
            AnswerGenerator::new(self.completion, self.generation).with_retry(retry.clone());

        Ok(RagSession {
            loader: self.loader,
            chunker,
            embedder: self.embedder,
            retriever,
            generator,
            index_config: self.index,
            retry,
            active: None,
        })
    }
}

/// Explicit per-user session state: the active index and the pipeline around it.
///
/// Processing takes `&mut self`, so one session never runs two index builds at once.
/// Sessions sharing an index path must still be serialised by the caller.
pub struct RagSession {
    loader: DocumentLoader,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Retriever,
    generator: AnswerGenerator,
    index_config: IndexConfig,
    retry: RetryPolicy,
    active: Option<ActiveDocument>,
}

impl RagSession {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = Arc::new(OpenAIProvider::from_config(config));
        SessionBuilder::new(provider.clone(), provider)
            .chunking(config.chunking.clone())
            .generation(config.generation.clone())
            .index(config.index.clone())
            .build()
    }

    pub fn active_document(&self) -> Option<&ActiveDocument> {
        self.active.as_ref()
    }

    pub fn index_path(&self) -> &Path {
        &self.index_config.path
    }

    /// Load → chunk → index. On success the document becomes the active one.
    pub async fn process_document(&mut self, source: &Path) -> Result<ProcessedDocument> {
        SourceFormat::from_path(source)?;
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| RagError::unreadable(source, e))?;
        let fingerprint = document_fingerprint(&bytes);

        let units = self.loader.load_from_bytes(source, bytes).await?;
        let chunks = self.chunker.split(&units);

        let path = self.index_config.path.clone();
        let options = BuildOptions {
            batch_size: self.index_config.embedding_batch_size,
            document_fingerprint: Some(fingerprint),
            retry: self.retry.clone(),
        };
        let (index, reused_index) = match self.index_config.reuse_policy {
            IndexReusePolicy::Always => {
                let reused = VectorIndex::exists(&path);
                let index =
                    VectorIndex::build_or_load(&chunks, self.embedder.as_ref(), &path, &options).await?;
                (index, reused)
            }
            IndexReusePolicy::Fingerprint => match self.matching_index(&path, &options).await? {
                Some(index) => (index, true),
                None => {
                    let index =
                        VectorIndex::build_or_load(&chunks, self.embedder.as_ref(), &path, &options)
                            .await?;
                    (index, false)
                }
            },
        };

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        let processed = ProcessedDocument {
            name: name.clone(),
            text_units: units.len(),
            chunks: chunks.len(),
            indexed_chunks: index.len(),
            reused_index,
        };
        log::info!(
            "Processed '{}': {} units, {} chunks, index {} ({} chunks)",
            name,
            processed.text_units,
            processed.chunks,
            if reused_index { "reused" } else { "built" },
            processed.indexed_chunks
        );

        self.active = Some(ActiveDocument {
            name,
            index: Arc::new(index),
        });
        Ok(processed)
    }

    /// Returns the persisted index when it was built from the same document bytes with the
    /// current embedding model; any other store at `path` is deleted.
    async fn matching_index(&self, path: &Path, options: &BuildOptions) -> Result<Option<VectorIndex>> {
        let existing = match VectorIndex::load_existing(path).await {
            Ok(existing) => existing,
            Err(e) => {
                log::warn!("Persisted index at {} is unusable: {}", path.display(), e);
                VectorIndex::delete(path).await?;
                return Ok(None);
            }
        };
        let Some(index) = existing else {
            return Ok(None);
        };

        let manifest = index.manifest();
        if manifest.document_fingerprint != options.document_fingerprint {
            log::info!("Persisted index belongs to another document; rebuilding");
        } else if manifest.embedding_model != self.embedder.model_name() {
            log::info!(
                "Persisted index was embedded with '{}', now using '{}'; rebuilding",
                manifest.embedding_model,
                self.embedder.model_name()
            );
        } else {
            log::info!(
                "Reusing persisted index at {} ({} chunks)",
                path.display(),
                index.len()
            );
            return Ok(Some(index));
        }
        VectorIndex::delete(path).await?;
        Ok(None)
    }

    /// Deletes the persisted index and forgets the active document.
    pub async fn reset_index(&mut self) -> Result<bool> {
        self.active = None;
        VectorIndex::delete(&self.index_config.path).await
    }

    pub async fn ask(&self, query: &str) -> Result<AnswerResult> {
        let Some(active) = &self.active else {
            return Ok(AnswerResult {
                text: NO_DOCUMENT_MESSAGE.to_string(),
            });
        };
        let chunks = self.retriever.search(&active.index, query).await?;
        self.generator.answer(&chunks, query).await
    }

    /// Lazily retrieves and streams an answer. Nothing happens until the stream is polled.
    pub fn ask_stream(&self, query: &str) -> AnswerStream {
        let Some(active) = &self.active else {
            return stream::once(future::ready(Ok(NO_DOCUMENT_MESSAGE.to_string()))).boxed();
        };

        let retriever = self.retriever.clone();
        let generator = self.generator.clone();
        let index = Arc::clone(&active.index);
        let query = query.to_string();

        stream::once(async move {
            let chunks = retriever.search(&index, &query).await?;
            generator.answer_stream(&chunks, &query).await
        })
        .flat_map(|opened| match opened {
            Ok(fragments) => fragments,
            Err(e) => stream::once(future::ready(Err(e))).boxed(),
        })
        .boxed()
    }

    /// Streaming entry point: errors become a final rendered fragment and end the stream.
    pub fn run_stream(&self, query: &str) -> BoxStream<'static, String> {
        self.ask_stream(query)
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                future::ready(Some(match item {
                    Ok(fragment) => fragment,
                    Err(e) => {
                        *failed = true;
                        log::error!("Streaming answer failed: {}", e);
                        e.render()
                    }
                }))
            })
            .boxed()
    }

    /// One-shot entry point. Never fails: errors are rendered into the answer text.
    pub async fn run(&mut self, source: &Path, query: &str) -> AnswerResult {
        let outcome = match self.process_document(source).await {
            Ok(_) => self.ask(query).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| {
            log::error!("Pipeline failed: {}", e);
            AnswerResult { text: e.render() }
        })
    }
}
