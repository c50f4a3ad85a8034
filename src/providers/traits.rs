use crate::error::ServiceFailure;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

pub type ServiceResult<T> = std::result::Result<T, ServiceFailure>;

/// Ordered text fragments of one model response.
pub type FragmentStream = BoxStream<'static, ServiceResult<String>>;

/// One chat-completion call: a system instruction plus the user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u16,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;

    async fn embed_query(&self, text: &str) -> ServiceResult<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceFailure::invalid_response("no embedding returned for query"))
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> ServiceResult<String>;

    /// Streams the response as it is produced. Providers without native streaming
    /// yield the whole completion as a single fragment.
    async fn complete_stream(&self, request: &CompletionRequest) -> ServiceResult<FragmentStream> {
        let text = self.complete(request).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }

    fn model_name(&self) -> &str;
}
