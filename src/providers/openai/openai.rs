use crate::config::AppConfig;
use crate::error::ServiceFailure;
use crate::providers::traits::{
    CompletionProvider, CompletionRequest, EmbeddingProvider, FragmentStream, ServiceResult,
};
use crate::providers::utils::classify_openai_error;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, EmbeddingInput,
    },
    Client,
};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use futures::StreamExt;
use std::time::Duration;

/// OpenAI-compatible endpoint serving both chat completions and embeddings.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, api_base: &str, chat_model: &str, embedding_model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Self {
            client: Client::with_config(config).with_backoff(no_client_retries()),
            chat_model: chat_model.to_string(),
            embedding_model: embedding_model.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.api_key,
            &config.api_base,
            &config.model_name,
            &config.embedding_model,
        )
    }

    fn chat_request(&self, request: &CompletionRequest) -> ServiceResult<CreateChatCompletionRequest> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(classify_openai_error)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.clone())
                .build()
                .map_err(classify_openai_error)?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(classify_openai_error)
    }
}

/// Retries belong to `RetryPolicy`; the client reports a rate limit on the first 429.
fn no_client_retries() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()
            .map_err(classify_openai_error)?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(classify_openai_error)?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(ServiceFailure::invalid_response(format!(
                "requested {} embeddings, received {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|embedding| embedding.index);
        Ok(data.into_iter().map(|embedding| embedding.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, request: &CompletionRequest) -> ServiceResult<String> {
        let chat_request = self.chat_request(request)?;
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(classify_openai_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceFailure::invalid_response("No response content"))
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> ServiceResult<FragmentStream> {
        let chat_request = self.chat_request(request)?;
        let stream = self
            .client
            .chat()
            .create_stream(chat_request)
            .await
            .map_err(classify_openai_error)?;

        Ok(stream
            .filter_map(|item| async move {
                match item {
                    Ok(response) => response
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content)
                        .filter(|content| !content.is_empty())
                        .map(Ok),
                    Err(e) => Some(Err(classify_openai_error(e))),
                }
            })
            .boxed())
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}
