use crate::config::GenerationSettings;
use crate::document::Chunk;
use crate::error::{RagError, Result, ServiceFailure};
use crate::providers::{CompletionProvider, CompletionRequest, FragmentStream, RetryPolicy};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub text: String,
}

/// Answer fragments in the order the model produced them.
pub type AnswerStream = BoxStream<'static, Result<String>>;

/// Stuffs retrieved chunks into a prompt and asks the language model.
#[derive(Clone)]
pub struct AnswerGenerator {
    provider: Arc<dyn CompletionProvider>,
    settings: GenerationSettings,
    retry: RetryPolicy,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: GenerationSettings) -> Self {
        let retry = RetryPolicy::new(settings.max_retries, settings.request_timeout);
        Self {
            provider,
            settings,
            retry,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn compose_request(&self, chunks: &[Chunk], query: &str) -> CompletionRequest {
        let context = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        CompletionRequest {
            system: format!("{}{}", SYSTEM_TEMPLATE, context),
            prompt: query.to_string(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }

    pub async fn answer(&self, chunks: &[Chunk], query: &str) -> Result<AnswerResult> {
        let request = self.compose_request(chunks, query);
        log::debug!(
            "Asking {} with {} context chunks ({} prompt chars)",
            self.provider.model_name(),
            chunks.len(),
            request.system.len() + request.prompt.len()
        );

        let text = self
            .retry
            .execute("chat completion", || self.provider.complete(&request))
            .await
            .map_err(RagError::GenerationService)?;
        Ok(AnswerResult { text })
    }

    /// Opens a streamed completion. Retries cover opening the stream only; a failure
    /// after fragments have been forwarded ends the stream with that error.
    ///
    /// Each fragment must arrive within the request timeout, so a stalled connection
    /// ends the stream with a timeout instead of hanging.
    pub async fn answer_stream(&self, chunks: &[Chunk], query: &str) -> Result<AnswerStream> {
        let request = self.compose_request(chunks, query);
        let fragments = self
            .retry
            .execute("chat completion stream", || self.provider.complete_stream(&request))
            .await
            .map_err(RagError::GenerationService)?;

        Ok(with_fragment_deadline(fragments, self.retry.request_timeout())
            .map(|fragment| fragment.map_err(RagError::GenerationService))
            .boxed())
    }
}

fn with_fragment_deadline(fragments: FragmentStream, deadline: Duration) -> FragmentStream {
    stream::unfold(Some(fragments), move |state| async move {
        let mut fragments = state?;
        match tokio::time::timeout(deadline, fragments.next()).await {
            Ok(Some(Ok(fragment))) => Some((Ok(fragment), Some(fragments))),
            Ok(Some(Err(failure))) => Some((Err(failure), None)),
            Ok(None) => None,
            Err(_) => Some((
                Err(ServiceFailure::timeout(format!(
                    "no response fragment within {}s",
                    deadline.as_secs_f32()
                ))),
                None,
            )),
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceMetadata;
    use crate::error::{ErrorKind, FailureKind};
    use crate::providers::ServiceResult;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        seen: Mutex<Vec<CompletionRequest>>,
        failures_left: Mutex<u32>,
        failure: FailureKind,
    }

    impl Recorder {
        fn new(failures: u32, failure: FailureKind) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                failures_left: Mutex::new(failures),
                failure,
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for Recorder {
        async fn complete(&self, request: &CompletionRequest) -> ServiceResult<String> {
            self.seen.lock().unwrap().push(request.clone());
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(ServiceFailure::new(self.failure, "simulated"));
            }
            Ok(format!("answer to: {}", request.prompt))
        }

        async fn complete_stream(&self, request: &CompletionRequest) -> ServiceResult<FragmentStream> {
            let text = self.complete(request).await?;
            let parts: Vec<ServiceResult<String>> = text
                .split_inclusive(' ')
                .map(|p| Ok(p.to_string()))
                .collect();
            Ok(stream::iter(parts).boxed())
        }

        fn model_name(&self) -> &str {
            "recorder"
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            content: text.to_string(),
            source_metadata: SourceMetadata::new(),
            chunk_index: 0,
        }
    }

    fn generator(provider: Arc<Recorder>) -> AnswerGenerator {
        AnswerGenerator::new(provider, GenerationSettings::default())
            .with_retry(RetryPolicy::new(2, Duration::from_secs(5)).with_backoff(
                Duration::from_millis(1),
                Duration::from_millis(2),
            ))
    }

    #[test]
    fn test_prompt_contains_context_and_settings() {
        let gen = AnswerGenerator::new(Arc::new(Recorder::new(0, FailureKind::Api)), GenerationSettings::default());
        let request = gen.compose_request(&[chunk("first context"), chunk("second context")], "What is it?");
        assert!(request.system.contains("first context\n\nsecond context"));
        assert!(request.system.contains("don't know"));
        assert_eq!(request.prompt, "What is it?");
        assert_eq!(request.temperature, 1.3);
        assert_eq!(request.max_tokens, 500);
    }

    #[tokio::test]
    async fn test_answer_returns_text_verbatim() {
        let provider = Arc::new(Recorder::new(0, FailureKind::Api));
        let result = generator(provider.clone()).answer(&[chunk("ctx")], "goal?").await.unwrap();
        assert_eq!(result.text, "answer to: goal?");
        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_use_retry_budget() {
        let provider = Arc::new(Recorder::new(2, FailureKind::Server));
        let result = generator(provider.clone()).answer(&[], "q").await.unwrap();
        assert_eq!(result.text, "answer to: q");
        assert_eq!(provider.seen.lock().unwrap().len(), 3);

        let provider = Arc::new(Recorder::new(3, FailureKind::Connectivity));
        let err = generator(provider.clone()).answer(&[], "q").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationService);
        assert!(err.is_connectivity());
        assert_eq!(provider.seen.lock().unwrap().len(), 3);
    }

    /// Streams its fragments, then either stalls or fails.
    struct Stalling {
        fragments: Vec<&'static str>,
        then_fail: bool,
    }

    #[async_trait]
    impl CompletionProvider for Stalling {
        async fn complete(&self, _request: &CompletionRequest) -> ServiceResult<String> {
            Ok(self.fragments.concat())
        }

        async fn complete_stream(&self, _request: &CompletionRequest) -> ServiceResult<FragmentStream> {
            let head = stream::iter(
                self.fragments
                    .iter()
                    .map(|f| Ok(f.to_string()))
                    .collect::<Vec<ServiceResult<String>>>(),
            );
            if self.then_fail {
                let tail = stream::iter(vec![
                    Err(ServiceFailure::connectivity("connection reset")),
                    Ok("never seen".to_string()),
                ]);
                Ok(head.chain(tail).boxed())
            } else {
                Ok(head.chain(stream::pending()).boxed())
            }
        }

        fn model_name(&self) -> &str {
            "stalling"
        }
    }

    #[tokio::test]
    async fn test_stalled_stream_ends_with_timeout() {
        let provider = Arc::new(Stalling {
            fragments: vec!["The ", "answer "],
            then_fail: false,
        });
        let gen = AnswerGenerator::new(provider, GenerationSettings::default())
            .with_retry(RetryPolicy::new(0, Duration::from_millis(50)));

        let items: Vec<Result<String>> = gen.answer_stream(&[], "q").await.unwrap().collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), "The ");
        assert_eq!(items[1].as_ref().unwrap(), "answer ");
        let err = items[2].as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationService);
        assert_eq!(err.service_failure().map(|f| f.kind), Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_stream_stops_after_first_failure() {
        let provider = Arc::new(Stalling {
            fragments: vec!["partial"],
            then_fail: true,
        });
        let gen = AnswerGenerator::new(provider, GenerationSettings::default())
            .with_retry(RetryPolicy::new(0, Duration::from_secs(5)));

        let items: Vec<Result<String>> = gen.answer_stream(&[], "q").await.unwrap().collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[1].as_ref().unwrap_err().is_connectivity());
    }

    #[tokio::test]
    async fn test_stream_matches_one_shot() {
        let provider = Arc::new(Recorder::new(0, FailureKind::Api));
        let gen = generator(provider);
        let one_shot = gen.answer(&[chunk("ctx")], "how does it work").await.unwrap();
        let fragments: Vec<String> = gen
            .answer_stream(&[chunk("ctx")], "how does it work")
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert!(fragments.len() > 1);
        assert_eq!(fragments.concat(), one_shot.text);
    }
}
