pub mod openai;
pub mod retry;
pub mod traits;
pub mod utils;

pub use openai::OpenAIProvider;
pub use retry::RetryPolicy;
pub use traits::{CompletionProvider, CompletionRequest, EmbeddingProvider, FragmentStream, ServiceResult};
