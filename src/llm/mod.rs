pub mod chat;
pub mod semantic_search;

pub use chat::{AnswerGenerator, AnswerResult, AnswerStream};
pub use semantic_search::{Retriever, DEFAULT_TOP_K};
