pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod providers;
pub mod session;

// Re-export commonly used items
pub use config::AppConfig;
pub use error::{ErrorKind, RagError};
pub use llm::AnswerResult;
pub use session::{RagSession, SessionBuilder, NO_DOCUMENT_MESSAGE};
