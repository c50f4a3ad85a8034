use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub const TROUBLESHOOTING_TIPS: &str = "Troubleshooting tips:\n\
1. Check your internet connection\n\
2. Verify your OpenAI API key is valid\n\
3. Check if the API endpoint URL (OPENAI_API_BASE) is correct\n\
4. If using a proxy, check proxy settings";

/// How a remote service call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connectivity,
    Timeout,
    Authentication,
    RateLimited,
    Server,
    InvalidResponse,
    Api,
}

impl FailureKind {
    /// Failures worth another attempt under the retry budget.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Connectivity
                | FailureKind::Timeout
                | FailureKind::RateLimited
                | FailureKind::Server
        )
    }

    /// Failures the user can usually fix on their side (network, key, endpoint, proxy).
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            FailureKind::Connectivity | FailureKind::Timeout | FailureKind::Authentication
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Connectivity => "connection failed",
            FailureKind::Timeout => "request timed out",
            FailureKind::Authentication => "authentication failed",
            FailureKind::RateLimited => "rate limited",
            FailureKind::Server => "server error",
            FailureKind::InvalidResponse => "invalid response",
            FailureKind::Api => "API error",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct ServiceFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ServiceFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connectivity, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidResponse, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Flat discriminant of [`RagError`] so callers can branch without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    UnsupportedFormat,
    UnreadableSource,
    EmbeddingService,
    GenerationService,
    Index,
}

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Unsupported file format '{extension}' for {path}: expected pdf, png, jpg or jpeg")]
    UnsupportedFormat { path: PathBuf, extension: String },
    #[error("Could not read {path}: {reason}")]
    UnreadableSource { path: PathBuf, reason: String },
    #[error("Embedding service error: {0}")]
    EmbeddingService(ServiceFailure),
    #[error("Generation service error: {0}")]
    GenerationService(ServiceFailure),
    #[error("Vector index error: {0}")]
    Index(String),
}

pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        RagError::UnreadableSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Configuration(_) => ErrorKind::Configuration,
            RagError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            RagError::UnreadableSource { .. } => ErrorKind::UnreadableSource,
            RagError::EmbeddingService(_) => ErrorKind::EmbeddingService,
            RagError::GenerationService(_) => ErrorKind::GenerationService,
            RagError::Index(_) => ErrorKind::Index,
        }
    }

    pub fn service_failure(&self) -> Option<&ServiceFailure> {
        match self {
            RagError::EmbeddingService(failure) | RagError::GenerationService(failure) => {
                Some(failure)
            }
            _ => None,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        self.service_failure()
            .map(|failure| failure.kind.is_connectivity())
            .unwrap_or(false)
    }

    /// Short hint telling the user what to do about this error, if there is one.
    pub fn remediation(&self) -> Option<&'static str> {
        if self.is_connectivity() {
            return Some(TROUBLESHOOTING_TIPS);
        }
        match self {
            RagError::Configuration(_) => {
                Some("Set OPENAI_API_KEY and MODEL_NAME in the environment or a .env file.")
            }
            RagError::UnsupportedFormat { .. } => {
                Some("Upload a PDF, PNG or JPG file.")
            }
            RagError::EmbeddingService(f) | RagError::GenerationService(f)
                if f.kind == FailureKind::RateLimited =>
            {
                Some("The API is rate limiting requests; wait a moment and try again.")
            }
            _ => None,
        }
    }

    /// User-facing text for this error. Never a debug dump.
    pub fn render(&self) -> String {
        match self {
            RagError::EmbeddingService(failure) if failure.kind.is_connectivity() => {
                connection_message("creating embeddings", failure)
            }
            RagError::GenerationService(failure) if failure.kind.is_connectivity() => {
                connection_message("querying the model", failure)
            }
            other => format!("Error: {}", other),
        }
    }
}

fn connection_message(stage: &str, failure: &ServiceFailure) -> String {
    format!(
        "Connection Error: Failed to connect to the API when {}. \
         Please check your network connection and API key. Error: {}\n\n{}",
        stage, failure, TROUBLESHOOTING_TIPS
    )
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Index(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Index(format!("corrupt index data: {}", err))
    }
}
