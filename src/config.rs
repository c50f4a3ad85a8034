use crate::error::{RagError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_INDEX_PATH: &str = "faiss_index";
pub const SUPPORTED_MODELS: [&str; 2] = ["gpt-3.5-turbo", "gpt-4"];

/// Whether an existing on-disk index may serve a different document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexReusePolicy {
    /// Any persisted index is reused as-is.
    Always,
    /// A persisted index is reused only when it was built from the same document bytes.
    Fingerprint,
}

impl FromStr for IndexReusePolicy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(IndexReusePolicy::Always),
            "fingerprint" => Ok(IndexReusePolicy::Fingerprint),
            other => Err(RagError::Configuration(format!(
                "INDEX_REUSE_POLICY must be 'always' or 'fingerprint', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u16,
    pub request_timeout: Duration,
    pub max_retries: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 1.3,
            max_tokens: 500,
            request_timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub path: PathBuf,
    pub top_k: usize,
    pub embedding_batch_size: usize,
    pub reuse_policy: IndexReusePolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_INDEX_PATH),
            top_k: 4,
            embedding_batch_size: 100,
            reuse_policy: IndexReusePolicy::Fingerprint,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_base: String,
    pub model_name: String,
    pub embedding_model: String,
    pub chunking: ChunkingConfig,
    pub generation: GenerationSettings,
    pub index: IndexConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model_name", &self.model_name)
            .field("embedding_model", &self.embedding_model)
            .field("chunking", &self.chunking)
            .field("generation", &self.generation)
            .field("index", &self.index)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, validating required values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            RagError::Configuration("OPENAI_API_KEY is not set in the environment variables.".to_string())
        })?;

        let api_base = get("OPENAI_API_BASE").unwrap_or_else(|| {
            log::warn!("OPENAI_API_BASE not set, using default OpenAI endpoint.");
            DEFAULT_API_BASE.to_string()
        });

        let model_name = get("MODEL_NAME").ok_or_else(|| {
            RagError::Configuration("MODEL_NAME is not set in the environment variables.".to_string())
        })?;
        validate_model(&model_name)?;

        let embedding_model =
            get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

        let defaults = ChunkingConfig::default();
        let chunking = ChunkingConfig {
            chunk_size: parse_or(&get, "CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_or(&get, "CHUNK_OVERLAP", defaults.chunk_overlap)?,
        };
        if chunking.chunk_size == 0 || chunking.chunk_overlap >= chunking.chunk_size {
            return Err(RagError::Configuration(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({}) and CHUNK_SIZE must be positive",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }

        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            temperature: parse_or(&get, "TEMPERATURE", defaults.temperature)?,
            max_tokens: parse_or(&get, "MAX_TOKENS", defaults.max_tokens)?,
            request_timeout: Duration::from_secs(parse_or(
                &get,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            max_retries: parse_or(&get, "MAX_RETRIES", defaults.max_retries)?,
        };

        let defaults = IndexConfig::default();
        let index = IndexConfig {
            path: get("INDEX_PATH").map(PathBuf::from).unwrap_or(defaults.path),
            top_k: parse_or(&get, "RETRIEVER_K", defaults.top_k)?,
            embedding_batch_size: parse_or(&get, "EMBEDDING_BATCH_SIZE", defaults.embedding_batch_size)?,
            reuse_policy: match get("INDEX_REUSE_POLICY") {
                Some(value) => value.parse()?,
                None => defaults.reuse_policy,
            },
        };
        if index.top_k == 0 || index.embedding_batch_size == 0 {
            return Err(RagError::Configuration(
                "RETRIEVER_K and EMBEDDING_BATCH_SIZE must be positive".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            api_base,
            model_name,
            embedding_model,
            chunking,
            generation,
            index,
        })
    }
}

pub fn validate_model(model_name: &str) -> Result<()> {
    if SUPPORTED_MODELS.contains(&model_name) {
        Ok(())
    } else {
        Err(RagError::Configuration(format!(
            "MODEL_NAME must be either '{}' or '{}', got '{}'.",
            SUPPORTED_MODELS[0], SUPPORTED_MODELS[1], model_name
        )))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            RagError::Configuration(format!("{} has an invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_NAME", "gpt-4"),
        ]))
        .unwrap();

        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.chunking.chunk_size, 10_000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.generation.temperature, 1.3);
        assert_eq!(config.generation.max_tokens, 500);
        assert_eq!(config.generation.request_timeout, Duration::from_secs(60));
        assert_eq!(config.generation.max_retries, 2);
        assert_eq!(config.index.path, PathBuf::from("faiss_index"));
        assert_eq!(config.index.top_k, 4);
        assert_eq!(config.index.reuse_policy, IndexReusePolicy::Fingerprint);
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let err = AppConfig::from_lookup(lookup(&[("MODEL_NAME", "gpt-4")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_model_must_be_in_allow_list() {
        let err = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_NAME", "gpt-4o"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap_err();
        assert!(err.to_string().contains("MODEL_NAME"));
    }

    #[test]
    fn test_overrides_and_invalid_numbers() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_NAME", "gpt-3.5-turbo"),
            ("OPENAI_API_BASE", "http://localhost:8080/v1"),
            ("CHUNK_SIZE", "500"),
            ("CHUNK_OVERLAP", "50"),
            ("INDEX_REUSE_POLICY", "always"),
        ]))
        .unwrap();
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.index.reuse_policy, IndexReusePolicy::Always);

        let err = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_NAME", "gpt-4"),
            ("MAX_TOKENS", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));

        let err = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_NAME", "gpt-4"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-secret"),
            ("MODEL_NAME", "gpt-4"),
        ]))
        .unwrap();
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
