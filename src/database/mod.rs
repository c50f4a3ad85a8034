pub mod vector_db;

pub use vector_db::{BuildOptions, IndexManifest, ScoredChunk, VectorIndex, INDEX_FILE};

use std::hash::Hasher;
use twox_hash::XxHash64;

/// Stable identity of a source document, stored in the index manifest.
pub fn document_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        assert_eq!(document_fingerprint(b"report v1"), document_fingerprint(b"report v1"));
        assert_ne!(document_fingerprint(b"report v1"), document_fingerprint(b"report v2"));
        assert_eq!(document_fingerprint(b"").len(), 16);
    }
}
