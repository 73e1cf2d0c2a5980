//! Tokenizer collaborators
//!
//! The token accountant only needs something that turns text into a
//! deterministic sequence of token ids. Two encoders are provided:
//!
//! - [`HeuristicEncoder`]: dependency-free, 1 token ≈ 4 characters
//! - [`HfEncoder`]: a HuggingFace `tokenizer.json` (BPE, WordPiece, ...)

use crate::errors::{AgentError, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Turns text into token ids.
///
/// Implementations must be pure: the same input always yields the same ids.
pub trait TokenEncoder: Send + Sync + fmt::Debug {
    /// Encode text into token ids
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Number of tokens in `text`
    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }

    /// Short human-readable name for logs
    fn name(&self) -> &str;
}

/// Character-based estimator
///
/// # Mathematical Specification
///
/// ```text
/// count(text) = ⌈chars(text) / 4⌉
///
/// Complexity: O(n) where n = text length
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEncoder;

/// Characters folded into one heuristic token
const CHARS_PER_TOKEN: usize = 4;

impl HeuristicEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl TokenEncoder for HeuristicEncoder {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let chars: Vec<char> = text.chars().collect();
        Ok(chars
            .chunks(CHARS_PER_TOKEN)
            .map(|chunk| fnv1a(chunk.iter().collect::<String>().as_bytes()))
            .collect())
    }

    fn count(&self, text: &str) -> Result<usize> {
        // Ceiling division avoids underestimating short strings
        Ok((text.chars().count() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// 32-bit FNV-1a, used as a stable id for heuristic chunks
fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in bytes {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// HuggingFace tokenizer wrapper
#[derive(Clone)]
pub struct HfEncoder {
    tokenizer: Arc<Tokenizer>,
    source: String,
}

impl HfEncoder {
    /// Load from a local `tokenizer.json`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            AgentError::TokenizerError(format!("Failed to load {}: {}", path.display(), e))
        })?;

        Ok(Self {
            tokenizer: Arc::new(tokenizer),
            source: path.display().to_string(),
        })
    }

    /// Download `tokenizer.json` for a model from the HuggingFace Hub
    /// (cached locally after the first call)
    pub fn from_hub(model_id: &str) -> Result<Self> {
        let api = Api::new().map_err(|e| {
            AgentError::TokenizerError(format!("Failed to create HuggingFace API client: {}", e))
        })?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));
        let tokenizer_path = repo.get("tokenizer.json").map_err(|e| {
            AgentError::TokenizerError(format!("Failed to download tokenizer for {}: {}", model_id, e))
        })?;

        let mut encoder = Self::from_file(tokenizer_path)?;
        encoder.source = model_id.to_string();
        Ok(encoder)
    }
}

impl fmt::Debug for HfEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HfEncoder").field("source", &self.source).finish()
    }
}

impl TokenEncoder for HfEncoder {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| AgentError::TokenizerError(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn name(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_estimation() {
        let encoder = HeuristicEncoder::new();
        // 100 characters ≈ 25 tokens
        assert_eq!(encoder.count(&"a".repeat(100)).unwrap(), 25);
    }

    #[test]
    fn test_empty_string() {
        let encoder = HeuristicEncoder::new();
        assert_eq!(encoder.count("").unwrap(), 0);
        assert!(encoder.encode("").unwrap().is_empty());
    }

    #[test]
    fn test_single_character() {
        let encoder = HeuristicEncoder::new();
        // 1 char = 1 token (ceiling division)
        assert_eq!(encoder.count("a").unwrap(), 1);
    }

    #[test]
    fn test_encode_length_matches_count() {
        let encoder = HeuristicEncoder::new();
        for text in ["", "a", "abcd", "abcde", "Hello, 世界! This is a test."] {
            assert_eq!(
                encoder.encode(text).unwrap().len(),
                encoder.count(text).unwrap(),
                "mismatch for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = HeuristicEncoder::new();
        let text = "Where is the onboarding checklist?";
        assert_eq!(encoder.encode(text).unwrap(), encoder.encode(text).unwrap());
        assert_ne!(encoder.encode("abcd").unwrap(), encoder.encode("abce").unwrap());
    }

    #[test]
    fn test_unicode_characters() {
        let encoder = HeuristicEncoder::new();
        // 3 chars / 4 = 0.75 → 1
        assert_eq!(encoder.count("日本語").unwrap(), 1);
    }

    #[test]
    fn test_linear_scaling() {
        let encoder = HeuristicEncoder::new();

        let base_tokens = encoder.count(&"test ".repeat(10)).unwrap(); // 50 chars
        let double_tokens = encoder.count(&"test ".repeat(20)).unwrap(); // 100 chars

        let ratio = double_tokens as f64 / base_tokens as f64;
        assert!((1.9..=2.1).contains(&ratio), "Expected ~2x ratio, got {}", ratio);
    }

    #[test]
    fn test_hf_encoder_missing_file() {
        let err = HfEncoder::from_file("/nonexistent/tokenizer.json").unwrap_err();
        assert!(matches!(err, AgentError::TokenizerError(_)));
    }
}
