//! Model provider traits and token estimation.
//!
//! Pure interface definitions for the external model collaborators.
//! Runtime orchestration (retry, cost accounting, parsing) lives in
//! lexgen-agents; live transports are supplied by the embedder.

use crate::{EmbeddingVector, LexgenResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// COMPLETION TYPES
// ============================================================================

/// Request for a single completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier to invoke.
    pub model_id: String,
    /// System instructions for the call.
    pub system: String,
    /// Assembled user prompt.
    pub prompt: String,
    /// Maximum tokens the model may produce.
    pub max_tokens: i32,
}

/// Response from a completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Raw model output text.
    pub text: String,
    /// Tokens consumed by the prompt.
    pub input_tokens: i64,
    /// Tokens produced by the model.
    pub output_tokens: i64,
}

// ============================================================================
// PROVIDER TRAITS
// ============================================================================

/// Async trait for completion providers.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Issue a single completion call.
    async fn complete(&self, request: CompletionRequest) -> LexgenResult<CompletionResponse>;
}

/// Async trait for embedding providers.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> LexgenResult<EmbeddingVector>;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[&str]) -> LexgenResult<Vec<EmbeddingVector>>;

    /// Get the number of dimensions this provider produces.
    fn dimensions(&self) -> i32;

    /// Get the model identifier for this provider.
    fn model_id(&self) -> &str;
}

// ============================================================================
// TOKEN ESTIMATION
// ============================================================================

/// Heuristic token estimate for text.
///
/// ~4 characters per token, the GPT-family ratio. Used for prompt budget
/// decisions when the provider does not report exact counts.
pub fn estimate_tokens(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    ((text.len() as f64) * 0.25).ceil() as i64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens_ratio() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn test_completion_request_serde() {
        let req = CompletionRequest {
            model_id: "gpt-4o".to_string(),
            system: "You draft legal documents.".to_string(),
            prompt: "Draft a clause.".to_string(),
            max_tokens: 1024,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: CompletionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
