//! Search leg provider traits.
//!
//! Interface definitions only; the vector store and lexical index are
//! external collaborators supplied by the embedder.

use async_trait::async_trait;
use lexgen_core::{EmbeddingVector, LexgenResult, SourceId, TenantId};
use serde::{Deserialize, Serialize};

/// One ranked hit from a single search leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub source_id: SourceId,
    pub excerpt: String,
    pub score: f32,
}

/// Async trait for the semantic search leg.
///
/// Implementations must be thread-safe (Send + Sync) and return hits in
/// descending score order.
#[async_trait]
pub trait VectorSearcher: Send + Sync {
    /// Search the tenant's vector index with a query embedding.
    async fn search(
        &self,
        tenant_id: &TenantId,
        query: &EmbeddingVector,
        k: usize,
    ) -> LexgenResult<Vec<SearchHit>>;
}

/// Async trait for the lexical search leg.
///
/// Implementations must be thread-safe (Send + Sync) and return hits in
/// descending score order.
#[async_trait]
pub trait LexicalSearcher: Send + Sync {
    /// Search the tenant's lexical index with the raw query string.
    async fn search(
        &self,
        tenant_id: &TenantId,
        query: &str,
        k: usize,
    ) -> LexgenResult<Vec<SearchHit>>;
}
