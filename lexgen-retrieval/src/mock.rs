//! In-memory mock searchers and embedding provider for tests.

use crate::fusion::lexical_overlap;
use crate::traits::{LexicalSearcher, SearchHit, VectorSearcher};
use async_trait::async_trait;
use lexgen_core::{
    EmbeddingProvider, EmbeddingVector, LexgenError, LexgenResult, RetrievalError, SourceId,
    TenantId,
};

/// Deterministic embedding: fold bytes into the vector and normalise.
/// The same text always produces the same vector.
pub fn deterministic_embedding(text: &str, dimensions: i32) -> EmbeddingVector {
    let mut data = vec![0.0f32; dimensions as usize];
    for (i, byte) in text.bytes().enumerate() {
        let idx = i % dimensions as usize;
        data[idx] += (byte as f32) / 255.0;
    }
    let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut data {
            *x /= norm;
        }
    }
    EmbeddingVector::new(data, "mock-embed".to_string())
}

// ============================================================================
// MOCK EMBEDDING PROVIDER
// ============================================================================

/// Mock embedding provider producing deterministic vectors.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    model_id: String,
    dimensions: i32,
}

impl MockEmbeddingProvider {
    pub fn new(model_id: impl Into<String>, dimensions: i32) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> LexgenResult<EmbeddingVector> {
        Ok(deterministic_embedding(text, self.dimensions))
    }

    async fn embed_batch(&self, texts: &[&str]) -> LexgenResult<Vec<EmbeddingVector>> {
        Ok(texts
            .iter()
            .map(|t| deterministic_embedding(t, self.dimensions))
            .collect())
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// MOCK SEARCHERS
// ============================================================================

/// Mock semantic searcher over a fixed (source id, text) corpus.
#[derive(Debug, Clone)]
pub struct MockVectorSearcher {
    corpus: Vec<(SourceId, String)>,
    dimensions: i32,
}

impl MockVectorSearcher {
    pub fn new(corpus: Vec<(SourceId, String)>, dimensions: i32) -> Self {
        Self { corpus, dimensions }
    }
}

#[async_trait]
impl VectorSearcher for MockVectorSearcher {
    async fn search(
        &self,
        _tenant_id: &TenantId,
        query: &EmbeddingVector,
        k: usize,
    ) -> LexgenResult<Vec<SearchHit>> {
        let mut scored: Vec<SearchHit> = Vec::new();
        for (source_id, text) in &self.corpus {
            let doc = deterministic_embedding(text, self.dimensions);
            let score = query.cosine_similarity(&doc)?;
            scored.push(SearchHit {
                source_id: source_id.clone(),
                excerpt: text.clone(),
                score,
            });
        }
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.source_id.cmp(&b.source_id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Mock lexical searcher using token-overlap scoring. Zero-score
/// documents are not returned.
#[derive(Debug, Clone)]
pub struct MockLexicalSearcher {
    corpus: Vec<(SourceId, String)>,
}

impl MockLexicalSearcher {
    pub fn new(corpus: Vec<(SourceId, String)>) -> Self {
        Self { corpus }
    }
}

#[async_trait]
impl LexicalSearcher for MockLexicalSearcher {
    async fn search(
        &self,
        _tenant_id: &TenantId,
        query: &str,
        k: usize,
    ) -> LexgenResult<Vec<SearchHit>> {
        let mut scored: Vec<SearchHit> = self
            .corpus
            .iter()
            .filter_map(|(source_id, text)| {
                let score = lexical_overlap(query, text);
                (score > 0.0).then(|| SearchHit {
                    source_id: source_id.clone(),
                    excerpt: text.clone(),
                    score,
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.source_id.cmp(&b.source_id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

// ============================================================================
// FAILING SEARCHERS
// ============================================================================

/// Vector searcher that always fails; used to exercise degraded legs.
#[derive(Debug, Clone, Copy)]
pub struct FailingVectorSearcher;

#[async_trait]
impl VectorSearcher for FailingVectorSearcher {
    async fn search(
        &self,
        _tenant_id: &TenantId,
        _query: &EmbeddingVector,
        _k: usize,
    ) -> LexgenResult<Vec<SearchHit>> {
        Err(LexgenError::Retrieval(RetrievalError::EmbeddingFailed {
            reason: "mock vector backend unavailable".to_string(),
        }))
    }
}

/// Lexical searcher that always fails; used to exercise degraded legs.
#[derive(Debug, Clone, Copy)]
pub struct FailingLexicalSearcher;

#[async_trait]
impl LexicalSearcher for FailingLexicalSearcher {
    async fn search(
        &self,
        _tenant_id: &TenantId,
        _query: &str,
        _k: usize,
    ) -> LexgenResult<Vec<SearchHit>> {
        Err(LexgenError::Retrieval(RetrievalError::EmbeddingFailed {
            reason: "mock lexical backend unavailable".to_string(),
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
