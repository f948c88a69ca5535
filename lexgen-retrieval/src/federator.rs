//! The retrieval federator: parallel fan-out, fusion, personalisation,
//! deduplication and truncation.

use crate::centroid::{infer_theme, CentroidStore};
use crate::fusion::{fuse, lexical_overlap, LegHit, LegRanking};
use crate::traits::{LexicalSearcher, SearchHit, VectorSearcher};
use chrono::Utc;
use lexgen_core::{
    CancelToken, EmbeddingProvider, EmbeddingVector, ExternalDocument, LegReport, LexgenResult,
    RetrievalHit, RetrievalLeg, RetrievalRecord, RetrievalSettings, TenantId,
    ANNOTATION_K_CLAMPED, ANNOTATION_PERSONALISATION_SKIPPED, ANNOTATION_RETRIEVAL_DEGRADED,
    ANNOTATION_RETRIEVAL_ERROR,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const EXCERPT_MAX_BYTES: usize = 240;

/// One retrieval call's inputs.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub tenant_id: TenantId,
    pub query: String,
    /// Desired total hit count (pre-clamp).
    pub k: i32,
    pub external_documents: Vec<ExternalDocument>,
    /// Whether to search the tenant's internal index.
    pub use_internal: bool,
    /// Whether to attempt the centroid personalisation shift.
    pub personalise: bool,
    pub alpha: f32,
}

/// Fuses the internal hybrid index with caller-supplied documents under
/// tenant personalisation.
pub struct Federator {
    vector: Arc<dyn VectorSearcher>,
    lexical: Arc<dyn LexicalSearcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    centroids: Arc<CentroidStore>,
    settings: RetrievalSettings,
}

impl Federator {
    pub fn new(
        vector: Arc<dyn VectorSearcher>,
        lexical: Arc<dyn LexicalSearcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        centroids: Arc<CentroidStore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            vector,
            lexical,
            embedder,
            centroids,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Run one federated retrieval.
    ///
    /// Partial leg failure is non-fatal and annotated; an all-legs
    /// failure yields an empty record with a retrieval-error annotation.
    /// Only cooperative cancellation surfaces as an error.
    #[instrument(skip(self, request, cancel), fields(tenant = %request.tenant_id, k = request.k))]
    pub async fn retrieve(
        &self,
        request: &RetrievalRequest,
        cancel: &CancelToken,
    ) -> LexgenResult<RetrievalRecord> {
        let mut annotations: Vec<String> = Vec::new();
        let theme = infer_theme(&request.query);

        // k = 0 short-circuits before any leg is dispatched.
        if request.k <= 0 {
            return Ok(self.empty_record(request, theme, request.k.max(0), annotations));
        }

        let effective_k = if request.k > self.settings.k_hard_ceiling {
            warn!(
                requested = request.k,
                ceiling = self.settings.k_hard_ceiling,
                "k_total clamped to hard ceiling"
            );
            annotations.push(ANNOTATION_K_CLAMPED.to_string());
            self.settings.k_hard_ceiling
        } else {
            request.k
        };
        let fetch_k = effective_k as usize;

        cancel.check()?;

        // Embed the query once; the semantic leg and the external scorer
        // share it.
        let query_embedding = match self.embedder.embed(&request.query).await {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(error = %e, "query embedding failed");
                None
            }
        };

        cancel.check()?;

        // Parallel fan-out: each leg under its own deadline.
        let leg_timeout = Duration::from_millis(self.settings.leg_timeout_ms.max(1) as u64);

        let semantic_fut = self.semantic_leg(
            request,
            query_embedding.as_ref(),
            fetch_k,
            leg_timeout,
        );
        let lexical_fut = self.lexical_leg(request, fetch_k, leg_timeout);
        let external_fut = self.external_leg(
            request,
            query_embedding.as_ref(),
            fetch_k,
            leg_timeout,
        );

        let (semantic_out, lexical_out, external_out) =
            tokio::join!(semantic_fut, lexical_fut, external_fut);

        cancel.check()?;

        // Personalisation shift: re-score the semantic leg against the
        // blended query and let fusion repeat over the shifted ranking.
        let mut personalisation_applied = false;
        let mut shifted_ranking: Option<Vec<LegHit>> = None;
        if request.personalise {
            if let (Some(theme), Some(query_emb), Some(Ok(original))) =
                (&theme, &query_embedding, &semantic_out)
            {
                if let Some(centroid) = self.centroids.fresh(&request.tenant_id, theme, Utc::now())
                {
                    match query_emb.blend(&centroid, request.alpha) {
                        Ok(shifted) => {
                            shifted_ranking = self
                                .shifted_semantic_leg(request, &shifted, original, fetch_k, leg_timeout)
                                .await;
                        }
                        Err(e) => warn!(error = %e, "centroid blend failed"),
                    }
                } else {
                    debug!(theme = %theme, "no fresh centroid; personalisation skipped");
                }
            }
            if shifted_ranking.is_some() {
                personalisation_applied = true;
            } else {
                annotations.push(ANNOTATION_PERSONALISATION_SKIPPED.to_string());
            }
        }
        let semantic_out = match shifted_ranking {
            Some(hits) => Some(Ok(hits)),
            None => semantic_out,
        };

        // Collect leg reports and the rankings that survived.
        let mut legs = Vec::new();
        let mut rankings = Vec::new();
        for (leg, outcome) in [
            (RetrievalLeg::Semantic, semantic_out),
            (RetrievalLeg::Lexical, lexical_out),
            (RetrievalLeg::ExternalDocs, external_out),
        ] {
            let Some(outcome) = outcome else {
                continue; // leg not dispatched
            };
            match outcome {
                Ok(hits) => {
                    legs.push(LegReport {
                        leg,
                        succeeded: true,
                        hit_count: hits.len() as i32,
                        error: None,
                    });
                    rankings.push(LegRanking { leg, hits });
                }
                Err(reason) => {
                    warn!(leg = leg.as_db_str(), %reason, "retrieval leg failed");
                    legs.push(LegReport {
                        leg,
                        succeeded: false,
                        hit_count: 0,
                        error: Some(reason),
                    });
                }
            }
        }

        let dispatched = legs.len();
        let failed = legs.iter().filter(|l| !l.succeeded).count();
        if dispatched > 0 && failed == dispatched {
            annotations.push(ANNOTATION_RETRIEVAL_ERROR.to_string());
        } else if failed > 0 {
            annotations.push(ANNOTATION_RETRIEVAL_DEGRADED.to_string());
        }

        let fused = fuse(&rankings, self.settings.k_rrf);
        let hits: Vec<RetrievalHit> = fused
            .into_iter()
            .take(fetch_k)
            .enumerate()
            .map(|(idx, c)| RetrievalHit {
                source_id: c.source_id,
                excerpt: c.excerpt,
                origin: c.origin,
                semantic_score: c.semantic_score,
                lexical_score: c.lexical_score,
                fused_score: c.fused_score,
                rank: idx as i32 + 1,
                personalised_score: c.personalised_score,
            })
            .collect();

        debug!(
            hits = hits.len(),
            personalisation_applied,
            "retrieval complete"
        );

        Ok(RetrievalRecord {
            query: request.query.clone(),
            theme,
            requested_k: request.k,
            effective_k,
            k_rrf: self.settings.k_rrf,
            personalisation_applied,
            alpha: request.alpha,
            legs,
            annotations,
            hits,
        })
    }

    fn empty_record(
        &self,
        request: &RetrievalRequest,
        theme: Option<String>,
        effective_k: i32,
        annotations: Vec<String>,
    ) -> RetrievalRecord {
        RetrievalRecord {
            query: request.query.clone(),
            theme,
            requested_k: request.k,
            effective_k,
            k_rrf: self.settings.k_rrf,
            personalisation_applied: false,
            alpha: request.alpha,
            legs: Vec::new(),
            annotations,
            hits: Vec::new(),
        }
    }

    /// Semantic leg. `None` = not dispatched; `Some(Err)` = failed.
    async fn semantic_leg(
        &self,
        request: &RetrievalRequest,
        query_embedding: Option<&EmbeddingVector>,
        k: usize,
        deadline: Duration,
    ) -> Option<Result<Vec<LegHit>, String>> {
        if !request.use_internal {
            return None;
        }
        let Some(embedding) = query_embedding else {
            return Some(Err("query embedding unavailable".to_string()));
        };
        let result = tokio::time::timeout(
            deadline,
            self.vector.search(&request.tenant_id, embedding, k),
        )
        .await;
        Some(match result {
            Ok(Ok(hits)) => Ok(hits
                .into_iter()
                .map(|h| LegHit {
                    source_id: h.source_id,
                    excerpt: h.excerpt,
                    semantic_score: Some(h.score),
                    lexical_score: None,
                    personalised_score: None,
                })
                .collect()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("semantic leg deadline of {:?} elapsed", deadline)),
        })
    }

    /// Lexical leg. `None` = not dispatched; `Some(Err)` = failed.
    async fn lexical_leg(
        &self,
        request: &RetrievalRequest,
        k: usize,
        deadline: Duration,
    ) -> Option<Result<Vec<LegHit>, String>> {
        if !request.use_internal {
            return None;
        }
        let result = tokio::time::timeout(
            deadline,
            self.lexical.search(&request.tenant_id, &request.query, k),
        )
        .await;
        Some(match result {
            Ok(Ok(hits)) => Ok(hits
                .into_iter()
                .map(|h| LegHit {
                    source_id: h.source_id,
                    excerpt: h.excerpt,
                    semantic_score: None,
                    lexical_score: Some(h.score),
                    personalised_score: None,
                })
                .collect()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("lexical leg deadline of {:?} elapsed", deadline)),
        })
    }

    /// External-documents leg: in-memory ranking with the same embedding
    /// and lexical scorers. `None` = no external documents supplied.
    async fn external_leg(
        &self,
        request: &RetrievalRequest,
        query_embedding: Option<&EmbeddingVector>,
        k: usize,
        deadline: Duration,
    ) -> Option<Result<Vec<LegHit>, String>> {
        if request.external_documents.is_empty() {
            return None;
        }
        let result = tokio::time::timeout(
            deadline,
            self.score_external(request, query_embedding, k),
        )
        .await;
        Some(match result {
            Ok(hits) => Ok(hits),
            Err(_) => Err(format!(
                "external document leg deadline of {:?} elapsed",
                deadline
            )),
        })
    }

    async fn score_external(
        &self,
        request: &RetrievalRequest,
        query_embedding: Option<&EmbeddingVector>,
        k: usize,
    ) -> Vec<LegHit> {
        let mut scored: Vec<(f32, LegHit)> = Vec::with_capacity(request.external_documents.len());
        for doc in &request.external_documents {
            let lexical = lexical_overlap(&request.query, &doc.text);
            // Semantic similarity is best-effort; a failed doc embedding
            // degrades this document to lexical-only scoring.
            let semantic = match query_embedding {
                Some(q) => match self.embedder.embed(&doc.text).await {
                    Ok(d) => q.cosine_similarity(&d).ok(),
                    Err(_) => None,
                },
                None => None,
            };
            let combined = match semantic {
                Some(s) => (s + lexical) / 2.0,
                None => lexical,
            };
            scored.push((
                combined,
                LegHit {
                    source_id: doc.source_id.clone(),
                    excerpt: excerpt_of(&doc.text),
                    semantic_score: semantic,
                    lexical_score: Some(lexical),
                    personalised_score: None,
                },
            ));
        }
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.source_id.cmp(&b.1.source_id))
        });
        scored.into_iter().take(k).map(|(_, h)| h).collect()
    }

    /// Re-run the semantic leg against the shifted query, attaching the
    /// original raw score per source. `None` means the shifted search
    /// failed and the original ranking should stand.
    async fn shifted_semantic_leg(
        &self,
        request: &RetrievalRequest,
        shifted: &EmbeddingVector,
        original: &[LegHit],
        k: usize,
        deadline: Duration,
    ) -> Option<Vec<LegHit>> {
        let result = tokio::time::timeout(
            deadline,
            self.vector.search(&request.tenant_id, shifted, k),
        )
        .await;
        match result {
            Ok(Ok(hits)) => Some(
                hits.into_iter()
                    .map(|h: SearchHit| {
                        let original_score = original
                            .iter()
                            .find(|o| o.source_id == h.source_id)
                            .and_then(|o| o.semantic_score);
                        LegHit {
                            source_id: h.source_id,
                            excerpt: h.excerpt,
                            semantic_score: original_score,
                            lexical_score: None,
                            personalised_score: Some(h.score),
                        }
                    })
                    .collect(),
            ),
            Ok(Err(e)) => {
                warn!(error = %e, "shifted semantic leg failed");
                None
            }
            Err(_) => {
                warn!("shifted semantic leg deadline elapsed");
                None
            }
        }
    }
}

fn excerpt_of(text: &str) -> String {
    if text.len() <= EXCERPT_MAX_BYTES {
        return text.to_string();
    }
    let mut end = EXCERPT_MAX_BYTES;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

// ============================================================================
// TESTS
// ============================================================================
