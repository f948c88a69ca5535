//! Reciprocal-rank fusion over per-leg rankings.
//!
//! fused score = Σ 1 / (k_rrf + rank_i) over the legs in which the
//! document appears, ranks 1-based, equal leg weighting. Fusion is
//! stable: ties break by better best single-leg rank, then source id
//! lexical order.

use lexgen_core::{OriginTag, RetrievalLeg, SourceId};

/// One hit inside a leg ranking, pre-fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct LegHit {
    pub source_id: SourceId,
    pub excerpt: String,
    pub semantic_score: Option<f32>,
    pub lexical_score: Option<f32>,
    pub personalised_score: Option<f32>,
}

/// A completed leg: which leg produced it and its ranked hits.
#[derive(Debug, Clone, PartialEq)]
pub struct LegRanking {
    pub leg: RetrievalLeg,
    pub hits: Vec<LegHit>,
}

/// Fused candidate before truncation; `rank` is assigned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub source_id: SourceId,
    pub excerpt: String,
    pub origin: OriginTag,
    pub semantic_score: Option<f32>,
    pub lexical_score: Option<f32>,
    pub personalised_score: Option<f32>,
    pub fused_score: f32,
    /// Best (lowest) 1-based rank across legs, used for tie-breaks.
    pub best_leg_rank: usize,
}

fn origin_of(leg: RetrievalLeg) -> OriginTag {
    match leg {
        RetrievalLeg::Semantic | RetrievalLeg::Lexical => OriginTag::Internal,
        RetrievalLeg::ExternalDocs => OriginTag::External,
    }
}

/// Fuse leg rankings into a single descending-score candidate list.
/// Duplicate source ids collapse; origin becomes `Both` when a source
/// appears on both internal and external legs.
pub fn fuse(legs: &[LegRanking], k_rrf: f32) -> Vec<FusedCandidate> {
    let mut by_source: Vec<FusedCandidate> = Vec::new();

    for leg in legs {
        for (idx, hit) in leg.hits.iter().enumerate() {
            let rank = idx + 1;
            let contribution = 1.0 / (k_rrf + rank as f32);
            let origin = origin_of(leg.leg);

            match by_source
                .iter_mut()
                .find(|c| c.source_id == hit.source_id)
            {
                Some(existing) => {
                    existing.fused_score += contribution;
                    existing.origin = existing.origin.merge(origin);
                    existing.best_leg_rank = existing.best_leg_rank.min(rank);
                    if existing.semantic_score.is_none() {
                        existing.semantic_score = hit.semantic_score;
                    }
                    if existing.lexical_score.is_none() {
                        existing.lexical_score = hit.lexical_score;
                    }
                    if existing.personalised_score.is_none() {
                        existing.personalised_score = hit.personalised_score;
                    }
                    if existing.excerpt.is_empty() {
                        existing.excerpt = hit.excerpt.clone();
                    }
                }
                None => by_source.push(FusedCandidate {
                    source_id: hit.source_id.clone(),
                    excerpt: hit.excerpt.clone(),
                    origin,
                    semantic_score: hit.semantic_score,
                    lexical_score: hit.lexical_score,
                    personalised_score: hit.personalised_score,
                    fused_score: contribution,
                    best_leg_rank: rank,
                }),
            }
        }
    }

    by_source.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.best_leg_rank.cmp(&b.best_leg_rank))
            .then(a.source_id.cmp(&b.source_id))
    });
    by_source
}

/// Lexical overlap score: fraction of distinct query tokens present in
/// the document, case-folded. Shared by the external-document scorer and
/// the mock lexical searcher.
pub fn lexical_overlap(query: &str, text: &str) -> f32 {
    let query_tokens: std::collections::HashSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens: std::collections::HashSet<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let matched = query_tokens
        .iter()
        .filter(|t| text_tokens.contains(*t))
        .count();
    matched as f32 / query_tokens.len() as f32
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str) -> LegHit {
        LegHit {
            source_id: id.to_string(),
            excerpt: format!("excerpt {}", id),
            semantic_score: None,
            lexical_score: None,
            personalised_score: None,
        }
    }

    fn ranking(leg: RetrievalLeg, ids: &[&str]) -> LegRanking {
        LegRanking {
            leg,
            hits: ids.iter().map(|id| hit(id)).collect(),
        }
    }

    #[test]
    fn test_single_leg_preserves_order() {
        let legs = vec![ranking(RetrievalLeg::Semantic, &["a", "b", "c"])];
        let fused = fuse(&legs, 60.0);
        let ids: Vec<_> = fused.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_document_in_both_legs_outranks() {
        let legs = vec![
            ranking(RetrievalLeg::Semantic, &["shared", "only-sem"]),
            ranking(RetrievalLeg::Lexical, &["only-lex", "shared"]),
        ];
        let fused = fuse(&legs, 60.0);
        assert_eq!(fused[0].source_id, "shared");
        // 1/(60+1) + 1/(60+2) for shared vs 1/(60+1) for only-lex
        assert!(fused[0].fused_score > fused[1].fused_score);
    }

    #[test]
    fn test_fused_score_formula() {
        let legs = vec![
            ranking(RetrievalLeg::Semantic, &["a"]),
            ranking(RetrievalLeg::Lexical, &["a"]),
        ];
        let fused = fuse(&legs, 60.0);
        let expected = 1.0 / 61.0 + 1.0 / 61.0;
        assert!((fused[0].fused_score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_tie_breaks_by_source_id() {
        // Same single-leg rank in separate legs: identical fused score
        // and identical best rank, so lexical order of ids decides.
        let legs = vec![
            ranking(RetrievalLeg::Semantic, &["zulu"]),
            ranking(RetrievalLeg::Lexical, &["alpha"]),
        ];
        let fused = fuse(&legs, 60.0);
        assert_eq!(fused[0].source_id, "alpha");
        assert_eq!(fused[1].source_id, "zulu");
    }

    #[test]
    fn test_origin_merging() {
        let legs = vec![
            ranking(RetrievalLeg::Semantic, &["doc-1"]),
            ranking(RetrievalLeg::ExternalDocs, &["doc-1", "doc-2"]),
        ];
        let fused = fuse(&legs, 60.0);
        let doc1 = fused.iter().find(|c| c.source_id == "doc-1").unwrap();
        let doc2 = fused.iter().find(|c| c.source_id == "doc-2").unwrap();
        assert_eq!(doc1.origin, OriginTag::Both);
        assert_eq!(doc2.origin, OriginTag::External);
    }

    #[test]
    fn test_dedup_keeps_best_scores() {
        let mut sem = ranking(RetrievalLeg::Semantic, &["a"]);
        sem.hits[0].semantic_score = Some(0.9);
        let mut lex = ranking(RetrievalLeg::Lexical, &["a"]);
        lex.hits[0].lexical_score = Some(0.4);
        let fused = fuse(&[sem, lex], 60.0);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].semantic_score, Some(0.9));
        assert_eq!(fused[0].lexical_score, Some(0.4));
    }

    #[test]
    fn test_empty_legs() {
        assert!(fuse(&[], 60.0).is_empty());
        let legs = vec![ranking(RetrievalLeg::Semantic, &[])];
        assert!(fuse(&legs, 60.0).is_empty());
    }

    #[test]
    fn test_lexical_overlap() {
        assert_eq!(lexical_overlap("", "anything"), 0.0);
        assert_eq!(lexical_overlap("contrato", "sem relação"), 0.0);
        let full = lexical_overlap("obrigações contratuais", "as obrigações contratuais da parte");
        assert!((full - 1.0).abs() < 1e-6);
        let half = lexical_overlap("obrigações fiscais", "as obrigações da parte");
        assert!((half - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_lexical_overlap_case_and_punctuation() {
        let score = lexical_overlap("Obrigações, contratuais.", "OBRIGAÇÕES CONTRATUAIS");
        assert!((score - 1.0).abs() < 1e-6);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn leg_strategy(leg: RetrievalLeg) -> impl Strategy<Value = LegRanking> {
        proptest::collection::vec("[a-e]", 0..6).prop_map(move |ids| {
            let mut seen = std::collections::HashSet::new();
            LegRanking {
                leg,
                hits: ids
                    .into_iter()
                    .filter(|id| seen.insert(id.clone()))
                    .map(|id| LegHit {
                        source_id: id,
                        excerpt: String::new(),
                        semantic_score: None,
                        lexical_score: None,
                        personalised_score: None,
                    })
                    .collect(),
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_fusion_deterministic(
            sem in leg_strategy(RetrievalLeg::Semantic),
            lex in leg_strategy(RetrievalLeg::Lexical)
        ) {
            let a = fuse(&[sem.clone(), lex.clone()], 60.0);
            let b = fuse(&[sem, lex], 60.0);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_fusion_dedups(
            sem in leg_strategy(RetrievalLeg::Semantic),
            lex in leg_strategy(RetrievalLeg::Lexical)
        ) {
            let fused = fuse(&[sem, lex], 60.0);
            let ids: std::collections::HashSet<_> =
                fused.iter().map(|c| c.source_id.clone()).collect();
            prop_assert_eq!(ids.len(), fused.len());
        }

        #[test]
        fn prop_scores_descending(
            sem in leg_strategy(RetrievalLeg::Semantic),
            lex in leg_strategy(RetrievalLeg::Lexical)
        ) {
            let fused = fuse(&[sem, lex], 60.0);
            for pair in fused.windows(2) {
                prop_assert!(pair[0].fused_score >= pair[1].fused_score);
            }
        }
    }
}
