//! Feedback intake: structured corrections attached to completed runs.

use crate::store::AuditStore;
use async_trait::async_trait;
use chrono::Utc;
use lexgen_core::{
    AuditError, EntityIdType, ErrorSpan, FeedbackEvent, FeedbackId, FeedbackSummary, LexgenError,
    LexgenResult, MissingSourceHint, RunId, ValidationError,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Async trait for feedback event persistence. One row per event,
/// indexed by run id; events are immutable and additive.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append(&self, event: FeedbackEvent) -> LexgenResult<()>;
    async fn events_for(&self, run_id: RunId) -> Vec<FeedbackEvent>;
}

/// In-memory reference implementation.
#[derive(Default)]
pub struct InMemoryFeedbackStore {
    events: RwLock<HashMap<RunId, Vec<FeedbackEvent>>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn append(&self, event: FeedbackEvent) -> LexgenResult<()> {
        self.events
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(event.run_id)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn events_for(&self, run_id: RunId) -> Vec<FeedbackEvent> {
        self.events
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&run_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// A submit-feedback request body, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackSubmission {
    pub rater_id: String,
    /// One of -1, 0, +1.
    pub rating: i8,
    pub comment: Option<String>,
    pub error_spans: Vec<ErrorSpan>,
    pub missing_sources: Vec<MissingSourceHint>,
    pub edited_text: Option<String>,
    pub tags: Vec<String>,
}

/// The narrow write interface for attaching corrections to a run.
///
/// A feedback event may only attach to a terminated run - equivalently,
/// to a run with a sealed audit record. Feedback never modifies the
/// audit record.
pub struct FeedbackIntake {
    audit: Arc<dyn AuditStore>,
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackIntake {
    pub fn new(audit: Arc<dyn AuditStore>, store: Arc<dyn FeedbackStore>) -> Self {
        Self { audit, store }
    }

    /// Validate and persist one feedback event.
    pub async fn submit(
        &self,
        run_id: RunId,
        submission: FeedbackSubmission,
    ) -> LexgenResult<FeedbackEvent> {
        if !matches!(submission.rating, -1 | 0 | 1) {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "rating".to_string(),
                reason: "must be -1, 0 or +1".to_string(),
            }));
        }
        if submission.rater_id.trim().is_empty() {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "rater_id".to_string(),
                reason: "must be non-empty".to_string(),
            }));
        }
        // A sealed audit record is the witness that the run terminated.
        if !self.audit.exists(run_id).await {
            return Err(LexgenError::Audit(AuditError::RunNotTerminated { run_id }));
        }

        let event = FeedbackEvent {
            feedback_id: FeedbackId::now_v7(),
            run_id,
            rater_id: submission.rater_id,
            rating: submission.rating,
            comment: submission.comment,
            error_spans: submission.error_spans,
            missing_sources: submission.missing_sources,
            edited_text: submission.edited_text,
            tags: submission.tags,
            created_at: Utc::now(),
        };
        self.store.append(event.clone()).await?;
        info!(run_id = %run_id, rating = event.rating, "feedback event attached");
        Ok(event)
    }

    /// Aggregate all events for a run. The summary depends only on the
    /// event multiset, so aggregation commutes with submission order.
    pub async fn summary(&self, run_id: RunId) -> FeedbackSummary {
        let events = self.store.events_for(run_id).await;
        summarise(run_id, &events)
    }
}

fn summarise(run_id: RunId, events: &[FeedbackEvent]) -> FeedbackSummary {
    let event_count = events.len();
    let mean_rating = if event_count == 0 {
        0.0
    } else {
        events.iter().map(|e| e.rating as f64).sum::<f64>() / event_count as f64
    };
    let total_error_spans = events.iter().map(|e| e.error_spans.len()).sum();
    let distinct_missing_sources = events
        .iter()
        .flat_map(|e| e.missing_sources.iter().map(|m| m.citation.as_str()))
        .collect::<HashSet<_>>()
        .len();
    let mut tag_counts: BTreeMap<String, usize> = BTreeMap::new();
    for event in events {
        for tag in &event.tags {
            *tag_counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    FeedbackSummary {
        run_id,
        event_count,
        mean_rating,
        total_error_spans,
        distinct_missing_sources,
        tag_counts,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAuditStore;
    use lexgen_core::{
        PiiReport, PolicySnapshot, RunStatus, TaskKind, TenantId,
    };
    use rust_decimal::Decimal;

    async fn sealed_run(audit: &InMemoryAuditStore) -> RunId {
        let run_id = RunId::now_v7();
        let tenant = TenantId::new("T1").unwrap();
        audit
            .append(lexgen_core::AuditRecord {
                run_id,
                tenant_id: tenant.clone(),
                user_id: None,
                task: TaskKind::Draft,
                document_type: None,
                started_at: Utc::now(),
                completed_at: Utc::now(),
                input_hash: "aa".repeat(32),
                output_hash: "bb".repeat(32),
                context_hash: "cc".repeat(32),
                trace: Vec::new(),
                policy_snapshot: PolicySnapshot::empty(tenant, Utc::now()),
                pii_report: PiiReport::default(),
                sources_used: Vec::new(),
                input_tokens: 0,
                output_tokens: 0,
                cost: Decimal::ZERO,
                duration_ms: 0,
                status: RunStatus::Succeeded,
                success: true,
                error_code: None,
                error_cause: None,
            })
            .await
            .unwrap();
        run_id
    }

    fn submission(rating: i8) -> FeedbackSubmission {
        FeedbackSubmission {
            rater_id: "reviewer-1".to_string(),
            rating,
            comment: None,
            error_spans: Vec::new(),
            missing_sources: Vec::new(),
            edited_text: None,
            tags: Vec::new(),
        }
    }

    fn intake(audit: Arc<InMemoryAuditStore>) -> FeedbackIntake {
        FeedbackIntake::new(audit, Arc::new(InMemoryFeedbackStore::new()))
    }

    #[tokio::test]
    async fn test_submit_to_terminated_run() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let run_id = sealed_run(&audit).await;
        let intake = intake(audit);
        let event = intake.submit(run_id, submission(1)).await.unwrap();
        assert_eq!(event.run_id, run_id);
        assert_eq!(event.rating, 1);
    }

    #[tokio::test]
    async fn test_submit_rejected_without_sealed_record() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let intake = intake(audit);
        let err = intake.submit(RunId::now_v7(), submission(1)).await.unwrap_err();
        assert!(matches!(
            err,
            LexgenError::Audit(AuditError::RunNotTerminated { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_rating_rejected() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let run_id = sealed_run(&audit).await;
        let intake = intake(audit);
        let err = intake.submit(run_id, submission(5)).await.unwrap_err();
        assert!(matches!(err, LexgenError::Validation(_)));
    }

    #[tokio::test]
    async fn test_summary_aggregates() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let run_id = sealed_run(&audit).await;
        let intake = intake(audit);

        let mut first = submission(1);
        first.error_spans = vec![
            ErrorSpan {
                start: 0,
                end: 10,
                label: "cita errada".to_string(),
                correction_hint: None,
            },
            ErrorSpan {
                start: 20,
                end: 30,
                label: "cláusula ausente".to_string(),
                correction_hint: Some("incluir cláusula penal".to_string()),
            },
        ];
        first.missing_sources = vec![MissingSourceHint {
            citation: "REsp 1.737.428/RS".to_string(),
            classification: "jurisprudencia".to_string(),
            relevance: 0.9,
        }];
        first.tags = vec!["citations".to_string()];
        intake.submit(run_id, first).await.unwrap();

        let mut second = submission(-1);
        second.missing_sources = vec![MissingSourceHint {
            citation: "REsp 1.737.428/RS".to_string(),
            classification: "jurisprudencia".to_string(),
            relevance: 0.7,
        }];
        second.tags = vec!["citations".to_string(), "structure".to_string()];
        intake.submit(run_id, second).await.unwrap();

        let summary = intake.summary(run_id).await;
        assert_eq!(summary.event_count, 2);
        assert!((summary.mean_rating - 0.0).abs() < 1e-9);
        assert_eq!(summary.total_error_spans, 2);
        // Same citation twice counts once.
        assert_eq!(summary.distinct_missing_sources, 1);
        assert_eq!(summary.tag_counts["citations"], 2);
        assert_eq!(summary.tag_counts["structure"], 1);
    }

    #[tokio::test]
    async fn test_summary_commutative() {
        let run_id = RunId::now_v7();
        let make = |rating: i8, tag: &str| FeedbackEvent {
            feedback_id: FeedbackId::now_v7(),
            run_id,
            rater_id: "r".to_string(),
            rating,
            comment: None,
            error_spans: Vec::new(),
            missing_sources: Vec::new(),
            edited_text: None,
            tags: vec![tag.to_string()],
            created_at: Utc::now(),
        };
        let a = make(1, "x");
        let b = make(-1, "y");
        let forward = summarise(run_id, &[a.clone(), b.clone()]);
        let backward = summarise(run_id, &[b, a]);
        assert_eq!(forward.mean_rating, backward.mean_rating);
        assert_eq!(forward.tag_counts, backward.tag_counts);
        assert_eq!(forward.event_count, backward.event_count);
    }

    #[tokio::test]
    async fn test_feedback_never_modifies_audit_record() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let run_id = sealed_run(&audit).await;
        let before = audit.fetch(run_id, "test", "baseline").await.unwrap();
        let intake = FeedbackIntake::new(audit.clone(), Arc::new(InMemoryFeedbackStore::new()));
        intake.submit(run_id, submission(1)).await.unwrap();
        let after = audit.fetch(run_id, "test", "verification").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_empty_summary() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let intake = intake(audit);
        let summary = intake.summary(RunId::now_v7()).await;
        assert_eq!(summary.event_count, 0);
        assert_eq!(summary.mean_rating, 0.0);
        assert!(summary.tag_counts.is_empty());
    }
}
