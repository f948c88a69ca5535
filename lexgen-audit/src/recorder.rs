//! Sealing terminated runs into audit records.

use crate::store::AuditStore;
use chrono::Utc;
use lexgen_core::{
    context_hash, input_hash, output_hash, AuditRecord, LexgenError, LexgenResult, RunState,
    RunStatus,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Computes the three digests and writes the forensic record.
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn AuditStore> {
        Arc::clone(&self.store)
    }

    /// Seal a terminated run.
    ///
    /// A write failure is surfaced as `AuditWriteFailed`: the caller must
    /// treat the run as failed regardless of the generation outcome, and
    /// no document may be returned without the sealed record.
    #[instrument(skip(self, state, error), fields(run_id = %state.run_id))]
    pub async fn seal(
        &self,
        state: &RunState,
        error: Option<&LexgenError>,
    ) -> LexgenResult<AuditRecord> {
        let completed_at = Utc::now();
        let final_text = state.best_text().unwrap_or_default();

        let user_id = state.user_id.as_ref().map(|u| u.as_str().to_string());
        let record = AuditRecord {
            run_id: state.run_id,
            tenant_id: state.tenant_id.clone(),
            user_id: state.user_id.clone(),
            task: state.task,
            document_type: state.document_type.clone(),
            started_at: state.started_at,
            completed_at,
            input_hash: input_hash(
                &state.query,
                state.tenant_id.as_str(),
                user_id.as_deref(),
                &state.config,
            ),
            output_hash: output_hash(final_text),
            context_hash: context_hash(state.sources_consumed.iter()),
            trace: state.trace.clone(),
            policy_snapshot: state.policy_snapshot.clone(),
            pii_report: state.pii_report.clone(),
            sources_used: state.sources_consumed.iter().cloned().collect(),
            input_tokens: state.total_input_tokens(),
            output_tokens: state.total_output_tokens(),
            cost: state.cost_accrued,
            duration_ms: state.elapsed_ms(completed_at),
            status: state.status,
            success: matches!(state.status, RunStatus::Succeeded)
                || (state.status == RunStatus::BudgetExhausted && state.best_text().is_some()),
            error_code: error.map(|e| e.code().to_string()),
            error_cause: error.map(|e| e.to_string()),
        };

        self.store.append(record.clone()).await?;
        info!(
            run_id = %state.run_id,
            status = state.status.as_db_str(),
            "audit record sealed"
        );
        Ok(record)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailingAuditStore, InMemoryAuditStore};
    use lexgen_core::{
        sha256_hex, AgentKind, AuditError, Budget, EntityIdType, PiiReport, PolicySnapshot,
        RunConfig, RunId, TaskKind, TenantId, WorkingSet,
    };
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn terminated_state() -> RunState {
        let tenant = TenantId::new("T1").unwrap();
        let mut state = RunState {
            run_id: RunId::now_v7(),
            tenant_id: tenant.clone(),
            user_id: None,
            task: TaskKind::Draft,
            document_type: None,
            started_at: Utc::now(),
            query: "resumo de obrigações contratuais".to_string(),
            external_documents: Vec::new(),
            config: RunConfig::default(),
            redacted_query: "resumo de obrigações contratuais".to_string(),
            working: WorkingSet::default(),
            trace: Vec::new(),
            retrievals: Vec::new(),
            policy_snapshot: PolicySnapshot::empty(tenant, Utc::now()),
            pii_report: PiiReport::default(),
            budget: Budget {
                max_iterations: 10,
                deadline_ms: 300_000,
                cost_ceiling: Decimal::new(5_000_000, 6),
            },
            status: RunStatus::Succeeded,
            iterations: 4,
            cost_accrued: Decimal::ZERO,
            sources_consumed: BTreeSet::new(),
            annotations: Vec::new(),
        };
        state
            .working
            .set_formatted("DOCUMENTO FINAL".to_string(), AgentKind::Formatter);
        state.sources_consumed.insert("juris-002".to_string());
        state.sources_consumed.insert("juris-001".to_string());
        state
    }

    #[tokio::test]
    async fn test_output_hash_matches_final_text() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryAuditStore::new()));
        let state = terminated_state();
        let record = recorder.seal(&state, None).await.unwrap();
        assert_eq!(record.output_hash, sha256_hex("DOCUMENTO FINAL".as_bytes()));
        assert!(record.success);
    }

    #[tokio::test]
    async fn test_context_hash_over_sorted_sources() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryAuditStore::new()));
        let state = terminated_state();
        let record = recorder.seal(&state, None).await.unwrap();
        assert_eq!(record.context_hash, sha256_hex(b"juris-001\njuris-002"));
        assert_eq!(record.sources_used, vec!["juris-001", "juris-002"]);
    }

    #[tokio::test]
    async fn test_input_hash_stable_across_reseal() {
        let store = Arc::new(InMemoryAuditStore::new());
        let recorder = AuditRecorder::new(store);
        let mut state = terminated_state();
        let first = recorder.seal(&state, None).await.unwrap();
        // A different run with identical inputs hashes identically.
        state.run_id = RunId::now_v7();
        let second = recorder.seal(&state, None).await.unwrap();
        assert_eq!(first.input_hash, second.input_hash);
    }

    #[tokio::test]
    async fn test_failed_run_records_error() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryAuditStore::new()));
        let mut state = terminated_state();
        state.status = RunStatus::Failed;
        let error = LexgenError::Model(lexgen_core::ModelError::ContentBlocked {
            model: "gpt-4o".to_string(),
        });
        let record = recorder.seal(&state, Some(&error)).await.unwrap();
        assert!(!record.success);
        assert_eq!(record.error_code.as_deref(), Some("model_fatal"));
        assert!(record.error_cause.as_deref().unwrap().contains("gpt-4o"));
    }

    #[tokio::test]
    async fn test_budget_exhausted_with_text_is_success() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryAuditStore::new()));
        let mut state = terminated_state();
        state.status = RunStatus::BudgetExhausted;
        let record = recorder.seal(&state, None).await.unwrap();
        assert!(record.success);
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_audit_error() {
        let recorder = AuditRecorder::new(Arc::new(FailingAuditStore));
        let state = terminated_state();
        let err = recorder.seal(&state, None).await.unwrap_err();
        assert!(matches!(
            err,
            LexgenError::Audit(AuditError::WriteFailed { .. })
        ));
    }
}
