//! Submit-run validation and run-state construction.
//!
//! Everything rejected here is a client error: no run id is allocated
//! beyond the state under construction and no audit record is written.
//! PII redaction happens at ingress so the original sensitive spans
//! never travel past this boundary.

use chrono::Utc;
use lexgen_core::{
    Budget, EngineConfig, EntityIdType, ExternalDocument, LexgenError, LexgenResult, PiiReport,
    RunConfig, RunId, RunState, RunStatus, TaskKind, TenantId, UserId, ValidationError,
    WorkingSet,
};
use lexgen_policy::{PiiGate, PolicyStore};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// A submit-run request as handed over by the edge.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub query: String,
    pub task: TaskKind,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub external_documents: Vec<ExternalDocument>,
    pub config: RunConfig,
}

impl SubmitRequest {
    pub fn new(query: impl Into<String>, task: TaskKind, tenant_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            task,
            tenant_id: tenant_id.into(),
            user_id: None,
            external_documents: Vec::new(),
            config: RunConfig::default(),
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LexgenError {
    LexgenError::Validation(ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    })
}

/// Validate a request and build the initial run state, capturing the
/// tenant policy snapshot and redacting PII on the way in.
pub fn build_run_state(
    request: SubmitRequest,
    engine_config: &EngineConfig,
    policy_store: &PolicyStore,
) -> LexgenResult<RunState> {
    let tenant_id = TenantId::new(request.tenant_id.clone())
        .ok_or_else(|| invalid("tenant_id", "must be non-empty"))?;
    let user_id = match &request.user_id {
        Some(raw) => Some(UserId::new(raw.clone()).ok_or_else(|| {
            invalid("user_id", "must be non-empty when present")
        })?),
        None => None,
    };

    if request.query.trim().is_empty() {
        return Err(LexgenError::Validation(ValidationError::EmptyQuery));
    }
    if request.query.len() > engine_config.max_query_bytes {
        return Err(LexgenError::Validation(ValidationError::QueryTooLong {
            len: request.query.len(),
            max: engine_config.max_query_bytes,
        }));
    }

    if request.external_documents.len() > engine_config.max_external_documents {
        return Err(LexgenError::Validation(ValidationError::TooManyDocuments {
            count: request.external_documents.len(),
            max: engine_config.max_external_documents,
        }));
    }
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut aggregate = 0usize;
    for doc in &request.external_documents {
        if !seen_ids.insert(doc.source_id.as_str()) {
            return Err(LexgenError::Validation(ValidationError::DuplicateSourceId {
                source_id: doc.source_id.clone(),
            }));
        }
        if doc.text.len() > engine_config.max_document_bytes {
            return Err(LexgenError::Validation(ValidationError::DocumentTooLarge {
                source_id: doc.source_id.clone(),
                len: doc.text.len(),
                max: engine_config.max_document_bytes,
            }));
        }
        aggregate += doc.text.len();
    }
    if aggregate > engine_config.max_aggregate_bytes {
        return Err(LexgenError::Validation(ValidationError::AggregateTooLarge {
            len: aggregate,
            max: engine_config.max_aggregate_bytes,
        }));
    }

    request.config.validate()?;
    let config = request
        .config
        .normalised(engine_config.retrieval.k_hard_ceiling);

    // Redact on ingress: query and every external document. Originals
    // are not kept in the run state.
    let gate = PiiGate::new(config.pii_strategy);
    let mut pii_report = PiiReport::default();
    let (redacted_query, query_detections) = gate.process(&request.query);
    pii_report.extend(query_detections);

    let external_documents: Vec<ExternalDocument> = request
        .external_documents
        .into_iter()
        .map(|mut doc| {
            let (redacted, detections) = gate.process(&doc.text);
            pii_report.extend(detections);
            doc.text = redacted;
            doc
        })
        .collect();

    let policy_snapshot = policy_store.snapshot_for(&tenant_id);
    let started_at = Utc::now();
    let budget = Budget {
        max_iterations: config.max_iterations,
        deadline_ms: config.deadline_ms,
        cost_ceiling: config
            .cost_ceiling
            .unwrap_or(engine_config.default_cost_ceiling),
    };

    let state = RunState {
        run_id: RunId::now_v7(),
        tenant_id,
        user_id,
        task: request.task,
        document_type: config.document_type.clone(),
        started_at,
        query: request.query,
        external_documents,
        config,
        redacted_query,
        working: WorkingSet::default(),
        trace: Vec::new(),
        retrievals: Vec::new(),
        policy_snapshot,
        pii_report,
        budget,
        status: RunStatus::Pending,
        iterations: 0,
        cost_accrued: rust_decimal::Decimal::ZERO,
        sources_consumed: BTreeSet::new(),
        annotations: Vec::new(),
    };
    debug!(run_id = %state.run_id, tenant = %state.tenant_id, "run state built");
    Ok(state)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lexgen_core::{PiiKind, RedactionStrategy};

    fn engine_config() -> EngineConfig {
        EngineConfig::default()
    }

    fn store() -> PolicyStore {
        PolicyStore::new()
    }

    fn base_request() -> SubmitRequest {
        SubmitRequest::new("resumo de obrigações contratuais", TaskKind::Draft, "T1")
    }

    #[test]
    fn test_valid_request_builds_state() {
        let state = build_run_state(base_request(), &engine_config(), &store()).unwrap();
        assert_eq!(state.status, RunStatus::Pending);
        assert_eq!(state.tenant_id.as_str(), "T1");
        assert_eq!(state.budget.max_iterations, 10);
        assert_eq!(state.policy_snapshot.version, 0);
        assert_eq!(state.redacted_query, state.query);
    }

    #[test]
    fn test_empty_query_rejected() {
        let mut request = base_request();
        request.query = "   ".to_string();
        let err = build_run_state(request, &engine_config(), &store()).unwrap_err();
        assert!(matches!(
            err,
            LexgenError::Validation(ValidationError::EmptyQuery)
        ));
    }

    #[test]
    fn test_oversized_query_rejected() {
        let mut request = base_request();
        request.query = "a".repeat(engine_config().max_query_bytes + 1);
        let err = build_run_state(request, &engine_config(), &store()).unwrap_err();
        assert!(matches!(
            err,
            LexgenError::Validation(ValidationError::QueryTooLong { .. })
        ));
    }

    #[test]
    fn test_empty_tenant_rejected() {
        let mut request = base_request();
        request.tenant_id = String::new();
        assert!(build_run_state(request, &engine_config(), &store()).is_err());
    }

    #[test]
    fn test_duplicate_source_ids_rejected() {
        let mut request = base_request();
        request.external_documents = vec![
            ExternalDocument::new("doc-1", "primeiro"),
            ExternalDocument::new("doc-1", "segundo"),
        ];
        let err = build_run_state(request, &engine_config(), &store()).unwrap_err();
        assert!(matches!(
            err,
            LexgenError::Validation(ValidationError::DuplicateSourceId { .. })
        ));
    }

    #[test]
    fn test_too_many_documents_rejected() {
        let mut request = base_request();
        request.external_documents = (0..11)
            .map(|i| ExternalDocument::new(format!("doc-{}", i), "texto"))
            .collect();
        let err = build_run_state(request, &engine_config(), &store()).unwrap_err();
        assert!(matches!(
            err,
            LexgenError::Validation(ValidationError::TooManyDocuments { .. })
        ));
    }

    #[test]
    fn test_oversized_document_rejected() {
        let mut request = base_request();
        request.external_documents = vec![ExternalDocument::new(
            "doc-1",
            "x".repeat(engine_config().max_document_bytes + 1),
        )];
        let err = build_run_state(request, &engine_config(), &store()).unwrap_err();
        assert!(matches!(
            err,
            LexgenError::Validation(ValidationError::DocumentTooLarge { .. })
        ));
    }

    #[test]
    fn test_config_clamps_applied() {
        let mut request = base_request();
        request.config.k_total = 400;
        request.config.personalisation_alpha = 3.0;
        let state = build_run_state(request, &engine_config(), &store()).unwrap();
        assert_eq!(state.config.k_total, 100);
        assert_eq!(state.config.personalisation_alpha, 1.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut request = base_request();
        request.config.max_iterations = 0;
        assert!(build_run_state(request, &engine_config(), &store()).is_err());
    }

    #[test]
    fn test_pii_redacted_on_ingress() {
        let mut request = base_request();
        request.query = "contrato do cliente CPF 123.456.789-09".to_string();
        request.external_documents = vec![ExternalDocument::new(
            "doc-1",
            "Contratante: CPF 123.456.789-09, domiciliado em local não informado.",
        )];
        let state = build_run_state(request, &engine_config(), &store()).unwrap();
        assert!(state.redacted_query.contains("[CPF_REDACTED]"));
        assert!(!state.redacted_query.contains("123.456.789-09"));
        assert!(!state.external_documents[0].text.contains("123.456.789-09"));
        assert_eq!(state.pii_report.count_kind(PiiKind::TaxId), 2);
        assert!(state
            .pii_report
            .detections
            .iter()
            .all(|d| d.strategy == RedactionStrategy::Typed));
    }

    #[test]
    fn test_policy_snapshot_captured_at_start() {
        let store = PolicyStore::new();
        let tenant = TenantId::new("T1").unwrap();
        store.publish(tenant.clone(), Vec::new());
        let state = build_run_state(base_request(), &engine_config(), &store).unwrap();
        assert_eq!(state.policy_snapshot.version, 1);

        // Later edits do not retroactively apply.
        store.publish(tenant, Vec::new());
        assert_eq!(state.policy_snapshot.version, 1);
    }
}
