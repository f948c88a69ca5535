//! Run response assembly at the executor boundary.
//!
//! No internal stack detail crosses here: failures surface as a short
//! machine-readable code, a human-readable reason and the run id.

use chrono::Utc;
use lexgen_core::{
    AuditRecord, LexgenError, OriginTag, RunId, RunState, RunStatus, SourceId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Summary of the context a run consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContextSummary {
    pub total: usize,
    pub internal_count: usize,
    pub external_count: usize,
    pub personalisation_applied: bool,
}

/// An external source consumed by the run, with its final rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumedSource {
    pub source_id: SourceId,
    pub rank: i32,
    pub fused_score: f32,
}

/// Machine-readable failure surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub reason: String,
}

/// The run response returned at the executor boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub run_id: RunId,
    pub status: RunStatus,
    pub final_text: Option<String>,
    pub document_type: Option<String>,
    pub context: ContextSummary,
    pub external_sources: Vec<ConsumedSource>,
    pub duration_ms: i64,
    pub iterations: i32,
    pub cost: Decimal,
    pub error: Option<RunError>,
}

/// A terminated run: its boundary response and, when sealing succeeded,
/// the audit record.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub response: RunResponse,
    pub audit: Option<AuditRecord>,
}

fn context_summary(state: &RunState) -> ContextSummary {
    match state.latest_retrieval() {
        Some(record) => ContextSummary {
            total: record.hits.len(),
            internal_count: record.count_origin(OriginTag::Internal),
            external_count: record.count_origin(OriginTag::External),
            personalisation_applied: record.personalisation_applied,
        },
        None => ContextSummary::default(),
    }
}

fn external_sources(state: &RunState) -> Vec<ConsumedSource> {
    state
        .latest_retrieval()
        .map(|record| {
            record
                .hits
                .iter()
                .filter(|h| matches!(h.origin, OriginTag::External | OriginTag::Both))
                .map(|h| ConsumedSource {
                    source_id: h.source_id.clone(),
                    rank: h.rank,
                    fused_score: h.fused_score,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Build the boundary response for a sealed run.
pub(crate) fn build_response(state: &RunState, error: Option<&LexgenError>) -> RunResponse {
    let emit_text = matches!(
        state.status,
        RunStatus::Succeeded | RunStatus::BudgetExhausted
    );
    RunResponse {
        run_id: state.run_id,
        status: state.status,
        final_text: if emit_text {
            state.best_text().map(str::to_string)
        } else {
            None
        },
        document_type: state.document_type.clone(),
        context: context_summary(state),
        external_sources: external_sources(state),
        duration_ms: state.elapsed_ms(Utc::now()),
        iterations: state.iterations,
        cost: state.cost_accrued,
        error: error.map(|e| RunError {
            code: e.code().to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Build the boundary response for a run whose audit write failed: the
/// run is failed and no document is returned, whatever the generation
/// produced.
pub(crate) fn build_unsealed_response(state: &RunState, seal_error: &LexgenError) -> RunResponse {
    RunResponse {
        run_id: state.run_id,
        status: RunStatus::Failed,
        final_text: None,
        document_type: state.document_type.clone(),
        context: context_summary(state),
        external_sources: external_sources(state),
        duration_ms: state.elapsed_ms(Utc::now()),
        iterations: state.iterations,
        cost: state.cost_accrued,
        error: Some(RunError {
            code: seal_error.code().to_string(),
            reason: seal_error.to_string(),
        }),
    }
}
