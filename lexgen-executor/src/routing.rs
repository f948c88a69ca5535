//! The routing decision function.
//!
//! Pure over the run state: given identical states it always returns the
//! same next hop, which keeps re-runs with mocked tool and model outputs
//! byte-identical in their routing decisions.

use lexgen_core::{AgentKind, RunState};

/// The executor's next hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Run one agent turn.
    Agent(AgentKind),
    /// Supervisor-driven context retrieval (not an agent turn).
    Retrieve,
    /// Terminate successfully.
    Finish,
}

/// Decide the next hop from the evolving state.
pub fn route(state: &RunState) -> NextStep {
    // No analysis yet: always start with the analyser.
    let Some(analysis) = state.working.analysis.as_ref() else {
        return NextStep::Agent(AgentKind::Analyser);
    };

    // The analyser flagged a need for external information and nothing
    // has been retrieved: the researcher gathers and condenses context.
    if analysis.value.needs_external_info && state.retrievals.is_empty() {
        return NextStep::Agent(AgentKind::Researcher);
    }

    // No context yet and somewhere to get it from (the internal index or
    // caller-supplied documents): the supervisor fetches it directly; no
    // agent turn is spent.
    if state.retrievals.is_empty()
        && (state.config.use_internal_rag || !state.external_documents.is_empty())
    {
        return NextStep::Retrieve;
    }

    // Analysis and context present, no draft yet.
    if state.working.draft.is_none() {
        return NextStep::Agent(AgentKind::Drafter);
    }

    // A draft that the critic has not yet judged.
    if !state.working.verdict_covers_current_draft() {
        return NextStep::Agent(AgentKind::Critic);
    }

    // The latest verdict is authoritative.
    let accepted = state.working.latest_verdict_accepts().unwrap_or(false);
    let revisions_done = state.working.draft_versions() - 1;
    if !accepted && revisions_done < state.config.max_revisions {
        return NextStep::Agent(AgentKind::Drafter);
    }

    // Accepted, or revisions exhausted: format the best draft we have.
    if state.working.formatted.is_none() {
        return NextStep::Agent(AgentKind::Formatter);
    }

    NextStep::Finish
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lexgen_core::{
        Budget, CriticDisposition, CriticVerdict, DocumentAnalysis, EntityIdType, PiiReport,
        PolicySnapshot, RetrievalRecord, RunConfig, RunId, RunStatus, TaskKind, TenantId,
        WorkingSet,
    };
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn state() -> RunState {
        let tenant = TenantId::new("T1").unwrap();
        RunState {
            run_id: RunId::now_v7(),
            tenant_id: tenant.clone(),
            user_id: None,
            task: TaskKind::Draft,
            document_type: None,
            started_at: Utc::now(),
            query: "q".to_string(),
            external_documents: Vec::new(),
            config: RunConfig::default(),
            redacted_query: "q".to_string(),
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
            status: RunStatus::Running,
            iterations: 0,
            cost_accrued: Decimal::ZERO,
            sources_consumed: BTreeSet::new(),
            annotations: Vec::new(),
        }
    }

    fn analysis(needs_external: bool) -> DocumentAnalysis {
        DocumentAnalysis {
            needs_external_info: needs_external,
            themes: Vec::new(),
            outline: Vec::new(),
        }
    }

    fn empty_retrieval() -> RetrievalRecord {
        RetrievalRecord {
            query: "q".to_string(),
            theme: None,
            requested_k: 20,
            effective_k: 20,
            k_rrf: 60.0,
            personalisation_applied: false,
            alpha: 0.25,
            legs: Vec::new(),
            annotations: Vec::new(),
            hits: Vec::new(),
        }
    }

    fn verdict(disposition: CriticDisposition) -> CriticVerdict {
        CriticVerdict {
            aspect: "overall".to_string(),
            disposition,
            rationale: String::new(),
        }
    }

    #[test]
    fn test_fresh_state_routes_to_analyser() {
        assert_eq!(route(&state()), NextStep::Agent(AgentKind::Analyser));
    }

    #[test]
    fn test_needs_external_routes_to_researcher() {
        let mut s = state();
        s.working.set_analysis(analysis(true), AgentKind::Analyser);
        assert_eq!(route(&s), NextStep::Agent(AgentKind::Researcher));
    }

    #[test]
    fn test_internal_rag_routes_to_supervisor_retrieve() {
        let mut s = state();
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        assert_eq!(route(&s), NextStep::Retrieve);
    }

    #[test]
    fn test_no_rag_no_docs_routes_straight_to_drafter() {
        let mut s = state();
        s.config.use_internal_rag = false;
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        assert_eq!(route(&s), NextStep::Agent(AgentKind::Drafter));
    }

    #[test]
    fn test_external_docs_without_rag_still_retrieve() {
        let mut s = state();
        s.config.use_internal_rag = false;
        s.external_documents
            .push(lexgen_core::ExternalDocument::new("doc-1", "texto"));
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        assert_eq!(route(&s), NextStep::Retrieve);
    }

    #[test]
    fn test_context_without_draft_routes_to_drafter() {
        let mut s = state();
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        s.record_retrieval(empty_retrieval());
        assert_eq!(route(&s), NextStep::Agent(AgentKind::Drafter));
    }

    #[test]
    fn test_unjudged_draft_routes_to_critic() {
        let mut s = state();
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        s.record_retrieval(empty_retrieval());
        s.working.set_draft("v1".to_string(), AgentKind::Drafter);
        assert_eq!(route(&s), NextStep::Agent(AgentKind::Critic));
    }

    #[test]
    fn test_revise_verdict_reenters_drafter() {
        let mut s = state();
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        s.record_retrieval(empty_retrieval());
        s.working.set_draft("v1".to_string(), AgentKind::Drafter);
        s.working
            .set_verdicts(vec![verdict(CriticDisposition::Revise)], AgentKind::Critic);
        assert_eq!(route(&s), NextStep::Agent(AgentKind::Drafter));
    }

    #[test]
    fn test_revisions_exhausted_goes_to_formatter() {
        let mut s = state();
        s.config.max_revisions = 1;
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        s.record_retrieval(empty_retrieval());
        s.working.set_draft("v1".to_string(), AgentKind::Drafter);
        s.working
            .set_verdicts(vec![verdict(CriticDisposition::Revise)], AgentKind::Critic);
        s.working.set_draft("v2".to_string(), AgentKind::Drafter);
        s.working
            .set_verdicts(vec![verdict(CriticDisposition::Revise)], AgentKind::Critic);
        // One revision done, limit 1: stop looping and format.
        assert_eq!(route(&s), NextStep::Agent(AgentKind::Formatter));
    }

    #[test]
    fn test_accept_routes_to_formatter_then_finish() {
        let mut s = state();
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        s.record_retrieval(empty_retrieval());
        s.working.set_draft("v1".to_string(), AgentKind::Drafter);
        s.working
            .set_verdicts(vec![verdict(CriticDisposition::Accept)], AgentKind::Critic);
        assert_eq!(route(&s), NextStep::Agent(AgentKind::Formatter));
        s.working
            .set_formatted("final".to_string(), AgentKind::Formatter);
        assert_eq!(route(&s), NextStep::Finish);
    }

    #[test]
    fn test_new_draft_after_verdict_routes_back_to_critic() {
        let mut s = state();
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        s.record_retrieval(empty_retrieval());
        s.working.set_draft("v1".to_string(), AgentKind::Drafter);
        s.working
            .set_verdicts(vec![verdict(CriticDisposition::Revise)], AgentKind::Critic);
        s.working.set_draft("v2".to_string(), AgentKind::Drafter);
        assert_eq!(route(&s), NextStep::Agent(AgentKind::Critic));
    }

    #[test]
    fn test_routing_deterministic() {
        let mut s = state();
        s.working.set_analysis(analysis(false), AgentKind::Analyser);
        assert_eq!(route(&s), route(&s));
    }
}
