//! The run supervisor: owns the state, routes agent turns, enforces
//! budgets and policy checkpoints, and seals the audit record.

use crate::response::{build_response, build_unsealed_response, RunOutcome};
use crate::routing::{route, NextStep};
use chrono::Utc;
use lexgen_agents::{AgentOutcome, AgentRuntime};
use lexgen_audit::AuditRecorder;
use lexgen_core::{
    AgentKind, BudgetError, CancelToken, Checkpoint, EngineConfig, EntityIdType, LexgenError,
    LexgenResult, PolicyAction, PolicyError, RetrievalError, RetrievalRecord, RunState,
    RunStatus, ToolError, TurnId, TurnRecord, ANNOTATION_RETRIEVAL_ERROR,
};
use lexgen_policy::{EvaluationContext, PiiGate, PolicyEngine};
use lexgen_tools::ToolRegistry;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Drives one run from `pending` to a terminal status.
pub struct Supervisor {
    policy: PolicyEngine,
    tools: Arc<ToolRegistry>,
    agents: Arc<AgentRuntime>,
    recorder: Arc<AuditRecorder>,
    config: EngineConfig,
}

impl Supervisor {
    pub fn new(
        tools: Arc<ToolRegistry>,
        agents: Arc<AgentRuntime>,
        recorder: Arc<AuditRecorder>,
        config: EngineConfig,
    ) -> Self {
        Self {
            policy: PolicyEngine::new(),
            tools,
            agents,
            recorder,
            config,
        }
    }

    /// Drive the run to termination. Always seals an audit record except
    /// when the audit write itself fails, in which case the run is
    /// failed and no document is returned.
    #[instrument(skip(self, state, cancel), fields(run_id = %state.run_id, tenant = %state.tenant_id))]
    pub async fn run(&self, mut state: RunState, cancel: CancelToken) -> RunOutcome {
        state.status = RunStatus::Running;
        info!(task = state.task.as_db_str(), "run started");

        if let Err(e) = self.checkpoint(&mut state, Checkpoint::OnIngest) {
            return self.terminate(state, RunStatus::Failed, Some(e)).await;
        }

        loop {
            if cancel.is_cancelled() {
                return self
                    .terminate(state, RunStatus::Cancelled, Some(LexgenError::Cancelled))
                    .await;
            }

            // The three budgets are enforced independently.
            if state.iterations >= state.budget.max_iterations {
                let reason = BudgetError::IterationsExhausted {
                    limit: state.budget.max_iterations,
                };
                return self.budget_exhausted(state, &cancel, reason).await;
            }
            if state.elapsed_ms(Utc::now()) >= state.budget.deadline_ms {
                let reason = BudgetError::DeadlineExceeded {
                    deadline_ms: state.budget.deadline_ms,
                };
                return self.budget_exhausted(state, &cancel, reason).await;
            }
            if state.cost_accrued >= state.budget.cost_ceiling {
                let reason = BudgetError::CostCeilingExceeded {
                    ceiling: state.budget.cost_ceiling.to_string(),
                };
                return self.budget_exhausted(state, &cancel, reason).await;
            }

            match route(&state) {
                NextStep::Finish => {
                    return self
                        .terminate_with_emission(state, RunStatus::Succeeded, None)
                        .await;
                }
                NextStep::Retrieve => {
                    if let Err(e) = self.do_retrieve(&mut state, &cancel).await {
                        let status = if matches!(e, LexgenError::Cancelled) {
                            RunStatus::Cancelled
                        } else {
                            RunStatus::Failed
                        };
                        return self.terminate(state, status, Some(e)).await;
                    }
                }
                NextStep::Agent(kind) => {
                    if let Err(e) = self.agent_turn(&mut state, kind, &cancel).await {
                        match e {
                            LexgenError::Cancelled => {
                                return self
                                    .terminate(state, RunStatus::Cancelled, Some(e))
                                    .await;
                            }
                            LexgenError::Budget(reason) => {
                                return self.budget_exhausted(state, &cancel, reason).await;
                            }
                            other => {
                                return self
                                    .terminate(state, RunStatus::Failed, Some(other))
                                    .await;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Evaluate the tenant policy at a checkpoint and apply the decision.
    /// Deny and require-human-review terminate the run; redact rewrites
    /// the working text in place; annotate accumulates notes.
    fn checkpoint(&self, state: &mut RunState, checkpoint: Checkpoint) -> LexgenResult<()> {
        let ctx = EvaluationContext::from_state(state);
        let decision = self.policy.evaluate(&state.policy_snapshot, checkpoint, &ctx);
        state.annotations.extend(decision.annotations.iter().cloned());

        match decision.action {
            PolicyAction::Deny | PolicyAction::RequireHumanReview => {
                let rule_id = decision
                    .rule_id
                    .unwrap_or_else(|| "unidentified-rule".to_string());
                let reason = decision.reason.unwrap_or_else(|| {
                    if decision.action == PolicyAction::RequireHumanReview {
                        "human review required".to_string()
                    } else {
                        "denied by tenant policy".to_string()
                    }
                });
                warn!(rule = %rule_id, checkpoint = checkpoint.as_db_str(), "policy denied run");
                Err(LexgenError::Policy(PolicyError::Denied {
                    rule_id,
                    checkpoint,
                    reason,
                }))
            }
            PolicyAction::Redact => {
                self.apply_redaction(state);
                Ok(())
            }
            PolicyAction::Annotate | PolicyAction::Allow => Ok(()),
        }
    }

    /// Re-run the PII gate over the working text after a redact decision.
    fn apply_redaction(&self, state: &mut RunState) {
        let gate = PiiGate::new(state.config.pii_strategy);
        if let Some(draft) = state.working.draft.as_mut() {
            let (redacted, detections) = gate.process(&draft.value);
            if !detections.is_empty() {
                draft.value = redacted;
                state.pii_report.extend(detections);
            }
        }
        if let Some(formatted) = state.working.formatted.as_mut() {
            let (redacted, detections) = gate.process(&formatted.value);
            if !detections.is_empty() {
                formatted.value = redacted;
                state.pii_report.extend(detections);
            }
        }
    }

    /// Invoke a registry tool, retrying recoverable failures.
    async fn invoke_tool(
        &self,
        name: &str,
        args: Value,
        cancel: &CancelToken,
    ) -> LexgenResult<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            cancel.check()?;
            match self.tools.invoke(name, args.clone(), cancel).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_recoverable() && attempt < self.config.retry.max_attempts => {
                    warn!(tool = name, attempt, error = %e, "recoverable tool error, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(
                        self.config.retry.initial_backoff_ms.max(1) as u64,
                    ))
                    .await;
                }
                Err(e) => return Err(LexgenError::Tool(e)),
            }
        }
    }

    /// Supervisor-driven context retrieval via the `retrieve` tool.
    async fn do_retrieve(&self, state: &mut RunState, cancel: &CancelToken) -> LexgenResult<()> {
        self.checkpoint(state, Checkpoint::BeforeRetrieval)?;
        state.status = RunStatus::AwaitingTool;

        let args = json!({
            "tenant_id": state.tenant_id.as_str(),
            "query": state.redacted_query.clone(),
            "k": state.config.k_total,
            "use_internal": state.config.use_internal_rag,
            "personalise": state.config.enable_personalisation,
            "alpha": state.config.personalisation_alpha,
            "external_documents": state.external_documents.clone(),
        });
        let value = self.invoke_tool("retrieve", args, cancel).await?;
        cancel.check()?;

        let record: RetrievalRecord =
            serde_json::from_value(value).map_err(|e| ToolError::Failed {
                tool: "retrieve".to_string(),
                reason: format!("malformed retrieval record: {}", e),
                recoverable: false,
            })?;
        let all_legs_failed = record
            .annotations
            .iter()
            .any(|a| a == ANNOTATION_RETRIEVAL_ERROR);
        info!(
            hits = record.hits.len(),
            personalisation = record.personalisation_applied,
            "context retrieved"
        );
        state.record_retrieval(record);
        state.status = RunStatus::Running;

        // A full retrieval failure is fatal only when there is no
        // caller-supplied material to proceed on.
        if all_legs_failed && state.external_documents.is_empty() {
            return Err(LexgenError::Retrieval(RetrievalError::AllLegsFailed));
        }
        Ok(())
    }

    /// Jurisprudence enrichment for the researcher: court decisions with
    /// formatted citations appended to the retrieval context.
    async fn researcher_context(
        &self,
        state: &mut RunState,
        cancel: &CancelToken,
    ) -> LexgenResult<Option<String>> {
        let value = self
            .invoke_tool(
                "jurisprudence_search",
                json!({"query": state.redacted_query.clone(), "limit": 3}),
                cancel,
            )
            .await?;
        let cases = value["cases"].as_array().cloned().unwrap_or_default();
        if cases.is_empty() {
            return Ok(None);
        }

        let mut lines: Vec<String> = state
            .latest_retrieval()
            .map(|record| {
                record
                    .hits
                    .iter()
                    .take(5)
                    .map(|h| format!("[{}] {}", h.source_id, h.excerpt))
                    .collect()
            })
            .unwrap_or_default();

        for case in &cases {
            let case_id = case["case_id"].as_str().unwrap_or_default().to_string();
            let citation = self
                .invoke_tool(
                    "format_citation",
                    json!({
                        "court": case["court"].clone(),
                        "case_number": case_id.clone(),
                        "year": case["year"].clone(),
                    }),
                    cancel,
                )
                .await?;
            lines.push(format!(
                "[{}] {} ({})",
                case_id,
                case["summary"].as_str().unwrap_or_default(),
                citation["citation"].as_str().unwrap_or_default()
            ));
            state.consume_sources([case_id]);
        }
        Ok(Some(lines.join("\n")))
    }

    /// One agent turn: pre-step tool calls, the model call, and the
    /// working-set write-back.
    async fn agent_turn(
        &self,
        state: &mut RunState,
        kind: AgentKind,
        cancel: &CancelToken,
    ) -> LexgenResult<()> {
        self.checkpoint(state, Checkpoint::BeforeModelCall)?;

        let mut extras: Vec<(String, String)> = Vec::new();
        match kind {
            AgentKind::Researcher => {
                self.do_retrieve(state, cancel).await?;
                if let Some(context) = self.researcher_context(state, cancel).await? {
                    extras.push(("context".to_string(), context));
                }
            }
            AgentKind::Critic => {
                if let Some(draft_text) = state.working.draft.as_ref().map(|d| d.value.clone()) {
                    state.status = RunStatus::AwaitingTool;
                    let quality = self
                        .invoke_tool("quality_score", json!({"text": draft_text}), cancel)
                        .await?;
                    extras.push(("quality".to_string(), quality.to_string()));
                }
            }
            AgentKind::Formatter => {
                if let Some(findings) = state.working.findings.as_ref() {
                    if !findings.value.is_empty() {
                        let citations = findings
                            .value
                            .iter()
                            .map(|f| format!("[{}] {}", f.source_id, f.statement))
                            .collect::<Vec<_>>()
                            .join("\n");
                        extras.push(("citations".to_string(), citations));
                    }
                }
            }
            AgentKind::Analyser | AgentKind::Drafter => {}
        }

        state.status = RunStatus::AwaitingModel;
        let remaining = state.budget.deadline_ms - state.elapsed_ms(Utc::now());
        let result = self
            .agents
            .execute_turn(
                state,
                kind,
                &extras,
                remaining,
                self.config.per_turn_timeout_ms,
                cancel,
            )
            .await;

        match result {
            Ok(output) => {
                state.record_turn(output.record);
                state.iterations += 1;
                apply_outcome(state, kind, output.outcome);
                state.status = RunStatus::Running;
                Ok(())
            }
            Err(e) => {
                state.record_turn(failed_turn(self.agents.model_for(state, kind), kind, &e));
                Err(e)
            }
        }
    }

    /// A budget breach invokes the formatter one last time on the best
    /// available draft; the rescue pass records a turn but does not count
    /// as an iteration.
    async fn budget_exhausted(
        &self,
        mut state: RunState,
        cancel: &CancelToken,
        reason: BudgetError,
    ) -> RunOutcome {
        warn!(reason = %reason, "budget exhausted");
        let error = LexgenError::Budget(reason);

        if state.working.draft.is_some()
            && state.working.formatted.is_none()
            && !cancel.is_cancelled()
        {
            let rescue = self
                .agents
                .execute_turn(
                    &state,
                    AgentKind::Formatter,
                    &[],
                    self.config.per_turn_timeout_ms,
                    self.config.per_turn_timeout_ms,
                    cancel,
                )
                .await;
            match rescue {
                Ok(output) => {
                    state.record_turn(output.record);
                    if let AgentOutcome::Formatted(text) = output.outcome {
                        state.working.set_formatted(text, AgentKind::Formatter);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "best-effort formatter pass failed; emitting raw draft")
                }
            }
        }

        self.terminate_with_emission(state, RunStatus::BudgetExhausted, Some(error))
            .await
    }

    /// Final policy gates before any text leaves the boundary, then seal.
    async fn terminate_with_emission(
        &self,
        mut state: RunState,
        status: RunStatus,
        error: Option<LexgenError>,
    ) -> RunOutcome {
        for checkpoint in [Checkpoint::BeforeEmit, Checkpoint::OnExport] {
            if let Err(e) = self.checkpoint(&mut state, checkpoint) {
                return self.terminate(state, RunStatus::Failed, Some(e)).await;
            }
        }
        self.terminate(state, status, error).await
    }

    /// Set the terminal status and seal the audit record. A failed seal
    /// converts the run to `failed` and withholds the document.
    async fn terminate(
        &self,
        mut state: RunState,
        status: RunStatus,
        error: Option<LexgenError>,
    ) -> RunOutcome {
        state.status = status;
        match self.recorder.seal(&state, error.as_ref()).await {
            Ok(audit) => {
                info!(status = status.as_db_str(), "run terminated");
                RunOutcome {
                    response: build_response(&state, error.as_ref()),
                    audit: Some(audit),
                }
            }
            Err(seal_error) => {
                error!(error = %seal_error, "audit seal failed; run failed");
                state.status = RunStatus::Failed;
                RunOutcome {
                    response: build_unsealed_response(&state, &seal_error),
                    audit: None,
                }
            }
        }
    }
}

fn apply_outcome(state: &mut RunState, kind: AgentKind, outcome: AgentOutcome) {
    match outcome {
        AgentOutcome::Analysis(analysis) => state.working.set_analysis(analysis, kind),
        AgentOutcome::Findings(findings) => state.working.set_findings(findings, kind),
        AgentOutcome::Draft(draft) => state.working.set_draft(draft, kind),
        AgentOutcome::Verdicts(verdicts) => state.working.set_verdicts(verdicts, kind),
        AgentOutcome::Formatted(text) => state.working.set_formatted(text, kind),
    }
}

fn failed_turn(model_id: String, kind: AgentKind, error: &LexgenError) -> TurnRecord {
    TurnRecord {
        turn_id: TurnId::now_v7(),
        agent: kind,
        model_id,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
        summary: "turn failed".to_string(),
        input_preview: String::new(),
        cost: Decimal::ZERO,
        error: Some(error.to_string()),
        started_at: Utc::now(),
    }
}
