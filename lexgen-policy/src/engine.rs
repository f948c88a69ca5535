//! Checkpoint-keyed policy evaluation.
//!
//! Rules are data: (predicate triples, action). Evaluation walks the
//! tenant snapshot, collects every rule whose predicates hold at the
//! checkpoint, and resolves conflicts through the restrictiveness
//! lattice: deny > require-review > redact > annotate > allow.

use lexgen_core::{
    Checkpoint, PiiKind, PolicyAction, PolicySnapshot, PredicateOp, RulePredicate, RunState,
    TaskKind,
};
use serde_json::Value;
use tracing::debug;

// ============================================================================
// EVALUATION CONTEXT
// ============================================================================

/// Snapshot of the facts a rule predicate may reference.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    pub task: Option<TaskKind>,
    pub document_type: Option<String>,
    /// Distinct PII kinds detected so far in the run.
    pub pii_kinds: Vec<PiiKind>,
    pub query_length: usize,
    pub iteration: i32,
    /// Whether caller-supplied documents are present.
    pub has_external_documents: bool,
}

impl EvaluationContext {
    /// Build the context from the current run state.
    pub fn from_state(state: &RunState) -> Self {
        Self {
            task: Some(state.task),
            document_type: state.document_type.clone(),
            pii_kinds: state.pii_report.kinds(),
            query_length: state.query.len(),
            iteration: state.iterations,
            has_external_documents: !state.external_documents.is_empty(),
        }
    }

    /// Look up a predicate field by name.
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "task_kind" => self.task.map(|t| Value::String(t.as_db_str().to_string())),
            "document_type" => self
                .document_type
                .as_ref()
                .map(|d| Value::String(d.clone())),
            "pii_kinds" => Some(Value::Array(
                self.pii_kinds
                    .iter()
                    .map(|k| Value::String(k.as_db_str().to_string()))
                    .collect(),
            )),
            "query_length" => Some(Value::Number(self.query_length.into())),
            "iteration" => Some(Value::Number(self.iteration.into())),
            "has_external_documents" => Some(Value::Bool(self.has_external_documents)),
            _ => None,
        }
    }
}

// ============================================================================
// DECISION
// ============================================================================

/// Resolved decision at a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub action: PolicyAction,
    /// Identifier of the winning rule, absent for the implicit allow.
    pub rule_id: Option<String>,
    pub reason: Option<String>,
    /// Notes from every matching annotate rule, in policy order.
    pub annotations: Vec<String>,
}

impl PolicyDecision {
    /// The implicit decision when no rule matches.
    pub fn allow() -> Self {
        Self {
            action: PolicyAction::Allow,
            rule_id: None,
            reason: None,
            annotations: Vec::new(),
        }
    }

    pub fn is_deny(&self) -> bool {
        matches!(
            self.action,
            PolicyAction::Deny | PolicyAction::RequireHumanReview
        )
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Stateless policy evaluator over immutable snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the snapshot at a checkpoint. The most restrictive
    /// matching action wins; annotate notes accumulate regardless of the
    /// winner.
    pub fn evaluate(
        &self,
        snapshot: &PolicySnapshot,
        checkpoint: Checkpoint,
        ctx: &EvaluationContext,
    ) -> PolicyDecision {
        let mut decision = PolicyDecision::allow();

        for policy in &snapshot.policies {
            for rule in &policy.rules {
                let applies_here =
                    rule.checkpoints.is_empty() || rule.checkpoints.contains(&checkpoint);
                if !applies_here {
                    continue;
                }
                if !rule.predicates.iter().all(|p| predicate_holds(p, ctx)) {
                    continue;
                }

                debug!(
                    rule = %rule.rule_id,
                    action = ?rule.action,
                    checkpoint = checkpoint.as_db_str(),
                    "policy rule matched"
                );

                if rule.action == PolicyAction::Annotate {
                    if let Some(note) = &rule.note {
                        decision.annotations.push(note.clone());
                    }
                }

                if rule.action.restrictiveness() > decision.action.restrictiveness() {
                    decision.action = rule.action;
                    decision.rule_id = Some(rule.rule_id.clone());
                    decision.reason = rule.note.clone();
                }
            }
        }

        decision
    }
}

fn predicate_holds(predicate: &RulePredicate, ctx: &EvaluationContext) -> bool {
    let Some(actual) = ctx.field(&predicate.field) else {
        return false;
    };
    match predicate.op {
        PredicateOp::Eq => actual == predicate.value,
        PredicateOp::Ne => actual != predicate.value,
        PredicateOp::Gt => as_f64(&actual)
            .zip(as_f64(&predicate.value))
            .map(|(a, b)| a > b)
            .unwrap_or(false),
        PredicateOp::Lt => as_f64(&actual)
            .zip(as_f64(&predicate.value))
            .map(|(a, b)| a < b)
            .unwrap_or(false),
        PredicateOp::Contains => match (&actual, &predicate.value) {
            (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
            (Value::Array(items), needle) => items.contains(needle),
            _ => false,
        },
        PredicateOp::In => match &predicate.value {
            Value::Array(options) => options.contains(&actual),
            _ => false,
        },
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

// ============================================================================
// TESTS
// ============================================================================
