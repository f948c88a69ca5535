//! Entity structs for LEXGEN runs, retrieval, policy, audit and feedback.

use crate::{
    AgentKind, Checkpoint, CriticDisposition, DetectionId, FeedbackId, OriginTag, PiiKind,
    PolicyAction, PolicyId, PolicyKind, RedactionStrategy, RetrievalLeg, RunConfig, RunId,
    RunStatus, SourceId, TaskKind, TenantId, Timestamp, TurnId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ============================================================================
// EXTERNAL DOCUMENTS
// ============================================================================

/// Caller-supplied document, immutable once accepted at ingress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalDocument {
    /// Unique within the request.
    pub source_id: SourceId,
    /// Plain text content. The ingress gate stores the redacted view;
    /// original sensitive spans never travel past the edge.
    pub text: String,
    /// Arbitrary caller metadata.
    pub metadata: HashMap<String, String>,
}

impl ExternalDocument {
    pub fn new(source_id: impl Into<SourceId>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// RETRIEVAL RECORDS
// ============================================================================

/// One ranked hit in a fused retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub source_id: SourceId,
    /// Text excerpt used downstream for prompt assembly.
    pub excerpt: String,
    pub origin: OriginTag,
    /// Raw semantic score, when the semantic leg saw this source.
    pub semantic_score: Option<f32>,
    /// Raw lexical score, when the lexical leg saw this source.
    pub lexical_score: Option<f32>,
    /// Reciprocal-rank fused score across legs.
    pub fused_score: f32,
    /// Final rank after fusion, dedup and truncation (1-based).
    pub rank: i32,
    /// Semantic score against the personalisation-shifted query, if the
    /// shift was applied.
    pub personalised_score: Option<f32>,
}

/// Outcome of a single retrieval leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegReport {
    pub leg: RetrievalLeg,
    pub succeeded: bool,
    pub hit_count: i32,
    pub error: Option<String>,
}

/// Annotation recorded when personalisation was requested but skipped.
pub const ANNOTATION_PERSONALISATION_SKIPPED: &str = "personalisation_skipped";
/// Annotation recorded when k_total was clamped to the hard ceiling.
pub const ANNOTATION_K_CLAMPED: &str = "k_clamped";
/// Annotation recorded when at least one leg failed but results exist.
pub const ANNOTATION_RETRIEVAL_DEGRADED: &str = "retrieval_degraded";
/// Annotation recorded when every leg failed.
pub const ANNOTATION_RETRIEVAL_ERROR: &str = "retrieval_error";

/// Record of one retrieval call: the query, fusion parameters, per-leg
/// outcomes and the final ranked hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub query: String,
    /// Thematic tag inferred for centroid selection, if any.
    pub theme: Option<String>,
    /// k requested by the caller (pre-clamp).
    pub requested_k: i32,
    /// k actually used after clamping.
    pub effective_k: i32,
    pub k_rrf: f32,
    pub personalisation_applied: bool,
    pub alpha: f32,
    pub legs: Vec<LegReport>,
    pub annotations: Vec<String>,
    pub hits: Vec<RetrievalHit>,
}

impl RetrievalRecord {
    /// Source ids of the returned hits, in rank order.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.hits.iter().map(|h| h.source_id.clone()).collect()
    }

    /// Count of hits with the given origin (counting `Both` for either).
    pub fn count_origin(&self, origin: OriginTag) -> usize {
        self.hits
            .iter()
            .filter(|h| h.origin == origin || h.origin == OriginTag::Both)
            .count()
    }
}

// ============================================================================
// TURN RECORDS
// ============================================================================

/// One agent invocation and its recorded outcome within a run's trace.
/// Turn records are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_id: TurnId,
    pub agent: AgentKind,
    pub model_id: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub duration_ms: i64,
    /// Short result summary for the forensic trace.
    pub summary: String,
    /// Leading slice of the (redacted) model input, kept for audit.
    pub input_preview: String,
    /// Itemised cost of this turn in the fixed currency.
    pub cost: Decimal,
    pub error: Option<String>,
    pub started_at: Timestamp,
}

// ============================================================================
// WORKING SET
// ============================================================================

/// A working-set slot value together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    /// Agent that last wrote this slot.
    pub written_by: AgentKind,
    /// Monotonic per-slot version counter, starting at 1.
    pub version: i32,
}

/// Structured output of the analyser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// Whether the task needs context beyond what the caller supplied.
    pub needs_external_info: bool,
    /// Thematic tags inferred for the task.
    pub themes: Vec<String>,
    /// Proposed document outline.
    pub outline: Vec<String>,
}

/// One research finding extracted from retrieved context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchFinding {
    pub source_id: SourceId,
    pub statement: String,
    pub relevance: f32,
}

/// One critic judgement over an aspect of the draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticVerdict {
    pub aspect: String,
    pub disposition: CriticDisposition,
    pub rationale: String,
}

/// The evolving outputs of the run, one slot per agent product.
/// Slots carry the writing agent and a monotonic version counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkingSet {
    pub analysis: Option<Versioned<DocumentAnalysis>>,
    pub findings: Option<Versioned<Vec<ResearchFinding>>>,
    pub draft: Option<Versioned<String>>,
    pub verdicts: Option<Versioned<Vec<CriticVerdict>>>,
    pub formatted: Option<Versioned<String>>,
}

impl WorkingSet {
    fn next_version<T>(slot: &Option<Versioned<T>>) -> i32 {
        slot.as_ref().map(|v| v.version + 1).unwrap_or(1)
    }

    pub fn set_analysis(&mut self, value: DocumentAnalysis, by: AgentKind) {
        self.analysis = Some(Versioned {
            version: Self::next_version(&self.analysis),
            value,
            written_by: by,
        });
    }

    pub fn set_findings(&mut self, value: Vec<ResearchFinding>, by: AgentKind) {
        self.findings = Some(Versioned {
            version: Self::next_version(&self.findings),
            value,
            written_by: by,
        });
    }

    pub fn set_draft(&mut self, value: String, by: AgentKind) {
        self.draft = Some(Versioned {
            version: Self::next_version(&self.draft),
            value,
            written_by: by,
        });
    }

    /// The latest verdict list is authoritative; earlier verdicts are
    /// replaced, not merged.
    pub fn set_verdicts(&mut self, value: Vec<CriticVerdict>, by: AgentKind) {
        self.verdicts = Some(Versioned {
            version: Self::next_version(&self.verdicts),
            value,
            written_by: by,
        });
    }

    pub fn set_formatted(&mut self, value: String, by: AgentKind) {
        self.formatted = Some(Versioned {
            version: Self::next_version(&self.formatted),
            value,
            written_by: by,
        });
    }

    /// Number of draft versions written so far.
    pub fn draft_versions(&self) -> i32 {
        self.draft.as_ref().map(|d| d.version).unwrap_or(0)
    }

    /// Whether the newest verdict list accepts the draft.
    pub fn latest_verdict_accepts(&self) -> Option<bool> {
        self.verdicts.as_ref().map(|v| {
            v.value
                .iter()
                .all(|j| j.disposition == CriticDisposition::Accept)
        })
    }

    /// Whether the newest verdict list is for the newest draft.
    pub fn verdict_covers_current_draft(&self) -> bool {
        match (&self.draft, &self.verdicts) {
            (Some(d), Some(v)) => v.version >= d.version,
            _ => false,
        }
    }
}

// ============================================================================
// PII REPORT
// ============================================================================

/// One sensitive span detected on a processed string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiDetection {
    pub detection_id: DetectionId,
    pub kind: PiiKind,
    /// Byte offsets relative to the processed string.
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
    /// Result of verifier-digit arithmetic, for kinds that carry it.
    pub verifier_valid: Option<bool>,
    pub strategy: RedactionStrategy,
    /// The replacement written into the redacted view.
    pub replacement: String,
}

/// Aggregated PII detections observed on any processed string of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PiiReport {
    pub detections: Vec<PiiDetection>,
}

impl PiiReport {
    pub fn extend(&mut self, detections: Vec<PiiDetection>) {
        self.detections.extend(detections);
    }

    pub fn count_kind(&self, kind: PiiKind) -> usize {
        self.detections.iter().filter(|d| d.kind == kind).count()
    }

    /// Distinct kinds present in the report, sorted.
    pub fn kinds(&self) -> Vec<PiiKind> {
        let mut kinds: Vec<PiiKind> = self.detections.iter().map(|d| d.kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

// ============================================================================
// POLICY
// ============================================================================

/// Comparison operator inside a rule predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Contains,
    In,
}

/// Data-driven predicate over the evaluation context: a field name, an
/// operator and a comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePredicate {
    pub field: String,
    pub op: PredicateOp,
    pub value: serde_json::Value,
}

impl RulePredicate {
    pub fn new(field: impl Into<String>, op: PredicateOp, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, PredicateOp::Eq, value)
    }
}

/// One policy rule: all predicates must hold for the action to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Stable rule identifier, surfaced on deny.
    pub rule_id: String,
    /// Checkpoints at which this rule is considered. Empty = all.
    pub checkpoints: Vec<Checkpoint>,
    pub predicates: Vec<RulePredicate>,
    pub action: PolicyAction,
    /// Free-text note attached on annotate/deny decisions.
    pub note: Option<String>,
}

/// A versioned tenant policy, immutable per version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: PolicyId,
    pub tenant_id: TenantId,
    pub version: i32,
    pub kind: PolicyKind,
    /// Ordered rule list; order is preserved for audit display, the
    /// decision lattice decides conflicts.
    pub rules: Vec<PolicyRule>,
    pub effective_from: Timestamp,
}

/// Immutable copy of a tenant's effective policy set captured at run
/// start. Policy edits made mid-run never retroactively apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub tenant_id: TenantId,
    /// Version of the tenant policy set this snapshot was taken from.
    pub version: i32,
    pub policies: Vec<Policy>,
    pub captured_at: Timestamp,
}

impl PolicySnapshot {
    /// Empty snapshot for tenants with no published policies.
    pub fn empty(tenant_id: TenantId, captured_at: Timestamp) -> Self {
        Self {
            tenant_id,
            version: 0,
            policies: Vec::new(),
            captured_at,
        }
    }
}

// ============================================================================
// BUDGET
// ============================================================================

/// The three independently enforced run budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub max_iterations: i32,
    pub deadline_ms: i64,
    /// Monetary ceiling in the fixed currency, six decimal places.
    pub cost_ceiling: Decimal,
}

// ============================================================================
// RUN STATE
// ============================================================================

/// Mutable state of one in-flight run.
///
/// Exclusively owned by the executor driving the run; subsystems return
/// values and never mutate this directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    // Identity
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
    pub task: TaskKind,
    pub document_type: Option<String>,
    pub started_at: Timestamp,

    // Inputs, immutable after creation
    pub query: String,
    pub external_documents: Vec<ExternalDocument>,
    pub config: RunConfig,

    // PII-redacted view of the query, used for all prompt assembly
    pub redacted_query: String,

    // Working set
    pub working: WorkingSet,

    // Trace, append-only
    pub trace: Vec<TurnRecord>,

    // Retrieval records, one per retrieval call
    pub retrievals: Vec<RetrievalRecord>,

    // Policy snapshot captured at run start
    pub policy_snapshot: PolicySnapshot,

    // PII detections across all processed strings
    pub pii_report: PiiReport,

    // Budgets
    pub budget: Budget,

    // Progress
    pub status: RunStatus,
    pub iterations: i32,
    pub cost_accrued: Decimal,
    /// Source ids consumed by any tool call, deduplicated.
    pub sources_consumed: BTreeSet<SourceId>,
    /// Policy annotations accumulated across checkpoints.
    pub annotations: Vec<String>,
}

impl RunState {
    /// Append a turn record to the trace. The trace is append-only; the
    /// ith turn's output is visible only to later turns.
    pub fn record_turn(&mut self, turn: TurnRecord) {
        self.cost_accrued += turn.cost;
        self.trace.push(turn);
    }

    /// Record a retrieval call and mark its hit ids as consumed.
    pub fn record_retrieval(&mut self, record: RetrievalRecord) {
        for id in record.source_ids() {
            self.sources_consumed.insert(id);
        }
        self.retrievals.push(record);
    }

    /// Mark additional source ids as consumed by a tool call.
    pub fn consume_sources<I: IntoIterator<Item = SourceId>>(&mut self, ids: I) {
        self.sources_consumed.extend(ids);
    }

    /// The best text available for emission: formatter output if present,
    /// otherwise the newest draft.
    pub fn best_text(&self) -> Option<&str> {
        self.working
            .formatted
            .as_ref()
            .map(|f| f.value.as_str())
            .or_else(|| self.working.draft.as_ref().map(|d| d.value.as_str()))
    }

    /// Total input tokens across the trace.
    pub fn total_input_tokens(&self) -> i64 {
        self.trace.iter().map(|t| t.input_tokens).sum()
    }

    /// Total output tokens across the trace.
    pub fn total_output_tokens(&self) -> i64 {
        self.trace.iter().map(|t| t.output_tokens).sum()
    }

    /// Elapsed wall-clock milliseconds since the run started.
    pub fn elapsed_ms(&self, now: Timestamp) -> i64 {
        (now - self.started_at).num_milliseconds()
    }

    /// The newest retrieval record, if any retrieval has happened.
    pub fn latest_retrieval(&self) -> Option<&RetrievalRecord> {
        self.retrievals.last()
    }
}

// ============================================================================
// AUDIT RECORD
// ============================================================================

/// Immutable forensic record sealed once per terminated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
    pub task: TaskKind,
    pub document_type: Option<String>,
    pub started_at: Timestamp,
    pub completed_at: Timestamp,

    /// SHA-256 lowercase hex over the canonical input form.
    pub input_hash: String,
    /// SHA-256 lowercase hex over the final text.
    pub output_hash: String,
    /// SHA-256 lowercase hex over the sorted unique consumed source ids.
    pub context_hash: String,

    pub trace: Vec<TurnRecord>,
    pub policy_snapshot: PolicySnapshot,
    pub pii_report: PiiReport,
    /// Sorted unique source ids consumed by any tool call.
    pub sources_used: Vec<SourceId>,

    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: Decimal,
    pub duration_ms: i64,

    pub status: RunStatus,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_cause: Option<String>,
}

/// Append-only log entry recording a read of an audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub run_id: RunId,
    pub reader_id: String,
    pub reason: String,
    pub at: Timestamp,
}

// ============================================================================
// FEEDBACK
// ============================================================================

/// Offset range flagged as erroneous by a rater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub correction_hint: Option<String>,
}

/// A source the rater believes the run should have cited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSourceHint {
    /// Raw citation string as given by the rater.
    pub citation: String,
    pub classification: String,
    pub relevance: f32,
}

/// Structured correction attached to a completed run. Immutable and
/// additive; feedback never modifies the audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub feedback_id: FeedbackId,
    pub run_id: RunId,
    pub rater_id: String,
    /// One of -1, 0, +1.
    pub rating: i8,
    pub comment: Option<String>,
    pub error_spans: Vec<ErrorSpan>,
    pub missing_sources: Vec<MissingSourceHint>,
    pub edited_text: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Timestamp,
}

/// Aggregate over all feedback events for one run. Depends only on the
/// event multiset, so aggregation is commutative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub run_id: RunId,
    pub event_count: usize,
    pub mean_rating: f64,
    pub total_error_spans: usize,
    pub distinct_missing_sources: usize,
    pub tag_counts: BTreeMap<String, usize>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;
    use chrono::Utc;

    fn analysis() -> DocumentAnalysis {
        DocumentAnalysis {
            needs_external_info: false,
            themes: vec!["contratos".to_string()],
            outline: vec!["Objeto".to_string(), "Obrigações".to_string()],
        }
    }

    #[test]
    fn test_working_set_versions_monotonic() {
        let mut ws = WorkingSet::default();
        ws.set_draft("v1".to_string(), AgentKind::Drafter);
        ws.set_draft("v2".to_string(), AgentKind::Drafter);
        assert_eq!(ws.draft_versions(), 2);
        assert_eq!(ws.draft.as_ref().unwrap().value, "v2");
        assert_eq!(ws.draft.as_ref().unwrap().written_by, AgentKind::Drafter);
    }

    #[test]
    fn test_working_set_latest_verdict_authoritative() {
        let mut ws = WorkingSet::default();
        ws.set_verdicts(
            vec![CriticVerdict {
                aspect: "completeness".to_string(),
                disposition: CriticDisposition::Revise,
                rationale: "missing clause".to_string(),
            }],
            AgentKind::Critic,
        );
        assert_eq!(ws.latest_verdict_accepts(), Some(false));

        ws.set_verdicts(
            vec![CriticVerdict {
                aspect: "completeness".to_string(),
                disposition: CriticDisposition::Accept,
                rationale: "resolved".to_string(),
            }],
            AgentKind::Critic,
        );
        assert_eq!(ws.latest_verdict_accepts(), Some(true));
        assert_eq!(ws.verdicts.as_ref().unwrap().version, 2);
    }

    #[test]
    fn test_verdict_covers_current_draft() {
        let mut ws = WorkingSet::default();
        ws.set_draft("v1".to_string(), AgentKind::Drafter);
        assert!(!ws.verdict_covers_current_draft());
        ws.set_verdicts(Vec::new(), AgentKind::Critic);
        assert!(ws.verdict_covers_current_draft());
        ws.set_draft("v2".to_string(), AgentKind::Drafter);
        assert!(!ws.verdict_covers_current_draft());
    }

    #[test]
    fn test_run_state_best_text_prefers_formatted() {
        let mut state = sample_state();
        assert!(state.best_text().is_none());
        state.working.set_draft("draft".to_string(), AgentKind::Drafter);
        assert_eq!(state.best_text(), Some("draft"));
        state
            .working
            .set_formatted("formatted".to_string(), AgentKind::Formatter);
        assert_eq!(state.best_text(), Some("formatted"));
    }

    #[test]
    fn test_run_state_turns_accrue_cost() {
        let mut state = sample_state();
        state.record_turn(sample_turn(Decimal::new(125_000, 6)));
        state.record_turn(sample_turn(Decimal::new(375_000, 6)));
        assert_eq!(state.cost_accrued, Decimal::new(500_000, 6));
        assert_eq!(state.trace.len(), 2);
    }

    #[test]
    fn test_run_state_consumes_retrieval_sources() {
        let mut state = sample_state();
        state.record_retrieval(RetrievalRecord {
            query: "q".to_string(),
            theme: None,
            requested_k: 5,
            effective_k: 5,
            k_rrf: 60.0,
            personalisation_applied: false,
            alpha: 0.25,
            legs: Vec::new(),
            annotations: Vec::new(),
            hits: vec![hit("doc-b", 1), hit("doc-a", 2)],
        });
        let ids: Vec<_> = state.sources_consumed.iter().cloned().collect();
        // BTreeSet keeps them sorted and unique
        assert_eq!(ids, vec!["doc-a".to_string(), "doc-b".to_string()]);
    }

    #[test]
    fn test_pii_report_kinds_sorted_unique() {
        let mut report = PiiReport::default();
        report.extend(vec![
            detection(PiiKind::Email),
            detection(PiiKind::TaxId),
            detection(PiiKind::Email),
        ]);
        assert_eq!(report.kinds(), vec![PiiKind::TaxId, PiiKind::Email]);
        assert_eq!(report.count_kind(PiiKind::Email), 2);
    }

    #[test]
    fn test_working_set_analysis_slot() {
        let mut ws = WorkingSet::default();
        ws.set_analysis(analysis(), AgentKind::Analyser);
        let slot = ws.analysis.as_ref().unwrap();
        assert_eq!(slot.version, 1);
        assert_eq!(slot.written_by, AgentKind::Analyser);
        assert!(!slot.value.needs_external_info);
    }

    fn sample_state() -> RunState {
        RunState {
            run_id: RunId::now_v7(),
            tenant_id: TenantId::new("T1").unwrap(),
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
            policy_snapshot: PolicySnapshot::empty(TenantId::new("T1").unwrap(), Utc::now()),
            pii_report: PiiReport::default(),
            budget: Budget {
                max_iterations: 10,
                deadline_ms: 300_000,
                cost_ceiling: Decimal::new(5_000_000, 6),
            },
            status: RunStatus::Pending,
            iterations: 0,
            cost_accrued: Decimal::ZERO,
            sources_consumed: BTreeSet::new(),
            annotations: Vec::new(),
        }
    }

    fn sample_turn(cost: Decimal) -> TurnRecord {
        TurnRecord {
            turn_id: TurnId::now_v7(),
            agent: AgentKind::Drafter,
            model_id: "gpt-4o".to_string(),
            input_tokens: 100,
            output_tokens: 50,
            duration_ms: 10,
            summary: "drafted".to_string(),
            input_preview: "Draft a clause".to_string(),
            cost,
            error: None,
            started_at: Utc::now(),
        }
    }

    fn hit(id: &str, rank: i32) -> RetrievalHit {
        RetrievalHit {
            source_id: id.to_string(),
            excerpt: String::new(),
            origin: OriginTag::Internal,
            semantic_score: None,
            lexical_score: None,
            fused_score: 0.0,
            rank,
            personalised_score: None,
        }
    }

    fn detection(kind: PiiKind) -> PiiDetection {
        PiiDetection {
            detection_id: DetectionId::now_v7(),
            kind,
            start: 0,
            end: 1,
            confidence: 0.9,
            verifier_valid: None,
            strategy: RedactionStrategy::Typed,
            replacement: String::new(),
        }
    }
}
