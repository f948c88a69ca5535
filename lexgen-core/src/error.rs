//! Error types for LEXGEN operations
//!
//! Failures propagate as tagged values, never as bare strings. Each
//! domain has its own error enum; `LexgenError` folds them together and
//! maps every variant onto the stable taxonomy (`ErrorKind`) that crosses
//! the executor boundary as a machine-readable code.

use crate::{AgentKind, Checkpoint, RetrievalLeg, RunId};
use thiserror::Error;

/// Ingress validation errors. Surfaced to the caller; no audit record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Query length {len} exceeds the {max} byte limit")]
    QueryTooLong { len: usize, max: usize },

    #[error("External document list has {count} entries, limit is {max}")]
    TooManyDocuments { count: usize, max: usize },

    #[error("External document '{source_id}' has {len} bytes, limit is {max}")]
    DocumentTooLarge {
        source_id: String,
        len: usize,
        max: usize,
    },

    #[error("Aggregate external document size {len} exceeds the {max} byte limit")]
    AggregateTooLarge { len: usize, max: usize },

    #[error("Duplicate external source id '{source_id}'")]
    DuplicateSourceId { source_id: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Submission queue is full")]
    QueueFull,
}

/// Policy gate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Policy rule {rule_id} denied at {}", checkpoint.as_db_str())]
    Denied {
        rule_id: String,
        checkpoint: Checkpoint,
        reason: String,
    },
}

/// Retrieval federation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("Retrieval leg {} failed: {reason}", leg.as_db_str())]
    LegFailed { leg: RetrievalLeg, reason: String },

    #[error("All retrieval legs failed")]
    AllLegsFailed,

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: i32, got: i32 },
}

/// Tool invocation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not registered: {name}")]
    NotFound { name: String },

    #[error("Invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool {tool} failed: {reason}")]
    Failed {
        tool: String,
        reason: String,
        recoverable: bool,
    },
}

impl ToolError {
    /// Whether the caller may retry this invocation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Failed { recoverable: true, .. })
    }
}

/// Model call errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("No completion provider configured for model {model}")]
    NotConfigured { model: String },

    #[error("Model {model} timed out after {timeout_ms}ms")]
    Timeout { model: String, timeout_ms: i64 },

    #[error("Rate limited by {model}, retry after {retry_after_ms}ms")]
    RateLimited { model: String, retry_after_ms: i64 },

    #[error("Transport failure calling {model}: {reason}")]
    Transport { model: String, reason: String },

    #[error("Model {model} blocked the request content")]
    ContentBlocked { model: String },

    #[error("Authentication rejected by provider for model {model}")]
    AuthRejected { model: String },

    #[error("Failed to parse {} output: {reason}", agent.as_db_str())]
    ParseFailure { agent: AgentKind, reason: String },
}

impl ModelError {
    /// Transient errors are retried with backoff and jitter.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Transport { .. }
        )
    }
}

/// Budget enforcement errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BudgetError {
    #[error("Iteration budget exhausted at {limit}")]
    IterationsExhausted { limit: i32 },

    #[error("Wall-clock deadline of {deadline_ms}ms exceeded")]
    DeadlineExceeded { deadline_ms: i64 },

    #[error("Monetary ceiling of {ceiling} exceeded")]
    CostCeilingExceeded { ceiling: String },
}

/// Audit and feedback store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("Audit write failed for run {run_id}: {reason}")]
    WriteFailed { run_id: RunId, reason: String },

    #[error("No audit record for run {run_id}")]
    NotFound { run_id: RunId },

    #[error("Run {run_id} has not terminated; feedback rejected")]
    RunNotTerminated { run_id: RunId },
}

/// Master error type for all LEXGEN errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexgenError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Budget error: {0}")]
    Budget(#[from] BudgetError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Run was cancelled")]
    Cancelled,
}

/// Result type alias for LEXGEN operations.
pub type LexgenResult<T> = Result<T, LexgenError>;

// ============================================================================
// ERROR TAXONOMY
// ============================================================================

/// The stable failure taxonomy that crosses the executor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputInvalid,
    PolicyDeny,
    RetrievalDegraded,
    RetrievalFailed,
    ToolRecoverable,
    ToolFatal,
    ModelTransient,
    ModelFatal,
    ParseFailure,
    BudgetExhausted,
    Cancelled,
    AuditWriteFailed,
}

impl ErrorKind {
    /// Short machine-readable code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputInvalid => "input_invalid",
            Self::PolicyDeny => "policy_deny",
            Self::RetrievalDegraded => "retrieval_degraded",
            Self::RetrievalFailed => "retrieval_failed",
            Self::ToolRecoverable => "tool_recoverable",
            Self::ToolFatal => "tool_fatal",
            Self::ModelTransient => "model_transient",
            Self::ModelFatal => "model_fatal",
            Self::ParseFailure => "parse_failure",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
            Self::AuditWriteFailed => "audit_write_failed",
        }
    }
}

impl LexgenError {
    /// Map this error onto the stable taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InputInvalid,
            Self::Policy(PolicyError::Denied { .. }) => ErrorKind::PolicyDeny,
            Self::Retrieval(RetrievalError::LegFailed { .. }) => ErrorKind::RetrievalDegraded,
            Self::Retrieval(_) => ErrorKind::RetrievalFailed,
            Self::Tool(e) if e.is_recoverable() => ErrorKind::ToolRecoverable,
            Self::Tool(_) => ErrorKind::ToolFatal,
            Self::Model(ModelError::ParseFailure { .. }) => ErrorKind::ParseFailure,
            Self::Model(e) if e.is_transient() => ErrorKind::ModelTransient,
            Self::Model(_) => ErrorKind::ModelFatal,
            Self::Budget(_) => ErrorKind::BudgetExhausted,
            // Feedback preconditions are caller mistakes, not audit faults.
            Self::Audit(AuditError::WriteFailed { .. }) => ErrorKind::AuditWriteFailed,
            Self::Audit(_) => ErrorKind::InputInvalid,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Short machine-readable code surfaced to callers.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Whether the failed operation may be retried in place.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ToolRecoverable | ErrorKind::ModelTransient | ErrorKind::RetrievalDegraded
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
