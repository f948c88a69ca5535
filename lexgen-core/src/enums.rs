//! Enum types for LEXGEN entities

use serde::{Deserialize, Serialize};

// ============================================================================
// RUN ENUMS
// ============================================================================

/// Kind of task a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Produce a new document from scratch
    Draft,
    /// Review an existing document
    Review,
    /// Summarise supplied material
    Summarise,
    /// Answer a legal question
    Answer,
}

impl TaskKind {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Summarise => "summarise",
            Self::Answer => "answer",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s {
            "draft" => Ok(Self::Draft),
            "review" => Ok(Self::Review),
            "summarise" => Ok(Self::Summarise),
            "answer" => Ok(Self::Answer),
            _ => Err(EnumParseError::new("task kind", s)),
        }
    }
}

/// Status of a run through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted but not yet picked up by a worker
    #[default]
    Pending,
    /// Actively executing agent turns
    Running,
    /// Suspended on a tool invocation
    AwaitingTool,
    /// Suspended on a model call
    AwaitingModel,
    /// Terminated successfully with a final document
    Succeeded,
    /// Terminated with an error
    Failed,
    /// Terminated by cooperative cancellation
    Cancelled,
    /// Terminated because a budget was exhausted
    BudgetExhausted,
}

impl RunStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::BudgetExhausted
        )
    }

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::AwaitingTool => "awaiting_tool",
            Self::AwaitingModel => "awaiting_model",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::BudgetExhausted => "budget_exhausted",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "awaiting_tool" => Ok(Self::AwaitingTool),
            "awaiting_model" => Ok(Self::AwaitingModel),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "budget_exhausted" => Ok(Self::BudgetExhausted),
            _ => Err(EnumParseError::new("run status", s)),
        }
    }
}

/// The specialised agents the executor routes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Classifies the task and decides whether external context is needed
    Analyser,
    /// Gathers and condenses external context
    Researcher,
    /// Produces and revises the draft text
    Drafter,
    /// Judges the draft and requests revision or acceptance
    Critic,
    /// Applies final structure and citation formatting
    Formatter,
}

impl AgentKind {
    /// All agent kinds in routing order.
    pub const ALL: [AgentKind; 5] = [
        Self::Analyser,
        Self::Researcher,
        Self::Drafter,
        Self::Critic,
        Self::Formatter,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Analyser => "analyser",
            Self::Researcher => "researcher",
            Self::Drafter => "drafter",
            Self::Critic => "critic",
            Self::Formatter => "formatter",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s {
            "analyser" => Ok(Self::Analyser),
            "researcher" => Ok(Self::Researcher),
            "drafter" => Ok(Self::Drafter),
            "critic" => Ok(Self::Critic),
            "formatter" => Ok(Self::Formatter),
            _ => Err(EnumParseError::new("agent kind", s)),
        }
    }
}

// ============================================================================
// PII ENUMS
// ============================================================================

/// Kinds of sensitive spans the gate detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    /// Individual taxpayer registry (CPF), verifier-digit checked
    TaxId,
    /// Corporate taxpayer registry (CNPJ), verifier-digit checked
    CorporateId,
    Email,
    Phone,
    /// General registry identity card (RG)
    NationalId,
    Address,
    /// Payment card number, Luhn checked
    CardNumber,
    BankAccount,
}

impl PiiKind {
    /// Token used inside redaction markers, e.g. `[CPF_REDACTED]`.
    pub fn token(&self) -> &'static str {
        match self {
            Self::TaxId => "CPF",
            Self::CorporateId => "CNPJ",
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::NationalId => "RG",
            Self::Address => "ADDRESS",
            Self::CardNumber => "CARD",
            Self::BankAccount => "BANK_ACCOUNT",
        }
    }

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::TaxId => "tax_id",
            Self::CorporateId => "corporate_id",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::NationalId => "national_id",
            Self::Address => "address",
            Self::CardNumber => "card_number",
            Self::BankAccount => "bank_account",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s {
            "tax_id" => Ok(Self::TaxId),
            "corporate_id" => Ok(Self::CorporateId),
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            "national_id" => Ok(Self::NationalId),
            "address" => Ok(Self::Address),
            "card_number" => Ok(Self::CardNumber),
            "bank_account" => Ok(Self::BankAccount),
            _ => Err(EnumParseError::new("pii kind", s)),
        }
    }
}

/// How a detected span is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RedactionStrategy {
    /// Replace the span with `[<KIND>_REDACTED]`
    #[default]
    Typed,
    /// Replace with `[<KIND>_<first 8 hex of SHA-256>]`, stable within a run
    Hashed,
    /// Replace each character preserving length
    Masked,
}

impl RedactionStrategy {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Typed => "typed",
            Self::Hashed => "hashed",
            Self::Masked => "masked",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s {
            "typed" => Ok(Self::Typed),
            "hashed" => Ok(Self::Hashed),
            "masked" => Ok(Self::Masked),
            _ => Err(EnumParseError::new("redaction strategy", s)),
        }
    }
}

// ============================================================================
// POLICY ENUMS
// ============================================================================

/// Category of a tenant policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    AccessControl,
    PiiHandling,
    AuditLevel,
    DataRetention,
    ContentFilter,
    ExportRestriction,
}

/// Named point in the executor's loop at which policies are re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    OnIngest,
    BeforeRetrieval,
    BeforeModelCall,
    BeforeEmit,
    OnExport,
}

impl Checkpoint {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::OnIngest => "on_ingest",
            Self::BeforeRetrieval => "before_retrieval",
            Self::BeforeModelCall => "before_model_call",
            Self::BeforeEmit => "before_emit",
            Self::OnExport => "on_export",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s {
            "on_ingest" => Ok(Self::OnIngest),
            "before_retrieval" => Ok(Self::BeforeRetrieval),
            "before_model_call" => Ok(Self::BeforeModelCall),
            "before_emit" => Ok(Self::BeforeEmit),
            "on_export" => Ok(Self::OnExport),
            _ => Err(EnumParseError::new("checkpoint", s)),
        }
    }
}

/// Action attached to a policy rule.
///
/// When multiple rules match, the most restrictive action wins:
/// deny > require-review > redact > annotate > allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Allow,
    Annotate,
    Redact,
    RequireHumanReview,
    Deny,
}

impl PolicyAction {
    /// Restrictiveness rank; higher wins when multiple rules match.
    pub fn restrictiveness(&self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Annotate => 1,
            Self::Redact => 2,
            Self::RequireHumanReview => 3,
            Self::Deny => 4,
        }
    }
}

// ============================================================================
// RETRIEVAL ENUMS
// ============================================================================

/// Where a retrieval hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginTag {
    /// Internal tenant index
    Internal,
    /// Caller-supplied document
    External,
    /// Same source id surfaced by both internal and external legs
    Both,
}

impl OriginTag {
    /// Merge the origin of two hits for the same source id.
    pub fn merge(self, other: OriginTag) -> OriginTag {
        if self == other {
            self
        } else {
            OriginTag::Both
        }
    }
}

/// One of the three concurrent retrieval legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalLeg {
    Semantic,
    Lexical,
    ExternalDocs,
}

impl RetrievalLeg {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Lexical => "lexical",
            Self::ExternalDocs => "external_docs",
        }
    }
}

// ============================================================================
// CRITIC ENUMS
// ============================================================================

/// Disposition of a critic verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticDisposition {
    /// The draft is good enough to format and emit
    Accept,
    /// The draft needs another drafter pass
    Revise,
}

// ============================================================================
// PARSE ERROR
// ============================================================================

/// Error parsing an enum from its string representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub input: String,
}

impl EnumParseError {
    fn new(kind: &'static str, input: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }
}

impl std::fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.kind, self.input)
    }
}

impl std::error::Error for EnumParseError {}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_roundtrip() {
        for kind in [
            TaskKind::Draft,
            TaskKind::Review,
            TaskKind::Summarise,
            TaskKind::Answer,
        ] {
            let s = kind.as_db_str();
            assert_eq!(TaskKind::from_db_str(s).unwrap(), kind);
        }
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::BudgetExhausted.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::AwaitingModel.is_terminal());
        assert!(!RunStatus::AwaitingTool.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
    }

    #[test]
    fn test_agent_kind_roundtrip() {
        for kind in AgentKind::ALL {
            let s = kind.as_db_str();
            assert_eq!(AgentKind::from_db_str(s).unwrap(), kind);
        }
    }

    #[test]
    fn test_pii_kind_tokens() {
        assert_eq!(PiiKind::TaxId.token(), "CPF");
        assert_eq!(PiiKind::CorporateId.token(), "CNPJ");
        assert_eq!(PiiKind::NationalId.token(), "RG");
    }

    #[test]
    fn test_policy_action_lattice() {
        let mut actions = [
            PolicyAction::Deny,
            PolicyAction::Allow,
            PolicyAction::Redact,
            PolicyAction::RequireHumanReview,
            PolicyAction::Annotate,
        ];
        actions.sort_by_key(|a| a.restrictiveness());
        assert_eq!(
            actions,
            [
                PolicyAction::Allow,
                PolicyAction::Annotate,
                PolicyAction::Redact,
                PolicyAction::RequireHumanReview,
                PolicyAction::Deny,
            ]
        );
    }

    #[test]
    fn test_origin_tag_merge() {
        assert_eq!(
            OriginTag::Internal.merge(OriginTag::External),
            OriginTag::Both
        );
        assert_eq!(
            OriginTag::Internal.merge(OriginTag::Internal),
            OriginTag::Internal
        );
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        for cp in [
            Checkpoint::OnIngest,
            Checkpoint::BeforeRetrieval,
            Checkpoint::BeforeModelCall,
            Checkpoint::BeforeEmit,
            Checkpoint::OnExport,
        ] {
            assert_eq!(Checkpoint::from_db_str(cp.as_db_str()).unwrap(), cp);
        }
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&RunStatus::BudgetExhausted).unwrap();
        assert_eq!(json, "\"budget_exhausted\"");
        let json = serde_json::to_string(&AgentKind::Analyser).unwrap();
        assert_eq!(json, "\"analyser\"");
    }
}
