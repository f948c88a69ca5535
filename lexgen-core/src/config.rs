//! Configuration types

use crate::{AgentKind, LexgenError, LexgenResult, RedactionStrategy, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// RUN CONFIGURATION BUNDLE
// ============================================================================

/// Per-request configuration bundle, normalised at ingress.
///
/// Unrecognised options are rejected at the edge; every recognised option
/// has the default listed here. Clamping happens in `normalised()` so the
/// rest of the engine never sees out-of-range values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Whether to search the tenant's internal index.
    pub use_internal_rag: bool,
    /// Desired total retrieval count, clamped to [0, hard ceiling].
    pub k_total: i32,
    /// Whether to apply the tenant centroid shift.
    pub enable_personalisation: bool,
    /// Centroid blend factor, clamped to [0.0, 1.0].
    pub personalisation_alpha: f32,
    /// Maximum agent turns before the run is cut off.
    pub max_iterations: i32,
    /// Wall-clock deadline for the whole run, in milliseconds.
    pub deadline_ms: i64,
    /// Monetary ceiling, six decimal places. `None` means the engine-wide
    /// default applies.
    pub cost_ceiling: Option<Decimal>,
    /// Preferred model per agent kind; unspecified kinds use defaults.
    pub model_preferences: HashMap<AgentKind, String>,
    /// Redaction strategy applied to detected PII.
    pub pii_strategy: RedactionStrategy,
    /// Free document type tag, e.g. "contract" or "petition".
    pub document_type: Option<String>,
    /// Maximum drafter re-entries after a "revise" verdict.
    pub max_revisions: i32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            use_internal_rag: true,
            k_total: 20,
            enable_personalisation: true,
            personalisation_alpha: 0.25,
            max_iterations: 10,
            deadline_ms: 300_000,
            cost_ceiling: None,
            model_preferences: HashMap::new(),
            pii_strategy: RedactionStrategy::Typed,
            document_type: None,
            max_revisions: 2,
        }
    }
}

impl RunConfig {
    /// Return a copy with all soft-range options clamped to their valid
    /// ranges. Hard violations (non-positive iteration budget, negative
    /// deadline) remain and are caught by `validate()`.
    pub fn normalised(&self, k_ceiling: i32) -> Self {
        let mut cfg = self.clone();
        cfg.k_total = cfg.k_total.clamp(0, k_ceiling);
        cfg.personalisation_alpha = cfg.personalisation_alpha.clamp(0.0, 1.0);
        cfg
    }

    /// Validate hard constraints.
    pub fn validate(&self) -> LexgenResult<()> {
        if self.max_iterations < 1 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "max_iterations".to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }
        if self.deadline_ms <= 0 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "deadline_ms".to_string(),
                reason: "must be positive".to_string(),
            }));
        }
        if self.k_total < 0 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "k_total".to_string(),
                reason: "must be non-negative".to_string(),
            }));
        }
        if self.max_revisions < 0 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "max_revisions".to_string(),
                reason: "must be non-negative".to_string(),
            }));
        }
        if let Some(ceiling) = self.cost_ceiling {
            if ceiling <= Decimal::ZERO {
                return Err(LexgenError::Validation(ValidationError::InvalidValue {
                    field: "cost_ceiling".to_string(),
                    reason: "must be positive".to_string(),
                }));
            }
        }
        Ok(())
    }
}

// ============================================================================
// RETRY CONFIGURATION
// ============================================================================

/// Retry configuration for transient model and tool errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: i32,
    /// Initial backoff in milliseconds.
    pub initial_backoff_ms: i64,
    /// Backoff cap in milliseconds.
    pub max_backoff_ms: i64,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

// ============================================================================
// RETRIEVAL SETTINGS
// ============================================================================

/// Engine-wide retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Reciprocal-rank fusion constant.
    pub k_rrf: f32,
    /// Hard ceiling on k_total; requests above it are clamped.
    pub k_hard_ceiling: i32,
    /// Independent deadline per retrieval leg, in milliseconds.
    pub leg_timeout_ms: i64,
    /// Centroid staleness TTL in milliseconds.
    pub centroid_ttl_ms: i64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k_rrf: 60.0,
            k_hard_ceiling: 100,
            leg_timeout_ms: 10_000,
            centroid_ttl_ms: 86_400_000,
        }
    }
}

// ============================================================================
// ENGINE CONFIGURATION
// ============================================================================

/// Process-wide engine configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of worker executors serving the run queue.
    pub worker_count: usize,
    /// Bounded submission queue depth.
    pub queue_depth: usize,
    /// Per-turn wall-clock ceiling in milliseconds; the effective turn
    /// timeout is the minimum of this and the remaining run deadline.
    pub per_turn_timeout_ms: i64,
    /// Retry policy for transient model errors.
    pub retry: RetryConfig,
    /// Retrieval federation settings.
    pub retrieval: RetrievalSettings,
    /// Engine-wide monetary ceiling applied when a request does not carry
    /// its own.
    pub default_cost_ceiling: Decimal,
    /// Ingress limit on query length in bytes.
    pub max_query_bytes: usize,
    /// Ingress limit on external document count.
    pub max_external_documents: usize,
    /// Ingress limit on a single external document, in bytes.
    pub max_document_bytes: usize,
    /// Ingress limit on aggregate external text, in bytes.
    pub max_aggregate_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_depth: 64,
            per_turn_timeout_ms: 60_000,
            retry: RetryConfig::default(),
            retrieval: RetrievalSettings::default(),
            // 5.000000 units in the fixed currency
            default_cost_ceiling: Decimal::new(5_000_000, 6),
            max_query_bytes: 32 * 1024,
            max_external_documents: 10,
            max_document_bytes: 512 * 1024,
            max_aggregate_bytes: 2 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> LexgenResult<()> {
        if self.worker_count == 0 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "worker_count".to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }
        if self.queue_depth == 0 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "queue_depth".to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }
        if self.per_turn_timeout_ms <= 0 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "per_turn_timeout_ms".to_string(),
                reason: "must be positive".to_string(),
            }));
        }
        if self.retry.max_attempts < 1 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }
        if self.retry.backoff_multiplier <= 0.0 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "retry.backoff_multiplier".to_string(),
                reason: "must be positive".to_string(),
            }));
        }
        if self.retrieval.k_rrf <= 0.0 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "retrieval.k_rrf".to_string(),
                reason: "must be positive".to_string(),
            }));
        }
        if self.retrieval.k_hard_ceiling < 1 {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "retrieval.k_hard_ceiling".to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }
        if self.default_cost_ceiling <= Decimal::ZERO {
            return Err(LexgenError::Validation(ValidationError::InvalidValue {
                field: "default_cost_ceiling".to_string(),
                reason: "must be positive".to_string(),
            }));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
