//! LEXGEN Policy - PII Gate and Checkpoint Policies
//!
//! The ingress/egress envelope of the engine:
//! - Sensitive-span detection for the eight PII kinds, with verifier-digit
//!   arithmetic for CPF/CNPJ and Luhn checking for card numbers
//! - Typed, hashed and masked redaction strategies
//! - Checkpoint-keyed policy evaluation with a most-restrictive-wins
//!   decision lattice
//! - Copy-on-write tenant policy store publishing immutable snapshots

mod engine;
mod pii;
mod store;

pub use engine::{EvaluationContext, PolicyDecision, PolicyEngine};
pub use pii::{detect_pii, redact, redacted_view, PiiGate};
pub use store::PolicyStore;
