//! LEXGEN Audit - Forensic Records and Feedback
//!
//! Seals one immutable, hash-bound audit record per terminated run and
//! accepts structured feedback keyed by run id. Stores are append-only:
//! updates are forbidden, and every read of an audit record emits an
//! access-log entry. No document leaves the engine without a sealed
//! record.

mod feedback;
mod recorder;
mod store;

pub use feedback::{FeedbackIntake, FeedbackStore, FeedbackSubmission, InMemoryFeedbackStore};
pub use recorder::AuditRecorder;
pub use store::{AuditStore, FailingAuditStore, InMemoryAuditStore};
