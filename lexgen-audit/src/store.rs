//! Append-only audit record stores.

use async_trait::async_trait;
use chrono::Utc;
use lexgen_core::{AccessLogEntry, AuditError, AuditRecord, LexgenError, LexgenResult, RunId};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Async trait for audit record persistence.
///
/// Writes are append-only; a run id can be written exactly once. Every
/// read emits an access-log entry, and access logs are themselves
/// append-only.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a sealed record. Fails if the run already has one.
    async fn append(&self, record: AuditRecord) -> LexgenResult<()>;

    /// Fetch a record, logging the access.
    async fn fetch(
        &self,
        run_id: RunId,
        reader_id: &str,
        reason: &str,
    ) -> LexgenResult<AuditRecord>;

    /// Whether a sealed record exists for the run.
    async fn exists(&self, run_id: RunId) -> bool;

    /// Access-log entries for one run, in append order.
    async fn access_log(&self, run_id: RunId) -> Vec<AccessLogEntry>;
}

/// In-memory reference implementation.
#[derive(Default)]
pub struct InMemoryAuditStore {
    records: RwLock<HashMap<RunId, AuditRecord>>,
    accesses: RwLock<Vec<AccessLogEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> LexgenResult<()> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if records.contains_key(&record.run_id) {
            return Err(LexgenError::Audit(AuditError::WriteFailed {
                run_id: record.run_id,
                reason: "audit record already sealed; updates are forbidden".to_string(),
            }));
        }
        debug!(run_id = %record.run_id, "audit record sealed");
        records.insert(record.run_id, record);
        Ok(())
    }

    async fn fetch(
        &self,
        run_id: RunId,
        reader_id: &str,
        reason: &str,
    ) -> LexgenResult<AuditRecord> {
        let record = {
            let records = self
                .records
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            records.get(&run_id).cloned()
        }
        .ok_or(LexgenError::Audit(AuditError::NotFound { run_id }))?;

        let mut accesses = self
            .accesses
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        accesses.push(AccessLogEntry {
            run_id,
            reader_id: reader_id.to_string(),
            reason: reason.to_string(),
            at: Utc::now(),
        });
        Ok(record)
    }

    async fn exists(&self, run_id: RunId) -> bool {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&run_id)
    }

    async fn access_log(&self, run_id: RunId) -> Vec<AccessLogEntry> {
        self.accesses
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|entry| entry.run_id == run_id)
            .cloned()
            .collect()
    }
}

/// Store whose writes always fail; exercises the seal-or-fail contract.
#[derive(Debug, Default)]
pub struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, record: AuditRecord) -> LexgenResult<()> {
        Err(LexgenError::Audit(AuditError::WriteFailed {
            run_id: record.run_id,
            reason: "mock audit backend unavailable".to_string(),
        }))
    }

    async fn fetch(
        &self,
        run_id: RunId,
        _reader_id: &str,
        _reason: &str,
    ) -> LexgenResult<AuditRecord> {
        Err(LexgenError::Audit(AuditError::NotFound { run_id }))
    }

    async fn exists(&self, _run_id: RunId) -> bool {
        false
    }

    async fn access_log(&self, _run_id: RunId) -> Vec<AccessLogEntry> {
        Vec::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
