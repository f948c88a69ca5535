//! Copy-on-write tenant policy store.
//!
//! Process-wide, initialised at startup and republished on explicit
//! signal. Readers take an `Arc` snapshot and observe a consistent policy
//! set for the whole run; publishes swap the map atomically and never
//! disturb in-flight runs.

use chrono::Utc;
use lexgen_core::{Policy, PolicySnapshot, TenantId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

#[derive(Debug, Clone)]
struct TenantPolicies {
    version: i32,
    policies: Vec<Policy>,
}

/// Process-wide policy cache with copy-on-write publication.
#[derive(Debug, Default)]
pub struct PolicyStore {
    inner: RwLock<Arc<HashMap<TenantId, Arc<TenantPolicies>>>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a tenant's policy set, bumping its version. The previous
    /// version stays visible to runs that captured it.
    pub fn publish(&self, tenant_id: TenantId, policies: Vec<Policy>) -> i32 {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next: HashMap<TenantId, Arc<TenantPolicies>> = (**guard).clone();
        let version = next
            .get(&tenant_id)
            .map(|t| t.version + 1)
            .unwrap_or(1);
        next.insert(
            tenant_id.clone(),
            Arc::new(TenantPolicies { version, policies }),
        );
        *guard = Arc::new(next);
        info!(tenant = %tenant_id, version, "published tenant policy set");
        version
    }

    /// Capture the tenant's effective policy set as an immutable snapshot.
    /// Tenants with no published policies get an empty version-0 snapshot.
    pub fn snapshot_for(&self, tenant_id: &TenantId) -> PolicySnapshot {
        let map = {
            let guard = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(&*guard)
        };
        match map.get(tenant_id) {
            Some(t) => PolicySnapshot {
                tenant_id: tenant_id.clone(),
                version: t.version,
                policies: t.policies.clone(),
                captured_at: Utc::now(),
            },
            None => PolicySnapshot::empty(tenant_id.clone(), Utc::now()),
        }
    }

    /// Current published version for a tenant (0 when none).
    pub fn current_version(&self, tenant_id: &TenantId) -> i32 {
        let guard = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(tenant_id).map(|t| t.version).unwrap_or(0)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lexgen_core::{EntityIdType, PolicyAction, PolicyId, PolicyKind, PolicyRule};

    fn policy(tenant: &TenantId, version: i32) -> Policy {
        Policy {
            policy_id: PolicyId::now_v7(),
            tenant_id: tenant.clone(),
            version,
            kind: PolicyKind::ContentFilter,
            rules: vec![PolicyRule {
                rule_id: format!("rule-v{}", version),
                checkpoints: Vec::new(),
                predicates: Vec::new(),
                action: PolicyAction::Allow,
                note: None,
            }],
            effective_from: Utc::now(),
        }
    }

    #[test]
    fn test_empty_store_gives_version_zero_snapshot() {
        let store = PolicyStore::new();
        let tenant = TenantId::new("T1").unwrap();
        let snapshot = store.snapshot_for(&tenant);
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.policies.is_empty());
    }

    #[test]
    fn test_publish_bumps_version() {
        let store = PolicyStore::new();
        let tenant = TenantId::new("T1").unwrap();
        assert_eq!(store.publish(tenant.clone(), vec![policy(&tenant, 1)]), 1);
        assert_eq!(store.publish(tenant.clone(), vec![policy(&tenant, 2)]), 2);
        assert_eq!(store.current_version(&tenant), 2);
    }

    #[test]
    fn test_snapshot_survives_republish() {
        let store = PolicyStore::new();
        let tenant = TenantId::new("T1").unwrap();
        store.publish(tenant.clone(), vec![policy(&tenant, 1)]);
        let snapshot = store.snapshot_for(&tenant);
        assert_eq!(snapshot.version, 1);

        // Mid-run edits never retroactively apply to a captured snapshot.
        store.publish(tenant.clone(), vec![policy(&tenant, 2)]);
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.policies[0].rules[0].rule_id, "rule-v1");
        assert_eq!(store.snapshot_for(&tenant).version, 2);
    }

    #[test]
    fn test_tenants_isolated() {
        let store = PolicyStore::new();
        let t1 = TenantId::new("T1").unwrap();
        let t2 = TenantId::new("T2").unwrap();
        store.publish(t1.clone(), vec![policy(&t1, 1)]);
        assert_eq!(store.current_version(&t1), 1);
        assert_eq!(store.current_version(&t2), 0);
    }
}
