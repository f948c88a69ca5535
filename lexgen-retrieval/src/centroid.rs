//! Tenant centroid cache and thematic tag inference.
//!
//! A centroid is a precomputed representative vector for a
//! (tenant, theme) pair, used to bias retrieval toward the tenant's
//! historical content. The cache is process-wide, copy-on-write
//! published, and entries expire on a TTL: stale or absent centroids mean
//! personalisation is silently skipped.

use chrono::Utc;
use lexgen_core::{EmbeddingVector, TenantId, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// THEME INFERENCE
// ============================================================================

/// Keyword table for deterministic theme classification, ordered so ties
/// resolve to the lexically first tag.
const THEME_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "contratos",
        &[
            "contrato",
            "contratual",
            "contratuais",
            "obrigações",
            "cláusula",
            "clausula",
            "rescisão",
        ],
    ),
    (
        "processual",
        &["processo", "petição", "peticao", "recurso", "liminar", "sentença"],
    ),
    (
        "societario",
        &["sociedade", "societário", "societario", "acionista", "quotas", "fusão"],
    ),
    (
        "trabalhista",
        &["trabalhista", "emprego", "empregado", "clt", "verbas"],
    ),
    (
        "tributario",
        &["tributário", "tributario", "imposto", "fiscal", "icms", "iss"],
    ),
];

/// Infer the thematic tag of a query with a deterministic keyword count.
/// Returns `None` when no theme keyword occurs.
pub fn infer_theme(query: &str) -> Option<String> {
    let folded = query.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for (theme, keywords) in THEME_KEYWORDS {
        let count = keywords
            .iter()
            .filter(|k| folded.contains(*k))
            .count();
        if count == 0 {
            continue;
        }
        match best {
            None => best = Some((theme, count)),
            Some((_, best_count)) if count > best_count => best = Some((theme, count)),
            _ => {}
        }
    }
    best.map(|(theme, _)| theme.to_string())
}

// ============================================================================
// CENTROID STORE
// ============================================================================

#[derive(Debug, Clone)]
struct CentroidEntry {
    vector: EmbeddingVector,
    stored_at: Timestamp,
}

/// Process-wide centroid cache with versioned copy-on-write publication
/// and TTL staleness.
#[derive(Debug)]
pub struct CentroidStore {
    inner: RwLock<Arc<HashMap<(TenantId, String), CentroidEntry>>>,
    ttl_ms: i64,
}

impl CentroidStore {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            inner: RwLock::new(Arc::new(HashMap::new())),
            ttl_ms,
        }
    }

    /// Publish a centroid for a (tenant, theme) pair.
    pub fn publish(&self, tenant_id: TenantId, theme: impl Into<String>, vector: EmbeddingVector) {
        self.publish_at(tenant_id, theme, vector, Utc::now());
    }

    /// Publish with an explicit timestamp (used by staleness tests).
    pub fn publish_at(
        &self,
        tenant_id: TenantId,
        theme: impl Into<String>,
        vector: EmbeddingVector,
        stored_at: Timestamp,
    ) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next: HashMap<(TenantId, String), CentroidEntry> = (**guard).clone();
        next.insert(
            (tenant_id, theme.into()),
            CentroidEntry { vector, stored_at },
        );
        *guard = Arc::new(next);
    }

    /// Fetch a centroid if present and within its TTL.
    pub fn fresh(&self, tenant_id: &TenantId, theme: &str, now: Timestamp) -> Option<EmbeddingVector> {
        let map = {
            let guard = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(&*guard)
        };
        let entry = map.get(&(tenant_id.clone(), theme.to_string()))?;
        let age_ms = (now - entry.stored_at).num_milliseconds();
        if age_ms <= self.ttl_ms {
            Some(entry.vector.clone())
        } else {
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn vector() -> EmbeddingVector {
        EmbeddingVector::new(vec![1.0, 0.0], "mock-embed".to_string())
    }

    #[test]
    fn test_infer_theme_contract_query() {
        assert_eq!(
            infer_theme("resumo de obrigações contratuais"),
            Some("contratos".to_string())
        );
    }

    #[test]
    fn test_infer_theme_none() {
        assert_eq!(infer_theme("pergunta genérica sem tema"), None);
    }

    #[test]
    fn test_infer_theme_deterministic_tie() {
        // One keyword of each: lexically first theme wins.
        let theme = infer_theme("contrato sobre imposto");
        assert_eq!(theme, Some("contratos".to_string()));
    }

    #[test]
    fn test_infer_theme_majority_wins() {
        let theme = infer_theme("imposto fiscal icms sobre contrato");
        assert_eq!(theme, Some("tributario".to_string()));
    }

    #[test]
    fn test_store_fresh_within_ttl() {
        let store = CentroidStore::new(1_000);
        let tenant = TenantId::new("T1").unwrap();
        let now = Utc::now();
        store.publish_at(tenant.clone(), "contratos", vector(), now);
        assert!(store.fresh(&tenant, "contratos", now).is_some());
    }

    #[test]
    fn test_store_stale_past_ttl() {
        let store = CentroidStore::new(1_000);
        let tenant = TenantId::new("T1").unwrap();
        let stored = Utc::now();
        store.publish_at(tenant.clone(), "contratos", vector(), stored);
        let later = stored + Duration::milliseconds(2_000);
        assert!(store.fresh(&tenant, "contratos", later).is_none());
    }

    #[test]
    fn test_store_absent_theme() {
        let store = CentroidStore::new(1_000);
        let tenant = TenantId::new("T1").unwrap();
        assert!(store.fresh(&tenant, "contratos", Utc::now()).is_none());
    }

    #[test]
    fn test_store_tenant_isolation() {
        let store = CentroidStore::new(1_000);
        let t1 = TenantId::new("T1").unwrap();
        let t2 = TenantId::new("T2").unwrap();
        let now = Utc::now();
        store.publish_at(t1.clone(), "contratos", vector(), now);
        assert!(store.fresh(&t1, "contratos", now).is_some());
        assert!(store.fresh(&t2, "contratos", now).is_none());
    }
}
