//! LEXGEN Test Utils - Fixtures and Mock Wiring
//!
//! Shared by the crate unit tests and the executor integration suite:
//! a seeded legal corpus, a fully mocked engine harness, policy
//! fixtures and request builders.

use chrono::Utc;
use lexgen_agents::{AgentRuntime, PriceTable, ScriptedCompletionProvider, TemplateRegistry};
use lexgen_audit::{
    AuditRecorder, AuditStore, FeedbackIntake, InMemoryAuditStore, InMemoryFeedbackStore,
};
use lexgen_core::{
    EngineConfig, EntityIdType, PolicyAction, PolicyId, PolicyKind, PolicyRule, RulePredicate,
    TaskKind, TenantId,
};
use lexgen_executor::{Engine, SubmitRequest, Supervisor};
use lexgen_policy::PolicyStore;
use lexgen_retrieval::{
    CentroidStore, Federator, LexicalSearcher, MockEmbeddingProvider, MockLexicalSearcher,
    MockVectorSearcher, VectorSearcher,
};
use lexgen_tools::default_registry;
use std::sync::Arc;

/// Embedding dimensions used by every mock in the harness.
pub const MOCK_DIMENSIONS: i32 = 64;

/// A small seeded corpus of Brazilian legal snippets.
pub fn legal_corpus() -> Vec<(String, String)> {
    vec![
        (
            "juris-001".to_string(),
            "Resumo das obrigações contratuais da parte contratada e deveres acessórios"
                .to_string(),
        ),
        (
            "juris-002".to_string(),
            "Decisão sobre rescisão de contrato de prestação de serviços".to_string(),
        ),
        (
            "juris-003".to_string(),
            "Imposto sobre serviços e regime tributário aplicável às sociedades".to_string(),
        ),
        (
            "juris-004".to_string(),
            "Petição inicial em processo de execução de título extrajudicial".to_string(),
        ),
    ]
}

/// A policy with one deny rule for a task kind at ingest.
pub fn deny_task_policy(tenant: &TenantId, task: TaskKind) -> lexgen_core::Policy {
    lexgen_core::Policy {
        policy_id: PolicyId::now_v7(),
        tenant_id: tenant.clone(),
        version: 1,
        kind: PolicyKind::AccessControl,
        rules: vec![PolicyRule {
            rule_id: format!("acl-no-{}", task.as_db_str()),
            checkpoints: vec![lexgen_core::Checkpoint::OnIngest],
            predicates: vec![RulePredicate::eq(
                "task_kind",
                serde_json::json!(task.as_db_str()),
            )],
            action: PolicyAction::Deny,
            note: Some(format!("task kind {} is not permitted", task.as_db_str())),
        }],
        effective_from: Utc::now(),
    }
}

/// A standard draft request against tenant `T1`.
pub fn draft_request() -> SubmitRequest {
    SubmitRequest::new("resumo de obrigações contratuais", TaskKind::Draft, "T1")
}

/// Fully mocked engine plus handles to everything a test wants to poke.
///
/// `audit` is the default in-memory store; when the builder overrides
/// the audit store this field is an unused placeholder.
pub struct Harness {
    pub engine: Engine,
    pub supervisor: Arc<Supervisor>,
    pub config: EngineConfig,
    pub provider: Arc<ScriptedCompletionProvider>,
    pub audit: Arc<InMemoryAuditStore>,
    pub feedback: FeedbackIntake,
    pub policy_store: Arc<PolicyStore>,
    pub centroids: Arc<CentroidStore>,
}

impl Harness {
    /// Harness with all defaults. Must be called inside a tokio runtime.
    pub fn new() -> Self {
        HarnessBuilder::new().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for harness variants (failing legs, failing audit store,
/// custom budgets).
pub struct HarnessBuilder {
    config: EngineConfig,
    corpus: Vec<(String, String)>,
    vector: Option<Arc<dyn VectorSearcher>>,
    lexical: Option<Arc<dyn LexicalSearcher>>,
    audit: Option<Arc<dyn AuditStore>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                worker_count: 2,
                queue_depth: 8,
                ..EngineConfig::default()
            },
            corpus: legal_corpus(),
            vector: None,
            lexical: None,
            audit: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn corpus(mut self, corpus: Vec<(String, String)>) -> Self {
        self.corpus = corpus;
        self
    }

    pub fn vector_searcher(mut self, searcher: Arc<dyn VectorSearcher>) -> Self {
        self.vector = Some(searcher);
        self
    }

    pub fn lexical_searcher(mut self, searcher: Arc<dyn LexicalSearcher>) -> Self {
        self.lexical = Some(searcher);
        self
    }

    pub fn audit_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(store);
        self
    }

    /// Wire everything together. Must be called inside a tokio runtime.
    pub fn build(self) -> Harness {
        let centroids = Arc::new(CentroidStore::new(self.config.retrieval.centroid_ttl_ms));
        let vector = self
            .vector
            .unwrap_or_else(|| Arc::new(MockVectorSearcher::new(self.corpus.clone(), MOCK_DIMENSIONS)));
        let lexical = self
            .lexical
            .unwrap_or_else(|| Arc::new(MockLexicalSearcher::new(self.corpus.clone())));
        let federator = Arc::new(Federator::new(
            vector,
            lexical,
            Arc::new(MockEmbeddingProvider::new("mock-embed", MOCK_DIMENSIONS)),
            Arc::clone(&centroids),
            self.config.retrieval.clone(),
        ));
        let tools = Arc::new(default_registry(federator));

        let provider = Arc::new(ScriptedCompletionProvider::new());
        let agents = Arc::new(AgentRuntime::new(
            provider.clone(),
            Arc::new(TemplateRegistry::with_defaults()),
            PriceTable::default(),
            self.config.retry.clone(),
        ));

        let in_memory_audit = Arc::new(InMemoryAuditStore::new());
        let audit_store: Arc<dyn AuditStore> = match self.audit {
            Some(store) => store,
            None => in_memory_audit.clone(),
        };
        let recorder = Arc::new(AuditRecorder::new(Arc::clone(&audit_store)));
        let feedback = FeedbackIntake::new(
            Arc::clone(&audit_store),
            Arc::new(InMemoryFeedbackStore::new()),
        );

        let policy_store = Arc::new(PolicyStore::new());
        let supervisor = Arc::new(Supervisor::new(tools, agents, recorder, self.config.clone()));
        let engine = Engine::start(
            self.config.clone(),
            Arc::clone(&policy_store),
            Arc::clone(&supervisor),
        )
        .expect("engine configuration is valid");

        Harness {
            engine,
            supervisor,
            config: self.config,
            provider,
            audit: in_memory_audit,
            feedback,
            policy_store,
            centroids,
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
