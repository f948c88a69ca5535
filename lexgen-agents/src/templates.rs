//! Versioned prompt template registry.
//!
//! Templates are keyed by (agent kind, document type); resolution falls
//! back to the kind's generic template when no document-type-specific
//! one exists. The registry is process-wide, initialised with a built-in
//! default pack and republished copy-on-write on reload.

use lexgen_core::AgentKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A versioned prompt template for one agent kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub agent: AgentKind,
    /// `None` is the generic fallback for the kind.
    pub document_type: Option<String>,
    pub version: i32,
    pub system: String,
    /// User prompt with `{slot}` placeholders.
    pub user_template: String,
}

impl PromptTemplate {
    /// Render the user template by substituting the given slots.
    pub fn render(&self, slots: &[(&str, &str)]) -> String {
        let mut out = self.user_template.clone();
        for (name, value) in slots {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }
}

type TemplateKey = (AgentKind, Option<String>);

/// Process-wide template registry with copy-on-write publication.
pub struct TemplateRegistry {
    inner: RwLock<Arc<HashMap<TemplateKey, PromptTemplate>>>,
}

impl TemplateRegistry {
    /// Registry seeded with the built-in default pack.
    pub fn with_defaults() -> Self {
        let mut map = HashMap::new();
        for template in default_pack() {
            map.insert((template.agent, template.document_type.clone()), template);
        }
        Self {
            inner: RwLock::new(Arc::new(map)),
        }
    }

    /// Publish a template, bumping the version over any existing entry.
    pub fn publish(&self, mut template: PromptTemplate) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next: HashMap<TemplateKey, PromptTemplate> = (**guard).clone();
        let key = (template.agent, template.document_type.clone());
        if let Some(existing) = next.get(&key) {
            template.version = existing.version + 1;
        }
        next.insert(key, template);
        *guard = Arc::new(next);
    }

    /// Resolve the template for an agent kind and document type, falling
    /// back to the kind's generic template.
    pub fn resolve(&self, agent: AgentKind, document_type: Option<&str>) -> Option<PromptTemplate> {
        let map = {
            let guard = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(&*guard)
        };
        if let Some(doc_type) = document_type {
            if let Some(t) = map.get(&(agent, Some(doc_type.to_string()))) {
                return Some(t.clone());
            }
        }
        map.get(&(agent, None)).cloned()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry").finish()
    }
}

/// The built-in template pack, one generic template per agent kind.
fn default_pack() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            agent: AgentKind::Analyser,
            document_type: None,
            version: 1,
            system: "You are the analyser agent of a legal document engine. Classify the task \
                     and decide whether external context is required. Respond with a JSON object \
                     {\"needs_external_info\": bool, \"themes\": [string], \"outline\": [string]}."
                .to_string(),
            user_template: "Task kind: {task}\nDocument type: {document_type}\n\nRequest:\n{query}"
                .to_string(),
        },
        PromptTemplate {
            agent: AgentKind::Researcher,
            document_type: None,
            version: 1,
            system: "You are the researcher agent of a legal document engine. Condense the \
                     retrieved context into findings. Respond with a JSON object \
                     {\"findings\": [{\"source_id\": string, \"statement\": string, \
                     \"relevance\": number}]}."
                .to_string(),
            user_template: "Request:\n{query}\n\nRetrieved context:\n{context}".to_string(),
        },
        PromptTemplate {
            agent: AgentKind::Drafter,
            document_type: None,
            version: 1,
            system: "You are the drafter agent of a legal document engine for Brazilian \
                     practice. Produce the full document text in Portuguese, structured in \
                     numbered clauses. Output only the document text."
                .to_string(),
            user_template: "Task kind: {task}\nDocument type: {document_type}\n\nRequest:\n{query}\n\n\
                            Analysis:\n{analysis}\n\nFindings:\n{findings}\n\nRetrieved context:\n{context}\n\n\
                            Previous draft (revise if present):\n{draft}\n\nCritic verdicts:\n{verdicts}"
                .to_string(),
        },
        PromptTemplate {
            agent: AgentKind::Critic,
            document_type: None,
            version: 1,
            system: "You are the critic agent of a legal document engine. Judge the draft for \
                     completeness, grounding and formal correctness. Respond with a JSON object \
                     {\"verdicts\": [{\"aspect\": string, \"disposition\": \"accept\"|\"revise\", \
                     \"rationale\": string}]}."
                .to_string(),
            user_template: "Request:\n{query}\n\nDraft under review:\n{draft}\n\n\
                            Quality signals:\n{quality}"
                .to_string(),
        },
        PromptTemplate {
            agent: AgentKind::Formatter,
            document_type: None,
            version: 1,
            system: "You are the formatter agent of a legal document engine. Apply final \
                     structure, heading case and ABNT citation formatting. Output only the \
                     finished document text."
                .to_string(),
            user_template: "Document type: {document_type}\n\nAccepted draft:\n{draft}\n\n\
                            Citations:\n{citations}"
                .to_string(),
        },
    ]
}

// ============================================================================
// TESTS
// ============================================================================
