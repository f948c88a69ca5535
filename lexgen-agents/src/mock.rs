//! Scripted completion providers for tests.

use async_trait::async_trait;
use lexgen_core::{
    estimate_tokens, AgentKind, CompletionProvider, CompletionRequest, CompletionResponse,
    LexgenError, LexgenResult, ModelError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

fn kind_of_request(request: &CompletionRequest) -> Option<AgentKind> {
    let system = request.system.to_lowercase();
    AgentKind::ALL
        .into_iter()
        .find(|kind| system.contains(kind.as_db_str()))
}

fn default_response(kind: AgentKind) -> String {
    match kind {
        AgentKind::Analyser => {
            r#"{"needs_external_info": false, "themes": ["contratos"], "outline": ["Objeto", "Obrigações"]}"#
                .to_string()
        }
        AgentKind::Researcher => r#"{"findings": []}"#.to_string(),
        AgentKind::Drafter => {
            "MINUTA\n\nCláusula Primeira: Do Objeto\n\nAs partes ajustam as obrigações descritas."
                .to_string()
        }
        AgentKind::Critic => {
            r#"{"verdicts": [{"aspect": "overall", "disposition": "accept", "rationale": "adequado"}]}"#
                .to_string()
        }
        AgentKind::Formatter => {
            "DOCUMENTO FINAL\n\nCláusula Primeira: Do Objeto\n\nTexto consolidado e formatado."
                .to_string()
        }
    }
}

/// Completion provider driven by per-agent-kind response scripts.
///
/// The agent kind is inferred from the system prompt. When a kind's
/// script is exhausted a sensible default response is produced, so tests
/// only script the calls they care about. Every request is logged for
/// assertion.
pub struct ScriptedCompletionProvider {
    scripts: Mutex<HashMap<AgentKind, VecDeque<LexgenResult<String>>>>,
    calls: Mutex<Vec<(Option<AgentKind>, CompletionRequest)>>,
}

impl ScriptedCompletionProvider {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for an agent kind.
    pub fn script(&self, kind: AgentKind, response: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(kind)
            .or_default()
            .push_back(Ok(response.into()));
    }

    /// Queue an error for an agent kind.
    pub fn script_err(&self, kind: AgentKind, error: LexgenError) {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(kind)
            .or_default()
            .push_back(Err(error));
    }

    /// All requests observed so far, with the inferred agent kind.
    pub fn calls(&self) -> Vec<(Option<AgentKind>, CompletionRequest)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of calls attributed to one agent kind.
    pub fn call_count(&self, kind: AgentKind) -> usize {
        self.calls()
            .iter()
            .filter(|(k, _)| *k == Some(kind))
            .count()
    }
}

impl Default for ScriptedCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletionProvider {
    async fn complete(&self, request: CompletionRequest) -> LexgenResult<CompletionResponse> {
        let kind = kind_of_request(&request);
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((kind, request.clone()));

        let scripted = kind.and_then(|k| {
            self.scripts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get_mut(&k)
                .and_then(|queue| queue.pop_front())
        });

        let text = match scripted {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(e),
            None => match kind {
                Some(k) => default_response(k),
                None => {
                    return Err(LexgenError::Model(ModelError::NotConfigured {
                        model: request.model_id,
                    }))
                }
            },
        };

        Ok(CompletionResponse {
            input_tokens: estimate_tokens(&request.system) + estimate_tokens(&request.prompt),
            output_tokens: estimate_tokens(&text),
            text,
        })
    }
}

/// Provider that fails with a transient error a fixed number of times,
/// then delegates to an inner provider. Used to exercise retry paths.
pub struct FlakyCompletionProvider<P> {
    failures_remaining: Mutex<i32>,
    inner: P,
}

impl<P> FlakyCompletionProvider<P> {
    pub fn new(failures: i32, inner: P) -> Self {
        Self {
            failures_remaining: Mutex::new(failures),
            inner,
        }
    }
}

#[async_trait]
impl<P: CompletionProvider> CompletionProvider for FlakyCompletionProvider<P> {
    async fn complete(&self, request: CompletionRequest) -> LexgenResult<CompletionResponse> {
        {
            let mut remaining = self
                .failures_remaining
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LexgenError::Model(ModelError::RateLimited {
                    model: request.model_id,
                    retry_after_ms: 10,
                }));
            }
        }
        self.inner.complete(request).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
