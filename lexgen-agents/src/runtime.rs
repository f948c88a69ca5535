//! The agent turn runtime.

use crate::parse::{parse_output, AgentOutcome};
use crate::pricing::{default_model_for, PriceTable};
use crate::templates::TemplateRegistry;
use chrono::Utc;
use lexgen_core::{
    AgentKind, BudgetError, CancelToken, CompletionProvider, CompletionRequest, EntityIdType,
    LexgenError, ModelError, RetryConfig, RunState, TurnId, TurnRecord,
};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{instrument, warn};

const INPUT_PREVIEW_BYTES: usize = 200;
const REPAIR_DIRECTIVE: &str =
    "Your previous reply could not be parsed. Respond again following the required output \
     format exactly, with no surrounding prose.";

fn max_tokens_for(agent: AgentKind) -> i32 {
    match agent {
        AgentKind::Drafter | AgentKind::Formatter => 4096,
        AgentKind::Analyser | AgentKind::Researcher | AgentKind::Critic => 1024,
    }
}

/// Outcome and forensic record of one agent turn.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub outcome: AgentOutcome,
    pub record: TurnRecord,
}

/// Executes single agent turns against a completion provider.
pub struct AgentRuntime {
    provider: Arc<dyn CompletionProvider>,
    templates: Arc<TemplateRegistry>,
    pricing: PriceTable,
    retry: RetryConfig,
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        templates: Arc<TemplateRegistry>,
        pricing: PriceTable,
        retry: RetryConfig,
    ) -> Self {
        Self {
            provider,
            templates,
            pricing,
            retry,
        }
    }

    /// Resolve the model for an agent kind from tenant preferences.
    pub fn model_for(&self, state: &RunState, agent: AgentKind) -> String {
        state
            .config
            .model_preferences
            .get(&agent)
            .cloned()
            .unwrap_or_else(|| default_model_for(agent).to_string())
    }

    /// Execute one agent turn.
    ///
    /// `extras` carries caller-supplied prompt slots (quality signals,
    /// formatted citations). `remaining_ms` is the remaining wall-clock
    /// budget; the effective call timeout is capped by the per-turn
    /// ceiling.
    #[instrument(skip(self, state, extras, cancel), fields(agent = agent.as_db_str()))]
    pub async fn execute_turn(
        &self,
        state: &RunState,
        agent: AgentKind,
        extras: &[(String, String)],
        remaining_ms: i64,
        per_turn_ceiling_ms: i64,
        cancel: &CancelToken,
    ) -> Result<TurnOutput, LexgenError> {
        let timeout_ms = remaining_ms.min(per_turn_ceiling_ms);
        if timeout_ms <= 0 {
            return Err(LexgenError::Budget(BudgetError::DeadlineExceeded {
                deadline_ms: state.budget.deadline_ms,
            }));
        }

        let model = self.model_for(state, agent);
        let template = self
            .templates
            .resolve(agent, state.document_type.as_deref())
            .ok_or_else(|| {
                LexgenError::Model(ModelError::NotConfigured {
                    model: model.clone(),
                })
            })?;

        let slots = prompt_slots(state, extras);
        let slot_refs: Vec<(&str, &str)> = slots.iter().map(|(n, v)| (*n, v.as_str())).collect();
        let base_prompt = template.render(&slot_refs);
        let started_at = Utc::now();
        let started = Instant::now();

        let mut attempt = 0;
        let mut repaired = false;
        loop {
            attempt += 1;
            cancel.check()?;

            let prompt = if repaired {
                format!("{}\n\n{}", base_prompt, REPAIR_DIRECTIVE)
            } else {
                base_prompt.clone()
            };
            let request = CompletionRequest {
                model_id: model.clone(),
                system: template.system.clone(),
                prompt: prompt.clone(),
                max_tokens: max_tokens_for(agent),
            };

            let call = tokio::time::timeout(
                Duration::from_millis(timeout_ms as u64),
                self.provider.complete(request),
            )
            .await;
            let result = match call {
                Ok(result) => result,
                Err(_) => Err(LexgenError::Model(ModelError::Timeout {
                    model: model.clone(),
                    timeout_ms,
                })),
            };

            match result {
                Ok(response) => match parse_output(agent, &response.text) {
                    Ok(outcome) => {
                        let record = TurnRecord {
                            turn_id: TurnId::now_v7(),
                            agent,
                            model_id: model.clone(),
                            input_tokens: response.input_tokens,
                            output_tokens: response.output_tokens,
                            duration_ms: started.elapsed().as_millis() as i64,
                            summary: outcome.summary(),
                            input_preview: preview_of(&prompt),
                            cost: self.pricing.cost_of(
                                &model,
                                response.input_tokens,
                                response.output_tokens,
                            ),
                            error: None,
                            started_at,
                        };
                        return Ok(TurnOutput { outcome, record });
                    }
                    Err(parse_err) if !repaired => {
                        warn!(error = %parse_err, "parse failure, retrying with repair directive");
                        repaired = true;
                    }
                    Err(parse_err) => return Err(LexgenError::Model(parse_err)),
                },
                Err(e) => {
                    let transient =
                        matches!(&e, LexgenError::Model(m) if m.is_transient());
                    if transient && attempt < self.retry.max_attempts {
                        let delay = self.backoff_delay(attempt);
                        warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "transient model error, backing off");
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Exponential backoff with full jitter.
    fn backoff_delay(&self, attempt: i32) -> Duration {
        let exponent = (attempt - 1).max(0) as u32;
        let multiplier = self.retry.backoff_multiplier.max(1.0) as f64;
        let cap = (self.retry.initial_backoff_ms as f64 * multiplier.powi(exponent as i32))
            .min(self.retry.max_backoff_ms as f64)
            .max(1.0) as u64;
        let jittered = rand::rng().random_range(0..=cap);
        Duration::from_millis(jittered)
    }
}

/// Assemble the prompt slots from the run state.
fn prompt_slots(state: &RunState, extras: &[(String, String)]) -> Vec<(&'static str, String)> {
    let context = state
        .latest_retrieval()
        .map(|record| {
            record
                .hits
                .iter()
                .take(5)
                .map(|h| format!("[{}] {}", h.source_id, h.excerpt))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| "none".to_string());

    let analysis = state
        .working
        .analysis
        .as_ref()
        .and_then(|a| serde_json::to_string(&a.value).ok())
        .unwrap_or_else(|| "none".to_string());

    let findings = state
        .working
        .findings
        .as_ref()
        .map(|f| {
            f.value
                .iter()
                .map(|finding| format!("[{}] {}", finding.source_id, finding.statement))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| "none".to_string());

    let draft = state
        .working
        .draft
        .as_ref()
        .map(|d| d.value.clone())
        .unwrap_or_else(|| "none".to_string());

    let verdicts = state
        .working
        .verdicts
        .as_ref()
        .map(|v| {
            v.value
                .iter()
                .map(|j| {
                    format!(
                        "{}: {:?} - {}",
                        j.aspect, j.disposition, j.rationale
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| "none".to_string());

    let mut slots: Vec<(&'static str, String)> = vec![
        ("task", state.task.as_db_str().to_string()),
        ("query", state.redacted_query.clone()),
        (
            "document_type",
            state
                .document_type
                .clone()
                .unwrap_or_else(|| "generic".to_string()),
        ),
        ("context", context),
        ("analysis", analysis),
        ("findings", findings),
        ("draft", draft),
        ("verdicts", verdicts),
        ("quality", "none".to_string()),
        ("citations", "none".to_string()),
    ];
    for (name, value) in extras {
        if let Some(slot) = slots.iter_mut().find(|(n, _)| *n == name.as_str()) {
            slot.1 = value.clone();
        }
    }
    slots
}

fn preview_of(prompt: &str) -> String {
    if prompt.len() <= INPUT_PREVIEW_BYTES {
        return prompt.to_string();
    }
    let mut end = INPUT_PREVIEW_BYTES;
    while end > 0 && !prompt.is_char_boundary(end) {
        end -= 1;
    }
    prompt[..end].to_string()
}

// ============================================================================
// TESTS
// ============================================================================
