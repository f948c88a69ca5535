//! Per-agent-kind structured output parsing.
//!
//! The analyser, researcher and critic return JSON; the drafter and
//! formatter return plain text. A parse failure is recoverable: the
//! runtime retries once with a repair directive appended to the prompt.

use lexgen_core::{
    AgentKind, CriticVerdict, DocumentAnalysis, ModelError, ResearchFinding,
};
use serde::Deserialize;

/// Sum type over the structured products of the five agent kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    Analysis(DocumentAnalysis),
    Findings(Vec<ResearchFinding>),
    Draft(String),
    Verdicts(Vec<CriticVerdict>),
    Formatted(String),
}

impl AgentOutcome {
    /// Short trace summary of this outcome.
    pub fn summary(&self) -> String {
        match self {
            Self::Analysis(a) => format!(
                "analysis: needs_external_info={}, themes={}",
                a.needs_external_info,
                a.themes.join(",")
            ),
            Self::Findings(f) => format!("findings: {} statements", f.len()),
            Self::Draft(d) => format!("draft: {} chars", d.len()),
            Self::Verdicts(v) => {
                let revise = v
                    .iter()
                    .filter(|j| j.disposition == lexgen_core::CriticDisposition::Revise)
                    .count();
                format!("verdicts: {} total, {} revise", v.len(), revise)
            }
            Self::Formatted(t) => format!("formatted: {} chars", t.len()),
        }
    }
}

#[derive(Deserialize)]
struct FindingsEnvelope {
    findings: Vec<ResearchFinding>,
}

#[derive(Deserialize)]
struct VerdictsEnvelope {
    verdicts: Vec<CriticVerdict>,
}

/// Extract the first JSON object from model output, tolerating prose or
/// code fences around it.
fn json_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

fn parse_failure(agent: AgentKind, reason: impl Into<String>) -> ModelError {
    ModelError::ParseFailure {
        agent,
        reason: reason.into(),
    }
}

/// Parse raw model output into the structured form for the agent kind.
pub fn parse_output(agent: AgentKind, text: &str) -> Result<AgentOutcome, ModelError> {
    match agent {
        AgentKind::Analyser => {
            let slice =
                json_slice(text).ok_or_else(|| parse_failure(agent, "no JSON object found"))?;
            let analysis: DocumentAnalysis = serde_json::from_str(slice)
                .map_err(|e| parse_failure(agent, e.to_string()))?;
            Ok(AgentOutcome::Analysis(analysis))
        }
        AgentKind::Researcher => {
            let slice =
                json_slice(text).ok_or_else(|| parse_failure(agent, "no JSON object found"))?;
            let envelope: FindingsEnvelope = serde_json::from_str(slice)
                .map_err(|e| parse_failure(agent, e.to_string()))?;
            Ok(AgentOutcome::Findings(envelope.findings))
        }
        AgentKind::Critic => {
            let slice =
                json_slice(text).ok_or_else(|| parse_failure(agent, "no JSON object found"))?;
            let envelope: VerdictsEnvelope = serde_json::from_str(slice)
                .map_err(|e| parse_failure(agent, e.to_string()))?;
            if envelope.verdicts.is_empty() {
                return Err(parse_failure(agent, "empty verdict list"));
            }
            Ok(AgentOutcome::Verdicts(envelope.verdicts))
        }
        AgentKind::Drafter => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(parse_failure(agent, "empty draft"));
            }
            Ok(AgentOutcome::Draft(trimmed.to_string()))
        }
        AgentKind::Formatter => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(parse_failure(agent, "empty formatted output"));
            }
            Ok(AgentOutcome::Formatted(trimmed.to_string()))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lexgen_core::CriticDisposition;

    #[test]
    fn test_parse_analysis() {
        let text = r#"{"needs_external_info": true, "themes": ["contratos"], "outline": ["Objeto"]}"#;
        let outcome = parse_output(AgentKind::Analyser, text).unwrap();
        match outcome {
            AgentOutcome::Analysis(a) => {
                assert!(a.needs_external_info);
                assert_eq!(a.themes, vec!["contratos".to_string()]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_parse_analysis_with_fences() {
        let text = "```json\n{\"needs_external_info\": false, \"themes\": [], \"outline\": []}\n```";
        assert!(parse_output(AgentKind::Analyser, text).is_ok());
    }

    #[test]
    fn test_parse_analysis_garbage_fails() {
        let err = parse_output(AgentKind::Analyser, "not json at all").unwrap_err();
        assert!(matches!(err, ModelError::ParseFailure { .. }));
    }

    #[test]
    fn test_parse_findings() {
        let text = r#"{"findings": [{"source_id": "juris-001", "statement": "Dever acessório reconhecido", "relevance": 0.9}]}"#;
        let outcome = parse_output(AgentKind::Researcher, text).unwrap();
        match outcome {
            AgentOutcome::Findings(f) => {
                assert_eq!(f.len(), 1);
                assert_eq!(f[0].source_id, "juris-001");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_parse_verdicts() {
        let text = r#"{"verdicts": [{"aspect": "completeness", "disposition": "revise", "rationale": "faltam cláusulas"}]}"#;
        let outcome = parse_output(AgentKind::Critic, text).unwrap();
        match outcome {
            AgentOutcome::Verdicts(v) => {
                assert_eq!(v[0].disposition, CriticDisposition::Revise);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_verdicts_fails() {
        let err = parse_output(AgentKind::Critic, r#"{"verdicts": []}"#).unwrap_err();
        assert!(matches!(err, ModelError::ParseFailure { .. }));
    }

    #[test]
    fn test_parse_draft_plain_text() {
        let outcome = parse_output(AgentKind::Drafter, "  CONTRATO DE PRESTAÇÃO\n... ").unwrap();
        assert_eq!(outcome, AgentOutcome::Draft("CONTRATO DE PRESTAÇÃO\n...".to_string()));
    }

    #[test]
    fn test_parse_empty_draft_fails() {
        assert!(parse_output(AgentKind::Drafter, "   ").is_err());
        assert!(parse_output(AgentKind::Formatter, "").is_err());
    }

    #[test]
    fn test_summaries() {
        let draft = AgentOutcome::Draft("abcd".to_string());
        assert_eq!(draft.summary(), "draft: 4 chars");
        let verdicts = AgentOutcome::Verdicts(vec![CriticVerdict {
            aspect: "x".to_string(),
            disposition: CriticDisposition::Revise,
            rationale: "y".to_string(),
        }]);
        assert_eq!(verdicts.summary(), "verdicts: 1 total, 1 revise");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_drafter_accepts_any_nonempty(text in "\\PC{1,200}") {
            prop_assume!(!text.trim().is_empty());
            let outcome = parse_output(AgentKind::Drafter, &text).unwrap();
            prop_assert!(matches!(outcome, AgentOutcome::Draft(_)));
        }

        #[test]
        fn prop_json_kinds_never_panic(text in "\\PC{0,200}") {
            let _ = parse_output(AgentKind::Analyser, &text);
            let _ = parse_output(AgentKind::Researcher, &text);
            let _ = parse_output(AgentKind::Critic, &text);
        }
    }
}
