//! The built-in tool set: retrieval, jurisprudence lookup, citation
//! formatting, quality scoring and document analysis.

use crate::registry::{Tool, ToolRegistry};
use crate::schema::{ParamType, ToolParam, ToolSchema};
use async_trait::async_trait;
use lexgen_core::{CancelToken, ExternalDocument, TenantId, ToolError};
use lexgen_retrieval::{infer_theme, lexical_overlap, Federator, RetrievalRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:REsp|AgRg|RE\s|HC\s|RR\s|[Aa]rt\.\s*\d+|Lei\s+n[ºo°.]?\s*[\d.]+|Súmula\s+\d+)")
        .unwrap()
});

fn str_arg(args: &serde_json::Map<String, Value>, name: &str) -> Option<String> {
    args.get(name).and_then(|v| v.as_str()).map(str::to_string)
}

fn int_arg(args: &serde_json::Map<String, Value>, name: &str) -> Option<i64> {
    args.get(name).and_then(|v| v.as_i64())
}

fn bool_arg(args: &serde_json::Map<String, Value>, name: &str) -> Option<bool> {
    args.get(name).and_then(|v| v.as_bool())
}

fn float_arg(args: &serde_json::Map<String, Value>, name: &str) -> Option<f64> {
    args.get(name).and_then(|v| v.as_f64())
}

// ============================================================================
// RETRIEVE
// ============================================================================

/// The `retrieve` tool: wraps the retrieval federator.
pub struct RetrieveTool {
    federator: Arc<Federator>,
    schema: ToolSchema,
}

impl RetrieveTool {
    pub fn new(federator: Arc<Federator>) -> Self {
        Self {
            federator,
            schema: ToolSchema {
                name: "retrieve".to_string(),
                description: "Federated hybrid retrieval over the tenant index and caller documents"
                    .to_string(),
                params: vec![
                    ToolParam::required("tenant_id", ParamType::String, "Tenant identifier"),
                    ToolParam::required("query", ParamType::String, "Search query"),
                    ToolParam::required("k", ParamType::Integer, "Desired total hit count"),
                    ToolParam::optional(
                        "use_internal",
                        ParamType::Boolean,
                        "Search the internal index (default true)",
                    ),
                    ToolParam::optional(
                        "personalise",
                        ParamType::Boolean,
                        "Apply the tenant centroid shift (default false)",
                    ),
                    ToolParam::optional(
                        "alpha",
                        ParamType::Float,
                        "Centroid blend factor (default 0.25)",
                    ),
                    ToolParam::optional(
                        "external_documents",
                        ParamType::Array,
                        "Caller-supplied documents to federate",
                    ),
                ],
                returns: "The retrieval record with ranked, deduplicated hits".to_string(),
            },
        }
    }
}

#[async_trait]
impl Tool for RetrieveTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        cancel: &CancelToken,
    ) -> Result<Value, ToolError> {
        let tenant_id = str_arg(args, "tenant_id")
            .and_then(TenantId::new)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "retrieve".to_string(),
                reason: "tenant_id must be non-empty".to_string(),
            })?;
        let external_documents: Vec<ExternalDocument> = match args.get("external_documents") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ToolError::InvalidArguments {
                    tool: "retrieve".to_string(),
                    reason: format!("external_documents malformed: {}", e),
                }
            })?,
            None => Vec::new(),
        };

        let request = RetrievalRequest {
            tenant_id,
            query: str_arg(args, "query").unwrap_or_default(),
            k: int_arg(args, "k").unwrap_or(0) as i32,
            external_documents,
            use_internal: bool_arg(args, "use_internal").unwrap_or(true),
            personalise: bool_arg(args, "personalise").unwrap_or(false),
            alpha: float_arg(args, "alpha").unwrap_or(0.25) as f32,
        };

        let record = self
            .federator
            .retrieve(&request, cancel)
            .await
            .map_err(|e| ToolError::Failed {
                tool: "retrieve".to_string(),
                reason: e.to_string(),
                recoverable: false,
            })?;

        serde_json::to_value(&record).map_err(|e| ToolError::Failed {
            tool: "retrieve".to_string(),
            reason: format!("result serialisation failed: {}", e),
            recoverable: false,
        })
    }
}

// ============================================================================
// JURISPRUDENCE SEARCH
// ============================================================================

/// One court decision in the jurisprudence corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisCase {
    pub case_id: String,
    pub court: String,
    pub year: i32,
    pub summary: String,
}

fn default_juris_corpus() -> Vec<JurisCase> {
    vec![
        JurisCase {
            case_id: "stj-resp-1737428".to_string(),
            court: "STJ".to_string(),
            year: 2019,
            summary: "Responsabilidade contratual e dever de indenizar por descumprimento de obrigações acessórias".to_string(),
        },
        JurisCase {
            case_id: "stj-resp-1614721".to_string(),
            court: "STJ".to_string(),
            year: 2017,
            summary: "Rescisão de contrato de prestação de serviços e retenção de valores".to_string(),
        },
        JurisCase {
            case_id: "stf-re-636331".to_string(),
            court: "STF".to_string(),
            year: 2017,
            summary: "Limites da responsabilidade do transportador aéreo em contratos internacionais".to_string(),
        },
        JurisCase {
            case_id: "tst-rr-100045".to_string(),
            court: "TST".to_string(),
            year: 2020,
            summary: "Verbas rescisórias em contrato de trabalho intermitente".to_string(),
        },
        JurisCase {
            case_id: "stj-resp-1340553".to_string(),
            court: "STJ".to_string(),
            year: 2018,
            summary: "Prescrição intercorrente na execução fiscal e imposto devido".to_string(),
        },
        JurisCase {
            case_id: "stf-adi-5766".to_string(),
            court: "STF".to_string(),
            year: 2021,
            summary: "Constitucionalidade de honorários periciais no processo do trabalho".to_string(),
        },
    ]
}

/// The `jurisprudence_search` tool: lookup over a seeded decision corpus
/// with court and year filters.
pub struct JurisprudenceSearchTool {
    corpus: Vec<JurisCase>,
    schema: ToolSchema,
}

impl JurisprudenceSearchTool {
    pub fn new() -> Self {
        Self::with_corpus(default_juris_corpus())
    }

    pub fn with_corpus(corpus: Vec<JurisCase>) -> Self {
        Self {
            corpus,
            schema: ToolSchema {
                name: "jurisprudence_search".to_string(),
                description: "Search court decisions relevant to a query".to_string(),
                params: vec![
                    ToolParam::required("query", ParamType::String, "Search query"),
                    ToolParam::optional("court", ParamType::String, "Restrict to one court"),
                    ToolParam::optional("min_year", ParamType::Integer, "Minimum decision year"),
                    ToolParam::optional(
                        "limit",
                        ParamType::Integer,
                        "Maximum results (default 5)",
                    ),
                ],
                returns: "Matching decisions with relevance scores".to_string(),
            },
        }
    }
}

impl Default for JurisprudenceSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for JurisprudenceSearchTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _cancel: &CancelToken,
    ) -> Result<Value, ToolError> {
        let query = str_arg(args, "query").unwrap_or_default();
        let court = str_arg(args, "court");
        let min_year = int_arg(args, "min_year").unwrap_or(0) as i32;
        let limit = int_arg(args, "limit").unwrap_or(5).max(0) as usize;

        let mut scored: Vec<(f32, &JurisCase)> = self
            .corpus
            .iter()
            .filter(|c| court.as_deref().map(|ct| c.court == ct).unwrap_or(true))
            .filter(|c| c.year >= min_year)
            .filter_map(|c| {
                let score = lexical_overlap(&query, &c.summary);
                (score > 0.0).then_some((score, c))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.case_id.cmp(&b.1.case_id))
        });

        let cases: Vec<Value> = scored
            .into_iter()
            .take(limit)
            .map(|(score, c)| {
                json!({
                    "case_id": c.case_id.clone(),
                    "court": c.court.clone(),
                    "year": c.year,
                    "summary": c.summary.clone(),
                    "score": score,
                })
            })
            .collect();

        Ok(json!({ "cases": cases }))
    }
}

// ============================================================================
// FORMAT CITATION
// ============================================================================

/// The `format_citation` tool: ABNT-style citation assembly from
/// structured fields.
pub struct FormatCitationTool {
    schema: ToolSchema,
}

impl FormatCitationTool {
    pub fn new() -> Self {
        Self {
            schema: ToolSchema {
                name: "format_citation".to_string(),
                description: "Format a court decision citation in ABNT style".to_string(),
                params: vec![
                    ToolParam::required("court", ParamType::String, "Deciding court"),
                    ToolParam::required("case_number", ParamType::String, "Case number"),
                    ToolParam::required("year", ParamType::Integer, "Decision year"),
                    ToolParam::optional("rapporteur", ParamType::String, "Reporting judge"),
                ],
                returns: "The formatted citation string".to_string(),
            },
        }
    }

    fn court_full_name(court: &str) -> &str {
        match court {
            "STF" => "Supremo Tribunal Federal",
            "STJ" => "Superior Tribunal de Justiça",
            "TST" => "Tribunal Superior do Trabalho",
            other => other,
        }
    }
}

impl Default for FormatCitationTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FormatCitationTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _cancel: &CancelToken,
    ) -> Result<Value, ToolError> {
        let court = str_arg(args, "court").unwrap_or_default();
        let case_number = str_arg(args, "case_number").unwrap_or_default();
        let year = int_arg(args, "year").unwrap_or(0);
        let rapporteur = str_arg(args, "rapporteur");

        let citation = match rapporteur {
            Some(r) => format!(
                "BRASIL. {}. {}. Relator: {}. Julgado em {}.",
                Self::court_full_name(&court),
                case_number,
                r,
                year
            ),
            None => format!(
                "BRASIL. {}. {}. Julgado em {}.",
                Self::court_full_name(&court),
                case_number,
                year
            ),
        };

        Ok(json!({ "citation": citation }))
    }
}

// ============================================================================
// QUALITY SCORE
// ============================================================================

/// The `quality_score` tool: deterministic draft quality heuristic over
/// length, structure and citation density.
pub struct QualityScoreTool {
    schema: ToolSchema,
}

impl QualityScoreTool {
    pub fn new() -> Self {
        Self {
            schema: ToolSchema {
                name: "quality_score".to_string(),
                description: "Score a draft on length, structure and citation density".to_string(),
                params: vec![ToolParam::required(
                    "text",
                    ParamType::String,
                    "Draft text to score",
                )],
                returns: "Score in [0,1] with the contributing statistics".to_string(),
            },
        }
    }
}

impl Default for QualityScoreTool {
    fn default() -> Self {
        Self::new()
    }
}

fn heading_count(text: &str) -> usize {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && (trimmed.ends_with(':')
                    || trimmed.to_lowercase().starts_with("cláusula")
                    || trimmed.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
                        && trimmed.contains('.'))
        })
        .count()
}

#[async_trait]
impl Tool for QualityScoreTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _cancel: &CancelToken,
    ) -> Result<Value, ToolError> {
        let text = str_arg(args, "text").unwrap_or_default();
        let word_count = text.split_whitespace().count();
        let paragraph_count = text
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count();
        let headings = heading_count(&text);
        let citations = CITATION_RE.find_iter(&text).count();

        let length_factor = (word_count as f32 / 300.0).min(1.0) * 0.4;
        let structure_factor = if paragraph_count >= 3 { 0.2 } else { 0.0 };
        let heading_factor = if headings > 0 { 0.2 } else { 0.0 };
        let citation_factor = if citations > 0 { 0.2 } else { 0.0 };
        let score = (length_factor + structure_factor + heading_factor + citation_factor)
            .clamp(0.0, 1.0);

        Ok(json!({
            "score": score,
            "word_count": word_count,
            "paragraph_count": paragraph_count,
            "heading_count": headings,
            "citation_count": citations,
        }))
    }
}

// ============================================================================
// DOCUMENT ANALYSE
// ============================================================================

/// The `document_analyse` tool: structure statistics and a
/// needs-research signal over a document or query.
pub struct DocumentAnalyseTool {
    schema: ToolSchema,
}

impl DocumentAnalyseTool {
    pub fn new() -> Self {
        Self {
            schema: ToolSchema {
                name: "document_analyse".to_string(),
                description: "Analyse document structure and research needs".to_string(),
                params: vec![ToolParam::required(
                    "text",
                    ParamType::String,
                    "Document or query text",
                )],
                returns: "Structure statistics, inferred theme and research signal".to_string(),
            },
        }
    }
}

impl Default for DocumentAnalyseTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DocumentAnalyseTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _cancel: &CancelToken,
    ) -> Result<Value, ToolError> {
        let text = str_arg(args, "text").unwrap_or_default();
        let word_count = text.split_whitespace().count();
        let paragraph_count = text
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count();
        let headings = heading_count(&text);
        let citations = CITATION_RE.find_iter(&text).count();
        let theme = infer_theme(&text);
        // Short material without citations will not support a grounded
        // draft on its own.
        let needs_research = word_count < 200 || citations == 0;

        Ok(json!({
            "word_count": word_count,
            "paragraph_count": paragraph_count,
            "heading_count": headings,
            "citation_count": citations,
            "theme": theme,
            "needs_research": needs_research,
        }))
    }
}

// ============================================================================
// DEFAULT REGISTRY
// ============================================================================

/// Build the standard registry with all five required tools.
pub fn default_registry(federator: Arc<Federator>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(RetrieveTool::new(federator)));
    registry.register(Arc::new(JurisprudenceSearchTool::new()));
    registry.register(Arc::new(FormatCitationTool::new()));
    registry.register(Arc::new(QualityScoreTool::new()));
    registry.register(Arc::new(DocumentAnalyseTool::new()));
    registry
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lexgen_core::{RetrievalRecord, RetrievalSettings};
    use lexgen_retrieval::{
        CentroidStore, MockEmbeddingProvider, MockLexicalSearcher, MockVectorSearcher,
    };

    fn federator() -> Arc<Federator> {
        let corpus = vec![
            (
                "juris-001".to_string(),
                "Obrigações contratuais e deveres acessórios".to_string(),
            ),
            (
                "juris-002".to_string(),
                "Regime tributário das sociedades".to_string(),
            ),
        ];
        Arc::new(Federator::new(
            Arc::new(MockVectorSearcher::new(corpus.clone(), 64)),
            Arc::new(MockLexicalSearcher::new(corpus)),
            Arc::new(MockEmbeddingProvider::new("mock-embed", 64)),
            Arc::new(CentroidStore::new(86_400_000)),
            RetrievalSettings::default(),
        ))
    }

    #[tokio::test]
    async fn test_default_registry_has_required_tools() {
        let registry = default_registry(federator());
        assert_eq!(
            registry.names(),
            vec![
                "document_analyse".to_string(),
                "format_citation".to_string(),
                "jurisprudence_search".to_string(),
                "quality_score".to_string(),
                "retrieve".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_retrieve_tool_roundtrip() {
        let registry = default_registry(federator());
        let result = registry
            .invoke(
                "retrieve",
                json!({
                    "tenant_id": "T1",
                    "query": "obrigações contratuais",
                    "k": 5
                }),
                &CancelToken::new(),
            )
            .await
            .unwrap();
        let record: RetrievalRecord = serde_json::from_value(result).unwrap();
        assert!(!record.hits.is_empty());
        assert_eq!(record.hits[0].source_id, "juris-001");
    }

    #[tokio::test]
    async fn test_retrieve_tool_rejects_missing_query() {
        let registry = default_registry(federator());
        let err = registry
            .invoke(
                "retrieve",
                json!({"tenant_id": "T1", "k": 5}),
                &CancelToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_jurisprudence_search_filters() {
        let tool = JurisprudenceSearchTool::new();
        let args = json!({
            "query": "contrato rescisão serviços",
            "court": "STJ",
            "min_year": 2017
        });
        let result = tool
            .invoke(args.as_object().unwrap(), &CancelToken::new())
            .await
            .unwrap();
        let cases = result["cases"].as_array().unwrap();
        assert!(!cases.is_empty());
        for case in cases {
            assert_eq!(case["court"], "STJ");
            assert!(case["year"].as_i64().unwrap() >= 2017);
        }
    }

    #[tokio::test]
    async fn test_jurisprudence_search_no_match() {
        let tool = JurisprudenceSearchTool::new();
        let args = json!({"query": "astronomia quântica"});
        let result = tool
            .invoke(args.as_object().unwrap(), &CancelToken::new())
            .await
            .unwrap();
        assert!(result["cases"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_format_citation_with_rapporteur() {
        let tool = FormatCitationTool::new();
        let args = json!({
            "court": "STJ",
            "case_number": "REsp 1.737.428/RS",
            "year": 2019,
            "rapporteur": "Min. Nancy Andrighi"
        });
        let result = tool
            .invoke(args.as_object().unwrap(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(
            result["citation"],
            "BRASIL. Superior Tribunal de Justiça. REsp 1.737.428/RS. Relator: Min. Nancy Andrighi. Julgado em 2019."
        );
    }

    #[tokio::test]
    async fn test_quality_score_structured_text_scores_higher() {
        let tool = QualityScoreTool::new();
        let poor = json!({"text": "texto curto"});
        let rich_text = format!(
            "Cláusula Primeira: Do Objeto\n\n{}\n\nCláusula Segunda: Das Obrigações\n\nConforme o art. 421 do Código Civil.\n\nEncerramento.",
            "palavra ".repeat(300)
        );
        let rich = json!({"text": rich_text});
        let poor_score = tool
            .invoke(poor.as_object().unwrap(), &CancelToken::new())
            .await
            .unwrap()["score"]
            .as_f64()
            .unwrap();
        let rich_score = tool
            .invoke(rich.as_object().unwrap(), &CancelToken::new())
            .await
            .unwrap()["score"]
            .as_f64()
            .unwrap();
        assert!(rich_score > poor_score);
        assert!(rich_score >= 0.9);
    }

    #[tokio::test]
    async fn test_document_analyse_needs_research_signal() {
        let tool = DocumentAnalyseTool::new();
        let args = json!({"text": "resumo de obrigações contratuais"});
        let result = tool
            .invoke(args.as_object().unwrap(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(result["needs_research"], true);
        assert_eq!(result["theme"], "contratos");
    }
}
