//! Declarative tool schemas and data-driven argument validation.

use lexgen_core::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameter types a tool schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Whether a JSON value satisfies this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            // Integers are acceptable where floats are declared.
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
}

impl ToolParam {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required: true,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required: false,
            description: description.to_string(),
        }
    }
}

/// Declarative schema of a tool: name, parameters and result description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
    /// Human-readable description of the result shape.
    pub returns: String,
}

impl ToolSchema {
    /// Validate an argument map against this schema: every required
    /// parameter present, no unknown parameters, types matching.
    pub fn validate(&self, args: &serde_json::Map<String, Value>) -> Result<(), ToolError> {
        for param in &self.params {
            match args.get(&param.name) {
                Some(value) => {
                    if !param.param_type.accepts(value) {
                        return Err(ToolError::InvalidArguments {
                            tool: self.name.clone(),
                            reason: format!(
                                "parameter '{}' expects {:?}",
                                param.name, param.param_type
                            ),
                        });
                    }
                }
                None if param.required => {
                    return Err(ToolError::InvalidArguments {
                        tool: self.name.clone(),
                        reason: format!("missing required parameter '{}'", param.name),
                    });
                }
                None => {}
            }
        }
        for key in args.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                return Err(ToolError::InvalidArguments {
                    tool: self.name.clone(),
                    reason: format!("unknown parameter '{}'", key),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ToolSchema {
        ToolSchema {
            name: "sample".to_string(),
            description: "sample tool".to_string(),
            params: vec![
                ToolParam::required("query", ParamType::String, "search query"),
                ToolParam::optional("limit", ParamType::Integer, "max results"),
            ],
            returns: "list of hits".to_string(),
        }
    }

    fn args(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_valid_args() {
        let s = schema();
        assert!(s.validate(&args(json!({"query": "contrato"}))).is_ok());
        assert!(s
            .validate(&args(json!({"query": "contrato", "limit": 5})))
            .is_ok());
    }

    #[test]
    fn test_missing_required() {
        let s = schema();
        let err = s.validate(&args(json!({"limit": 5}))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_unknown_parameter() {
        let s = schema();
        let err = s
            .validate(&args(json!({"query": "x", "bogus": 1})))
            .unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_type_mismatch() {
        let s = schema();
        let err = s
            .validate(&args(json!({"query": "x", "limit": "five"})))
            .unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_float_accepts_integer() {
        assert!(ParamType::Float.accepts(&json!(1)));
        assert!(ParamType::Float.accepts(&json!(0.5)));
        assert!(!ParamType::Integer.accepts(&json!(0.5)));
    }
}
