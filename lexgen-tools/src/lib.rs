//! LEXGEN Tools - Typed Capability Registry
//!
//! A single name-keyed registry with declarative schemas rather than
//! per-tool inheritance. Parameter validation is data-driven; new tools
//! are additions to the registry, not new type hierarchies. Tools are
//! stateless with respect to run state: they receive their inputs
//! explicitly and the caller writes results back.

mod builtin;
mod registry;
mod schema;

pub use builtin::{
    default_registry, DocumentAnalyseTool, FormatCitationTool, JurisCase,
    JurisprudenceSearchTool, QualityScoreTool, RetrieveTool,
};
pub use registry::{Tool, ToolRegistry};
pub use schema::{ParamType, ToolParam, ToolSchema};
