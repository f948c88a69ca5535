//! LEXGEN Retrieval - Federated Hybrid Search
//!
//! Tenant-personalised retrieval over three concurrent legs:
//! - Semantic search over the tenant's internal vector index
//! - Lexical search over the same corpus
//! - In-memory ranking of caller-supplied documents
//!
//! Legs run under independent deadlines; partial failure is non-fatal.
//! Rankings are combined by reciprocal-rank fusion, optionally after a
//! personalisation shift of the query embedding toward the tenant's
//! thematic centroid.

mod centroid;
mod federator;
mod fusion;
mod mock;
mod traits;

pub use centroid::{infer_theme, CentroidStore};
pub use federator::{Federator, RetrievalRequest};
pub use fusion::{fuse, lexical_overlap, FusedCandidate, LegHit, LegRanking};
pub use mock::{
    deterministic_embedding, FailingLexicalSearcher, FailingVectorSearcher,
    MockEmbeddingProvider, MockLexicalSearcher, MockVectorSearcher,
};
pub use traits::{LexicalSearcher, SearchHit, VectorSearcher};
