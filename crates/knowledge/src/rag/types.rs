//! RAG response types.

use serde::{Deserialize, Serialize};

/// A single source reference used to answer a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSourceRef {
    /// URL or file path of the originating document
    pub source: String,

    /// Short snippet of the best matching passage (truncated if needed)
    pub snippet: String,

    /// Cosine similarity of that passage to the query
    pub score: f32,
}

/// Answer synthesized by the LLM plus the sources it was given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,

    /// Sources in rank order, one per distinct document
    pub sources: Vec<RagSourceRef>,

    /// Highest similarity score from the search; 0.0 when nothing was retrieved
    #[serde(skip_serializing, default)]
    pub max_score: f32,
}

impl RagResponse {
    pub fn new(answer: String, sources: Vec<RagSourceRef>) -> Self {
        let max_score = sources
            .iter()
            .map(|s| s.score)
            .fold(0.0f32, f32::max);

        Self {
            answer,
            sources,
            max_score,
        }
    }
}
