use crate::models::Accommodation;
use serde::Serialize;
use std::fmt;

/// Step of one search invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    Idle,
    Geocoding,
    SourceSpatial,
    SourceAddress,
    SourceGenerative,
    Deduplicating,
    Done,
    /// Only reachable from `Geocoding`
    Failed,
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SearchStage::Idle => "idle",
            SearchStage::Geocoding => "geocoding",
            SearchStage::SourceSpatial => "map features",
            SearchStage::SourceAddress => "address search",
            SearchStage::SourceGenerative => "generative search",
            SearchStage::Deduplicating => "deduplicating",
            SearchStage::Done => "done",
            SearchStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Progress notifications sent while a search runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SearchEvent {
    Stage { stage: SearchStage },
    /// Merged results and operation log so far
    Progress {
        results: Vec<Accommodation>,
        logs: Vec<String>,
    },
    /// One generative model call finished
    GenerativeQuery {
        prompt_summary: String,
        response_excerpt: String,
    },
}
