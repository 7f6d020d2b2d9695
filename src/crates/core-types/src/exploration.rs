use serde::{Deserialize, Serialize};

/// History entry handed to the exploration recorder after an answer completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationRecord {
    pub notebook_id: String,
    pub query: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, rename = "sources_used")]
    pub source_ids: Vec<String>,
    pub confidence: f32,
    #[serde(default, rename = "answer_preview")]
    pub preview: String,
}
