use serde::{Deserialize, Serialize};

/// Body of the streaming question endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatQuery {
    pub notebook_id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub deep_think: bool,
    /// Let the backend supplement retrieval with a web search.
    #[serde(default)]
    pub enable_web_search: bool,
    /// Backend decides when unset (decomposes complex questions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_orchestrator: Option<bool>,
}

impl ChatQuery {
    pub fn new(notebook_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            question: question.into(),
            source_ids: None,
            top_k: None,
            llm_provider: None,
            deep_think: false,
            enable_web_search: false,
            use_orchestrator: None,
        }
    }

    /// The same question again, this time allowed to search the web.
    pub fn with_web_search(mut self) -> Self {
        self.enable_web_search = true;
        self
    }
}

/// Body of the streaming visual endpoint.
///
/// A refinement carries the displayed diagram's code plus the user's instruction
/// in `guidance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualStreamRequest {
    pub notebook_id: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_code: Option<String>,
}

impl VisualStreamRequest {
    pub fn new(notebook_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            topic: topic.into(),
            source_ids: None,
            template_id: None,
            color_theme: None,
            guidance: None,
            current_code: None,
        }
    }

    pub fn is_refinement(&self) -> bool {
        self.current_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_query_serializes_backend_field_names() {
        let mut query = ChatQuery::new("nb-1", "What changed?").with_web_search();
        query.use_orchestrator = Some(false);

        let value = serde_json::to_value(&query).expect("serialize");
        assert_eq!(value["enable_web_search"], true);
        assert_eq!(value["use_orchestrator"], false);
        assert_eq!(value["deep_think"], false);
        assert!(value.get("top_k").is_none());
    }

    #[test]
    fn chat_query_defaults_missing_flags() {
        let query: ChatQuery = serde_json::from_value(serde_json::json!({
            "notebook_id": "nb-1",
            "question": "q"
        }))
        .expect("deserialize");
        assert!(!query.enable_web_search);
        assert_eq!(query.use_orchestrator, None);
    }
}
