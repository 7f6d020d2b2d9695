use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One retrieved passage the answer may reference as `[N]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub number: u32,
    pub source_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub chunk_index: Option<u32>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub confidence_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub quick_summary: Option<String>,
    #[serde(default)]
    pub follow_up_questions: Option<Vec<String>>,
    /// Original question, set when the answer was judged weakly grounded.
    #[serde(default)]
    pub low_confidence_query: Option<String>,
    pub timestamp_ms: i64,
}

impl AnswerMessage {
    pub fn user(question: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            role: MessageRole::User,
            content: question.into(),
            ..Self::assistant(timestamp_ms)
        }
    }

    /// Empty assistant slot, created when a question is submitted.
    pub fn assistant(timestamp_ms: i64) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: String::new(),
            status_message: None,
            citations: Vec::new(),
            quick_summary: None,
            follow_up_questions: None,
            low_confidence_query: None,
            timestamp_ms,
        }
    }

    pub fn citation(&self, number: u32) -> Option<&Citation> {
        self.citations.iter().find(|c| c.number == number)
    }
}

/// Changes published by an answer session, in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerUpdate {
    Mode {
        deep_think: bool,
        auto_upgraded: bool,
    },
    Status {
        message: String,
    },
    Citations {
        citations: Vec<Citation>,
        low_confidence: bool,
    },
    QuickSummary {
        content: String,
    },
    /// The "searching" indicator can be hidden.
    StopLoading,
    /// Full content after a batched flush of pending tokens.
    Content {
        content: String,
    },
    Completed {
        message: AnswerMessage,
    },
    Failed {
        error: String,
        message: AnswerMessage,
    },
}
