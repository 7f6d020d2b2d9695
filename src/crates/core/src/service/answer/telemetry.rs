//! Exploration record built from a finished answer.

use localbook_core_types::{AnswerMessage, ExplorationRecord};

const MAX_TOPICS: usize = 5;
const MIN_TOPIC_LEN: usize = 4;
const PREVIEW_CHARS: usize = 200;
const LOW_CONFIDENCE_SCORE: f32 = 0.3;
const NORMAL_CONFIDENCE_SCORE: f32 = 0.7;

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "been", "before", "being", "between", "both",
    "could", "does", "doing", "down", "during", "each", "explain", "from", "have", "having",
    "here", "into", "just", "know", "more", "most", "much", "only", "other", "over", "same",
    "should", "some", "such", "tell", "than", "that", "their", "them", "then", "there", "these",
    "they", "this", "those", "through", "under", "until", "very", "were", "what", "when",
    "where", "which", "while", "with", "would", "your",
];

/// Up to five distinct lowercase words of the question worth tracking.
pub fn derive_topics(question: &str) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for word in question.split(|c: char| !c.is_alphanumeric() && c != '-') {
        let word = word.trim_matches('-').to_lowercase();
        if word.chars().count() < MIN_TOPIC_LEN || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        if !topics.contains(&word) {
            topics.push(word);
        }
        if topics.len() == MAX_TOPICS {
            break;
        }
    }
    topics
}

pub fn build_record(
    notebook_id: &str,
    question: &str,
    message: &AnswerMessage,
    low_confidence: bool,
) -> ExplorationRecord {
    let mut source_ids: Vec<String> = Vec::new();
    for citation in &message.citations {
        if !source_ids.contains(&citation.source_id) {
            source_ids.push(citation.source_id.clone());
        }
    }

    ExplorationRecord {
        notebook_id: notebook_id.to_string(),
        query: question.to_string(),
        topics: derive_topics(question),
        source_ids,
        confidence: if low_confidence {
            LOW_CONFIDENCE_SCORE
        } else {
            NORMAL_CONFIDENCE_SCORE
        },
        preview: message.content.chars().take(PREVIEW_CHARS).collect(),
    }
}
