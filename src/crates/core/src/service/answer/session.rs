use super::finalize::{
    detect_low_confidence, offers_web_search, strip_leading_citation_markers,
    strip_trailing_references, WEB_SEARCH_OFFER,
};
use super::telemetry::build_record;
use crate::infrastructure::exploration::{spawn_record, ExplorationRecorder};
use crate::service::session::{
    EventHandlerMap, Flow, SessionEvent, StreamFailure, StreamSession,
};
use futures::future::{ready, BoxFuture};
use futures::FutureExt;
use localbook_core_types::{AnswerMessage, AnswerUpdate, Citation};
use localbook_stream_adapters::Frame;
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(50);
const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPhase {
    Streaming,
    Completed,
    Failed,
}

/// One question's streamed answer.
///
/// Content grows append-only while streaming; finalization on `done` is the only
/// step that may shorten it, and nothing changes after a terminal event.
pub struct AnswerSession {
    notebook_id: String,
    question: String,
    message: AnswerMessage,
    pending_tokens: String,
    last_flush: Option<Instant>,
    flush_interval: Duration,
    loading: bool,
    server_low_confidence: bool,
    low_confidence: bool,
    deep_think: bool,
    auto_upgraded: bool,
    phase: AnswerPhase,
    error: Option<String>,
    updates: Option<mpsc::UnboundedSender<AnswerUpdate>>,
    recorder: Option<Arc<dyn ExplorationRecorder>>,
}

impl AnswerSession {
    pub fn new(
        notebook_id: impl Into<String>,
        question: impl Into<String>,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            question: question.into(),
            message: AnswerMessage::assistant(timestamp_ms),
            pending_tokens: String::new(),
            last_flush: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            loading: true,
            server_low_confidence: false,
            low_confidence: false,
            deep_think: false,
            auto_upgraded: false,
            phase: AnswerPhase::Streaming,
            error: None,
            updates: None,
            recorder: None,
        }
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<AnswerUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn ExplorationRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn message(&self) -> &AnswerMessage {
        &self.message
    }

    pub fn into_message(self) -> AnswerMessage {
        self.message
    }

    pub fn phase(&self) -> AnswerPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the "searching" indicator is still shown.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_low_confidence(&self) -> bool {
        self.low_confidence
    }

    pub fn deep_think(&self) -> (bool, bool) {
        (self.deep_think, self.auto_upgraded)
    }

    pub fn pending_len(&self) -> usize {
        self.pending_tokens.len()
    }

    fn publish(&self, update: AnswerUpdate) {
        if let Some(updates) = &self.updates {
            let _ = updates.send(update);
        }
    }

    fn stop_loading(&mut self) {
        if self.loading {
            self.loading = false;
            self.publish(AnswerUpdate::StopLoading);
        }
    }

    fn flush_tokens(&mut self, now: Instant) {
        if self.pending_tokens.is_empty() {
            return;
        }
        self.message.content.push_str(&self.pending_tokens);
        self.pending_tokens.clear();
        self.last_flush = Some(now);
        self.publish(AnswerUpdate::Content {
            content: self.message.content.clone(),
        });
        if !self.message.content.trim().is_empty() {
            self.stop_loading();
        }
    }

    fn apply_mode(&mut self, event: &SessionEvent) {
        self.deep_think = event.bool_field("deep_think");
        self.auto_upgraded = event.bool_field("auto_upgraded");
        self.publish(AnswerUpdate::Mode {
            deep_think: self.deep_think,
            auto_upgraded: self.auto_upgraded,
        });
    }

    fn apply_status(&mut self, event: &SessionEvent) {
        let Some(message) = event.str_field("message") else {
            return;
        };
        self.message.status_message = Some(message.to_string());
        self.publish(AnswerUpdate::Status {
            message: message.to_string(),
        });
    }

    /// Retrieval progress only feeds the status line.
    fn apply_retrieval_progress(&mut self, event: &SessionEvent) {
        if let Some(message) = event.str_field("message") {
            self.publish(AnswerUpdate::Status {
                message: message.to_string(),
            });
        }
    }

    fn apply_citations(&mut self, event: &SessionEvent) {
        let citations = parse_citations(event.payload.get("citations"));
        self.server_low_confidence = event.bool_field("low_confidence");
        self.message.citations = citations.clone();
        self.publish(AnswerUpdate::Citations {
            citations,
            low_confidence: self.server_low_confidence,
        });
    }

    fn apply_quick_summary(&mut self, event: &SessionEvent) {
        let Some(content) = event.str_field("content") else {
            return;
        };
        self.message.quick_summary = Some(content.to_string());
        self.stop_loading();
        self.publish(AnswerUpdate::QuickSummary {
            content: content.to_string(),
        });
    }

    fn apply_token(&mut self, event: &SessionEvent) {
        let Some(content) = event.str_field("content") else {
            return;
        };
        if content.is_empty() {
            return;
        }
        self.pending_tokens.push_str(content);

        let due = self
            .last_flush
            .map_or(true, |last| event.received_at.duration_since(last) >= self.flush_interval);
        if due {
            self.flush_tokens(event.received_at);
        }
    }

    fn complete(&mut self, event: &SessionEvent) {
        self.flush_tokens(event.received_at);

        if let Some(questions) = event.payload.get("follow_up_questions") {
            self.message.follow_up_questions = Some(string_list(questions));
        }

        self.finalize_content();
        self.loading = false;
        self.phase = AnswerPhase::Completed;
        debug!(
            "Answer completed: chars={}, citations={}, low_confidence={}",
            self.message.content.len(),
            self.message.citations.len(),
            self.low_confidence
        );
        self.publish(AnswerUpdate::Completed {
            message: self.message.clone(),
        });

        if let Some(recorder) = &self.recorder {
            let record = build_record(
                &self.notebook_id,
                &self.question,
                &self.message,
                self.low_confidence,
            );
            spawn_record(Arc::clone(recorder), record);
        }
    }

    fn finalize_content(&mut self) {
        let stripped = strip_trailing_references(&self.message.content);
        self.message.content = strip_leading_citation_markers(&stripped);

        self.low_confidence =
            self.server_low_confidence || detect_low_confidence(&self.message.content);
        if self.low_confidence {
            if !offers_web_search(&self.message.content) {
                self.message.content.push_str(WEB_SEARCH_OFFER);
            }
            self.message.low_confidence_query = Some(self.question.clone());
        }
    }

    fn fail(&mut self, error: String, now: Instant) {
        self.flush_tokens(now);
        self.loading = false;
        self.phase = AnswerPhase::Failed;
        self.error = Some(error.clone());
        self.publish(AnswerUpdate::Failed {
            error,
            message: self.message.clone(),
        });
    }

    fn on_mode(session: &mut AnswerSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        session.apply_mode(&event);
        ready(Flow::Continue).boxed()
    }

    fn on_status(session: &mut AnswerSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        session.apply_status(&event);
        ready(Flow::Continue).boxed()
    }

    fn on_retrieval(session: &mut AnswerSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        session.apply_retrieval_progress(&event);
        ready(Flow::Continue).boxed()
    }

    fn on_citations(session: &mut AnswerSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        session.apply_citations(&event);
        ready(Flow::Continue).boxed()
    }

    fn on_quick_summary(session: &mut AnswerSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        session.apply_quick_summary(&event);
        ready(Flow::Continue).boxed()
    }

    fn on_token(session: &mut AnswerSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        session.apply_token(&event);
        ready(Flow::Continue).boxed()
    }

    fn on_done(session: &mut AnswerSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        session.complete(&event);
        ready(Flow::completed()).boxed()
    }

    fn on_error(session: &mut AnswerSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        let error = ["content", "error", "message"]
            .iter()
            .find_map(|key| event.str_field(key))
            .unwrap_or(UNKNOWN_ERROR)
            .to_string();
        warn!("Answer stream reported error: {}", error);
        session.fail(error.clone(), event.received_at);
        ready(Flow::server_error(error)).boxed()
    }
}

impl StreamSession for AnswerSession {
    fn event_handlers() -> EventHandlerMap<Self> {
        EventHandlerMap::new()
            .on("mode", AnswerSession::on_mode)
            .on("status", AnswerSession::on_status)
            .on("retrieval_start", AnswerSession::on_retrieval)
            .on("retrieval_progress", AnswerSession::on_retrieval)
            .on("citations", AnswerSession::on_citations)
            .on("quick_summary", AnswerSession::on_quick_summary)
            .on("token", AnswerSession::on_token)
            .on("done", AnswerSession::on_done)
            .on("error", AnswerSession::on_error)
    }

    /// The backend's top-level failure frame is `{"error": ...}` with no type.
    fn event_name(frame: &Frame, payload: &Value) -> Option<String> {
        match frame.event_type.as_deref() {
            Some(name) if name != Frame::DEFAULT_EVENT_TYPE => Some(name.to_string()),
            _ => payload
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| payload.get("error").map(|_| "error".to_string())),
        }
    }

    fn flush_deadline(&self) -> Option<Instant> {
        if self.pending_tokens.is_empty() {
            return None;
        }
        self.last_flush.map(|last| last + self.flush_interval)
    }

    fn on_flush_deadline(&mut self, now: Instant) {
        self.flush_tokens(now);
    }

    fn on_stream_failure(&mut self, failure: &StreamFailure) {
        warn!("Answer stream failed: {}", failure);
        self.fail(failure.to_string(), Instant::now());
    }
}

fn parse_citations(value: Option<&Value>) -> Vec<Citation> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Citation>(item.clone()) {
            Ok(citation) => Some(citation),
            Err(e) => {
                warn!("Skipping malformed citation: {}", e);
                None
            }
        })
        .collect()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
