use futures::future::BoxFuture;
use localbook_stream_adapters::Frame;
use log::{debug, trace, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

const MAX_LOGGED_PAYLOAD_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamFailure {
    /// Explicit `error` event from the server.
    #[error("{0}")]
    Server(String),
    #[error("stream closed before response completed")]
    UnexpectedEnd,
    #[error("stream transport error: {0}")]
    Transport(String),
    #[error("stream idle for {}s", .0.as_secs())]
    IdleTimeout(Duration),
    #[error("session cancelled")]
    Cancelled,
    #[error("session did not complete within {}s", .0.as_secs())]
    DeadlineExceeded(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed(StreamFailure),
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished(SessionOutcome),
}

impl Flow {
    pub fn completed() -> Self {
        Flow::Finished(SessionOutcome::Completed)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Flow::Finished(SessionOutcome::Failed(StreamFailure::Server(message.into())))
    }
}

/// A frame whose payload parsed, resolved to its event name.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub name: String,
    pub payload: Value,
    pub received_at: Instant,
}

impl SessionEvent {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn bool_field(&self, key: &str) -> bool {
        self.payload
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

pub type EventHandler<S> = for<'a> fn(&'a mut S, SessionEvent) -> BoxFuture<'a, Flow>;

pub struct EventHandlerMap<S> {
    handlers: HashMap<&'static str, EventHandler<S>>,
}

impl<S> EventHandlerMap<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn on(mut self, event: &'static str, handler: EventHandler<S>) -> Self {
        self.handlers.insert(event, handler);
        self
    }

    pub fn get(&self, event: &str) -> Option<EventHandler<S>> {
        self.handlers.get(event).copied()
    }

    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }
}

impl<S> Default for EventHandlerMap<S> {
    fn default() -> Self {
        Self::new()
    }
}

pub trait StreamSession: Send + Sized {
    fn event_handlers() -> EventHandlerMap<Self>;

    /// Event name of a frame. Payload-only frames carry it in the `type` member.
    fn event_name(frame: &Frame, payload: &Value) -> Option<String> {
        match frame.event_type.as_deref() {
            Some(name) if name != Frame::DEFAULT_EVENT_TYPE => Some(name.to_string()),
            _ => payload
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// When deferred work is due; the driver wakes the session at that instant.
    fn flush_deadline(&self) -> Option<Instant> {
        None
    }

    fn on_flush_deadline(&mut self, _now: Instant) {}

    /// The stream ended without a terminal event, or the transport failed.
    fn on_stream_failure(&mut self, failure: &StreamFailure);
}

/// Applies frames to a session strictly one at a time.
pub struct SessionReducer<S: StreamSession> {
    session: S,
    handlers: EventHandlerMap<S>,
    outcome: Option<SessionOutcome>,
    frames_applied: u64,
    frames_dropped: u64,
}

impl<S: StreamSession> SessionReducer<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            handlers: S::event_handlers(),
            outcome: None,
            frames_applied: 0,
            frames_dropped: 0,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub async fn reduce(&mut self, frame: Frame, now: Instant) -> Flow {
        if let Some(outcome) = &self.outcome {
            debug!(
                "Ignoring frame after terminal event: event={}",
                frame.event_type()
            );
            return Flow::Finished(outcome.clone());
        }

        let payload = if frame.payload.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&frame.payload) {
                Ok(value) => value,
                Err(e) => {
                    self.frames_dropped += 1;
                    warn!(
                        "Dropping frame with malformed payload: event={}, error={}, data={}",
                        frame.event_type(),
                        e,
                        truncate_for_log(&frame.payload)
                    );
                    return Flow::Continue;
                }
            }
        };

        let Some(name) = S::event_name(&frame, &payload) else {
            debug!(
                "Ignoring frame without event name: data={}",
                truncate_for_log(&frame.payload)
            );
            return Flow::Continue;
        };
        let Some(handler) = self.handlers.get(&name) else {
            debug!("Ignoring unhandled event: {}", name);
            return Flow::Continue;
        };

        trace!("Applying event: {}", name);
        self.frames_applied += 1;
        let flow = handler(
            &mut self.session,
            SessionEvent {
                name,
                payload,
                received_at: now,
            },
        )
        .await;

        if let Flow::Finished(outcome) = &flow {
            debug!(
                "Session reached terminal event after {} frames: {:?}",
                self.frames_applied, outcome
            );
            self.outcome = Some(outcome.clone());
        }
        flow
    }

    /// Terminates the session from outside the event stream.
    pub fn fail(&mut self, failure: StreamFailure) -> SessionOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        self.session.on_stream_failure(&failure);
        let outcome = SessionOutcome::Failed(failure);
        self.outcome = Some(outcome.clone());
        outcome
    }
}

fn truncate_for_log(text: &str) -> String {
    if text.chars().count() <= MAX_LOGGED_PAYLOAD_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_LOGGED_PAYLOAD_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
        failure: Option<StreamFailure>,
    }

    impl Recorder {
        fn on_item(session: &mut Recorder, event: SessionEvent) -> BoxFuture<'_, Flow> {
            session
                .seen
                .push(event.str_field("value").unwrap_or_default().to_string());
            futures::future::ready(Flow::Continue).boxed()
        }

        fn on_end(session: &mut Recorder, _event: SessionEvent) -> BoxFuture<'_, Flow> {
            session.seen.push("end".to_string());
            futures::future::ready(Flow::completed()).boxed()
        }
    }

    impl StreamSession for Recorder {
        fn event_handlers() -> EventHandlerMap<Self> {
            EventHandlerMap::new()
                .on("item", Recorder::on_item)
                .on("end", Recorder::on_end)
        }

        fn on_stream_failure(&mut self, failure: &StreamFailure) {
            self.failure = Some(failure.clone());
        }
    }

    fn frame(event: Option<&str>, payload: &str) -> Frame {
        Frame::new(event.map(str::to_string), payload)
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_without_ending_the_session() {
        let mut reducer = SessionReducer::new(Recorder::default());
        let now = Instant::now();

        assert_eq!(
            reducer.reduce(frame(Some("item"), "{\"value\":\"a\""), now).await,
            Flow::Continue
        );
        assert_eq!(
            reducer.reduce(frame(Some("item"), "{\"value\":\"b\"}"), now).await,
            Flow::Continue
        );
        assert_eq!(reducer.frames_dropped(), 1);
        assert_eq!(reducer.session().seen, vec!["b"]);
    }

    #[tokio::test]
    async fn payload_type_names_frames_without_event_field() {
        let mut reducer = SessionReducer::new(Recorder::default());
        let now = Instant::now();

        reducer
            .reduce(frame(None, "{\"type\":\"item\",\"value\":\"x\"}"), now)
            .await;
        reducer.reduce(frame(None, "{\"value\":\"untyped\"}"), now).await;
        reducer.reduce(frame(Some("unknown"), "{}"), now).await;

        assert_eq!(reducer.session().seen, vec!["x"]);
    }

    #[tokio::test]
    async fn frames_after_terminal_event_are_ignored() {
        let mut reducer = SessionReducer::new(Recorder::default());
        let now = Instant::now();

        assert_eq!(
            reducer.reduce(frame(Some("end"), ""), now).await,
            Flow::completed()
        );
        reducer
            .reduce(frame(Some("item"), "{\"value\":\"late\"}"), now)
            .await;

        assert_eq!(reducer.session().seen, vec!["end"]);
        assert_eq!(reducer.outcome(), Some(&SessionOutcome::Completed));
        assert_eq!(reducer.fail(StreamFailure::UnexpectedEnd), SessionOutcome::Completed);
        assert!(reducer.session().failure.is_none());
    }

    #[test]
    fn fail_notifies_session_once() {
        let mut reducer = SessionReducer::new(Recorder::default());
        let outcome = reducer.fail(StreamFailure::UnexpectedEnd);
        assert_eq!(outcome, SessionOutcome::Failed(StreamFailure::UnexpectedEnd));
        reducer.fail(StreamFailure::Cancelled);
        assert_eq!(
            reducer.session().failure,
            Some(StreamFailure::UnexpectedEnd)
        );
    }
}
