use super::wire::candidate_from_payload;
use crate::service::diagram_validation::{DiagramGate, Verdict};
use crate::service::session::{
    EventHandlerMap, Flow, SessionEvent, StreamFailure, StreamSession,
};
use futures::future::{ready, BoxFuture};
use futures::FutureExt;
use localbook_core_types::{CandidateStatus, DiagramCandidate, DiagramUpdate, DisplayedDiagram};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const DEFAULT_MAX_ALTERNATIVES: usize = 3;
pub const UNVALIDATED_NOTE: &str =
    "This diagram did not pass validation and may not render correctly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramPhase {
    Streaming,
    Completed,
    Failed,
}

/// One generation or refinement of the diagram panel.
///
/// The primary is shown as soon as it arrives. Alternatives are accepted only
/// after it and only while the stream is open; each must pass the gate.
pub struct DiagramSession {
    gate: Arc<DiagramGate>,
    displayed: Option<DisplayedDiagram>,
    primary_received: bool,
    alternatives: VecDeque<DiagramCandidate>,
    max_alternatives: usize,
    accepting_alternatives: bool,
    loading_alternatives: bool,
    rejected: usize,
    total: Option<u32>,
    phase: DiagramPhase,
    error: Option<String>,
    updates: Option<mpsc::UnboundedSender<DiagramUpdate>>,
}

impl DiagramSession {
    pub fn new(gate: Arc<DiagramGate>) -> Self {
        Self {
            gate,
            displayed: None,
            primary_received: false,
            alternatives: VecDeque::new(),
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
            accepting_alternatives: false,
            loading_alternatives: false,
            rejected: 0,
            total: None,
            phase: DiagramPhase::Streaming,
            error: None,
            updates: None,
        }
    }

    /// Keeps `displayed` on screen until this session's primary replaces it.
    pub fn with_displayed(mut self, displayed: Option<DisplayedDiagram>) -> Self {
        self.displayed = displayed;
        self
    }

    pub fn with_max_alternatives(mut self, max_alternatives: usize) -> Self {
        self.max_alternatives = max_alternatives.max(1);
        self
    }

    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<DiagramUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn displayed(&self) -> Option<&DisplayedDiagram> {
        self.displayed.as_ref()
    }

    pub fn primary_received(&self) -> bool {
        self.primary_received
    }

    pub fn alternatives(&self) -> Vec<DiagramCandidate> {
        self.alternatives.iter().cloned().collect()
    }

    pub fn is_loading_alternatives(&self) -> bool {
        self.loading_alternatives
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    pub fn total(&self) -> Option<u32> {
        self.total
    }

    pub fn phase(&self) -> DiagramPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn publish(&self, update: DiagramUpdate) {
        if let Some(updates) = &self.updates {
            let _ = updates.send(update);
        }
    }

    fn set_loading_alternatives(&mut self, loading: bool) {
        if self.loading_alternatives != loading {
            self.loading_alternatives = loading;
            self.publish(DiagramUpdate::LoadingAlternatives { loading });
        }
    }

    async fn accept_primary(&mut self, event: SessionEvent) {
        if self.primary_received {
            warn!("Ignoring second primary diagram");
            return;
        }
        let Some(candidate) = candidate_from_payload(&event.payload) else {
            warn!("Primary diagram payload carried no diagram");
            return;
        };

        let displayed = match self.gate.vet(candidate).await {
            Verdict::Accepted(mut candidate) => {
                candidate.status = CandidateStatus::Displayed;
                DisplayedDiagram {
                    candidate,
                    validated: true,
                    note: None,
                }
            }
            Verdict::Rejected(candidate) => {
                warn!(
                    "Primary diagram failed validation, showing it anyway: title={}",
                    candidate.title
                );
                DisplayedDiagram {
                    candidate,
                    validated: false,
                    note: Some(UNVALIDATED_NOTE.to_string()),
                }
            }
        };

        info!(
            "Primary diagram ready: title={}, validated={}",
            displayed.candidate.title, displayed.validated
        );
        self.displayed = Some(displayed.clone());
        self.primary_received = true;
        self.alternatives.clear();
        self.accepting_alternatives = true;
        self.publish(DiagramUpdate::Primary { diagram: displayed });
        self.set_loading_alternatives(true);
    }

    async fn accept_alternative(&mut self, event: SessionEvent) {
        if !self.accepting_alternatives {
            debug!("Dropping alternative received outside the acceptance window");
            return;
        }
        let Some(candidate) = candidate_from_payload(&event.payload) else {
            debug!("Alternative payload carried no diagram");
            return;
        };

        match self.gate.vet(candidate).await {
            Verdict::Accepted(candidate) => {
                while self.alternatives.len() >= self.max_alternatives {
                    self.alternatives.pop_front();
                }
                self.alternatives.push_back(candidate);
                self.publish(DiagramUpdate::Alternatives {
                    alternatives: self.alternatives(),
                });
            }
            Verdict::Rejected(candidate) => {
                self.rejected += 1;
                debug!("Alternative rejected: title={}", candidate.title);
            }
        }
    }

    fn complete(&mut self, event: &SessionEvent) {
        self.accepting_alternatives = false;
        self.set_loading_alternatives(false);
        self.total = event
            .payload
            .get("total")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok());
        self.phase = DiagramPhase::Completed;
        debug!(
            "Diagram stream done: alternatives={}, rejected={}",
            self.alternatives.len(),
            self.rejected
        );
        self.publish(DiagramUpdate::Completed { total: self.total });
    }

    fn fail(&mut self, error: String) {
        self.accepting_alternatives = false;
        self.set_loading_alternatives(false);
        self.phase = DiagramPhase::Failed;
        self.error = Some(error.clone());
        self.publish(DiagramUpdate::Failed { error });
    }

    fn on_primary(session: &mut DiagramSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        async move {
            session.accept_primary(event).await;
            Flow::Continue
        }
        .boxed()
    }

    fn on_alternative(session: &mut DiagramSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        async move {
            session.accept_alternative(event).await;
            Flow::Continue
        }
        .boxed()
    }

    fn on_done(session: &mut DiagramSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        session.complete(&event);
        ready(Flow::completed()).boxed()
    }

    fn on_error(session: &mut DiagramSession, event: SessionEvent) -> BoxFuture<'_, Flow> {
        let error = ["error", "message", "content"]
            .iter()
            .find_map(|key| event.str_field(key))
            .unwrap_or("Diagram generation failed")
            .to_string();
        warn!("Visual stream reported error: {}", error);
        session.fail(error.clone());
        ready(Flow::server_error(error)).boxed()
    }
}

impl StreamSession for DiagramSession {
    fn event_handlers() -> EventHandlerMap<Self> {
        EventHandlerMap::new()
            .on("primary", DiagramSession::on_primary)
            .on("alternative", DiagramSession::on_alternative)
            .on("done", DiagramSession::on_done)
            .on("error", DiagramSession::on_error)
    }

    fn on_stream_failure(&mut self, failure: &StreamFailure) {
        warn!("Visual stream failed: {}", failure);
        self.fail(failure.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::diagram_validation::test_support::ScriptedRenderer;
    use crate::service::diagram_validation::DiagramValidator;
    use crate::service::session::{drive_session, DriveOptions, SessionOutcome};
    use bytes::Bytes;
    use futures::{stream, StreamExt};
    use localbook_core_types::DiagramKind;
    use localbook_stream_adapters::{ByteStream, FramingDialect};
    use serde_json::json;

    fn gate(renderer: Arc<ScriptedRenderer>) -> Arc<DiagramGate> {
        Arc::new(DiagramGate::new(DiagramValidator::new(renderer)))
    }

    fn frame(event: &str, payload: serde_json::Value) -> String {
        format!("event: {}\ndata: {}\n\n", event, payload)
    }

    fn body(frames: Vec<String>) -> ByteStream {
        let items: Vec<Result<Bytes, String>> =
            frames.into_iter().map(|f| Ok(Bytes::from(f))).collect();
        stream::iter(items).boxed()
    }

    fn code(title: &str, code: &str) -> serde_json::Value {
        json!({ "render_type": "mermaid", "code": code, "title": title })
    }

    async fn run(session: DiagramSession, frames: Vec<String>) -> (DiagramSession, SessionOutcome) {
        let run = drive_session(
            session,
            body(frames),
            DriveOptions::new(FramingDialect::EVENT_STREAM),
        )
        .await;
        (run.session, run.outcome)
    }

    #[tokio::test]
    async fn svg_primary_is_displayed_without_validation() {
        let renderer = Arc::new(ScriptedRenderer::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (session, outcome) = run(
            DiagramSession::new(gate(renderer.clone())).with_updates(tx),
            vec![
                frame("primary", json!({ "render_type": "svg", "svg": "<svg/>", "title": "Mix" })),
                frame("done", json!({ "total": 1 })),
            ],
        )
        .await;

        assert_eq!(outcome, SessionOutcome::Completed);
        assert_eq!(renderer.calls(), 0);
        let displayed = session.displayed().expect("displayed");
        assert_eq!(displayed.candidate.kind, DiagramKind::Svg);
        assert!(displayed.validated);
        assert_eq!(session.total(), Some(1));

        let first = rx.try_recv().expect("primary update");
        assert!(matches!(first, DiagramUpdate::Primary { .. }));
    }

    #[tokio::test]
    async fn invalid_primary_is_shown_with_a_note() {
        let (session, _) = run(
            DiagramSession::new(gate(Arc::new(ScriptedRenderer::default()))),
            vec![
                frame("primary", code("Broken", "flowchart LR\nA-->INVALID")),
                frame("done", json!({})),
            ],
        )
        .await;

        let displayed = session.displayed().expect("displayed");
        assert!(!displayed.validated);
        assert_eq!(displayed.note.as_deref(), Some(UNVALIDATED_NOTE));
        assert_eq!(displayed.candidate.code, "flowchart LR\n    A-->INVALID");
    }

    #[tokio::test]
    async fn alternatives_keep_the_three_most_recent_valid_ones() {
        let mut frames = vec![frame("primary", code("P", "flowchart LR\nA-->B"))];
        frames.push(frame("alternative", code("alt-1", "flowchart LR\nA-->C")));
        frames.push(frame("alternative", code("bad", "flowchart LR\nINVALID")));
        for n in 2..=4 {
            frames.push(frame(
                "alternative",
                code(&format!("alt-{}", n), "flowchart LR\nA-->D"),
            ));
        }
        frames.push(frame("done", json!({ "total": 6 })));

        let (session, outcome) = run(
            DiagramSession::new(gate(Arc::new(ScriptedRenderer::default()))),
            frames,
        )
        .await;

        assert_eq!(outcome, SessionOutcome::Completed);
        let titles: Vec<String> = session.alternatives().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["alt-2", "alt-3", "alt-4"]);
        assert_eq!(session.rejected_count(), 1);
        assert!(!session.is_loading_alternatives());
    }

    #[tokio::test]
    async fn alternative_before_primary_is_dropped() {
        let (session, _) = run(
            DiagramSession::new(gate(Arc::new(ScriptedRenderer::default()))),
            vec![
                frame("alternative", code("early", "flowchart LR\nA-->B")),
                frame("primary", code("P", "flowchart LR\nA-->B")),
                frame("done", json!({})),
            ],
        )
        .await;

        assert!(session.alternatives().is_empty());
        assert!(session.primary_received());
    }

    #[tokio::test]
    async fn svg_alternatives_are_trusted() {
        let renderer = Arc::new(ScriptedRenderer::default());
        let (session, _) = run(
            DiagramSession::new(gate(renderer.clone())),
            vec![
                frame("primary", code("P", "flowchart LR\nA-->B")),
                frame("alternative", json!({ "render_type": "svg", "svg": "<svg>INVALID</svg>" })),
                frame("done", json!({})),
            ],
        )
        .await;

        assert_eq!(session.alternatives().len(), 1);
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn error_keeps_prior_diagram() {
        let prior = DisplayedDiagram {
            candidate: candidate_from_payload(&code("Old", "flowchart LR\nX-->Y"))
                .expect("candidate"),
            validated: true,
            note: None,
        };
        let (session, outcome) = run(
            DiagramSession::new(gate(Arc::new(ScriptedRenderer::default())))
                .with_displayed(Some(prior.clone())),
            vec![frame("error", json!({ "error": "No content found" }))],
        )
        .await;

        assert_eq!(
            outcome,
            SessionOutcome::Failed(StreamFailure::Server("No content found".to_string()))
        );
        assert_eq!(session.displayed(), Some(&prior));
        assert_eq!(session.phase(), DiagramPhase::Failed);
    }

    #[tokio::test]
    async fn stream_closing_early_stops_accepting_alternatives() {
        let (session, outcome) = run(
            DiagramSession::new(gate(Arc::new(ScriptedRenderer::default()))),
            vec![frame("primary", code("P", "flowchart LR\nA-->B"))],
        )
        .await;

        assert_eq!(outcome, SessionOutcome::Failed(StreamFailure::UnexpectedEnd));
        assert!(session.displayed().is_some());
        assert!(!session.is_loading_alternatives());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_honoured_while_candidates_are_validating() {
        let slow = Arc::new(ScriptedRenderer {
            delay: Some(std::time::Duration::from_secs(30)),
            ..Default::default()
        });
        let gate = Arc::new(DiagramGate::new(
            DiagramValidator::new(slow).with_timeout(std::time::Duration::from_secs(10)),
        ));
        let mut chunk = frame("primary", code("P", "flowchart LR\nA-->B"));
        for n in 1..=3 {
            chunk.push_str(&frame(
                "alternative",
                code(&format!("alt-{}", n), "flowchart LR\nA-->C"),
            ));
        }
        chunk.push_str(&frame("done", json!({})));

        let cancel = tokio_util::sync::CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let run = drive_session(
            DiagramSession::new(gate),
            body(vec![chunk]),
            DriveOptions::new(FramingDialect::EVENT_STREAM).with_cancel(cancel),
        )
        .await;

        assert_eq!(run.outcome, SessionOutcome::Failed(StreamFailure::Cancelled));
        assert_eq!(run.session.phase(), DiagramPhase::Failed);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
