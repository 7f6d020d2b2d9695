mod common;

use async_trait::async_trait;
use localbook_core::infrastructure::backend::StreamEndpoint;
use localbook_core::{
    drive_session, DiagramGate, DiagramPanel, DiagramRenderer, DiagramValidator, DriveOptions,
    RenderError, SessionOutcome, StreamConfig, BackendClient,
};
use localbook_core_types::{DiagramKind, DiagramUpdate};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Treats any code mentioning `BROKEN` as a parse failure.
struct KeywordRenderer;

#[async_trait]
impl DiagramRenderer for KeywordRenderer {
    async fn render(&self, code: &str) -> Result<String, RenderError> {
        if code.contains("BROKEN") {
            Err(RenderError::Parse("Syntax error in graph".to_string()))
        } else {
            Ok("<svg/>".to_string())
        }
    }
}

fn sse(event: &str, payload: serde_json::Value) -> Vec<u8> {
    format!("event: {}\ndata: {}\n\n", event, payload).into_bytes()
}

fn client(base_url: &str) -> BackendClient {
    BackendClient::new(StreamConfig {
        backend_url: base_url.to_string(),
        ..StreamConfig::default()
    })
    .expect("client")
}

fn panel() -> DiagramPanel {
    let gate = Arc::new(DiagramGate::new(DiagramValidator::new(Arc::new(
        KeywordRenderer,
    ))));
    DiagramPanel::new("nb-1", gate, 3)
}

#[tokio::test]
async fn generation_then_refinement_over_http() {
    let (base_url, server) = common::serve_once(
        200,
        vec![
            sse(
                "primary",
                json!({ "render_type": "svg", "svg": "<svg>mix</svg>", "title": "Energy mix", "template_id": "pie_basic" }),
            ),
            sse(
                "alternative",
                json!({ "render_type": "mermaid", "code": "flowchart LR A-->B style 1 fill:#000", "title": "Flow" }),
            ),
            sse(
                "alternative",
                json!({ "render_type": "mermaid", "code": "flowchart LR\nBROKEN", "title": "Bad" }),
            ),
            sse("done", json!({ "total": 3 })),
        ],
    )
    .await;

    let client = client(&base_url);
    let mut panel = panel();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (request, session) = panel.begin_generation("Energy sources", tx);
    let stream = client.open_visual_stream(&request).await.expect("open stream");
    let run = drive_session(
        session,
        stream,
        DriveOptions::new(StreamEndpoint::Visual.dialect()),
    )
    .await;
    while let Ok(update) = rx.try_recv() {
        panel.apply(&update);
    }

    assert_eq!(run.outcome, SessionOutcome::Completed);
    let displayed = panel.displayed().expect("displayed");
    assert_eq!(displayed.candidate.kind, DiagramKind::Svg);
    assert_eq!(displayed.candidate.title, "Energy mix");
    assert_eq!(panel.alternatives().len(), 1);
    assert_eq!(panel.alternatives()[0].code, "flowchart LR\n    A-->B");
    assert!(!panel.is_loading_alternatives());

    let generation = server.await.expect("server task");
    assert!(generation.request_line.starts_with("POST /visual/smart/stream"));
    assert_eq!(generation.body["topic"], "Energy sources");
    assert!(generation.body.get("current_code").is_none());

    // The refinement fails mid-stream; the panel keeps the diagram it had.
    let (base_url, server) = common::serve_once(
        200,
        vec![sse("error", json!({ "error": "LLM unavailable" }))],
    )
    .await;
    let client = self::client(&base_url);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (request, session) = panel
        .begin_refinement("use warmer colors", tx)
        .expect("refinement");
    let stream = client.open_visual_stream(&request).await.expect("open stream");
    let run = drive_session(
        session,
        stream,
        DriveOptions::new(StreamEndpoint::Visual.dialect()),
    )
    .await;
    let mut failed = false;
    while let Ok(update) = rx.try_recv() {
        failed |= matches!(update, DiagramUpdate::Failed { .. });
        panel.apply(&update);
    }

    assert!(!run.outcome.is_completed());
    assert!(failed);
    assert_eq!(
        panel.displayed().map(|d| d.candidate.title.as_str()),
        Some("Energy mix")
    );
    assert_eq!(panel.last_error(), Some("LLM unavailable"));

    let refinement = server.await.expect("server task");
    assert_eq!(refinement.body["current_code"], "<svg>mix</svg>");
    assert_eq!(refinement.body["guidance"], "use warmer colors");
    assert_eq!(refinement.body["template_id"], "pie_basic");
}
