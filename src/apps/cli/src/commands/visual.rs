use super::interrupt::Interrupts;
use super::{diagram_gate, drive_options};
use crate::ui::DiagramPrinter;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use localbook_core::infrastructure::backend::StreamEndpoint;
use localbook_core::{drive_session, BackendClient, DiagramPanel, DiagramSession, SessionOutcome, StreamConfig};
use localbook_core_types::{
    CandidateStatus, DiagramCandidate, DiagramKind, DiagramUpdate, DisplayedDiagram,
    VisualStreamRequest,
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Args)]
pub struct VisualArgs {
    /// Notebook the diagram is about
    #[arg(short, long)]
    pub notebook: String,

    /// Restrict retrieval to these source ids
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Force a specific diagram template
    #[arg(long)]
    pub template: Option<String>,

    /// Color theme passed to the generator
    #[arg(long)]
    pub theme: Option<String>,

    /// Write the final diagram code here
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl VisualArgs {
    fn decorate(&self, request: &mut VisualStreamRequest) {
        if !self.sources.is_empty() {
            request.source_ids = Some(self.sources.clone());
        }
        if self.template.is_some() {
            request.template_id = self.template.clone();
        }
        request.color_theme = self.theme.clone();
    }
}

pub async fn generate(
    args: &VisualArgs,
    topic: &str,
    config: StreamConfig,
    interrupts: &Interrupts,
) -> Result<()> {
    let mut panel = DiagramPanel::new(args.notebook.clone(), diagram_gate(&config), config.max_alternatives);
    let (tx, rx) = mpsc::unbounded_channel();
    let (mut request, session) = panel.begin_generation(topic, tx);
    args.decorate(&mut request);

    stream_into_panel(&mut panel, request, session, rx, config, interrupts).await?;
    finish(&panel, args)
}

/// Reworks the diagram code in `code_file` according to `instruction`.
pub async fn refine(
    args: &VisualArgs,
    code_file: &Path,
    title: Option<String>,
    instruction: &str,
    config: StreamConfig,
    interrupts: &Interrupts,
) -> Result<()> {
    let code = tokio::fs::read_to_string(code_file)
        .await
        .with_context(|| format!("read {}", code_file.display()))?;

    let mut panel = DiagramPanel::new(args.notebook.clone(), diagram_gate(&config), config.max_alternatives);
    panel.apply(&DiagramUpdate::Primary {
        diagram: DisplayedDiagram {
            candidate: DiagramCandidate {
                kind: if code.trim_start().starts_with("<svg") {
                    DiagramKind::Svg
                } else {
                    DiagramKind::DiagramCode
                },
                code,
                title: title.unwrap_or_default(),
                description: None,
                template_id: args.template.clone(),
                template_name: None,
                pattern: None,
                tagline: None,
                status: CandidateStatus::Displayed,
            },
            validated: true,
            note: None,
        },
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let (mut request, session) = panel.begin_refinement(instruction, tx)?;
    args.decorate(&mut request);

    stream_into_panel(&mut panel, request, session, rx, config, interrupts).await?;
    finish(&panel, args)
}

async fn stream_into_panel(
    panel: &mut DiagramPanel,
    request: VisualStreamRequest,
    session: DiagramSession,
    mut rx: mpsc::UnboundedReceiver<DiagramUpdate>,
    config: StreamConfig,
    interrupts: &Interrupts,
) -> Result<()> {
    let client = BackendClient::new(config.clone())?;
    let stream = client
        .open_visual_stream(&request)
        .await
        .context("open visual stream")?;

    let armed = interrupts.arm();
    let options = drive_options(&config, StreamEndpoint::Visual, armed.token());
    let drive = async move { drive_session(session, stream, options).await.outcome };
    let render = async {
        let printer = DiagramPrinter;
        while let Some(update) = rx.recv().await {
            panel.apply(&update);
            if let Err(e) = printer.handle(&update) {
                warn!("Failed to write diagram output: {}", e);
            }
        }
    };

    let (outcome, ()) = tokio::join!(drive, render);
    drop(armed);
    match outcome {
        SessionOutcome::Completed => Ok(()),
        SessionOutcome::Failed(failure) => {
            if panel.displayed().is_some() {
                warn!("Diagram stream ended early: {}", failure);
                Ok(())
            } else {
                Err(anyhow!("diagram generation failed: {}", failure))
            }
        }
    }
}

fn finish(panel: &DiagramPanel, args: &VisualArgs) -> Result<()> {
    DiagramPrinter.print_alternatives(panel.alternatives());

    let displayed = panel
        .displayed()
        .ok_or_else(|| anyhow!("the stream finished without a diagram"))?;
    if let Some(path) = &args.out {
        std::fs::write(path, &displayed.candidate.code)
            .with_context(|| format!("write {}", path.display()))?;
        eprintln!("Diagram written to {}", path.display());
    }
    Ok(())
}
