//! Subcommand implementations

pub mod ask;
pub mod interrupt;
pub mod sanitize;
pub mod visual;

use localbook_core::infrastructure::backend::StreamEndpoint;
use localbook_core::{
    CommandRenderer, DiagramGate, DiagramValidator, DriveOptions, StreamConfig,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub fn drive_options(
    config: &StreamConfig,
    endpoint: StreamEndpoint,
    cancel: CancellationToken,
) -> DriveOptions {
    DriveOptions::new(endpoint.dialect())
        .with_idle_timeout(config.idle_timeout())
        .with_session_timeout(config.session_timeout())
        .with_cancel(cancel)
}

pub fn validator(config: &StreamConfig) -> DiagramValidator {
    let renderer = match CommandRenderer::locate(&config.renderer_command) {
        Ok(renderer) => renderer,
        Err(e) => {
            warn!(
                "Diagram renderer not found, code diagrams will fail validation: {}",
                e
            );
            CommandRenderer::mermaid_cli(&config.renderer_command)
        }
    };
    DiagramValidator::new(Arc::new(renderer)).with_timeout(config.validation_timeout())
}

pub fn diagram_gate(config: &StreamConfig) -> Arc<DiagramGate> {
    Arc::new(DiagramGate::new(validator(config)))
}
