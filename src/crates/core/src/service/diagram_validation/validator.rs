use super::sanitize::sanitize;
use crate::infrastructure::renderer::DiagramRenderer;
use localbook_core_types::{CandidateStatus, DiagramCandidate};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Dry-runs the rendering engine; any failure or a timeout means invalid.
#[derive(Clone)]
pub struct DiagramValidator {
    renderer: Arc<dyn DiagramRenderer>,
    timeout: Duration,
}

impl DiagramValidator {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(renderer: Arc<dyn DiagramRenderer>) -> Self {
        Self {
            renderer,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn validate(&self, code: &str) -> bool {
        if code.trim().is_empty() {
            return false;
        }
        match timeout(self.timeout, self.renderer.render(code)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Diagram failed validation: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    "Diagram validation timed out after {}s",
                    self.timeout.as_secs()
                );
                false
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(DiagramCandidate),
    Rejected(DiagramCandidate),
}

/// Sanitize-then-validate gate in front of the diagram panel.
#[derive(Clone)]
pub struct DiagramGate {
    validator: DiagramValidator,
}

impl DiagramGate {
    pub fn new(validator: DiagramValidator) -> Self {
        Self { validator }
    }

    pub async fn vet(&self, mut candidate: DiagramCandidate) -> Verdict {
        if candidate.is_svg() {
            candidate.status = CandidateStatus::Validated;
            return Verdict::Accepted(candidate);
        }

        candidate.code = sanitize(&candidate.code);
        if self.validator.validate(&candidate.code).await {
            candidate.status = CandidateStatus::Validated;
            Verdict::Accepted(candidate)
        } else {
            candidate.status = CandidateStatus::Rejected;
            Verdict::Rejected(candidate)
        }
    }
}
