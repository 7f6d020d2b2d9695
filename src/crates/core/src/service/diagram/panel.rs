use super::session::DiagramSession;
use crate::service::diagram_validation::DiagramGate;
use crate::util::errors::{LocalBookError, LocalBookResult};
use localbook_core_types::{
    CandidateStatus, DiagramCandidate, DiagramUpdate, DisplayedDiagram, VisualStreamRequest,
};
use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The diagram area of one notebook: what is displayed plus its alternatives.
///
/// Generation and refinement both run a fresh [`DiagramSession`]; the panel
/// follows its updates and keeps the prior diagram until a new primary lands.
pub struct DiagramPanel {
    notebook_id: String,
    gate: Arc<DiagramGate>,
    max_alternatives: usize,
    displayed: Option<DisplayedDiagram>,
    alternatives: Vec<DiagramCandidate>,
    loading_alternatives: bool,
    last_error: Option<String>,
}

impl DiagramPanel {
    pub fn new(notebook_id: impl Into<String>, gate: Arc<DiagramGate>, max_alternatives: usize) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            gate,
            max_alternatives,
            displayed: None,
            alternatives: Vec::new(),
            loading_alternatives: false,
            last_error: None,
        }
    }

    pub fn displayed(&self) -> Option<&DisplayedDiagram> {
        self.displayed.as_ref()
    }

    pub fn alternatives(&self) -> &[DiagramCandidate] {
        &self.alternatives
    }

    pub fn is_loading_alternatives(&self) -> bool {
        self.loading_alternatives
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Request and session for a new diagram about `topic`.
    pub fn begin_generation(
        &mut self,
        topic: impl Into<String>,
        updates: mpsc::UnboundedSender<DiagramUpdate>,
    ) -> (VisualStreamRequest, DiagramSession) {
        let request = VisualStreamRequest::new(self.notebook_id.clone(), topic);
        (request, self.session(updates))
    }

    /// Request and session that rework the displayed diagram per `instruction`.
    pub fn begin_refinement(
        &mut self,
        instruction: impl Into<String>,
        updates: mpsc::UnboundedSender<DiagramUpdate>,
    ) -> LocalBookResult<(VisualStreamRequest, DiagramSession)> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(LocalBookError::Validation(
                "refinement instruction must not be empty".to_string(),
            ));
        }
        let Some(displayed) = &self.displayed else {
            return Err(LocalBookError::NotFound(
                "no diagram is displayed to refine".to_string(),
            ));
        };

        let candidate = &displayed.candidate;
        let topic = if candidate.title.trim().is_empty() {
            instruction.clone()
        } else {
            candidate.title.clone()
        };
        let mut request = VisualStreamRequest::new(self.notebook_id.clone(), topic);
        request.current_code = Some(candidate.code.clone());
        request.template_id = candidate.template_id.clone();
        request.guidance = Some(instruction);

        Ok((request, self.session(updates)))
    }

    fn session(&mut self, updates: mpsc::UnboundedSender<DiagramUpdate>) -> DiagramSession {
        self.last_error = None;
        DiagramSession::new(Arc::clone(&self.gate))
            .with_displayed(self.displayed.clone())
            .with_max_alternatives(self.max_alternatives)
            .with_updates(updates)
    }

    /// Follows a session update.
    pub fn apply(&mut self, update: &DiagramUpdate) {
        match update {
            DiagramUpdate::Primary { diagram } => {
                self.displayed = Some(diagram.clone());
                self.alternatives.clear();
            }
            DiagramUpdate::LoadingAlternatives { loading } => self.loading_alternatives = *loading,
            DiagramUpdate::Alternatives { alternatives } => {
                self.alternatives = alternatives.clone();
            }
            DiagramUpdate::Completed { .. } => self.loading_alternatives = false,
            DiagramUpdate::Failed { error } => {
                self.loading_alternatives = false;
                self.last_error = Some(error.clone());
            }
        }
    }

    /// Swaps alternative `index` with the displayed diagram.
    ///
    /// A displayed diagram that failed validation is discarded instead, since
    /// the alternatives list only holds validated candidates.
    pub fn promote_alternative(&mut self, index: usize) -> LocalBookResult<&DisplayedDiagram> {
        if index >= self.alternatives.len() {
            return Err(LocalBookError::NotFound(format!(
                "no alternative at index {}",
                index
            )));
        }
        let mut chosen = self.alternatives.remove(index);
        chosen.status = CandidateStatus::Displayed;

        match self.displayed.take() {
            Some(previous) if previous.validated => {
                let mut previous = previous.candidate;
                previous.status = CandidateStatus::Validated;
                self.alternatives.insert(index, previous);
            }
            Some(previous) => {
                debug!(
                    "Discarding unvalidated diagram on promotion: title={}",
                    previous.candidate.title
                );
            }
            None => {}
        }

        Ok(self.displayed.insert(DisplayedDiagram {
            candidate: chosen,
            validated: true,
            note: None,
        }))
    }
}
