use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramKind {
    /// Pre-formed markup, trusted as is.
    Svg,
    /// Source for the external diagram engine; must pass validation.
    DiagramCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Validated,
    Displayed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramCandidate {
    #[serde(rename = "type")]
    pub kind: DiagramKind,
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Editable one-line summary shown under the diagram.
    #[serde(default)]
    pub tagline: Option<String>,
    pub status: CandidateStatus,
}

impl DiagramCandidate {
    pub fn is_svg(&self) -> bool {
        self.kind == DiagramKind::Svg
    }
}

/// The diagram currently occupying the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedDiagram {
    pub candidate: DiagramCandidate,
    /// False when a code primary failed validation but is shown anyway.
    pub validated: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagramUpdate {
    Primary {
        diagram: DisplayedDiagram,
    },
    LoadingAlternatives {
        loading: bool,
    },
    Alternatives {
        alternatives: Vec<DiagramCandidate>,
    },
    Completed {
        total: Option<u32>,
    },
    Failed {
        error: String,
    },
}
