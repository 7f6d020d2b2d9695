//! Visual stream payloads.

use localbook_core_types::{CandidateStatus, DiagramCandidate, DiagramKind};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct WireCandidate {
    #[serde(default)]
    render_type: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    svg: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    template_id: Option<String>,
    #[serde(default)]
    template_name: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    tagline: Option<String>,
}

/// Reads a `primary`/`alternative` payload. `None` when it carries no diagram.
pub fn candidate_from_payload(payload: &Value) -> Option<DiagramCandidate> {
    let wire: WireCandidate = serde_json::from_value(payload.clone()).ok()?;

    let declared_svg = wire
        .render_type
        .as_deref()
        .or(wire.kind.as_deref())
        .is_some_and(|kind| kind.eq_ignore_ascii_case("svg"));

    let (kind, code) = match (declared_svg, wire.svg, wire.code) {
        (true, Some(svg), _) | (false, Some(svg), None) => (DiagramKind::Svg, svg),
        (true, None, Some(code)) => (DiagramKind::Svg, code),
        (false, _, Some(code)) => (DiagramKind::DiagramCode, code),
        (_, None, None) => return None,
    };
    if code.trim().is_empty() {
        return None;
    }

    Some(DiagramCandidate {
        kind,
        code,
        title: wire.title.unwrap_or_default(),
        description: wire.description,
        template_id: wire.template_id,
        template_name: wire.template_name,
        pattern: wire.pattern,
        tagline: wire.tagline,
        status: CandidateStatus::Pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn svg_render_type_reads_svg_member() {
        let candidate = candidate_from_payload(&json!({
            "render_type": "svg",
            "svg": "<svg></svg>",
            "title": "Timeline",
            "template_id": "timeline_horizontal"
        }))
        .expect("candidate");

        assert_eq!(candidate.kind, DiagramKind::Svg);
        assert_eq!(candidate.code, "<svg></svg>");
        assert_eq!(candidate.template_id.as_deref(), Some("timeline_horizontal"));
    }

    #[test]
    fn code_payload_is_diagram_code() {
        let candidate = candidate_from_payload(&json!({
            "render_type": "mermaid",
            "code": "flowchart LR\nA-->B",
            "tagline": "How A feeds B"
        }))
        .expect("candidate");

        assert_eq!(candidate.kind, DiagramKind::DiagramCode);
        assert_eq!(candidate.status, CandidateStatus::Pending);
        assert_eq!(candidate.tagline.as_deref(), Some("How A feeds B"));
    }

    #[test]
    fn payload_without_diagram_is_ignored() {
        assert!(candidate_from_payload(&json!({ "title": "Nothing" })).is_none());
        assert!(candidate_from_payload(&json!({ "code": "   " })).is_none());
        assert!(candidate_from_payload(&json!("not an object")).is_none());
    }
}
