//! Deterministic repairs for generated diagram code.
//!
//! Only structural defects are touched: line breaks, fences, numeric `style`
//! targets and identifier/parenthesis spacing. Node labels are never rewritten.

use once_cell::sync::Lazy;
use regex::Regex;

/// Below this many lines the code is assumed to have lost its line breaks.
const REFLOW_LINE_THRESHOLD: usize = 3;

const FENCE_LANGUAGES: &[&str] = &["mermaid", "mmd"];

/// Keywords that always begin a statement of their own.
const STATEMENT_KEYWORDS: &[&str] = &[
    "subgraph",
    "end",
    "style",
    "classDef",
    "linkStyle",
    "direction",
];

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*((?:flowchart|graph)(?:[ \t]+(?:TD|TB|BT|RL|LR)\b)?|sequenceDiagram|classDiagram|stateDiagram-v2|stateDiagram|erDiagram|gantt|journey|pie(?:[ \t]+showData)?|mindmap|timeline|quadrantChart|xychart-beta|gitGraph)\b",
    )
    .expect("diagram declaration regex")
});

/// Applies every repair in order. Safe to call on already clean code.
pub fn sanitize(code: &str) -> String {
    let normalized = normalize_whitespace(code);
    let unfenced = strip_code_fences(&normalized);

    let line_count = unfenced.lines().filter(|l| !l.trim().is_empty()).count();
    let reflowed = if line_count < REFLOW_LINE_THRESHOLD {
        reflow(&unfenced)
    } else {
        unfenced
    };

    reflowed
        .lines()
        .filter(|line| !is_numeric_style_line(line))
        .map(fix_paren_spacing)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn normalize_whitespace(code: &str) -> String {
    let code = code
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', "    ");
    decode_escaped_newlines(&code)
}

/// Turns a literal `\n` into a line break, except inside labels and quotes.
fn decode_escaped_newlines(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut chars = code.chars().peekable();
    let mut depth = 0usize;
    let mut in_quote = false;

    while let Some(c) = chars.next() {
        if in_quote {
            if c == '"' {
                in_quote = false;
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => in_quote = true,
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            '\\' if depth == 0 && chars.peek() == Some(&'n') => {
                chars.next();
                out.push('\n');
                continue;
            }
            _ => {}
        }
        out.push(c);
    }
    out
}

fn strip_code_fences(code: &str) -> String {
    let mut text = code.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
        for language in FENCE_LANGUAGES {
            if let Some(rest) = text.strip_prefix(language) {
                if rest.starts_with(char::is_whitespace) || rest.is_empty() {
                    text = rest;
                    break;
                }
            }
        }
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim().to_string()
}

fn reflow(code: &str) -> String {
    let text = code.trim();
    let (declaration, body) = match DECLARATION.captures(text) {
        Some(caps) => {
            let end = caps.get(0).map_or(0, |m| m.end());
            let declaration = caps.get(1).map_or("", |m| m.as_str());
            (declaration, &text[end..])
        }
        None => ("", text),
    };

    // Mindmap structure is carried by indentation, which a reflow would destroy.
    if declaration == "mindmap" {
        return text.to_string();
    }

    let mut lines = Vec::new();
    if !declaration.is_empty() {
        lines.push(declaration.to_string());
    }
    for line in body.lines() {
        for statement in split_statements(line.trim()) {
            if declaration.is_empty() {
                lines.push(statement);
            } else {
                lines.push(format!("    {}", statement));
            }
        }
    }
    lines.join("\n")
}

/// Splits one line into statements at bracket depth 0.
///
/// A break goes before a statement keyword, after a block `end`, and between a
/// closing bracket and the next node reference.
fn split_statements(line: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut closed_bracket = false;
    let mut after_end = false;

    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        if in_quote {
            if c == '"' {
                in_quote = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_quote = true;
                closed_bracket = false;
            }
            '[' | '(' | '{' => {
                depth += 1;
                closed_bracket = false;
            }
            ']' | ')' | '}' => {
                depth = depth.saturating_sub(1);
                closed_bracket = depth == 0;
            }
            c if c.is_whitespace() && depth == 0 => {
                let mut next = i;
                while next < chars.len() && chars[next].1.is_whitespace() {
                    next += 1;
                }
                if next == chars.len() {
                    break;
                }
                let next_pos = chars[next].0;
                let rest = &line[next_pos..];
                let keyword = statement_keyword(rest);

                if after_end || keyword.is_some() || (closed_bracket && starts_node_reference(rest)) {
                    let statement = line[start..pos].trim();
                    if !statement.is_empty() {
                        statements.push(statement.to_string());
                    }
                    start = next_pos;
                    after_end = keyword == Some("end");
                } else {
                    after_end = false;
                }
                closed_bracket = false;
                i = next;
                continue;
            }
            _ => closed_bracket = false,
        }
        i += 1;
    }

    let statement = line[start..].trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    statements
}

fn statement_keyword(text: &str) -> Option<&'static str> {
    STATEMENT_KEYWORDS.iter().copied().find(|keyword| {
        text.strip_prefix(keyword)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

fn starts_node_reference(text: &str) -> bool {
    text.chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// `style` lines aimed at numeric ids are model confusion with `linkStyle`.
fn is_numeric_style_line(line: &str) -> bool {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("style") {
        return false;
    }
    parts.next().is_some_and(|target| {
        target.chars().any(|c| c.is_ascii_digit())
            && target.chars().all(|c| c.is_ascii_digit() || c == ',')
    })
}

/// `A (label)` and `A ((label))` lose the space before the parenthesis.
fn fix_paren_spacing(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;
    let mut in_quote = false;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_quote {
            if c == '"' {
                in_quote = false;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '"' => in_quote = true,
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 && i > 0 && is_identifier_char(chars[i - 1]) => {
                let mut next = i;
                while next < chars.len() && chars[next].is_whitespace() {
                    next += 1;
                }
                if next < chars.len() && chars[next] == '(' {
                    i = next;
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }
    out
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_flowchart_is_reflowed_and_numeric_style_dropped() {
        assert_eq!(
            sanitize("flowchart LR A-->B style 3,4 fill:#000"),
            "flowchart LR\n    A-->B"
        );
    }

    #[test]
    fn reflow_splits_after_closing_brackets_without_touching_labels() {
        assert_eq!(
            sanitize("graph TD A[Life style guide] --> B(Ends here) C{Choose end}-->D"),
            "graph TD\n    A[Life style guide] --> B(Ends here)\n    C{Choose end}-->D"
        );
    }

    #[test]
    fn reflow_breaks_around_subgraph_blocks() {
        assert_eq!(
            sanitize("flowchart TB subgraph S1[Inputs] A-->B end C-->A"),
            "flowchart TB\n    subgraph S1[Inputs]\n    A-->B\n    end\n    C-->A"
        );
    }

    #[test]
    fn fences_and_escaped_newlines_are_removed() {
        let code = "```mermaid\\nflowchart LR\\n    A-->B\\n    B-->C\\n```";
        assert_eq!(sanitize(code), "flowchart LR\n    A-->B\n    B-->C");
    }

    #[test]
    fn escaped_newlines_inside_labels_are_kept() {
        let code = "flowchart LR\\nA[\"C:\\new folder\"] --> B(\\notes)\\nB-->C";
        assert_eq!(
            sanitize(code),
            "flowchart LR\nA[\"C:\\new folder\"] --> B(\\notes)\nB-->C"
        );
    }

    #[test]
    fn multi_line_code_is_not_reflowed() {
        let code = "flowchart LR\n    A[x] B[y]\n    A-->B\n";
        assert_eq!(sanitize(code), "flowchart LR\n    A[x] B[y]\n    A-->B");
    }

    #[test]
    fn named_style_and_link_style_lines_are_kept() {
        let code = "flowchart LR\n    A-->B\n    style A fill:#f9f\n    style 2 fill:#000\n    linkStyle 0 stroke:#f00";
        assert_eq!(
            sanitize(code),
            "flowchart LR\n    A-->B\n    style A fill:#f9f\n    linkStyle 0 stroke:#f00"
        );
    }

    #[test]
    fn space_before_parenthesis_is_removed_outside_labels() {
        let code = "flowchart LR\n    A (Round) --> B ((Circle))\n    C[\"keep (this) spacing\"] --> D";
        assert_eq!(
            sanitize(code),
            "flowchart LR\n    A(Round) --> B((Circle))\n    C[\"keep (this) spacing\"] --> D"
        );
    }

    #[test]
    fn mindmap_keeps_its_indentation() {
        let code = "mindmap\n  root ((Energy))\n    Solar";
        assert_eq!(sanitize(code), "mindmap\n  root((Energy))\n    Solar");
    }

    #[test]
    fn crlf_and_tabs_are_normalized() {
        let code = "flowchart LR\r\n\tA-->B\r\n\tB-->C\r\n";
        assert_eq!(sanitize(code), "flowchart LR\n    A-->B\n    B-->C");
    }
}
