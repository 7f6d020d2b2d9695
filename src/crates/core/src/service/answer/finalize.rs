//! Post-processing applied once when an answer completes.

use once_cell::sync::Lazy;
use regex::Regex;

/// Appended to weakly grounded answers that do not already offer a web search.
pub const WEB_SEARCH_OFFER: &str = "\n\n---\n\n💡 Your documents don't seem to cover this well. Would you like me to search the web for more information?";

/// A stripped references block must be shorter than this share of the content.
const MAX_REFERENCE_BLOCK_SHARE: f64 = 0.3;

static REFERENCE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*|__)?\s*(?:references|sources|citations)\s*:?\s*(?:\*\*|__)?\s*:?\s*$",
    )
    .expect("reference header regex")
});

static HORIZONTAL_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").expect("horizontal rule regex"));

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\[\d+\]:?|\d+[.)]|[-*•])\s+\S").expect("list item regex")
});

static LEADING_CITATION_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\[\d+\][ \t,]*)+\n[ \t]*\n\s*").expect("leading citation regex")
});

const LOW_CONFIDENCE_PHRASES: &[&str] = &[
    "could not find",
    "couldn't find",
    "could not locate",
    "couldn't locate",
    "unable to find",
    "no relevant information",
    "don't have enough information",
    "do not have enough information",
    "don't have enough relevant information",
    "do not have enough relevant information",
    "not enough information",
    "not mentioned in the provided",
    "the provided sources do not",
    "the provided documents do not",
    "the sources do not contain",
];

const WEB_SEARCH_MARKERS: &[&str] = &["search the web", "web search", "search online"];

/// Removes a trailing references/sources list the model appended on its own.
///
/// Applied until nothing more matches, so running it twice changes nothing.
pub fn strip_trailing_references(content: &str) -> String {
    let mut current = content.to_string();
    while let Some(start) = trailing_reference_block(&current) {
        let block_len = current.len() - start;
        if block_len as f64 >= current.len() as f64 * MAX_REFERENCE_BLOCK_SHARE {
            break;
        }
        current.truncate(start);
        let kept = current.trim_end().len();
        current.truncate(kept);
    }
    current
}

/// Byte offset where a trailing reference block starts.
fn trailing_reference_block(content: &str) -> Option<usize> {
    let mut lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in content.split('\n') {
        lines.push((offset, line));
        offset += line.len() + 1;
    }

    let mut index = lines.len();
    let mut items = 0;
    while index > 0 {
        let (_, line) = lines[index - 1];
        if line.trim().is_empty() {
            index -= 1;
        } else if LIST_ITEM.is_match(line) {
            items += 1;
            index -= 1;
        } else {
            break;
        }
    }
    if items == 0 || index == 0 {
        return None;
    }

    let (header_start, header) = lines[index - 1];
    if HORIZONTAL_RULE.is_match(header) {
        return Some(header_start);
    }
    if !REFERENCE_HEADER.is_match(header) {
        return None;
    }

    // A rule directly above the header belongs to the block.
    let mut above = index - 1;
    while above > 0 && lines[above - 1].1.trim().is_empty() {
        above -= 1;
    }
    if above > 0 && HORIZONTAL_RULE.is_match(lines[above - 1].1) {
        return Some(lines[above - 1].0);
    }
    Some(header_start)
}

/// Drops a group of bare `[N]` markers opening the answer on their own line.
pub fn strip_leading_citation_markers(content: &str) -> String {
    match LEADING_CITATION_MARKERS.find(content) {
        Some(m) => content[m.end()..].to_string(),
        None => content.to_string(),
    }
}

pub fn detect_low_confidence(content: &str) -> bool {
    let normalized = content.to_lowercase().replace('\u{2019}', "'");
    LOW_CONFIDENCE_PHRASES
        .iter()
        .any(|phrase| normalized.contains(phrase))
}

pub fn offers_web_search(content: &str) -> bool {
    let normalized = content.to_lowercase();
    WEB_SEARCH_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
}
