/// Terminal output module
///
/// Answers stream to stdout; the transient status line lives on stderr and is
/// rewritten in place.
use crossterm::{
    cursor::MoveToColumn,
    execute,
    style::Stylize,
    terminal::{Clear, ClearType},
};
use localbook_core_types::{AnswerMessage, AnswerUpdate, DiagramCandidate, DiagramUpdate, DisplayedDiagram};
use std::io::{self, Write};

fn clear_status_line() -> io::Result<()> {
    execute!(io::stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine))
}

fn show_status(message: &str) -> io::Result<()> {
    clear_status_line()?;
    let mut stderr = io::stderr();
    write!(stderr, "{}", format!("… {}", message).dim())?;
    stderr.flush()
}

/// Prints answer updates as they arrive.
#[derive(Default)]
pub struct AnswerPrinter {
    printed: String,
    status_visible: bool,
}

impl AnswerPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, update: &AnswerUpdate) -> io::Result<()> {
        match update {
            AnswerUpdate::Mode { deep_think, auto_upgraded } => {
                if *auto_upgraded {
                    self.status("Upgraded to deep think for this question")?;
                } else if *deep_think {
                    self.status("Deep think enabled")?;
                }
            }
            AnswerUpdate::Status { message } => self.status(message)?,
            AnswerUpdate::Citations { citations, low_confidence } => {
                let note = if *low_confidence { ", weak match" } else { "" };
                self.status(&format!("{} passages retrieved{}", citations.len(), note))?;
            }
            AnswerUpdate::QuickSummary { content } => {
                self.hide_status()?;
                println!("{}\n", content.clone().italic());
            }
            AnswerUpdate::StopLoading => self.hide_status()?,
            AnswerUpdate::Content { content } => self.print_growth(content)?,
            AnswerUpdate::Completed { message } => {
                self.hide_status()?;
                self.print_finalized(&message.content)?;
                println!();
                print_sources(message);
                print_follow_ups(message);
            }
            AnswerUpdate::Failed { error, message } => {
                self.hide_status()?;
                if !self.printed.is_empty() {
                    println!();
                }
                eprintln!("{} {}", "error:".red().bold(), error);
                print_sources(message);
            }
        }
        io::stdout().flush()
    }

    fn status(&mut self, message: &str) -> io::Result<()> {
        self.status_visible = true;
        show_status(message)
    }

    fn hide_status(&mut self) -> io::Result<()> {
        if self.status_visible {
            self.status_visible = false;
            clear_status_line()?;
        }
        Ok(())
    }

    fn print_finalized(&mut self, content: &str) -> io::Result<()> {
        let tail = unprinted_tail(&self.printed, content);
        if !tail.is_empty() {
            print!("{}", tail);
        }
        self.printed = content.to_string();
        Ok(())
    }

    /// Prints what `content` adds to the text already on screen.
    fn print_growth(&mut self, content: &str) -> io::Result<()> {
        if let Some(rest) = content.strip_prefix(self.printed.as_str()) {
            if !rest.is_empty() {
                self.hide_status()?;
                print!("{}", rest);
                self.printed.push_str(rest);
            }
        }
        Ok(())
    }
}

/// Part of finalized `content` that is not already on screen.
///
/// Finalization may cut references and citation markers from what was
/// streamed, then append a note; only that appended note is new.
fn unprinted_tail<'a>(printed: &str, content: &'a str) -> &'a str {
    if let Some(rest) = content.strip_prefix(printed) {
        return rest;
    }
    let shown = content
        .match_indices("\n\n")
        .map(|(at, _)| at)
        .chain(std::iter::once(content.len()))
        .filter(|&at| printed.contains(&content[..at]))
        .last()
        .unwrap_or(0);
    &content[shown..]
}

fn print_sources(message: &AnswerMessage) {
    if message.citations.is_empty() {
        return;
    }
    println!("\n{}", "Sources".bold());
    for citation in &message.citations {
        let name = citation
            .filename
            .as_deref()
            .unwrap_or(citation.source_id.as_str());
        match citation.page {
            Some(page) => println!("  [{}] {} (p. {})", citation.number, name, page),
            None => println!("  [{}] {}", citation.number, name),
        }
    }
}

fn print_follow_ups(message: &AnswerMessage) {
    let Some(questions) = &message.follow_up_questions else {
        return;
    };
    if questions.is_empty() {
        return;
    }
    println!("\n{}", "Follow-up questions".bold());
    for question in questions {
        println!("  → {}", question);
    }
}

/// Prints diagram updates as they arrive.
#[derive(Default)]
pub struct DiagramPrinter;

impl DiagramPrinter {
    pub fn handle(&self, update: &DiagramUpdate) -> io::Result<()> {
        match update {
            DiagramUpdate::Primary { diagram } => print_displayed(diagram),
            DiagramUpdate::LoadingAlternatives { loading: true } => {
                show_status("Generating alternatives")?
            }
            DiagramUpdate::LoadingAlternatives { loading: false } => clear_status_line()?,
            DiagramUpdate::Alternatives { alternatives } => {
                show_status(&format!("{} alternatives ready", alternatives.len()))?;
            }
            DiagramUpdate::Completed { .. } => {}
            DiagramUpdate::Failed { error } => {
                clear_status_line()?;
                eprintln!("{} {}", "error:".red().bold(), error);
            }
        }
        io::stdout().flush()
    }

    pub fn print_alternatives(&self, alternatives: &[DiagramCandidate]) {
        if alternatives.is_empty() {
            return;
        }
        println!("\n{}", "Alternatives".bold());
        for (index, candidate) in alternatives.iter().enumerate() {
            println!("  {}. {}", index + 1, describe(candidate));
        }
    }
}

pub fn print_displayed(diagram: &DisplayedDiagram) {
    println!("{}", describe(&diagram.candidate).bold());
    if let Some(tagline) = &diagram.candidate.tagline {
        println!("{}", tagline.clone().italic());
    }
    if let Some(note) = &diagram.note {
        println!("{}", note.clone().yellow());
    }
    println!("\n{}\n", diagram.candidate.code);
}

fn describe(candidate: &DiagramCandidate) -> String {
    let title = if candidate.title.is_empty() {
        "Untitled diagram"
    } else {
        candidate.title.as_str()
    };
    match &candidate.template_name {
        Some(template) => format!("{} ({})", title, template),
        None => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_prints_only_the_new_suffix() {
        assert_eq!(unprinted_tail("Hel", "Hello"), "lo");
        assert_eq!(unprinted_tail("Hello", "Hello"), "");
    }

    #[test]
    fn note_appended_after_stripped_references_is_printed() {
        let streamed = "Solar output rose.\n\nReferences\n1. Report A\n2. Report B";
        let finalized = "Solar output rose.\n\n---\n\nNo good match. Search the web?";
        assert_eq!(
            unprinted_tail(streamed, finalized),
            "\n\n---\n\nNo good match. Search the web?"
        );
    }

    #[test]
    fn stripped_leading_markers_do_not_reprint_the_answer() {
        let streamed = "[1] [2]\n\nSolar output rose.";
        assert_eq!(unprinted_tail(streamed, "Solar output rose."), "");
    }
}
