//! Diagram rendering engine bridge
//!
//! The engine is a black box: `render(code)` yields markup or fails. The same call
//! is used for display and for the validator's dry run.

use async_trait::async_trait;
use log::debug;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("diagram parse error: {0}")]
    Parse(String),
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, code: &str) -> Result<String, RenderError>;
}

/// Runs an external renderer binary, code on stdin and markup on stdout.
///
/// The default invocation matches the mermaid CLI (`mmdc -i - -o - -e svg`).
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Mermaid CLI invocation of `program`.
    pub fn mermaid_cli(program: impl Into<PathBuf>) -> Self {
        Self::new(
            program,
            ["-i", "-", "-o", "-", "-e", "svg", "-q"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// Locates `command` on `PATH`.
    pub fn locate(command: &str) -> Result<Self, RenderError> {
        let program = which::which(command)
            .map_err(|e| RenderError::Unavailable(format!("{}: {}", command, e)))?;
        debug!("Using diagram renderer at {}", program.display());
        Ok(Self::mermaid_cli(program))
    }
}

#[async_trait]
impl DiagramRenderer for CommandRenderer {
    async fn render(&self, code: &str) -> Result<String, RenderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(code.as_bytes())
                .await
                .map_err(|e| RenderError::Unavailable(e.to_string()))?;
        }

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)
                .await
                .map_err(|e| RenderError::Unavailable(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(RenderError::Parse(if message.is_empty() {
                format!("renderer exited with {}", output.status)
            } else {
                message.trim().to_string()
            }));
        }
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_reports_missing_binary() {
        let result = CommandRenderer::locate("localbook-renderer-that-does-not-exist");
        assert!(matches!(result, Err(RenderError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_output_is_the_markup() {
        let renderer = CommandRenderer::new("cat", Vec::new());
        let markup = renderer.render("<svg/>").await.expect("render");
        assert_eq!(markup, "<svg/>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_parse_error() {
        let renderer = CommandRenderer::new(
            "sh",
            vec!["-c".to_string(), "cat >/dev/null; echo 'Parse error on line 2' >&2; exit 1".to_string()],
        );
        let err = renderer.render("flowchart LR\nA-->").await.expect_err("should fail");
        assert_eq!(err, RenderError::Parse("Parse error on line 2".to_string()));
    }
}
