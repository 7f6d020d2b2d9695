use super::validator;
use anyhow::{bail, Context, Result};
use localbook_core::{sanitize, StreamConfig};
use std::io::Read;
use std::path::Path;

/// Prints the repaired code; with `validate`, fails when the renderer rejects it.
pub async fn run(input: &Path, validate: bool, config: StreamConfig) -> Result<()> {
    let raw = if input == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("read stdin")?;
        raw
    } else {
        std::fs::read_to_string(input).with_context(|| format!("read {}", input.display()))?
    };

    let cleaned = sanitize(&raw);
    println!("{}", cleaned);

    if validate {
        if !validator(&config).validate(&cleaned).await {
            bail!("diagram code failed validation");
        }
        eprintln!("valid");
    }
    Ok(())
}
