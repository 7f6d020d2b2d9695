//! Logging Configuration

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const LOG_LEVEL_ENV: &str = "LOCALBOOK_LOG_LEVEL";

pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

pub fn level_to_str(level: LevelFilter) -> &'static str {
    if level == LevelFilter::TRACE {
        "trace"
    } else if level == LevelFilter::DEBUG {
        "debug"
    } else if level == LevelFilter::INFO {
        "info"
    } else if level == LevelFilter::WARN {
        "warn"
    } else if level == LevelFilter::ERROR {
        "error"
    } else {
        "off"
    }
}

fn resolve_default_level(verbose: bool) -> LevelFilter {
    let fallback = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    match std::env::var(LOG_LEVEL_ENV) {
        Ok(val) => parse_log_level(&val).unwrap_or_else(|| {
            eprintln!(
                "Warning: Invalid {} '{}', falling back to default",
                LOG_LEVEL_ENV, val
            );
            fallback
        }),
        Err(_) => fallback,
    }
}

/// Logs go to stderr so stdout carries only the answer or diagram.
pub fn init_logging(verbose: bool) -> LevelFilter {
    let level = resolve_default_level(verbose);
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy("");

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();

    tracing::debug!("Logging initialized: level={}", level_to_str(level));
    level
}
