//! Event-stream framing

mod dialect;
mod parser;

pub use dialect::{FieldKind, FieldRule, FramingDialect};
pub use parser::FrameParser;

/// One typed unit extracted from the raw stream.
///
/// The payload is handed over verbatim; interpreting it is the consumer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event_type: Option<String>,
    pub payload: String,
}

impl Frame {
    /// Event type assumed for frames that carried only a payload.
    pub const DEFAULT_EVENT_TYPE: &'static str = "message";

    pub fn new(event_type: Option<String>, payload: impl Into<String>) -> Self {
        Self {
            event_type,
            payload: payload.into(),
        }
    }

    pub fn event_type(&self) -> &str {
        self.event_type
            .as_deref()
            .unwrap_or(Self::DEFAULT_EVENT_TYPE)
    }
}
