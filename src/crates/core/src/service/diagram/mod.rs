//! Generated diagram streaming
//!
//! A visual stream delivers one primary diagram, then zero or more
//! alternatives, then `done`.

mod panel;
mod session;
mod wire;

pub use panel::DiagramPanel;
pub use session::{DiagramPhase, DiagramSession, DEFAULT_MAX_ALTERNATIVES, UNVALIDATED_NOTE};
pub use wire::candidate_from_payload;
