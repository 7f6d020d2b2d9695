//! Answer streaming
//!
//! `AnswerSession` reduces one question's event stream into an assistant
//! message; `Conversation` holds the message list the updates are applied to.

mod conversation;
mod finalize;
mod session;
mod telemetry;

pub use conversation::{Conversation, ExchangeId};
pub use finalize::{
    detect_low_confidence, offers_web_search, strip_leading_citation_markers,
    strip_trailing_references, WEB_SEARCH_OFFER,
};
pub use session::{AnswerPhase, AnswerSession};
pub use telemetry::{build_record, derive_topics};
