//! LocalBook shared DTOs
//!
//! Plain serde types exchanged between the stream sessions, the backend client
//! and whatever front end renders the evolving state.

pub mod answer;
pub mod diagram;
pub mod exploration;
pub mod request;

pub use answer::{AnswerMessage, AnswerUpdate, Citation, MessageRole};
pub use diagram::{
    CandidateStatus, DiagramCandidate, DiagramKind, DiagramUpdate, DisplayedDiagram,
};
pub use exploration::ExplorationRecord;
pub use request::{ChatQuery, VisualStreamRequest};
