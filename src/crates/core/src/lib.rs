// LocalBook Core Library - streaming sessions for answers and generated diagrams
// Three-layer architecture: Util -> Infrastructure -> Service

pub mod infrastructure; // Infrastructure layer - config, backend HTTP client, renderer bridge, exploration recorder
pub mod service; // Service layer - session reducer, answer/diagram sessions, diagram validation
pub mod util; // Utility layer - errors

// Export main types
pub use util::errors::*;

// Export infrastructure components
pub use infrastructure::{
    backend::BackendClient,
    config::StreamConfig,
    exploration::{ExplorationRecorder, HttpExplorationRecorder},
    renderer::{CommandRenderer, DiagramRenderer, RenderError},
};

// Export service layer components
pub use service::{
    answer::{AnswerSession, Conversation, ExchangeId},
    diagram::{DiagramPanel, DiagramSession},
    diagram_validation::{sanitize, DiagramGate, DiagramValidator},
    session::{drive_session, DriveOptions, SessionOutcome, StreamFailure, StreamSession},
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CORE_NAME: &str = "LocalBook Core";
