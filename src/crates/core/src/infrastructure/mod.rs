//! Infrastructure layer
//!
//! Configuration, the backend HTTP client, and the two external collaborators the
//! sessions talk to: the diagram renderer and the exploration recorder.

pub mod backend;
pub mod config;
pub mod exploration;
pub mod renderer;

pub use backend::BackendClient;
pub use config::StreamConfig;
pub use exploration::{ExplorationRecorder, HttpExplorationRecorder};
pub use renderer::{CommandRenderer, DiagramRenderer, RenderError};
