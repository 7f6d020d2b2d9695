//! Service layer
//!
//! One generic typed-event reducer (`session`) instantiated twice: for answer
//! streams and for generated-diagram streams.

pub mod answer;
pub mod diagram;
pub mod diagram_validation;
pub mod session;
