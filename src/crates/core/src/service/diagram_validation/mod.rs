//! Diagram code repair and validation
//!
//! Every code candidate passes `sanitize` and then a renderer dry run before it
//! may be shown; SVG candidates are trusted as they are.

mod sanitize;
mod validator;

pub use sanitize::sanitize;
pub use validator::{DiagramGate, DiagramValidator, Verdict};

#[cfg(test)]
pub(crate) use validator::test_support;
