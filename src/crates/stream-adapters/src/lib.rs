//! LocalBook stream adapters
//!
//! Turns a chunked response body into discrete `(event type, payload)` frames:
//! - `framing`: the buffering parser, configured by a dialect table
//! - `stream_handler`: pumps a byte stream through the parser with an idle timeout

pub mod framing;
pub mod stream_handler;

pub use framing::{FieldKind, FieldRule, Frame, FrameParser, FramingDialect};
pub use stream_handler::{byte_stream, ByteStream, FrameReader, ReadError, ReadOutcome};
