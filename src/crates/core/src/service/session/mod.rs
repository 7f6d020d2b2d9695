//! Typed-event session reducer
//!
//! A session is a state machine fed with frames in arrival order. The reducer
//! owns the sequencing rules (malformed payloads dropped, unknown events ignored,
//! nothing accepted after a terminal event); sessions only supply handlers.

mod driver;
mod reducer;

pub use driver::{drive_session, DriveOptions, SessionRun};
pub use reducer::{
    EventHandler, EventHandlerMap, Flow, SessionEvent, SessionOutcome, SessionReducer,
    StreamFailure, StreamSession,
};
