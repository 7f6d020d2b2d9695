use super::reducer::{Flow, SessionOutcome, SessionReducer, StreamFailure, StreamSession};
use localbook_stream_adapters::{ByteStream, Frame, FrameReader, FramingDialect, ReadError, ReadOutcome};
use log::{debug, warn};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct DriveOptions {
    pub dialect: FramingDialect,
    pub idle_timeout: Duration,
    /// Bound on the whole session, first byte to terminal event.
    pub session_timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl DriveOptions {
    pub fn new(dialect: FramingDialect) -> Self {
        Self {
            dialect,
            idle_timeout: FrameReader::DEFAULT_IDLE_TIMEOUT,
            session_timeout: None,
            cancel: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_session_timeout(mut self, session_timeout: Duration) -> Self {
        self.session_timeout = Some(session_timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Final state of a driven session.
pub struct SessionRun<S> {
    pub session: S,
    pub outcome: SessionOutcome,
}

enum Step {
    Read(ReadOutcome),
    Flush,
    Abort(StreamFailure),
}

/// Feeds a response body through the framing parser into `session` until a
/// terminal event, a transport failure, cancellation or the session deadline.
pub async fn drive_session<S: StreamSession>(
    session: S,
    stream: ByteStream,
    options: DriveOptions,
) -> SessionRun<S> {
    let mut reducer = SessionReducer::new(session);
    let mut reader =
        FrameReader::new(stream, options.dialect).with_idle_timeout(options.idle_timeout);
    let deadline = options
        .session_timeout
        .map(|limit| (Instant::now() + limit, limit));
    let cancel = options.cancel.unwrap_or_default();

    let outcome = loop {
        let flush_at = reducer.session().flush_deadline();

        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => Step::Abort(StreamFailure::Cancelled),
            _ = sleep_until_opt(deadline.map(|(at, _)| at)) => {
                Step::Abort(deadline_failure(deadline))
            }
            _ = sleep_until_opt(flush_at) => Step::Flush,
            read = reader.next_frames() => Step::Read(read),
        };

        match step {
            Step::Flush => {
                reducer.session_mut().on_flush_deadline(Instant::now());
            }
            Step::Abort(failure) => {
                warn!("Aborting stream session: {}", failure);
                break reducer.fail(failure);
            }
            Step::Read(ReadOutcome::Frames(frames)) => {
                if let Some(outcome) = apply_frames(&mut reducer, frames, &cancel, deadline).await {
                    break outcome;
                }
            }
            Step::Read(ReadOutcome::Closed(frames)) => {
                if let Some(outcome) = apply_frames(&mut reducer, frames, &cancel, deadline).await {
                    break outcome;
                }
                debug!("Stream closed without terminal event");
                break reducer.fail(StreamFailure::UnexpectedEnd);
            }
            Step::Read(ReadOutcome::Failed(err)) => {
                let failure = match err {
                    ReadError::Transport(message) => StreamFailure::Transport(message),
                    ReadError::IdleTimeout(idle) => StreamFailure::IdleTimeout(idle),
                };
                break reducer.fail(failure);
            }
        }
    };

    SessionRun {
        session: reducer.into_session(),
        outcome,
    }
}

/// Handlers may await (diagram validation), so each one still races the
/// cancellation token and the session deadline.
async fn apply_frames<S: StreamSession>(
    reducer: &mut SessionReducer<S>,
    frames: Vec<Frame>,
    cancel: &CancellationToken,
    deadline: Option<(Instant, Duration)>,
) -> Option<SessionOutcome> {
    for frame in frames {
        let applied = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StreamFailure::Cancelled),
            _ = sleep_until_opt(deadline.map(|(at, _)| at)) => Err(deadline_failure(deadline)),
            flow = reducer.reduce(frame, Instant::now()) => Ok(flow),
        };

        match applied {
            Ok(Flow::Continue) => {}
            Ok(Flow::Finished(outcome)) => return Some(outcome),
            Err(failure) => {
                warn!("Aborting stream session inside a handler: {}", failure);
                return Some(reducer.fail(failure));
            }
        }
    }
    None
}

fn deadline_failure(deadline: Option<(Instant, Duration)>) -> StreamFailure {
    StreamFailure::DeadlineExceeded(deadline.map(|(_, limit)| limit).unwrap_or_default())
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
