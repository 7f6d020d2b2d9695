use crate::framing::{Frame, FrameParser, FramingDialect};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use log::{error, trace};
use std::time::Duration;
use tokio::time::timeout;

/// Response body as a stream of network reads.
pub type ByteStream = BoxStream<'static, Result<Bytes, String>>;

/// Boxes any chunk stream (e.g. `reqwest::Response::bytes_stream`) into a [`ByteStream`].
pub fn byte_stream<S, E>(stream: S) -> ByteStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    stream.map(|chunk| chunk.map_err(|e| e.to_string())).boxed()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("stream transport error: {0}")]
    Transport(String),
    #[error("stream idle for {}s", .0.as_secs())]
    IdleTimeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Frames completed by one network read (possibly none).
    Frames(Vec<Frame>),
    /// The body ended; carries whatever the final flush produced.
    Closed(Vec<Frame>),
    Failed(ReadError),
}

/// Pumps a byte stream through a [`FrameParser`].
///
/// `next_frames` is cancel-safe: dropping it before it resolves loses no bytes,
/// because parsing only happens after a read has completed.
pub struct FrameReader {
    stream: ByteStream,
    parser: FrameParser,
    idle_timeout: Duration,
    finished: bool,
}

impl FrameReader {
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new(stream: ByteStream, dialect: FramingDialect) -> Self {
        Self {
            stream,
            parser: FrameParser::new(dialect),
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            finished: false,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn next_frames(&mut self) -> ReadOutcome {
        if self.finished {
            return ReadOutcome::Closed(Vec::new());
        }

        match timeout(self.idle_timeout, self.stream.next()).await {
            Ok(Some(Ok(chunk))) => {
                trace!(
                    "Stream read: {} bytes ({} dialect)",
                    chunk.len(),
                    self.parser.dialect().name
                );
                if chunk.is_empty() {
                    // An empty read is not the end of the body; the parser would
                    // treat it as a flush.
                    return ReadOutcome::Frames(Vec::new());
                }
                ReadOutcome::Frames(self.parser.feed(&chunk))
            }
            Ok(None) => {
                self.finished = true;
                ReadOutcome::Closed(self.parser.flush())
            }
            Ok(Some(Err(e))) => {
                self.finished = true;
                error!("Stream read failed: {}", e);
                ReadOutcome::Failed(ReadError::Transport(e))
            }
            Err(_) => {
                self.finished = true;
                error!(
                    "Stream idle timeout after {}s",
                    self.idle_timeout.as_secs()
                );
                ReadOutcome::Failed(ReadError::IdleTimeout(self.idle_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&'static str]) -> ByteStream {
        let items: Vec<Result<Bytes, String>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn reads_frames_then_flushes_on_close() {
        let mut reader = FrameReader::new(
            chunks(&["event: primary\nda", "ta: {}\n\nevent: done\ndata: {}"]),
            FramingDialect::EVENT_STREAM,
        );

        assert_eq!(reader.next_frames().await, ReadOutcome::Frames(vec![]));
        match reader.next_frames().await {
            ReadOutcome::Frames(frames) => {
                assert_eq!(frames.len(), 1);
                assert_eq!(frames[0].event_type(), "primary");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        match reader.next_frames().await {
            ReadOutcome::Closed(frames) => {
                assert_eq!(frames.len(), 1);
                assert_eq!(frames[0].event_type(), "done");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(reader.is_finished());
        assert_eq!(reader.next_frames().await, ReadOutcome::Closed(vec![]));
    }

    #[tokio::test]
    async fn transport_error_finishes_the_reader() {
        let items: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: {}\n")),
            Err("connection reset".to_string()),
        ];
        let mut reader = FrameReader::new(stream::iter(items).boxed(), FramingDialect::DATA_LINES);

        assert!(matches!(reader.next_frames().await, ReadOutcome::Frames(f) if f.len() == 1));
        assert_eq!(
            reader.next_frames().await,
            ReadOutcome::Failed(ReadError::Transport("connection reset".to_string()))
        );
        assert!(reader.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_hits_idle_timeout() {
        let mut reader = FrameReader::new(
            stream::pending::<Result<Bytes, String>>().boxed(),
            FramingDialect::EVENT_STREAM,
        )
        .with_idle_timeout(Duration::from_secs(5));

        assert_eq!(
            reader.next_frames().await,
            ReadOutcome::Failed(ReadError::IdleTimeout(Duration::from_secs(5)))
        );
    }

    #[test]
    fn byte_stream_maps_errors_to_strings() {
        let source = stream::iter(vec![Err::<Bytes, std::io::Error>(std::io::Error::other("boom"))]);
        let mut boxed = byte_stream(source);
        let first = futures::executor::block_on(boxed.next());
        assert_eq!(first, Some(Err("boom".to_string())));
    }
}
