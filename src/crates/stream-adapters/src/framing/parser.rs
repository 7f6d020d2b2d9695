use super::{FieldKind, Frame, FramingDialect};
use log::trace;

/// Incremental frame parser.
///
/// Everything after the last complete record separator stays buffered until the
/// next `feed`, so a frame split across network reads is reassembled intact.
#[derive(Debug)]
pub struct FrameParser {
    dialect: FramingDialect,
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence cut by a chunk boundary.
    partial_utf8: Vec<u8>,
}

impl FrameParser {
    pub fn new(dialect: FramingDialect) -> Self {
        Self {
            dialect,
            buffer: String::new(),
            partial_utf8: Vec::new(),
        }
    }

    pub fn dialect(&self) -> FramingDialect {
        self.dialect
    }

    /// Feeds one network read. An empty chunk marks the end of the stream and
    /// flushes any trailing unterminated frame.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.is_empty() {
            return self.flush();
        }
        self.push_bytes(chunk);
        self.drain_records()
    }

    /// Emits every remaining frame, including one without a final separator.
    pub fn flush(&mut self) -> Vec<Frame> {
        if !self.partial_utf8.is_empty() {
            let tail = std::mem::take(&mut self.partial_utf8);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let mut frames = self.drain_records();
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches('\r');
        if let Some(frame) = parse_record(&self.dialect, rest) {
            frames.push(frame);
        }
        frames
    }

    /// Bytes received but not yet emitted as frames.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.partial_utf8.len()
    }

    fn push_bytes(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.partial_utf8);
        bytes.extend_from_slice(chunk);

        let mut start = 0;
        while start < bytes.len() {
            match std::str::from_utf8(&bytes[start..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&bytes[start..valid_end]));
                    match e.error_len() {
                        Some(invalid_len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + invalid_len;
                        }
                        None => {
                            self.partial_utf8 = bytes[valid_end..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        self.normalize_line_endings();
    }

    /// `\r\n` and lone `\r` become `\n`. A trailing `\r` is kept as is because
    /// its `\n` may arrive with the next chunk.
    fn normalize_line_endings(&mut self) {
        if !self.buffer.contains('\r') {
            return;
        }
        let keep_trailing_cr = self.buffer.ends_with('\r');
        let body = if keep_trailing_cr {
            &self.buffer[..self.buffer.len() - 1]
        } else {
            &self.buffer[..]
        };
        let mut normalized = body.replace("\r\n", "\n").replace('\r', "\n");
        if keep_trailing_cr {
            normalized.push('\r');
        }
        self.buffer = normalized;
    }

    fn drain_records(&mut self) -> Vec<Frame> {
        let separator = self.dialect.record_separator;
        let mut frames = Vec::new();
        let mut consumed = 0;

        while let Some(pos) = self.buffer[consumed..].find(separator) {
            let record = &self.buffer[consumed..consumed + pos];
            if let Some(frame) = parse_record(&self.dialect, record) {
                frames.push(frame);
            }
            consumed += pos + separator.len();
        }

        self.buffer.drain(..consumed);
        frames
    }
}

fn parse_record(dialect: &FramingDialect, record: &str) -> Option<Frame> {
    let mut event_type: Option<String> = None;
    let mut payload: Option<String> = None;

    for line in record.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        match dialect.match_field(line) {
            Some((FieldKind::Event, value)) => event_type = Some(value.to_string()),
            Some((FieldKind::Data, value)) => match payload.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => payload = Some(value.to_string()),
            },
            None => trace!("Ignoring unrecognised stream line: {:?}", line),
        }
    }

    if event_type.is_none() && payload.is_none() {
        return None;
    }
    Some(Frame {
        event_type,
        payload: payload.unwrap_or_default(),
    })
}
