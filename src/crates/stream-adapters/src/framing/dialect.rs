#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Sets the event type of the frame being assembled.
    Event,
    /// Appends a line to the frame's payload.
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub prefix: &'static str,
    pub kind: FieldKind,
}

/// Framing convention of one endpoint.
///
/// Both conventions the backend speaks are expressed as a record separator plus
/// a field prefix table, so a single parser owns all the buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingDialect {
    pub name: &'static str,
    pub record_separator: &'static str,
    pub fields: &'static [FieldRule],
}

const EVENT_STREAM_FIELDS: &[FieldRule] = &[
    FieldRule {
        prefix: "event:",
        kind: FieldKind::Event,
    },
    FieldRule {
        prefix: "data:",
        kind: FieldKind::Data,
    },
];

const DATA_LINE_FIELDS: &[FieldRule] = &[FieldRule {
    prefix: "data:",
    kind: FieldKind::Data,
}];

impl FramingDialect {
    /// `event:` and `data:` field lines grouped until a blank line.
    pub const EVENT_STREAM: FramingDialect = FramingDialect {
        name: "event-stream",
        record_separator: "\n\n",
        fields: EVENT_STREAM_FIELDS,
    };

    /// Payload-only `data:` lines, one frame per line.
    pub const DATA_LINES: FramingDialect = FramingDialect {
        name: "data-lines",
        record_separator: "\n",
        fields: DATA_LINE_FIELDS,
    };

    /// Matches a line against the prefix table and returns the field value.
    ///
    /// A single space after the colon is part of the separator, not the value.
    pub fn match_field<'a>(&self, line: &'a str) -> Option<(FieldKind, &'a str)> {
        self.fields.iter().find_map(|rule| {
            line.strip_prefix(rule.prefix).map(|value| {
                (rule.kind, value.strip_prefix(' ').unwrap_or(value))
            })
        })
    }
}
