use chrono::{DateTime, NaiveDateTime, Utc};

/// Query-string datetime format, e.g. `2015-05-11-16:56:21`.
const QS_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// RFC 1123 datetime format, e.g. `Mon, 11 May 2015 16:56:21 GMT`.
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(thiserror::Error, Debug)]
#[error("invalid datetime {input:?}: {source}")]
pub struct TimestampParseError {
    input: String,
    #[source]
    source: chrono::ParseError,
}

/// A second-resolution UTC timestamp.
///
/// Revision times are totally ordered by this type; everything the store
/// persists or compares goes through the epoch-seconds representation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_epoch_secs(secs: i64) -> Self {
        Self(secs)
    }

    #[inline]
    pub fn epoch_secs(self) -> i64 {
        self.0
    }

    /// The current wall-clock time, truncated to whole seconds.
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Parses the query-string format (`%Y-%m-%d-%H:%M:%S`), interpreted as UTC.
    pub fn parse_qs(input: &str) -> Result<Self, TimestampParseError> {
        Self::parse(input, QS_FORMAT)
    }

    /// Parses an RFC 1123 datetime (`%a, %d %b %Y %H:%M:%S GMT`).
    pub fn parse_rfc1123(input: &str) -> Result<Self, TimestampParseError> {
        Self::parse(input, RFC1123_FORMAT)
    }

    fn parse(input: &str, format: &str) -> Result<Self, TimestampParseError> {
        NaiveDateTime::parse_from_str(input, format)
            .map(|dt| Self(dt.and_utc().timestamp()))
            .map_err(|source| TimestampParseError {
                input: input.to_owned(),
                source,
            })
    }

    pub fn format_qs(self) -> String {
        self.format(QS_FORMAT)
    }

    pub fn format_rfc1123(self) -> String {
        self.format(RFC1123_FORMAT)
    }

    pub fn format_iso8601(self) -> String {
        self.format(ISO8601_FORMAT)
    }

    fn format(self, format: &str) -> String {
        // Out-of-range values cannot come from our own parsers; clamp rather
        // than panic if a foreign row carries one.
        let dt = DateTime::<Utc>::from_timestamp(self.0, 0).unwrap_or(DateTime::UNIX_EPOCH);
        dt.format(format).to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_iso8601())
    }
}

impl std::fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timestamp({} @ {})", self.0, self.format_iso8601())
    }
}
