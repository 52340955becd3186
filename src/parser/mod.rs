//! Lexer for the textual trace stream: splits the header block from the
//! body, discriminates entry shapes, and feeds the raw entries through the
//! delta decoder. Entries are lexed lazily; only the decoded list is
//! materialized.

use crate::{
    config::DEFAULT_BYTES_ENTRIES,
    error::{Error, FormatError},
};
use fxhash::FxHashMap;
use internment::Intern;
use std::io::Read;
use tracing::debug;

pub(crate) mod delta;

/// A decoded seven-field entry.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StandardEntry {
    pub id: i32,
    pub entry_type: Intern<String>,
    pub timestamp: i64,
    pub tid: i32,
    pub arg1: i32,
    pub arg2: i32,
    pub arg3: i64,
}

/// A payload-carrying entry; `arg1` refers to the owning entry's id.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BytesEntry {
    pub id: i32,
    pub entry_type: Intern<String>,
    pub arg1: i32,
    pub data: String,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum RawEntry {
    Standard(StandardEntry),
    Bytes(BytesEntry),
}

impl RawEntry {
    pub fn id(&self) -> i32 {
        match self {
            Self::Standard(e) => e.id,
            Self::Bytes(e) => e.id,
        }
    }

    pub fn entry_type(&self) -> Intern<String> {
        match self {
            Self::Standard(e) => e.entry_type,
            Self::Bytes(e) => e.entry_type,
        }
    }

    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Self::Standard(e) => Some(e.timestamp),
            Self::Bytes(_) => None,
        }
    }

    fn construct(line: &str, lineno: usize) -> Result<Self, FormatError> {
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 2 {
            return Err(FormatError::FieldCount {
                line: lineno,
                expected: 7,
                found: fields.len(),
            });
        }

        if DEFAULT_BYTES_ENTRIES.contains(&fields[1]) {
            if fields.len() != 4 {
                return Err(FormatError::FieldCount {
                    line: lineno,
                    expected: 4,
                    found: fields.len(),
                });
            }
            Ok(Self::Bytes(BytesEntry {
                id: parse_int(fields[0], lineno, "id")?,
                entry_type: Intern::from_ref(fields[1]),
                arg1: parse_int(fields[2], lineno, "arg1")?,
                data: fields[3].to_owned(),
            }))
        } else {
            if fields.len() != 7 {
                return Err(FormatError::FieldCount {
                    line: lineno,
                    expected: 7,
                    found: fields.len(),
                });
            }
            Ok(Self::Standard(StandardEntry {
                id: parse_int(fields[0], lineno, "id")?,
                entry_type: Intern::from_ref(fields[1]),
                timestamp: parse_int(fields[2], lineno, "timestamp")?,
                tid: parse_int(fields[3], lineno, "tid")?,
                arg1: parse_int(fields[4], lineno, "arg1")?,
                arg2: parse_int(fields[5], lineno, "arg2")?,
                arg3: parse_int(fields[6], lineno, "arg3")?,
            }))
        }
    }
}

fn parse_int<T: std::str::FromStr>(
    field: &str,
    line: usize,
    name: &'static str,
) -> Result<T, FormatError> {
    field
        .parse()
        .map_err(|_| FormatError::InvalidInteger { line, field: name })
}

/// A lexed and delta-decoded trace file: header map plus the absolute
/// entry list, timestamps normalized to nanoseconds.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TraceFile {
    pub headers: FxHashMap<String, String>,
    pub entries: Vec<RawEntry>,
}

impl TraceFile {
    /// Lex and decode a decompressed UTF-8 trace stream.
    pub fn parse(text: &str) -> Result<Self, Error> {
        // Headers are separated from the entries by the first blank line
        let (header_text, body) = text
            .split_once("\n\n")
            .ok_or(FormatError::MissingBody)?;

        let mut headers = FxHashMap::default();
        for (idx, line) in header_text.lines().enumerate() {
            // `key|value`, last value wins
            let (key, value) = line
                .split_once('|')
                .ok_or(FormatError::MalformedHeader { line: idx + 1 })?;
            headers.insert(key.to_owned(), value.to_owned());
        }

        let body_offset = header_text.lines().count() + 2;
        let raw_entries = body
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| RawEntry::construct(line, body_offset + idx));

        let entries = delta::delta_decode(&headers, raw_entries)?;
        debug!(
            headers = headers.len(),
            entries = entries.len(),
            "Lexed trace file"
        );

        Ok(Self { headers, entries })
    }

    pub fn from_reader<R: Read>(mut r: R) -> Result<Self, Error> {
        let mut text = String::new();
        r.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    /// Read a gzip-compressed trace stream.
    pub fn from_gzip_reader<R: Read>(r: R) -> Result<Self, Error> {
        Self::from_reader(flate2::read::GzDecoder::new(r))
    }

    /// The trace id, if the producer recorded one.
    pub fn trace_id(&self) -> Option<&str> {
        self.headers.get("id").map(String::as_str)
    }

    /// The producing process id, as recorded.
    pub fn pid(&self) -> Option<&str> {
        self.headers.get("pid").map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn standard(entry: &RawEntry) -> &StandardEntry {
        match entry {
            RawEntry::Standard(e) => e,
            RawEntry::Bytes(_) => panic!("expected a standard entry"),
        }
    }

    #[test]
    fn header_and_body_split() {
        let trace = TraceFile::parse(
            "id|trace-1\npid|100\nid|trace-2\n\n1|MARK_PUSH|10|1|0|0|0\n",
        )
        .unwrap();
        // Last header value wins
        assert_eq!(trace.trace_id(), Some("trace-2"));
        assert_eq!(trace.pid(), Some("100"));
        assert_eq!(trace.entries.len(), 1);
        let e = standard(&trace.entries[0]);
        assert_eq!(e.entry_type.as_str(), "MARK_PUSH");
        assert_eq!(e.tid, 1);
        assert_eq!(e.timestamp, 10_000_000_000);
    }

    #[test]
    fn missing_separator() {
        let err = TraceFile::parse("id|trace-1\n1|MARK_PUSH|10|1|0|0|0").unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::MissingBody)
        ));
    }

    #[test]
    fn malformed_header() {
        let err = TraceFile::parse("id|trace-1\nbogus\n\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::MalformedHeader { line: 2 })
        ));
    }

    #[test]
    fn bytes_entries_are_discriminated_by_type_name() {
        let trace = TraceFile::parse(
            "\n\n1|MARK_PUSH|10|1|0|0|0\n2|STRING_KEY|1|__name\n3|STRING_VALUE|2|doFrame\n",
        )
        .unwrap();
        assert_eq!(trace.entries.len(), 3);
        match &trace.entries[1] {
            RawEntry::Bytes(b) => {
                assert_eq!(b.entry_type.as_str(), "STRING_KEY");
                assert_eq!(b.arg1, 1);
                assert_eq!(b.data, "__name");
            }
            RawEntry::Standard(_) => panic!("STRING_KEY must lex as a bytes entry"),
        }
    }

    #[test]
    fn field_count_mismatch_carries_the_line() {
        let err = TraceFile::parse("pid|1\n\n1|MARK_PUSH|10|1|0|0\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::FieldCount {
                line: 3,
                expected: 7,
                found: 6
            })
        ));
    }

    #[test]
    fn non_integer_field() {
        let err = TraceFile::parse("\n\n1|MARK_PUSH|oops|1|0|0|0\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::InvalidInteger {
                line: 2,
                field: "timestamp"
            })
        ));
    }

    #[test]
    fn blank_body_lines_are_skipped() {
        let trace =
            TraceFile::parse("\n\n1|MARK_PUSH|10|1|0|0|0\n\n2|MARK_POP|2|0|0|0|0\n").unwrap();
        assert_eq!(trace.entries.len(), 2);
    }

    #[test]
    fn empty_trace() {
        let trace = TraceFile::parse("id|t\n\n").unwrap();
        assert!(trace.entries.is_empty());
    }

    #[test]
    fn gzip_round_trip() {
        use flate2::{write::GzEncoder, Compression};
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"id|gz\n\n1|MARK_PUSH|10|1|0|0|0\n")
            .unwrap();
        let compressed = encoder.finish().unwrap();

        let trace = TraceFile::from_gzip_reader(&compressed[..]).unwrap();
        assert_eq!(trace.trace_id(), Some("gz"));
        assert_eq!(trace.entries.len(), 1);
    }
}
