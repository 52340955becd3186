//! Reconstructs absolute entries from the delta-encoded stream.
//!
//! The first standard entry is absolute (its timestamp still truncated to
//! the header precision); every later standard entry stores each numeric
//! field as a signed difference from the previous standard entry. Addition
//! wraps in two's complement at the field width, so checked arithmetic has
//! no place here. Bytes entries pass through untouched and do not move the
//! baseline.

use super::{RawEntry, StandardEntry};
use crate::error::FormatError;
use fxhash::FxHashMap;

/// Nanoseconds per stored timestamp unit for a `prec` header value.
fn timestamp_multiplier(headers: &FxHashMap<String, String>) -> Result<i64, FormatError> {
    let precision: i64 = match headers.get("prec") {
        None => 0,
        Some(raw) => raw
            .parse()
            .map_err(|_| FormatError::InvalidPrecision(raw.clone()))?,
    };
    if !(0..=9).contains(&precision) {
        return Err(FormatError::UnsupportedPrecision(precision));
    }
    Ok(10_i64.pow((9 - precision) as u32))
}

pub(crate) fn delta_decode<I>(
    headers: &FxHashMap<String, String>,
    encoded: I,
) -> Result<Vec<RawEntry>, FormatError>
where
    I: Iterator<Item = Result<RawEntry, FormatError>>,
{
    let multiplier = timestamp_multiplier(headers)?;

    let mut entries = Vec::new();
    let mut last: Option<StandardEntry> = None;
    for entry in encoded {
        let delta = match entry? {
            RawEntry::Bytes(e) => {
                entries.push(RawEntry::Bytes(e));
                continue;
            }
            RawEntry::Standard(e) => e,
        };

        let absolute = match last {
            // First entry is not delta-encoded, but its timestamp is
            // still in precision units
            None => StandardEntry {
                timestamp: delta.timestamp.wrapping_mul(multiplier),
                ..delta
            },
            Some(prev) => StandardEntry {
                id: prev.id.wrapping_add(delta.id),
                entry_type: delta.entry_type,
                timestamp: prev
                    .timestamp
                    .wrapping_add(delta.timestamp.wrapping_mul(multiplier)),
                tid: prev.tid.wrapping_add(delta.tid),
                arg1: prev.arg1.wrapping_add(delta.arg1),
                arg2: prev.arg2.wrapping_add(delta.arg2),
                arg3: prev.arg3.wrapping_add(delta.arg3),
            },
        };
        entries.push(RawEntry::Standard(absolute));
        last = Some(absolute);
    }
    Ok(entries)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::TraceFile;
    use pretty_assertions::assert_eq;

    fn standard(entry: &RawEntry) -> StandardEntry {
        match entry {
            RawEntry::Standard(e) => *e,
            RawEntry::Bytes(_) => panic!("expected a standard entry"),
        }
    }

    #[test]
    fn precision_scales_to_nanoseconds() {
        let trace = TraceFile::parse(
            "prec|6\n\n1|MARK_PUSH|1000000|1|0|0|0\n1|MARK_POP|2|0|0|0|0\n",
        )
        .unwrap();
        let first = standard(&trace.entries[0]);
        let second = standard(&trace.entries[1]);
        assert_eq!(first.timestamp, 1_000_000_000);
        assert_eq!(second.timestamp, 1_000_002_000);
        assert_eq!(second.id, 2);
    }

    #[test]
    fn fields_accumulate_independently() {
        let trace = TraceFile::parse(
            "\n\n10|MARK_PUSH|100|7|1|2|3\n-2|COUNTER|5|1|30|-1|40\n",
        )
        .unwrap();
        let second = standard(&trace.entries[1]);
        assert_eq!(second.id, 8);
        assert_eq!(second.timestamp, 105);
        assert_eq!(second.tid, 8);
        assert_eq!(second.arg1, 31);
        assert_eq!(second.arg2, 1);
        assert_eq!(second.arg3, 43);
    }

    #[test]
    fn addition_wraps_at_field_width() {
        let text = format!(
            "\n\n{id}|MARK_PUSH|{ts}|1|0|0|{a3}\n1|MARK_POP|1|0|0|0|1\n",
            id = i32::MAX,
            ts = i64::MAX,
            a3 = i64::MAX,
        );
        let trace = TraceFile::parse(&text).unwrap();
        let second = standard(&trace.entries[1]);
        assert_eq!(second.id, i32::MIN);
        assert_eq!(second.timestamp, i64::MIN);
        assert_eq!(second.arg3, i64::MIN);
    }

    #[test]
    fn bytes_entries_do_not_move_the_baseline() {
        let trace = TraceFile::parse(
            "\n\n1|MARK_PUSH|10|1|0|0|0\n2|STRING_KEY|1|__name\n1|MARK_POP|5|0|0|0|0\n",
        )
        .unwrap();
        let third = standard(&trace.entries[2]);
        assert_eq!(third.id, 2);
        assert_eq!(third.timestamp, 15);
    }

    #[test]
    fn unsupported_precision() {
        let err = TraceFile::parse("prec|12\n\n").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Format(FormatError::UnsupportedPrecision(12))
        ));
        let err = TraceFile::parse("prec|abc\n\n").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Format(FormatError::InvalidPrecision(_))
        ));
    }
}
