//! Native codecs for the packed log-entry records, mirroring the contracts
//! of the generated serializers: a one-byte serialization tag, fields in
//! declaration order in host byte order, and 4-byte-aligned dynamic-array
//! payloads that are borrowed (not copied) on unpack.

use crate::error::WireError;

pub use entries::{BytesEntry, DynArray, FramesEntry, StandardEntry, WireScalar};

pub mod entries;

/// Read the serialization tag of a packed record.
pub fn peek_type(src: &[u8]) -> Result<u8, WireError> {
    src.first().copied().ok_or(WireError::EmptyBuffer)
}

/// Receives the record unpacked by [`parse_entry`].
pub trait EntryVisitor {
    fn visit_standard(&mut self, entry: &StandardEntry);
    fn visit_frames(&mut self, entry: &FramesEntry<'_>);
    fn visit_bytes(&mut self, entry: &BytesEntry<'_>);
}

/// Peek the serialization tag of `src`, unpack the corresponding record and
/// hand it to `visitor`.
///
/// An unknown tag is reported as [`WireError::UnknownKind`] without
/// consuming anything, so the caller can skip the record and continue.
pub fn parse_entry<V: EntryVisitor>(src: &[u8], visitor: &mut V) -> Result<(), WireError> {
    match peek_type(src)? {
        StandardEntry::SERIALIZATION_TYPE => {
            visitor.visit_standard(&StandardEntry::unpack(src)?)
        }
        FramesEntry::SERIALIZATION_TYPE => visitor.visit_frames(&FramesEntry::unpack(src)?),
        BytesEntry::SERIALIZATION_TYPE => visitor.visit_bytes(&BytesEntry::unpack(src)?),
        unknown => return Err(WireError::UnknownKind(unknown)),
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn standard() -> StandardEntry {
        StandardEntry {
            id: 17,
            entry_type: 30,
            timestamp: 1_000_000_000,
            tid: 1234,
            callid: 0,
            matchid: 16,
            extra: -1,
        }
    }

    #[test]
    fn standard_round_trip() {
        let entry = standard();
        let mut buf = [0u8; 64];
        let len = entry.pack(&mut buf).unwrap();
        assert_eq!(len, entry.wire_size());
        assert_eq!(len, 34);
        assert_eq!(buf[0], StandardEntry::SERIALIZATION_TYPE);
        assert_eq!(StandardEntry::unpack(&buf[..len]).unwrap(), entry);
    }

    #[test]
    fn frames_round_trip() {
        let frames = [0xAA_i64, 0xBB, 0xCC];
        let entry = FramesEntry {
            id: 1,
            entry_type: 53,
            timestamp: 99,
            tid: 2,
            frames: (&frames[..]).into(),
        };
        // 1 tag + 17 fixed + 2 count + pad to 4 + 24 payload
        assert_eq!(entry.wire_size(), 44);

        let mut buf = [0u8; 64];
        let len = entry.pack(&mut buf).unwrap();
        assert_eq!(len, entry.wire_size());

        let unpacked = FramesEntry::unpack(&buf[..len]).unwrap();
        assert_eq!(unpacked, entry);
        assert_eq!(unpacked.frames.len(), 3);
        // The payload is borrowed from the packed buffer, not copied
        match unpacked.frames {
            DynArray::Wire { count, bytes, .. } => {
                assert_eq!(count, 3);
                assert_eq!(bytes.as_ptr(), buf[20..].as_ptr());
            }
            DynArray::Values(_) => panic!("unpack must borrow the source"),
        }
    }

    #[test]
    fn bytes_round_trip() {
        let payload = b"__name";
        let entry = BytesEntry {
            id: 9,
            entry_type: 64,
            matchid: 8,
            bytes: (&payload[..]).into(),
        };
        assert_eq!(entry.wire_size(), 12 + payload.len());

        let mut buf = [0u8; 32];
        let len = entry.pack(&mut buf).unwrap();
        assert_eq!(len, entry.wire_size());
        assert_eq!(BytesEntry::unpack(&buf[..len]).unwrap(), entry);
    }

    #[test]
    fn pack_into_small_buffer() {
        let entry = standard();
        let mut buf = [0u8; 16];
        assert_eq!(
            entry.pack(&mut buf),
            Err(WireError::BufferTooSmall { need: 34, cap: 16 })
        );
    }

    #[test]
    fn unpack_tag_mismatch() {
        let entry = standard();
        let mut buf = [0u8; 64];
        let len = entry.pack(&mut buf).unwrap();
        assert_eq!(
            FramesEntry::unpack(&buf[..len]).unwrap_err(),
            WireError::TagMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn unpack_truncated() {
        let entry = standard();
        let mut buf = [0u8; 64];
        entry.pack(&mut buf).unwrap();
        assert!(matches!(
            StandardEntry::unpack(&buf[..10]),
            Err(WireError::Truncated { .. })
        ));
    }

    #[derive(Default)]
    struct Recorder {
        standard: Vec<StandardEntry>,
        frame_counts: Vec<usize>,
        bytes: Vec<Vec<u8>>,
    }

    impl EntryVisitor for Recorder {
        fn visit_standard(&mut self, entry: &StandardEntry) {
            self.standard.push(*entry);
        }

        fn visit_frames(&mut self, entry: &FramesEntry<'_>) {
            self.frame_counts.push(entry.frames.len());
        }

        fn visit_bytes(&mut self, entry: &BytesEntry<'_>) {
            self.bytes.push(entry.bytes.iter().collect());
        }
    }

    #[test]
    fn dispatch_is_idempotent() {
        let entry = standard();
        let mut buf = [0u8; 64];
        let len = entry.pack(&mut buf).unwrap();

        let mut recorder = Recorder::default();
        parse_entry(&buf[..len], &mut recorder).unwrap();
        parse_entry(&buf[..len], &mut recorder).unwrap();
        assert_eq!(recorder.standard, vec![entry, entry]);
    }

    #[test]
    fn dispatch_bytes() {
        let entry = BytesEntry {
            id: 4,
            entry_type: 65,
            matchid: 0,
            bytes: (&b"value"[..]).into(),
        };
        let mut buf = [0u8; 32];
        let len = entry.pack(&mut buf).unwrap();

        let mut recorder = Recorder::default();
        parse_entry(&buf[..len], &mut recorder).unwrap();
        assert_eq!(recorder.bytes, vec![b"value".to_vec()]);
    }

    #[test]
    fn dispatch_unknown_kind() {
        let mut recorder = Recorder::default();
        let buf = [0xEE_u8, 0, 0, 0];
        assert_eq!(
            parse_entry(&buf, &mut recorder),
            Err(WireError::UnknownKind(0xEE))
        );
        assert_eq!(peek_type(&[]), Err(WireError::EmptyBuffer));
    }
}
