use crate::error::WireError;
use std::fmt;
use std::marker::PhantomData;

/// Round an offset up to the next 4-byte boundary.
#[inline]
pub(crate) const fn align4(offset: usize) -> usize {
    (offset + 0x03) & !0x03
}

mod private {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// An integer that can be copied to and from the wire in host byte order.
pub trait WireScalar: Copy + PartialEq + fmt::Debug + private::Sealed {
    const WIDTH: usize;

    fn read(bytes: &[u8]) -> Self;
    fn write(self, out: &mut [u8]);
}

macro_rules! impl_wire_scalar {
    ($($t:ty),*) => {
        $(
            impl WireScalar for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                #[inline]
                fn read(bytes: &[u8]) -> Self {
                    <$t>::from_ne_bytes(bytes.try_into().unwrap())
                }

                #[inline]
                fn write(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_wire_scalar!(u8, u16, i32, i64);

/// A dynamic-array field: a `u16` element count, then (4-byte aligned from
/// the buffer start) the elements' native bytes.
///
/// On the pack side this borrows the caller's typed values. On the unpack
/// side it borrows the raw payload bytes of the source buffer without
/// copying, so an unpacked record must not outlive its source buffer.
#[derive(Copy, Clone, Debug)]
pub enum DynArray<'a, T: WireScalar> {
    Values(&'a [T]),
    Wire {
        count: u16,
        bytes: &'a [u8],
        _elem: PhantomData<T>,
    },
}

impl<'a, T: WireScalar> DynArray<'a, T> {
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Wire { count, .. } => usize::from(*count),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> Option<T> {
        match self {
            Self::Values(v) => v.get(idx).copied(),
            Self::Wire { bytes, .. } => {
                let start = idx.checked_mul(T::WIDTH)?;
                bytes.get(start..start + T::WIDTH).map(T::read)
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        // SAFETY: idx < len, and the wire form always holds len * WIDTH bytes
        (0..self.len()).map(|idx| self.get(idx).unwrap())
    }

    pub(crate) fn payload_size(&self) -> usize {
        self.len() * T::WIDTH
    }
}

impl<'a, T: WireScalar> From<&'a [T]> for DynArray<'a, T> {
    fn from(values: &'a [T]) -> Self {
        Self::Values(values)
    }
}

impl<'a, 'b, T: WireScalar> PartialEq<DynArray<'b, T>> for DynArray<'a, T> {
    fn eq(&self, other: &DynArray<'b, T>) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

struct WriteCursor<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> WriteCursor<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn put<T: WireScalar>(&mut self, value: T) {
        value.write(&mut self.buf[self.offset..self.offset + T::WIDTH]);
        self.offset += T::WIDTH;
    }

    fn align4(&mut self) {
        let aligned = align4(self.offset);
        self.buf[self.offset..aligned].fill(0);
        self.offset = aligned;
    }

    fn put_payload<T: WireScalar>(&mut self, values: &DynArray<'_, T>) {
        match values {
            DynArray::Values(v) => {
                for value in v.iter() {
                    self.put(*value);
                }
            }
            DynArray::Wire { bytes, .. } => {
                self.buf[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
                self.offset += bytes.len();
            }
        }
    }
}

struct ReadCursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ReadCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn take<T: WireScalar>(&mut self) -> Result<T, WireError> {
        let bytes = self
            .buf
            .get(self.offset..self.offset + T::WIDTH)
            .ok_or(WireError::Truncated {
                offset: self.buf.len(),
                need: (self.offset + T::WIDTH).saturating_sub(self.buf.len()),
            })?;
        self.offset += T::WIDTH;
        Ok(T::read(bytes))
    }

    fn align4(&mut self) {
        self.offset = align4(self.offset);
    }

    fn take_payload<T: WireScalar>(&mut self, count: u16) -> Result<DynArray<'a, T>, WireError> {
        let len = usize::from(count) * T::WIDTH;
        let bytes = self
            .buf
            .get(self.offset..self.offset + len)
            .ok_or(WireError::Truncated {
                offset: self.buf.len().min(self.offset + len),
                need: (self.offset + len).saturating_sub(self.buf.len()),
            })?;
        self.offset += len;
        Ok(DynArray::Wire {
            count,
            bytes,
            _elem: PhantomData,
        })
    }
}

fn check_tag(src: &[u8], expected: u8) -> Result<(), WireError> {
    let found = *src.first().ok_or(WireError::EmptyBuffer)?;
    if found != expected {
        return Err(WireError::TagMismatch { expected, found });
    }
    Ok(())
}

fn check_capacity(dst: &[u8], need: usize) -> Result<(), WireError> {
    if dst.len() < need {
        return Err(WireError::BufferTooSmall {
            need,
            cap: dst.len(),
        });
    }
    Ok(())
}

/// The seven-field record used by most entry kinds.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StandardEntry {
    pub id: i32,
    pub entry_type: u8,
    pub timestamp: i64,
    pub tid: i32,
    pub callid: i32,
    pub matchid: i32,
    pub extra: i64,
}

impl StandardEntry {
    pub const SERIALIZATION_TYPE: u8 = 1;

    pub fn wire_size(&self) -> usize {
        1 + 4 + 1 + 8 + 4 + 4 + 4 + 8
    }

    pub fn pack(&self, dst: &mut [u8]) -> Result<usize, WireError> {
        check_capacity(dst, self.wire_size())?;
        let mut w = WriteCursor::new(dst);
        w.put(Self::SERIALIZATION_TYPE);
        w.put(self.id);
        w.put(self.entry_type);
        w.put(self.timestamp);
        w.put(self.tid);
        w.put(self.callid);
        w.put(self.matchid);
        w.put(self.extra);
        Ok(w.offset)
    }

    pub fn unpack(src: &[u8]) -> Result<Self, WireError> {
        check_tag(src, Self::SERIALIZATION_TYPE)?;
        let mut r = ReadCursor::new(src);
        let _tag: u8 = r.take()?;
        Ok(Self {
            id: r.take()?,
            entry_type: r.take()?,
            timestamp: r.take()?,
            tid: r.take()?,
            callid: r.take()?,
            matchid: r.take()?,
            extra: r.take()?,
        })
    }
}

/// Stack-sample record: fixed header plus a dynamic array of frame
/// addresses. Unpacking borrows the frame payload from the source buffer.
#[derive(Copy, Clone, Debug)]
pub struct FramesEntry<'a> {
    pub id: i32,
    pub entry_type: u8,
    pub timestamp: i64,
    pub tid: i32,
    pub frames: DynArray<'a, i64>,
}

impl<'a> FramesEntry<'a> {
    pub const SERIALIZATION_TYPE: u8 = 2;

    pub fn wire_size(&self) -> usize {
        let offset = 1 + 4 + 1 + 8 + 4 + 2;
        align4(offset) + self.frames.payload_size()
    }

    pub fn pack(&self, dst: &mut [u8]) -> Result<usize, WireError> {
        debug_assert!(self.frames.len() <= usize::from(u16::MAX));
        check_capacity(dst, self.wire_size())?;
        let mut w = WriteCursor::new(dst);
        w.put(Self::SERIALIZATION_TYPE);
        w.put(self.id);
        w.put(self.entry_type);
        w.put(self.timestamp);
        w.put(self.tid);
        w.put(self.frames.len() as u16);
        w.align4();
        w.put_payload(&self.frames);
        Ok(w.offset)
    }

    pub fn unpack(src: &'a [u8]) -> Result<Self, WireError> {
        check_tag(src, Self::SERIALIZATION_TYPE)?;
        let mut r = ReadCursor::new(src);
        let _tag: u8 = r.take()?;
        let id = r.take()?;
        let entry_type = r.take()?;
        let timestamp = r.take()?;
        let tid = r.take()?;
        let count: u16 = r.take()?;
        r.align4();
        Ok(Self {
            id,
            entry_type,
            timestamp,
            tid,
            frames: r.take_payload(count)?,
        })
    }
}

impl<'a, 'b> PartialEq<FramesEntry<'b>> for FramesEntry<'a> {
    fn eq(&self, other: &FramesEntry<'b>) -> bool {
        self.id == other.id
            && self.entry_type == other.entry_type
            && self.timestamp == other.timestamp
            && self.tid == other.tid
            && self.frames == other.frames
    }
}

/// Variable-length payload record used by string and mapping entry kinds.
/// Unpacking borrows the byte payload from the source buffer.
#[derive(Copy, Clone, Debug)]
pub struct BytesEntry<'a> {
    pub id: i32,
    pub entry_type: u8,
    pub matchid: i32,
    pub bytes: DynArray<'a, u8>,
}

impl<'a> BytesEntry<'a> {
    pub const SERIALIZATION_TYPE: u8 = 3;

    pub fn wire_size(&self) -> usize {
        let offset = 1 + 4 + 1 + 4 + 2;
        align4(offset) + self.bytes.payload_size()
    }

    pub fn pack(&self, dst: &mut [u8]) -> Result<usize, WireError> {
        debug_assert!(self.bytes.len() <= usize::from(u16::MAX));
        check_capacity(dst, self.wire_size())?;
        let mut w = WriteCursor::new(dst);
        w.put(Self::SERIALIZATION_TYPE);
        w.put(self.id);
        w.put(self.entry_type);
        w.put(self.matchid);
        w.put(self.bytes.len() as u16);
        w.align4();
        w.put_payload(&self.bytes);
        Ok(w.offset)
    }

    pub fn unpack(src: &'a [u8]) -> Result<Self, WireError> {
        check_tag(src, Self::SERIALIZATION_TYPE)?;
        let mut r = ReadCursor::new(src);
        let _tag: u8 = r.take()?;
        let id = r.take()?;
        let entry_type = r.take()?;
        let matchid = r.take()?;
        let count: u16 = r.take()?;
        r.align4();
        Ok(Self {
            id,
            entry_type,
            matchid,
            bytes: r.take_payload(count)?,
        })
    }
}

impl<'a, 'b> PartialEq<BytesEntry<'b>> for BytesEntry<'a> {
    fn eq(&self, other: &BytesEntry<'b>) -> bool {
        self.id == other.id
            && self.entry_type == other.entry_type
            && self.matchid == other.matchid
            && self.bytes == other.bytes
    }
}
