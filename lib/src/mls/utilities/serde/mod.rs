//! Byte codecs.
//!
//! Two encodings live here:
//!
//! * the wire encoding used by everything in [`crate::mls::framing`]: TLS-style
//!   structures where variable-size fields carry a QUIC-style varint length
//!   prefix ([`serialize_opaque_vec`], [`serialize_vector`], ...);
//! * the storage record encoding used by the group state partitions: a format
//!   version byte followed by records, each prefixed with its length as a 4-byte
//!   big-endian integer ([`RecordWriter`], [`RecordReader`]).
//!
//! A record stream is read front to back. Readers take the records they know
//! about and ignore anything after them, so a newer writer may append records
//! without breaking older readers. Removing or reordering records requires a
//! new format version.

#[cfg(test)]
mod serde_test;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::mls::utilities::error::{Error, Result};

#[inline]
pub fn deserialize_varint<B: Buf>(buf: &mut B) -> Result<u32> {
    if !buf.has_remaining() {
        return Err(Error::BufferTooSmall);
    }
    let b = buf.get_u8();

    let prefix = b >> 6;
    if prefix == 3 {
        return Err(Error::InvalidVariableLengthIntegerPrefix);
    }

    let n = 1 << prefix;
    let mut v = u32::from(b & 0x3F);
    for _ in 0..n - 1 {
        if !buf.has_remaining() {
            return Err(Error::BufferTooSmall);
        }
        v = (v << 8) + u32::from(buf.get_u8());
    }

    if prefix >= 1 && v < 1u32 << (8 * (n / 2) - 2) {
        return Err(Error::MinimumEncodingWasNotUsed);
    }

    Ok(v)
}

#[allow(clippy::cast_possible_truncation)] // truncation is intended here
#[inline]
pub fn serialize_varint<B: BufMut>(n: u32, buf: &mut B) -> Result<()> {
    if n < (1 << 6) {
        buf.put_u8(n as u8);
    } else if n < (1 << 14) {
        buf.put_u16(0b01 << 14 | (n as u16));
    } else if n < (1 << 30) {
        buf.put_u32(0b10 << 30 | n);
    } else {
        return Err(Error::VarintExceeds30Bits);
    }
    Ok(())
}

#[inline]
pub fn deserialize_opaque_vec<B: Buf>(buf: &mut B) -> Result<Bytes> {
    let n = deserialize_varint(buf)? as usize;
    if buf.remaining() < n {
        return Err(Error::BufferTooSmall);
    }

    Ok(buf.copy_to_bytes(n))
}

#[inline]
pub fn serialize_opaque_vec<B: BufMut>(v: &[u8], buf: &mut B) -> Result<()> {
    let len = u32::try_from(v.len()).map_err(|_| Error::OpaqueSizeExceedsMaximumValueOfU32)?;

    serialize_varint(len, buf)?;
    buf.put(v);

    Ok(())
}

/// Reads a vector whose total byte length is varint-prefixed, calling `f` until
/// the vector's bytes are consumed.
#[inline]
pub fn deserialize_vector<B: Buf>(
    buf: &mut B,
    mut f: impl FnMut(&mut Bytes) -> Result<()>,
) -> Result<()> {
    let mut v = deserialize_opaque_vec(buf)?;
    while v.has_remaining() {
        f(&mut v)?;
    }
    Ok(())
}

#[inline]
pub fn serialize_vector<B: BufMut>(
    n: usize,
    buf: &mut B,
    mut f: impl FnMut(usize, &mut BytesMut) -> Result<()>,
) -> Result<()> {
    // The length prefix is a varint over the encoded size, which we only know
    // once every element has been written
    let mut child = BytesMut::new();
    for i in 0..n {
        f(i, &mut child)?;
    }

    serialize_opaque_vec(&child, buf)
}

#[inline]
pub fn deserialize_optional<B: Buf>(buf: &mut B) -> Result<bool> {
    if !buf.has_remaining() {
        return Err(Error::BufferTooSmall);
    }

    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::InvalidOptionalValue),
    }
}

#[inline]
pub fn serialize_optional<B: BufMut>(present: bool, buf: &mut B) -> Result<()> {
    buf.put_u8(u8::from(present));
    Ok(())
}

#[inline]
pub fn deserialize_u32<B: Buf>(buf: &mut B) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(Error::BufferTooSmall);
    }
    Ok(buf.get_u32())
}

#[inline]
pub fn deserialize_u64<B: Buf>(buf: &mut B) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(Error::BufferTooSmall);
    }
    Ok(buf.get_u64())
}

/// Reads exactly `N` bytes, for fields whose size is fixed by the cipher suite.
#[inline]
pub fn deserialize_fixed<B: Buf, const N: usize>(buf: &mut B) -> Result<[u8; N]> {
    if buf.remaining() < N {
        return Err(Error::BufferTooSmall);
    }
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

pub trait Deserializer {
    fn deserialize<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf;

    /// Deserializes `buf`, failing if bytes are left over.
    fn deserialize_exact(buf: impl AsRef<[u8]>) -> Result<Self>
    where
        Self: Sized,
    {
        let mut buf = buf.as_ref();
        let value = Self::deserialize(&mut buf)?;
        if buf.has_remaining() {
            return Err(Error::TrailingBytes);
        }
        Ok(value)
    }
}

pub trait Serializer {
    fn serialize<B>(&self, buf: &mut B) -> Result<()>
    where
        Self: Sized,
        B: BufMut;

    fn serialize_detached(&self) -> Result<Bytes>
    where
        Self: Sized,
    {
        let mut buf = BytesMut::new();
        self.serialize(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Writes a versioned stream of length-prefixed records.
#[derive(Debug)]
pub struct RecordWriter {
    buf: BytesMut,
}

impl RecordWriter {
    pub fn new(version: u8) -> Self {
        let mut buf = BytesMut::new();
        buf.put_u8(version);
        Self { buf }
    }

    pub fn record(&mut self, payload: &[u8]) -> Result<&mut Self> {
        let len = u32::try_from(payload.len())
            .map_err(|_| Error::OpaqueSizeExceedsMaximumValueOfU32)?;
        self.buf.put_u32(len);
        self.buf.put(payload);
        Ok(self)
    }

    /// Serializes `value` and writes it as one record.
    pub fn serialized<T: Serializer>(&mut self, value: &T) -> Result<&mut Self> {
        let payload = value.serialize_detached()?;
        self.record(&payload)
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads a stream produced by [`RecordWriter`].
#[derive(Debug)]
pub struct RecordReader {
    version: u8,
    buf: Bytes,
}

impl RecordReader {
    /// Opens a record stream, rejecting versions other than `expected_version`.
    pub fn open(mut buf: Bytes, expected_version: u8) -> Result<Self> {
        if !buf.has_remaining() {
            return Err(Error::BufferTooSmall);
        }
        let version = buf.get_u8();
        if version != expected_version {
            return Err(Error::UnsupportedFormatVersion(version));
        }

        Ok(Self { version, buf })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the next record. `name` is only used to report a missing record.
    pub fn record(&mut self, name: &'static str) -> Result<Bytes> {
        if !self.buf.has_remaining() {
            return Err(Error::MissingRecord(name));
        }
        let len = deserialize_u32(&mut self.buf)? as usize;
        if self.buf.remaining() < len {
            return Err(Error::BufferTooSmall);
        }
        Ok(self.buf.split_to(len))
    }

    /// Reads the next record and deserializes all of it as `T`.
    pub fn deserialized<T: Deserializer>(&mut self, name: &'static str) -> Result<T> {
        let record = self.record(name)?;
        T::deserialize_exact(record)
    }

    /// Records after the ones a reader knows about.
    pub fn has_unread_records(&self) -> bool {
        self.buf.has_remaining()
    }
}
