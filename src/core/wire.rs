//! # Binary Wire Primitives
//!
//! Byte-level encoders and decoders for the externally-defined wire format:
//! big-endian base-128 varints (VLQ / SignedVLQ), fixed-width integers and
//! floats, booleans, raw UUIDs, and VLQ-length-prefixed byte arrays and
//! strings.
//!
//! All decoding goes through [`WireReader`], a cursor over a byte slice that
//! reports truncation as structured errors instead of panicking. Encoding
//! goes through [`WireWriter`], which appends to a growable buffer.
//!
//! ## Varint Format
//! Unsigned values are split into big-endian 7-bit groups; every byte except
//! the last carries the `0x80` continuation bit. Encoding is minimal: zero is
//! the single byte `0x00` and no value starts with a redundant `0x80` group.

use bytes::{BufMut, BytesMut};

use crate::error::{ProtocolError, Result};

/// Longest legal VLQ sequence for a 64-bit value (ceil(64 / 7) = 10 bytes).
const MAX_VLQ_BYTES: usize = 10;

/// Sign-decode an already-read unsigned varint value.
pub fn signed_from_vlq(m: u64) -> i64 {
    if m % 2 == 0 {
        (m / 2) as i64
    } else {
        ((m >> 1) as i64).wrapping_add(1).wrapping_neg()
    }
}

/// A wire string: UTF-8 text when the bytes decode cleanly, raw bytes
/// otherwise. Decoding never fails; re-encoding is byte-exact either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireString {
    Text(String),
    Raw(Vec<u8>),
}

impl WireString {
    /// Interpret a length-prefixed byte payload, preferring UTF-8 text.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => WireString::Text(text),
            Err(err) => WireString::Raw(err.into_bytes()),
        }
    }

    /// The bytes that go on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WireString::Text(s) => s.as_bytes(),
            WireString::Raw(b) => b,
        }
    }

    /// Text view, if the payload was valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireString::Text(s) => Some(s),
            WireString::Raw(_) => None,
        }
    }
}

impl From<&str> for WireString {
    fn from(s: &str) -> Self {
        WireString::Text(s.to_string())
    }
}

impl From<String> for WireString {
    fn from(s: String) -> Self {
        WireString::Text(s)
    }
}

/// Cursor over a byte slice with structured truncation errors.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `n` bytes or fail with `ShortRead`.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::ShortRead {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Unsigned big-endian base-128 varint.
    pub fn read_vlq(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for _ in 0..MAX_VLQ_BYTES {
            let byte = match self.take(1) {
                Ok(s) => s[0],
                Err(_) => return Err(ProtocolError::MalformedVarint),
            };
            // The next 7-bit group would shift set bits off the top.
            if value >> 57 != 0 {
                return Err(ProtocolError::MalformedVarint);
            }
            value = (value << 7) | u64::from(byte & 0x7f);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        // More continuation bytes than a u64 can carry.
        Err(ProtocolError::MalformedVarint)
    }

    /// Signed varint: `m = 2·|n| − (1 if n<0 else 0)` over the unsigned VLQ.
    pub fn read_signed_vlq(&mut self) -> Result<i64> {
        Ok(signed_from_vlq(self.read_vlq()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(i64::from_be_bytes(raw))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Raw 16-byte UUID, held hex-encoded in memory.
    pub fn read_uuid(&mut self) -> Result<String> {
        let raw = self.take(16)?;
        Ok(hex::encode(raw))
    }

    /// VLQ length prefix followed by raw bytes.
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_vlq()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Length-prefixed string, falling back to raw bytes on invalid UTF-8.
    pub fn read_string(&mut self) -> Result<WireString> {
        Ok(WireString::from_bytes(self.read_byte_array()?))
    }
}

/// Append-only encoder over a `BytesMut`.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn into_bytes(self) -> BytesMut {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Minimal unsigned big-endian base-128 varint.
    pub fn write_vlq(&mut self, mut v: u64) {
        let mut groups = [0u8; MAX_VLQ_BYTES];
        let mut idx = MAX_VLQ_BYTES - 1;
        groups[idx] = (v & 0x7f) as u8;
        v >>= 7;
        while v > 0 {
            idx -= 1;
            groups[idx] = ((v & 0x7f) as u8) | 0x80;
            v >>= 7;
        }
        self.buf.put_slice(&groups[idx..]);
    }

    pub fn write_signed_vlq(&mut self, n: i64) {
        // Wrapping keeps i64::MIN well-defined: 2·2^63 − 1 == u64::MAX.
        let m = if n < 0 {
            n.unsigned_abs().wrapping_mul(2).wrapping_sub(1)
        } else {
            2 * (n as u64)
        };
        self.write_vlq(m);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.put_u32(v.to_bits());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.put_u64(v.to_bits());
    }

    /// Hex-encoded UUID back to its raw 16 bytes. A malformed or short hex
    /// string encodes as the zero UUID rather than failing the build.
    pub fn write_uuid(&mut self, uuid_hex: &str) {
        let mut raw = [0u8; 16];
        if let Ok(decoded) = hex::decode(uuid_hex) {
            if decoded.len() == 16 {
                raw.copy_from_slice(&decoded);
            }
        }
        self.buf.put_slice(&raw);
    }

    pub fn write_byte_array(&mut self, bytes: &[u8]) {
        self.write_vlq(bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    pub fn write_string(&mut self, s: &WireString) {
        self.write_byte_array(s.as_bytes());
    }
}
