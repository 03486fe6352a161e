//! Bounds-checked little-endian reader and writer over message payloads.
//!
//! Every decoder goes through [`Reader`].  A read that would run past the
//! end of the payload returns [`DecodeError::Truncated`] and leaves the
//! cursor where it was, so callers never observe a half-read field.

use crate::error::DecodeError;
use crate::guid::{self, Guid};

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail with `Truncated` unless at least `n` bytes remain.
    pub fn require(&self, n: usize) -> Result<(), DecodeError> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(DecodeError::Truncated {
                offset: self.buf.len(),
                needed: n - remaining,
            });
        }
        Ok(())
    }

    /// Fail with `Truncated` unless the whole payload is at least `min` bytes.
    pub fn expect_min_len(&self, min: usize) -> Result<(), DecodeError> {
        if self.buf.len() < min {
            return Err(DecodeError::Truncated {
                offset: self.buf.len(),
                needed: min - self.buf.len(),
            });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.require(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    pub fn f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take()?))
    }

    /// A fixed-width (8 byte) identifier.
    pub fn guid(&mut self) -> Result<Guid, DecodeError> {
        Ok(Guid::new(self.u64()?))
    }

    pub fn packed_guid(&mut self) -> Result<Guid, DecodeError> {
        let (guid, used) = guid::decode_packed(&self.buf[self.pos..]).map_err(|e| match e {
            DecodeError::Truncated { needed, .. } => DecodeError::Truncated {
                offset: self.buf.len(),
                needed,
            },
            other => other,
        })?;
        self.pos += used;
        Ok(guid)
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.require(n)?;
        let buf = self.buf;
        let out = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read `n` bytes and throw them away.
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.bytes(n).map(|_| ())
    }

    /// A NUL-terminated string.  The terminator is consumed.
    pub fn cstring(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let buf = self.buf;
        let rest = &buf[start..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(DecodeError::Truncated {
                offset: self.buf.len(),
                needed: 1,
            });
        };
        let text = std::str::from_utf8(&rest[..nul]).map_err(|e| DecodeError::MalformedField {
            field: "string",
            offset: start,
            detail: e.to_string(),
        })?;
        self.pos += nul + 1;
        Ok(text.to_owned())
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let buf = self.buf;
        let out = &buf[self.pos..];
        self.pos = buf.len();
        out
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Little-endian payload builder used for outbound commands and fixtures.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn guid(self, g: Guid) -> Self {
        self.u64(g.raw())
    }

    pub fn packed_guid(mut self, g: Guid) -> Self {
        guid::write_packed(&mut self.buf, g);
        self
    }

    pub fn cstring(mut self, s: &str) -> Self {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        self
    }

    pub fn bytes(mut self, b: &[u8]) -> Self {
        self.buf.extend_from_slice(b);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
