//! Entity identifiers and the packed-GUID codec.
//!
//! ## Packed form
//!
//! ```text
//! [mask: u8][byte_i for every bit i set in mask, i ascending]
//! ```
//!
//! Bit *i* of the mask says whether little-endian byte *i* of the 64-bit
//! value is on the wire.  Omitted bytes are zero, so `0` packs to the single
//! byte `0x00` and `u64::MAX` packs to nine bytes.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Maximum encoded size of a packed GUID (mask + 8 bytes).
pub const MAX_PACKED_LEN: usize = 9;

// ---------------------------------------------------------------------------
// Guid
// ---------------------------------------------------------------------------

/// A 64-bit server object identifier.
///
/// The upper 32 bits carry the type tag ("high guid"), the lower 32 bits a
/// per-type counter.  Equality and hashing are by raw value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Guid(u64);

impl Guid {
    pub const EMPTY: Guid = Guid(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Build from the low/high u32 pair used by update fields.
    pub const fn from_parts(low: u32, high: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn low(self) -> u32 {
        self.0 as u32
    }

    pub const fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn high_guid(self) -> HighGuid {
        HighGuid::from_tag((self.0 >> 48) as u16)
    }

    pub fn with_low(self, low: u32) -> Self {
        Self::from_parts(low, self.high())
    }

    pub fn with_high(self, high: u32) -> Self {
        Self::from_parts(self.low(), high)
    }
}

impl From<u64> for Guid {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Classification of the top 16 bits of a [`Guid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighGuid {
    Player,
    Item,
    DynamicObject,
    Corpse,
    GameObject,
    Transport,
    Unit,
    Pet,
    MoTransport,
    Unknown(u16),
}

impl HighGuid {
    pub fn from_tag(tag: u16) -> Self {
        match tag {
            0x0000 => Self::Player,
            0x4000 => Self::Item,
            0xF100 => Self::DynamicObject,
            0xF101 => Self::Corpse,
            0xF110 => Self::GameObject,
            0xF120 => Self::Transport,
            0xF130 => Self::Unit,
            0xF140 => Self::Pet,
            0x1FC0 => Self::MoTransport,
            other => Self::Unknown(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Packed codec
// ---------------------------------------------------------------------------

/// A packed GUID held on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedGuid {
    buf: [u8; MAX_PACKED_LEN],
    len: usize,
}

impl PackedGuid {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn mask(&self) -> u8 {
        self.buf[0]
    }
}

impl AsRef<[u8]> for PackedGuid {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encode `guid` in its minimal packed form.
pub fn encode_packed(guid: Guid) -> PackedGuid {
    let mut buf = [0u8; MAX_PACKED_LEN];
    let mut len = 1;
    let mut mask = 0u8;

    for (i, byte) in guid.raw().to_le_bytes().into_iter().enumerate() {
        if byte != 0 {
            mask |= 1 << i;
            buf[len] = byte;
            len += 1;
        }
    }

    buf[0] = mask;
    PackedGuid { buf, len }
}

/// Append the packed form of `guid` to `out`.
pub fn write_packed(out: &mut Vec<u8>, guid: Guid) {
    out.extend_from_slice(encode_packed(guid).as_bytes());
}

/// Decode a packed GUID from the front of `input`.
///
/// Returns the identifier and the number of bytes consumed.  Offsets in the
/// returned error are relative to `input`.
pub fn decode_packed(input: &[u8]) -> Result<(Guid, usize), DecodeError> {
    let Some(&mask) = input.first() else {
        return Err(DecodeError::Truncated {
            offset: 0,
            needed: 1,
        });
    };

    let total = 1 + mask.count_ones() as usize;
    if input.len() < total {
        return Err(DecodeError::Truncated {
            offset: input.len(),
            needed: total - input.len(),
        });
    }

    let mut bytes = [0u8; 8];
    let mut cursor = 1;
    for (i, slot) in bytes.iter_mut().enumerate() {
        if mask & (1 << i) != 0 {
            *slot = input[cursor];
            cursor += 1;
        }
    }

    Ok((Guid::new(u64::from_le_bytes(bytes)), total))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_packs_to_bare_mask() {
        let packed = encode_packed(Guid::EMPTY);
        assert_eq!(packed.as_bytes(), &[0x00]);
        assert_eq!(decode_packed(&[0x00]).unwrap(), (Guid::EMPTY, 1));
    }

    #[test]
    fn sparse_guid_skips_zero_bytes() {
        let guid = Guid::new(0xF130_0000_0000_0042);
        let packed = encode_packed(guid);
        // bytes 0, 6, 7 present
        assert_eq!(packed.as_bytes(), &[0b1100_0001, 0x42, 0x30, 0xF1]);
        assert_eq!(decode_packed(packed.as_bytes()).unwrap(), (guid, 4));
    }

    #[test]
    fn max_value_uses_all_nine_bytes() {
        let packed = encode_packed(Guid::new(u64::MAX));
        assert_eq!(packed.len(), MAX_PACKED_LEN);
        assert_eq!(packed.mask(), 0xFF);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let (guid, used) = decode_packed(&[0x01, 0x07, 0xAA, 0xBB]).unwrap();
        assert_eq!(guid.raw(), 7);
        assert_eq!(used, 2);
    }

    #[test]
    fn truncated_input_reports_missing_bytes() {
        assert_eq!(
            decode_packed(&[]),
            Err(DecodeError::Truncated {
                offset: 0,
                needed: 1
            })
        );
        assert_eq!(
            decode_packed(&[0x03, 0x01]),
            Err(DecodeError::Truncated {
                offset: 2,
                needed: 1
            })
        );
    }

    #[test]
    fn high_guid_classification() {
        assert_eq!(Guid::new(0xF130_0000_0000_0001).high_guid(), HighGuid::Unit);
        assert_eq!(Guid::new(0x0000_0000_0000_0001).high_guid(), HighGuid::Player);
        assert_eq!(Guid::new(0x4000_0000_0000_0001).high_guid(), HighGuid::Item);
        assert_eq!(
            Guid::new(0xABCD_0000_0000_0000).high_guid(),
            HighGuid::Unknown(0xABCD)
        );
    }

    #[test]
    fn parts_round_trip() {
        let g = Guid::from_parts(0x42, 0x1);
        assert_eq!(g.raw(), 0x0000_0001_0000_0042);
        assert_eq!(g.low(), 0x42);
        assert_eq!(g.high(), 0x1);
        assert_eq!(g.with_low(7).raw(), 0x0000_0001_0000_0007);
    }
}
