//! Wire framing and outbound commands.
//!
//! ## Framing (plaintext, 1.12)
//!
//! | Direction        | Header                              | `size` counts          |
//! |------------------|-------------------------------------|------------------------|
//! | server → client  | `u16 BE size`, `u16 LE opcode`      | opcode + payload       |
//! | client → server  | `u16 BE size`, `u32 LE opcode`      | opcode + payload       |
//!
//! Header encryption belongs to the session layer and is not handled here;
//! frames reaching this crate are already in the clear.
//!
//! ## Outbound commands
//!
//! | Command        | Opcode | Payload          |
//! |----------------|--------|------------------|
//! | `GameObjUse`   | 0x0B1  | u64 object guid  |
//! | `AttackSwing`  | 0x141  | u64 target guid  |
//! | `AttackStop`   | 0x142  | *(empty)*        |
//! | `Loot`         | 0x15D  | u64 source guid  |
//! | `LootRelease`  | 0x15F  | u64 source guid  |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guid::Guid;
use crate::opcodes::cmsg;
use crate::wire::Writer;

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

pub const SERVER_HEADER_LEN: usize = 4;
pub const CLIENT_HEADER_LEN: usize = 6;

/// Largest value the 16-bit size field can carry.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error while reading frame: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame size {size} is smaller than its {min}-byte opcode")]
    TooShort { size: u16, min: usize },
    #[error("payload of {len} bytes does not fit a 16-bit frame size")]
    TooLarge { len: usize },
    #[error("stream ended inside a frame ({missing} byte(s) missing)")]
    UnexpectedEof { missing: usize },
}

/// Decode a server frame header into `(opcode, payload_len)`.
pub fn parse_server_header(header: [u8; SERVER_HEADER_LEN]) -> Result<(u16, usize), FrameError> {
    let size = u16::from_be_bytes([header[0], header[1]]);
    if usize::from(size) < 2 {
        return Err(FrameError::TooShort { size, min: 2 });
    }
    let opcode = u16::from_le_bytes([header[2], header[3]]);
    Ok((opcode, usize::from(size) - 2))
}

/// Build a server → client frame (captures, fixtures, proxies).
pub fn encode_server_frame(opcode: u16, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let size = frame_size(2, payload.len())?;
    let mut out = Vec::with_capacity(SERVER_HEADER_LEN + payload.len());
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(&opcode.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Build a client → server frame.
pub fn encode_client_frame(opcode: u32, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let size = frame_size(4, payload.len())?;
    let mut out = Vec::with_capacity(CLIENT_HEADER_LEN + payload.len());
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(&opcode.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

fn frame_size(opcode_len: usize, payload_len: usize) -> Result<u16, FrameError> {
    u16::try_from(opcode_len + payload_len).map_err(|_| FrameError::TooLarge { len: payload_len })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// The client → server requests this crate knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "target", rename_all = "snake_case")]
pub enum Command {
    GameObjUse(Guid),
    AttackSwing(Guid),
    AttackStop,
    Loot(Guid),
    LootRelease(Guid),
}

impl Command {
    pub fn opcode(&self) -> u32 {
        match self {
            Self::GameObjUse(_) => cmsg::GAMEOBJ_USE,
            Self::AttackSwing(_) => cmsg::ATTACKSWING,
            Self::AttackStop => cmsg::ATTACKSTOP,
            Self::Loot(_) => cmsg::LOOT,
            Self::LootRelease(_) => cmsg::LOOT_RELEASE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GameObjUse(_) => "CMSG_GAMEOBJ_USE",
            Self::AttackSwing(_) => "CMSG_ATTACKSWING",
            Self::AttackStop => "CMSG_ATTACKSTOP",
            Self::Loot(_) => "CMSG_LOOT",
            Self::LootRelease(_) => "CMSG_LOOT_RELEASE",
        }
    }

    /// `(opcode, payload)` ready for [`OutboundSender::send`].
    ///
    /// [`OutboundSender::send`]: crate::connection::OutboundSender::send
    pub fn encode(&self) -> (u32, Vec<u8>) {
        let payload = match *self {
            Self::GameObjUse(guid)
            | Self::AttackSwing(guid)
            | Self::Loot(guid)
            | Self::LootRelease(guid) => Writer::with_capacity(8).guid(guid).finish(),
            Self::AttackStop => Vec::new(),
        };
        (self.opcode(), payload)
    }
}
