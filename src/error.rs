//! Decode errors and the diagnostic taxonomy.
//!
//! Every error here is message-local.  Nothing in this module is ever
//! promoted to a connection-level failure; the service reports it through
//! the notifier and moves on to the next frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guid::Guid;

/// Why a single message payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated at byte {offset}: {needed} more byte(s) required")]
    Truncated { offset: usize, needed: usize },

    #[error("malformed {field} at byte {offset}: {detail}")]
    MalformedField {
        field: &'static str,
        offset: usize,
        detail: String,
    },

    #[error("unknown {what} {value:#x} at byte {offset}")]
    UnknownVariant {
        what: &'static str,
        value: u32,
        offset: usize,
    },
}

impl DecodeError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::Truncated { .. } => DiagnosticKind::Truncated,
            Self::MalformedField { .. } => DiagnosticKind::MalformedField,
            Self::UnknownVariant { .. } => DiagnosticKind::UnknownVariant,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::Truncated { offset, .. }
            | Self::MalformedField { offset, .. }
            | Self::UnknownVariant { offset, .. } => *offset,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

/// A [`DecodeError`] tagged with the message it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name} ({opcode:#05x}): {source}")]
pub struct MessageError {
    pub opcode: u16,
    pub name: &'static str,
    #[source]
    pub source: DecodeError,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Truncated,
    MalformedField,
    UnknownVariant,
    UnknownOpcode,
    StaleMutation,
    IncompatibleMutation,
    SubscriberPanic,
}

/// A non-fatal problem surfaced to subscribers for observability.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A known message failed to decode and was discarded.
    DecodeFailed(MessageError),
    /// No decoder is registered for this opcode.
    UnhandledOpcode { opcode: u16, len: usize },
    /// An update targeted an identifier the store does not hold.
    StaleMutation { target: Guid },
    /// An update carried a change the target's variant cannot hold.
    IncompatibleMutation { target: Guid, change: &'static str },
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::DecodeFailed(e) => e.source.kind(),
            Self::UnhandledOpcode { .. } => DiagnosticKind::UnknownOpcode,
            Self::StaleMutation { .. } => DiagnosticKind::StaleMutation,
            Self::IncompatibleMutation { .. } => DiagnosticKind::IncompatibleMutation,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DecodeFailed(e) => write!(f, "decode failed: {e}"),
            Self::UnhandledOpcode { opcode, len } => {
                write!(f, "unhandled opcode {opcode:#05x} ({len} bytes)")
            }
            Self::StaleMutation { target } => write!(f, "stale mutation for {target}"),
            Self::IncompatibleMutation { target, change } => {
                write!(f, "{change} does not apply to {target}")
            }
        }
    }
}
