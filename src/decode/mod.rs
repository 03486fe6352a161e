//! Message decoders.
//!
//! Every decoder is a pure function over one complete message payload:
//!
//! ```text
//! fn(&[u8], &DecodeContext) -> Result<Decoded, DecodeError>
//! ```
//!
//! Decoders never write the entity store; they only describe mutations.
//! A decoder either returns everything the message implies or an error.
//! There is no partial result, so a truncated message never leaves half of
//! its mutations behind.

pub mod combat;
pub mod spell;
pub mod update_object;
pub mod world;

use crate::error::DecodeError;
use crate::events::GameEvent;
use crate::guid::Guid;
use crate::mutation::{MutationBatch, PendingMutation};

/// Session facts a decoder may need but cannot derive from its payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeContext {
    /// The locally controlled player, or `Guid::EMPTY` before login.
    pub local_guid: Guid,
}

impl DecodeContext {
    pub fn new(local_guid: Guid) -> Self {
        Self { local_guid }
    }

    pub fn is_local(&self, guid: Guid) -> bool {
        !self.local_guid.is_empty() && guid == self.local_guid
    }
}

/// Output of a successful decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub event: Option<GameEvent>,
    pub mutations: Vec<PendingMutation>,
}

impl Decoded {
    pub fn event(event: GameEvent) -> Self {
        Self {
            event: Some(event),
            mutations: Vec::new(),
        }
    }

    pub fn with_mutation(mut self, mutation: PendingMutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn with_mutations(mut self, mutations: impl IntoIterator<Item = PendingMutation>) -> Self {
        self.mutations.extend(mutations);
        self
    }
}

impl From<Decoded> for MutationBatch {
    fn from(decoded: Decoded) -> Self {
        Self {
            mutations: decoded.mutations,
            event: decoded.event,
        }
    }
}

pub type DecodeFn = fn(&[u8], &DecodeContext) -> Result<Decoded, DecodeError>;
