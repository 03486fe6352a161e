//! Opcode dispatch table.

use std::collections::HashMap;

use crate::decode::{combat, spell, update_object, world, DecodeContext, DecodeFn, Decoded};
use crate::error::MessageError;
use crate::opcodes::smsg;

/// A registered decoder.
#[derive(Debug, Clone, Copy)]
pub struct Handler {
    pub name: &'static str,
    pub decode: DecodeFn,
}

const DEFAULT_HANDLERS: &[(u16, &str, DecodeFn)] = &[
    (smsg::LOGIN_VERIFY_WORLD, "SMSG_LOGIN_VERIFY_WORLD", world::decode_world_entry),
    (smsg::NEW_WORLD, "SMSG_NEW_WORLD", world::decode_world_entry),
    (smsg::DESTROY_OBJECT, "SMSG_DESTROY_OBJECT", world::decode_destroy_object),
    (smsg::LOG_XPGAIN, "SMSG_LOG_XPGAIN", world::decode_xp_gain),
    (smsg::LEVELUP_INFO, "SMSG_LEVELUP_INFO", world::decode_level_up),
    (smsg::UPDATE_OBJECT, "SMSG_UPDATE_OBJECT", update_object::decode_update_object),
    (
        smsg::COMPRESSED_UPDATE_OBJECT,
        "SMSG_COMPRESSED_UPDATE_OBJECT",
        update_object::decode_compressed_update_object,
    ),
    (smsg::INITIAL_SPELLS, "SMSG_INITIAL_SPELLS", spell::decode_initial_spells),
    (smsg::LEARNED_SPELL, "SMSG_LEARNED_SPELL", spell::decode_learned_spell),
    (smsg::SPELL_START, "SMSG_SPELL_START", spell::decode_spell_start),
    (smsg::SPELL_GO, "SMSG_SPELL_GO", spell::decode_spell_go),
    (smsg::CAST_FAILED, "SMSG_CAST_FAILED", spell::decode_cast_failed),
    (smsg::SPELL_FAILURE, "SMSG_SPELL_FAILURE", spell::decode_spell_failure),
    (smsg::SPELL_FAILED_OTHER, "SMSG_SPELL_FAILED_OTHER", spell::decode_spell_failed_other),
    (smsg::SPELLLOGMISS, "SMSG_SPELLLOGMISS", spell::decode_spell_log_miss),
    (smsg::ATTACKERSTATEUPDATE, "SMSG_ATTACKERSTATEUPDATE", combat::decode_attacker_state),
    (smsg::ATTACKSTART, "SMSG_ATTACKSTART", combat::decode_attack_start),
    (smsg::ATTACKSTOP, "SMSG_ATTACKSTOP", combat::decode_attack_stop),
];

/// Outcome of routing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Decoded(Decoded),
    Failed(MessageError),
    Unhandled(u16),
}

/// Maps inbound opcodes to their decoders.
///
/// Built once and then shared read-only (`Arc<OpcodeTable>`); there is no
/// registration after startup.
#[derive(Debug, Clone, Default)]
pub struct OpcodeTable {
    handlers: HashMap<u16, Handler>,
}

impl OpcodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message the mirror understands.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for &(opcode, name, decode) in DEFAULT_HANDLERS {
            table.register(opcode, name, decode);
        }
        table
    }

    /// Register (or replace) the decoder for `opcode`.
    pub fn register(&mut self, opcode: u16, name: &'static str, decode: DecodeFn) -> &mut Self {
        self.handlers.insert(opcode, Handler { name, decode });
        self
    }

    pub fn get(&self, opcode: u16) -> Option<&Handler> {
        self.handlers.get(&opcode)
    }

    pub fn contains(&self, opcode: u16) -> bool {
        self.handlers.contains_key(&opcode)
    }

    pub fn name(&self, opcode: u16) -> Option<&'static str> {
        self.handlers.get(&opcode).map(|h| h.name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route one payload to its decoder.
    pub fn decode(&self, opcode: u16, payload: &[u8], ctx: &DecodeContext) -> Dispatch {
        let Some(handler) = self.handlers.get(&opcode) else {
            return Dispatch::Unhandled(opcode);
        };
        match (handler.decode)(payload, ctx) {
            Ok(decoded) => Dispatch::Decoded(decoded),
            Err(source) => Dispatch::Failed(MessageError {
                opcode,
                name: handler.name,
                source,
            }),
        }
    }
}
