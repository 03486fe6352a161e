//! Typed events decoded from server messages.
//!
//! Some of these have store side effects (spell start sets an active cast);
//! others are purely ephemeral ("spell missed", "xp gained") and exist only
//! as notifications.

use serde::{Deserialize, Serialize};

use crate::entity::ObjectType;
use crate::guid::Guid;
use crate::mutation::{SpellCooldown, WorldInfo};

// ---------------------------------------------------------------------------
// Spell sub-records
// ---------------------------------------------------------------------------

/// `TARGET_FLAG_*` bits of a spell target block.
pub mod target_flags {
    pub const UNIT: u16 = 0x0002;
    pub const ITEM: u16 = 0x0010;
    pub const SOURCE_LOCATION: u16 = 0x0020;
    pub const DEST_LOCATION: u16 = 0x0040;
    pub const TRADE_ITEM: u16 = 0x0100;
    pub const PVP_CORPSE: u16 = 0x0200;
    pub const OBJECT: u16 = 0x0800;
    pub const STRING: u16 = 0x2000;
    pub const CORPSE: u16 = 0x8000;
}

/// Target block of a spell start/go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellTargets {
    pub mask: u16,
    pub unit: Option<Guid>,
    pub item: Option<Guid>,
    pub source: Option<[f32; 3]>,
    pub destination: Option<[f32; 3]>,
    pub text: Option<String>,
}

/// Miss reason that carries an extra reflect-result byte.
pub const SPELL_MISS_REFLECT: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellMiss {
    pub target: Guid,
    pub reason: u8,
    /// Present only when `reason == SPELL_MISS_REFLECT`.
    pub reflect_result: Option<u8>,
}

// ---------------------------------------------------------------------------
// Combat sub-records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubDamage {
    pub school: u32,
    pub damage_float: f32,
    pub damage: u32,
    pub absorb: u32,
    pub resist: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackerState {
    pub hit_info: u32,
    pub attacker: Guid,
    pub target: Guid,
    pub total_damage: u32,
    pub sub_damage: Vec<SubDamage>,
    pub target_state: u32,
    pub spell_id: u32,
    pub blocked: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    Kill { base_xp: u32, group_bonus: f32 },
    Other,
}

// ---------------------------------------------------------------------------
// Update-object summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdateSummary {
    pub blocks: u32,
    pub created: Vec<(Guid, ObjectType)>,
    pub values_updated: Vec<Guid>,
    pub moved: Vec<Guid>,
    pub out_of_range: Vec<Guid>,
    pub near: Vec<Guid>,
    /// Set when a create block carried the SELF flag.
    pub local_player: Option<Guid>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    WorldEntered(WorldInfo),
    ObjectsUpdated(ObjectUpdateSummary),
    ObjectDestroyed {
        guid: Guid,
    },
    InitialSpells {
        spells: Vec<u32>,
        cooldowns: Vec<SpellCooldown>,
    },
    SpellLearned {
        spell_id: u32,
    },
    SpellStart {
        caster: Guid,
        caster_unit: Guid,
        spell_id: u32,
        flags: u16,
        cast_time_ms: u32,
        targets: SpellTargets,
    },
    SpellGo {
        caster: Guid,
        caster_unit: Guid,
        spell_id: u32,
        flags: u16,
        hits: Vec<Guid>,
        misses: Vec<SpellMiss>,
        targets: SpellTargets,
    },
    CastFailed {
        spell_id: u32,
        status: u8,
        reason: Option<u8>,
    },
    SpellFailure {
        caster: Guid,
        spell_id: u32,
        reason: Option<u8>,
    },
    SpellMissed {
        spell_id: u32,
        caster: Guid,
        misses: Vec<SpellMiss>,
    },
    AttackerStateUpdate(AttackerState),
    AttackStarted {
        attacker: Guid,
        victim: Guid,
    },
    AttackStopped {
        attacker: Guid,
        victim: Guid,
    },
    XpGained {
        victim: Option<Guid>,
        amount: u32,
        source: XpSource,
    },
    LevelUp {
        level: u32,
        health: u32,
        powers: [u32; 5],
        stats: [u32; 5],
    },
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WorldEntered(_) => "world_entered",
            Self::ObjectsUpdated(_) => "objects_updated",
            Self::ObjectDestroyed { .. } => "object_destroyed",
            Self::InitialSpells { .. } => "initial_spells",
            Self::SpellLearned { .. } => "spell_learned",
            Self::SpellStart { .. } => "spell_start",
            Self::SpellGo { .. } => "spell_go",
            Self::CastFailed { .. } => "cast_failed",
            Self::SpellFailure { .. } => "spell_failure",
            Self::SpellMissed { .. } => "spell_missed",
            Self::AttackerStateUpdate(_) => "attacker_state_update",
            Self::AttackStarted { .. } => "attack_started",
            Self::AttackStopped { .. } => "attack_stopped",
            Self::XpGained { .. } => "xp_gained",
            Self::LevelUp { .. } => "level_up",
        }
    }
}
