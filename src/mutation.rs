//! Pending mutations produced by decoders and consumed by the entity store.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::entity::Entity;
use crate::events::GameEvent;
use crate::guid::Guid;
use crate::movement::MovementBlock;
use crate::types::Position;

/// One cooldown entry from the initial spell list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellCooldown {
    pub spell_id: u32,
    pub item_id: u32,
    pub category: u32,
    pub cooldown_ms: u32,
    pub category_cooldown_ms: u32,
}

/// Map + position announced on world entry or teleport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldInfo {
    pub map_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Absent in the short 16-byte form.
    pub facing: Option<f32>,
}

impl WorldInfo {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z, self.facing.unwrap_or(0.0))
    }
}

/// A single change inside an `Update`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    /// Raw update-field write.
    Value { index: u16, value: u32 },
    Movement(MovementBlock),
    SetActiveCast { spell_id: u32, cast_time_ms: u32 },
    ClearActiveCast,
    /// Clear the active cast only if it is still this exact cast.
    ExpireCast { spell_id: u32, started_at: Instant },
    AutoAttacking(bool),

    // Local profile changes: applied whether or not the entity exists.
    KnownSpells(Vec<u32>),
    LearnSpell(u32),
    SpellCooldowns(Vec<SpellCooldown>),
    WorldEntry(WorldInfo),
}

impl FieldChange {
    /// Changes that target the session's local profile instead of an entity.
    pub fn is_profile(&self) -> bool {
        matches!(
            self,
            Self::KnownSpells(_)
                | Self::LearnSpell(_)
                | Self::SpellCooldowns(_)
                | Self::WorldEntry(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Value { .. } => "value",
            Self::Movement(_) => "movement",
            Self::SetActiveCast { .. } => "set_active_cast",
            Self::ClearActiveCast => "clear_active_cast",
            Self::ExpireCast { .. } => "expire_cast",
            Self::AutoAttacking(_) => "auto_attacking",
            Self::KnownSpells(_) => "known_spells",
            Self::LearnSpell(_) => "learn_spell",
            Self::SpellCooldowns(_) => "spell_cooldowns",
            Self::WorldEntry(_) => "world_entry",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Replace whatever lives at the target with this entity.
    Create(Box<Entity>),
    Update(Vec<FieldChange>),
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub target: Guid,
    pub op: MutationOp,
}

impl PendingMutation {
    pub fn create(entity: Entity) -> Self {
        Self {
            target: entity.guid,
            op: MutationOp::Create(Box::new(entity)),
        }
    }

    pub fn update(target: Guid, changes: Vec<FieldChange>) -> Self {
        Self {
            target,
            op: MutationOp::Update(changes),
        }
    }

    pub fn update_one(target: Guid, change: FieldChange) -> Self {
        Self::update(target, vec![change])
    }

    pub fn remove(target: Guid) -> Self {
        Self {
            target,
            op: MutationOp::Remove,
        }
    }
}

/// Everything decoded from one frame: its mutations, applied atomically, and
/// the event published once they are visible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationBatch {
    pub mutations: Vec<PendingMutation>,
    pub event: Option<GameEvent>,
}

impl MutationBatch {
    pub fn new(mutations: Vec<PendingMutation>) -> Self {
        Self {
            mutations,
            event: None,
        }
    }

    pub fn single(mutation: PendingMutation) -> Self {
        Self::new(vec![mutation])
    }

    pub fn with_event(mut self, event: GameEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// No mutations and no event: nothing to apply or publish.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.event.is_none()
    }
}

impl From<Vec<PendingMutation>> for MutationBatch {
    fn from(mutations: Vec<PendingMutation>) -> Self {
        Self::new(mutations)
    }
}
