//! Spellcasting messages: spell book, cast lifecycle, and miss logs.

use super::{DecodeContext, Decoded};
use crate::error::DecodeError;
use crate::events::{target_flags, GameEvent, SpellMiss, SpellTargets, SPELL_MISS_REFLECT};
use crate::mutation::{FieldChange, PendingMutation, SpellCooldown};
use crate::wire::Reader;

pub const INITIAL_SPELLS_MIN_LEN: usize = 5;
pub const LEARNED_SPELL_LEN: usize = 4;
/// Two one-byte packed guids, spell, flags, cast time, target mask.
pub const SPELL_START_MIN_LEN: usize = 14;
/// Two one-byte packed guids, spell, flags, hit count, miss count, target mask.
pub const SPELL_GO_MIN_LEN: usize = 12;
pub const CAST_FAILED_MIN_LEN: usize = 5;
pub const SPELL_FAILURE_MIN_LEN: usize = 5;
pub const SPELLLOGMISS_MIN_LEN: usize = 17;

const SPELL_ENTRY_LEN: usize = 4;
const COOLDOWN_ENTRY_LEN: usize = 14;
const LOGMISS_ENTRY_LEN: usize = 9;

/// Guard a wire-supplied element count against the bytes actually left.
fn require_entries(r: &Reader<'_>, count: usize, entry_len: usize) -> Result<(), DecodeError> {
    r.require(count.saturating_mul(entry_len))
}

/// Read the optional-field target block that ends spell start/go.
pub fn read_targets(r: &mut Reader<'_>) -> Result<SpellTargets, DecodeError> {
    const UNIT_LIKE: u32 = target_flags::UNIT as u32
        | target_flags::PVP_CORPSE as u32
        | target_flags::OBJECT as u32
        | target_flags::CORPSE as u32
        | 0x10000;
    const ITEM_LIKE: u16 = target_flags::ITEM | target_flags::TRADE_ITEM;

    let mask = r.u16()?;
    let mut targets = SpellTargets {
        mask,
        ..SpellTargets::default()
    };

    if u32::from(mask) & UNIT_LIKE != 0 {
        targets.unit = Some(r.packed_guid()?);
    }
    if mask & ITEM_LIKE != 0 {
        targets.item = Some(r.packed_guid()?);
    }
    if mask & target_flags::SOURCE_LOCATION != 0 {
        targets.source = Some([r.f32()?, r.f32()?, r.f32()?]);
    }
    if mask & target_flags::DEST_LOCATION != 0 {
        targets.destination = Some([r.f32()?, r.f32()?, r.f32()?]);
    }
    if mask & target_flags::STRING != 0 {
        targets.text = Some(r.cstring()?);
    }
    Ok(targets)
}

/// `SMSG_INITIAL_SPELLS`: the full spell book and cooldown list.
pub fn decode_initial_spells(
    payload: &[u8],
    ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(INITIAL_SPELLS_MIN_LEN)?;

    let _reserved = r.u8()?;
    let count = usize::from(r.u16()?);
    require_entries(&r, count, SPELL_ENTRY_LEN)?;
    let mut spells = Vec::with_capacity(count);
    for _ in 0..count {
        let spell = r.u16()?;
        let _slot = r.u16()?;
        spells.push(u32::from(spell));
    }

    let cooldown_count = usize::from(r.u16()?);
    require_entries(&r, cooldown_count, COOLDOWN_ENTRY_LEN)?;
    let mut cooldowns = Vec::with_capacity(cooldown_count);
    for _ in 0..cooldown_count {
        cooldowns.push(SpellCooldown {
            spell_id: u32::from(r.u16()?),
            item_id: u32::from(r.u16()?),
            category: u32::from(r.u16()?),
            cooldown_ms: r.u32()?,
            category_cooldown_ms: r.u32()?,
        });
    }

    let changes = vec![
        FieldChange::KnownSpells(spells.clone()),
        FieldChange::SpellCooldowns(cooldowns.clone()),
    ];
    Ok(
        Decoded::event(GameEvent::InitialSpells { spells, cooldowns })
            .with_mutation(PendingMutation::update(ctx.local_guid, changes)),
    )
}

/// `SMSG_LEARNED_SPELL`.
pub fn decode_learned_spell(
    payload: &[u8],
    ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(LEARNED_SPELL_LEN)?;
    let spell_id = r.u32()?;
    Ok(Decoded::event(GameEvent::SpellLearned { spell_id }).with_mutation(
        PendingMutation::update_one(ctx.local_guid, FieldChange::LearnSpell(spell_id)),
    ))
}

/// `SMSG_SPELL_START`: marks the caster unit as casting.
pub fn decode_spell_start(
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(SPELL_START_MIN_LEN)?;

    let caster = r.packed_guid()?;
    let caster_unit = r.packed_guid()?;
    let spell_id = r.u32()?;
    let flags = r.u16()?;
    let cast_time_ms = r.u32()?;
    let targets = read_targets(&mut r)?;

    let cast = FieldChange::SetActiveCast {
        spell_id,
        cast_time_ms,
    };
    Ok(Decoded::event(GameEvent::SpellStart {
        caster,
        caster_unit,
        spell_id,
        flags,
        cast_time_ms,
        targets,
    })
    .with_mutation(PendingMutation::update_one(caster_unit, cast)))
}

/// `SMSG_SPELL_GO`: the cast completed; hit and miss lists follow.
pub fn decode_spell_go(payload: &[u8], _ctx: &DecodeContext) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(SPELL_GO_MIN_LEN)?;

    let caster = r.packed_guid()?;
    let caster_unit = r.packed_guid()?;
    let spell_id = r.u32()?;
    let flags = r.u16()?;

    let hit_count = usize::from(r.u8()?);
    require_entries(&r, hit_count, 8)?;
    let mut hits = Vec::with_capacity(hit_count);
    for _ in 0..hit_count {
        hits.push(r.guid()?);
    }

    let miss_count = usize::from(r.u8()?);
    require_entries(&r, miss_count, 9)?;
    let mut misses = Vec::with_capacity(miss_count);
    for _ in 0..miss_count {
        let target = r.guid()?;
        let reason = r.u8()?;
        let reflect_result = if reason == SPELL_MISS_REFLECT {
            Some(r.u8()?)
        } else {
            None
        };
        misses.push(SpellMiss {
            target,
            reason,
            reflect_result,
        });
    }

    let targets = read_targets(&mut r)?;

    Ok(Decoded::event(GameEvent::SpellGo {
        caster,
        caster_unit,
        spell_id,
        flags,
        hits,
        misses,
        targets,
    })
    .with_mutation(PendingMutation::update_one(
        caster_unit,
        FieldChange::ClearActiveCast,
    )))
}

/// `SMSG_CAST_FAILED`: always about the local player's own cast.
pub fn decode_cast_failed(payload: &[u8], ctx: &DecodeContext) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(CAST_FAILED_MIN_LEN)?;

    let spell_id = r.u32()?;
    let status = r.u8()?;
    // Status 0 ends the message; otherwise the server may still omit the reason.
    let reason = if status != 0 && !r.is_empty() {
        Some(r.u8()?)
    } else {
        None
    };

    let decoded = Decoded::event(GameEvent::CastFailed {
        spell_id,
        status,
        reason,
    });
    if ctx.local_guid.is_empty() {
        return Ok(decoded);
    }
    Ok(decoded.with_mutation(PendingMutation::update_one(
        ctx.local_guid,
        FieldChange::ClearActiveCast,
    )))
}

/// `SMSG_SPELL_FAILURE`: broadcast interruption with an optional reason.
pub fn decode_spell_failure(
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(SPELL_FAILURE_MIN_LEN)?;

    let caster = r.packed_guid()?;
    let spell_id = r.u32()?;
    let reason = if r.is_empty() { None } else { Some(r.u8()?) };

    Ok(Decoded::event(GameEvent::SpellFailure {
        caster,
        spell_id,
        reason,
    })
    .with_mutation(PendingMutation::update_one(
        caster,
        FieldChange::ClearActiveCast,
    )))
}

/// `SMSG_SPELL_FAILED_OTHER`: same effect as a failure, never a reason.
pub fn decode_spell_failed_other(
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(SPELL_FAILURE_MIN_LEN)?;

    let caster = r.packed_guid()?;
    let spell_id = r.u32()?;

    Ok(Decoded::event(GameEvent::SpellFailure {
        caster,
        spell_id,
        reason: None,
    })
    .with_mutation(PendingMutation::update_one(
        caster,
        FieldChange::ClearActiveCast,
    )))
}

/// `SMSG_SPELLLOGMISS`: ephemeral, no store effect.
pub fn decode_spell_log_miss(
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(SPELLLOGMISS_MIN_LEN)?;

    let spell_id = r.u32()?;
    let caster = r.guid()?;
    let _reserved = r.u8()?;
    let count = r.u32()? as usize;
    require_entries(&r, count, LOGMISS_ENTRY_LEN)?;

    let mut misses = Vec::with_capacity(count);
    for _ in 0..count {
        misses.push(SpellMiss {
            target: r.guid()?,
            reason: r.u8()?,
            reflect_result: None,
        });
    }

    Ok(Decoded::event(GameEvent::SpellMissed {
        spell_id,
        caster,
        misses,
    }))
}
