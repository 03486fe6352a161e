//! Melee combat messages.

use super::{DecodeContext, Decoded};
use crate::error::DecodeError;
use crate::events::{AttackerState, GameEvent, SubDamage};
use crate::mutation::{FieldChange, PendingMutation};
use crate::wire::Reader;

/// Hit info, two one-byte packed guids, total damage, zero sub-damage
/// count, then target state, reserved, spell id, and blocked.
pub const ATTACKERSTATEUPDATE_MIN_LEN: usize = 27;
pub const ATTACKSTART_LEN: usize = 16;
pub const ATTACKSTOP_MIN_LEN: usize = 6;

const SUB_DAMAGE_LEN: usize = 20;

/// `SMSG_ATTACKERSTATEUPDATE`: one melee swing outcome.
pub fn decode_attacker_state(
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(ATTACKERSTATEUPDATE_MIN_LEN)?;

    let hit_info = r.u32()?;
    let attacker = r.packed_guid()?;
    let target = r.packed_guid()?;
    let total_damage = r.u32()?;

    let count = usize::from(r.u8()?);
    r.require(count * SUB_DAMAGE_LEN)?;
    let mut sub_damage = Vec::with_capacity(count);
    for _ in 0..count {
        sub_damage.push(SubDamage {
            school: r.u32()?,
            damage_float: r.f32()?,
            damage: r.u32()?,
            absorb: r.u32()?,
            resist: r.i32()?,
        });
    }

    let target_state = r.u32()?;
    let _reserved = r.u32()?;
    let spell_id = r.u32()?;
    let blocked = r.u32()?;

    Ok(Decoded::event(GameEvent::AttackerStateUpdate(AttackerState {
        hit_info,
        attacker,
        target,
        total_damage,
        sub_damage,
        target_state,
        spell_id,
        blocked,
    })))
}

/// `SMSG_ATTACKSTART`: only the local player's own swing state is mirrored.
pub fn decode_attack_start(
    payload: &[u8],
    ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(ATTACKSTART_LEN)?;

    let attacker = r.guid()?;
    let victim = r.guid()?;

    let decoded = Decoded::event(GameEvent::AttackStarted { attacker, victim });
    if !ctx.is_local(attacker) {
        return Ok(decoded);
    }
    Ok(decoded.with_mutation(PendingMutation::update_one(
        attacker,
        FieldChange::AutoAttacking(true),
    )))
}

/// `SMSG_ATTACKSTOP`.
pub fn decode_attack_stop(payload: &[u8], ctx: &DecodeContext) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(ATTACKSTOP_MIN_LEN)?;

    let attacker = r.packed_guid()?;
    let victim = r.packed_guid()?;
    let _reserved = r.u32()?;

    let decoded = Decoded::event(GameEvent::AttackStopped { attacker, victim });
    if !ctx.is_local(attacker) {
        return Ok(decoded);
    }
    Ok(decoded.with_mutation(PendingMutation::update_one(
        attacker,
        FieldChange::AutoAttacking(false),
    )))
}
