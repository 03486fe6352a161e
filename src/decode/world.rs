//! World entry, object destruction, and ephemeral progression messages.

use super::{DecodeContext, Decoded};
use crate::error::DecodeError;
use crate::events::{GameEvent, XpSource};
use crate::mutation::{FieldChange, PendingMutation, WorldInfo};
use crate::wire::Reader;

/// Map id + x/y/z.  Facing follows in the full 20-byte form.
pub const WORLD_ENTRY_MIN_LEN: usize = 16;
pub const DESTROY_OBJECT_LEN: usize = 8;
pub const LOG_XPGAIN_MIN_LEN: usize = 13;
pub const LEVELUP_INFO_LEN: usize = 48;

/// `SMSG_LOGIN_VERIFY_WORLD` / `SMSG_NEW_WORLD`.
pub fn decode_world_entry(payload: &[u8], ctx: &DecodeContext) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(WORLD_ENTRY_MIN_LEN)?;

    let map_id = r.u32()?;
    let x = r.f32()?;
    let y = r.f32()?;
    let z = r.f32()?;
    let facing = if r.remaining() >= 4 {
        Some(r.f32()?)
    } else {
        None
    };

    let info = WorldInfo {
        map_id,
        x,
        y,
        z,
        facing,
    };
    Ok(Decoded::event(GameEvent::WorldEntered(info))
        .with_mutation(PendingMutation::update_one(
            ctx.local_guid,
            FieldChange::WorldEntry(info),
        )))
}

/// `SMSG_DESTROY_OBJECT`: a single fixed-width guid.
pub fn decode_destroy_object(
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(DESTROY_OBJECT_LEN)?;
    let guid = r.guid()?;
    Ok(Decoded::event(GameEvent::ObjectDestroyed { guid })
        .with_mutation(PendingMutation::remove(guid)))
}

/// `SMSG_LOG_XPGAIN`.
pub fn decode_xp_gain(payload: &[u8], _ctx: &DecodeContext) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(LOG_XPGAIN_MIN_LEN)?;

    let victim = r.guid()?;
    let amount = r.u32()?;
    let kind = r.u8()?;
    let source = if kind == 0 {
        XpSource::Kill {
            base_xp: r.u32()?,
            group_bonus: r.f32()?,
        }
    } else {
        XpSource::Other
    };

    Ok(Decoded::event(GameEvent::XpGained {
        victim: (!victim.is_empty()).then_some(victim),
        amount,
        source,
    }))
}

/// `SMSG_LEVELUP_INFO`.
pub fn decode_level_up(payload: &[u8], _ctx: &DecodeContext) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(LEVELUP_INFO_LEN)?;

    let level = r.u32()?;
    let health = r.u32()?;
    let mut powers = [0u32; 5];
    for p in &mut powers {
        *p = r.u32()?;
    }
    let mut stats = [0u32; 5];
    for s in &mut stats {
        *s = r.u32()?;
    }

    Ok(Decoded::event(GameEvent::LevelUp {
        level,
        health,
        powers,
        stats,
    }))
}
