//! Update-object messages: entity creation, field updates, movement, and
//! visibility changes, in plain and zlib-compressed form.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::{DecodeContext, Decoded};
use crate::entity::{Entity, ObjectType};
use crate::error::DecodeError;
use crate::events::{GameEvent, ObjectUpdateSummary};
use crate::guid::Guid;
use crate::movement::{
    move_flags, spline_flags, update_flags, JumpInfo, LivingMovement, MovementBlock,
    MovementSpeeds, SplineFacing, SplinePath, TransportInfo,
};
use crate::mutation::{FieldChange, PendingMutation};
use crate::types::Position;
use crate::wire::Reader;

pub const UPDATE_OBJECT_MIN_LEN: usize = 5;
pub const COMPRESSED_UPDATE_OBJECT_MIN_LEN: usize = 4;
/// Largest inflated body accepted from a compressed update.
pub const MAX_INFLATED_LEN: u32 = 4 * 1024 * 1024;

/// `UPDATETYPE_*` block discriminants.
pub mod update_type {
    pub const VALUES: u8 = 0;
    pub const MOVEMENT: u8 = 1;
    pub const CREATE_OBJECT: u8 = 2;
    pub const CREATE_OBJECT2: u8 = 3;
    pub const OUT_OF_RANGE_OBJECTS: u8 = 4;
    pub const NEAR_OBJECTS: u8 = 5;
}

/// `SMSG_UPDATE_OBJECT`.
pub fn decode_update_object(
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(UPDATE_OBJECT_MIN_LEN)?;

    let block_count = r.u32()?;
    let _has_transport = r.u8()?;

    let mut summary = ObjectUpdateSummary {
        blocks: block_count,
        ..ObjectUpdateSummary::default()
    };
    let mut mutations = Vec::new();

    for _ in 0..block_count {
        read_block(&mut r, &mut summary, &mut mutations)?;
    }

    log::trace!(
        "update object: {} block(s), {} mutation(s)",
        block_count,
        mutations.len()
    );
    Ok(Decoded::event(GameEvent::ObjectsUpdated(summary)).with_mutations(mutations))
}

/// `SMSG_COMPRESSED_UPDATE_OBJECT`: inflated size followed by a zlib stream.
pub fn decode_compressed_update_object(
    payload: &[u8],
    ctx: &DecodeContext,
) -> Result<Decoded, DecodeError> {
    let mut r = Reader::new(payload);
    r.expect_min_len(COMPRESSED_UPDATE_OBJECT_MIN_LEN)?;

    let declared = r.u32()?;
    if declared > MAX_INFLATED_LEN {
        return Err(DecodeError::MalformedField {
            field: "inflated size",
            offset: 0,
            detail: format!("declared {declared} byte(s), limit is {MAX_INFLATED_LEN}"),
        });
    }
    let stream_offset = r.position();
    let compressed = r.rest();

    // Read one byte past the declared size so an oversized stream is caught
    // without inflating all of it.
    let mut inflated = Vec::new();
    ZlibDecoder::new(compressed)
        .take(u64::from(declared) + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| DecodeError::MalformedField {
            field: "zlib stream",
            offset: stream_offset,
            detail: e.to_string(),
        })?;

    if inflated.len() != declared as usize {
        let detail = if inflated.len() > declared as usize {
            format!("stream inflates past the declared {declared} byte(s)")
        } else {
            format!("declared {declared} byte(s), inflated {}", inflated.len())
        };
        return Err(DecodeError::MalformedField {
            field: "inflated size",
            offset: 0,
            detail,
        });
    }

    decode_update_object(&inflated, ctx)
}

fn read_block(
    r: &mut Reader<'_>,
    summary: &mut ObjectUpdateSummary,
    mutations: &mut Vec<PendingMutation>,
) -> Result<(), DecodeError> {
    let offset = r.position();
    match r.u8()? {
        update_type::VALUES => {
            let guid = r.packed_guid()?;
            let changes = read_values(r)?
                .into_iter()
                .map(|(index, value)| FieldChange::Value { index, value })
                .collect();
            summary.values_updated.push(guid);
            mutations.push(PendingMutation::update(guid, changes));
        }
        update_type::MOVEMENT => {
            let guid = r.guid()?;
            let movement = read_movement(r)?;
            summary.moved.push(guid);
            mutations.push(PendingMutation::update_one(
                guid,
                FieldChange::Movement(movement),
            ));
        }
        update_type::CREATE_OBJECT | update_type::CREATE_OBJECT2 => {
            let guid = r.packed_guid()?;
            let type_offset = r.position();
            let type_id = r.u8()?;
            let object_type =
                ObjectType::from_id(type_id).ok_or(DecodeError::UnknownVariant {
                    what: "object type",
                    value: u32::from(type_id),
                    offset: type_offset,
                })?;
            let movement = read_movement(r)?;
            let values = read_values(r)?;

            let mut entity = Entity::new(guid, object_type);
            entity.apply_movement(&movement);
            for (index, value) in values {
                entity.apply_value(index, value);
            }

            if movement.is_self() {
                summary.local_player = Some(guid);
            }
            summary.created.push((guid, object_type));
            mutations.push(PendingMutation::create(entity));
        }
        update_type::OUT_OF_RANGE_OBJECTS => {
            for guid in read_guid_list(r)? {
                summary.out_of_range.push(guid);
                mutations.push(PendingMutation::remove(guid));
            }
        }
        update_type::NEAR_OBJECTS => {
            summary.near.extend(read_guid_list(r)?);
        }
        other => {
            return Err(DecodeError::UnknownVariant {
                what: "update type",
                value: u32::from(other),
                offset,
            })
        }
    }
    Ok(())
}

fn read_guid_list(r: &mut Reader<'_>) -> Result<Vec<Guid>, DecodeError> {
    let count = r.u32()? as usize;
    // Every packed guid takes at least its mask byte.
    r.require(count)?;
    let mut guids = Vec::with_capacity(count);
    for _ in 0..count {
        guids.push(r.packed_guid()?);
    }
    Ok(guids)
}

/// Values block: mask words, then one u32 per set bit in ascending order.
pub fn read_values(r: &mut Reader<'_>) -> Result<Vec<(u16, u32)>, DecodeError> {
    let mask_count = usize::from(r.u8()?);
    r.require(mask_count * 4)?;
    let mut masks = Vec::with_capacity(mask_count);
    for _ in 0..mask_count {
        masks.push(r.u32()?);
    }

    let set_bits: usize = masks.iter().map(|m| m.count_ones() as usize).sum();
    r.require(set_bits * 4)?;

    let mut values = Vec::with_capacity(set_bits);
    for (block, mask) in masks.iter().enumerate() {
        for bit in 0..32u16 {
            if mask & (1 << bit) != 0 {
                // At most 255 mask words, so the index fits in u16.
                let index = block as u16 * 32 + bit;
                values.push((index, r.u32()?));
            }
        }
    }
    Ok(values)
}

fn read_position(r: &mut Reader<'_>) -> Result<Position, DecodeError> {
    Ok(Position::new(r.f32()?, r.f32()?, r.f32()?, r.f32()?))
}

/// Movement block of a create or movement update.
pub fn read_movement(r: &mut Reader<'_>) -> Result<MovementBlock, DecodeError> {
    let flags = r.u8()?;
    let mut block = MovementBlock {
        update_flags: flags,
        ..MovementBlock::default()
    };

    if flags & update_flags::LIVING != 0 {
        block.living = Some(read_living(r)?);
    } else if flags & update_flags::HAS_POSITION != 0 {
        block.position = Some(read_position(r)?);
    }

    if flags & update_flags::HIGHGUID != 0 {
        block.high_guid = Some(r.u32()?);
    }
    if flags & update_flags::ALL != 0 {
        block.all = Some(r.u32()?);
    }
    if flags & update_flags::MELEE_ATTACKING != 0 {
        block.attacking = Some(r.packed_guid()?);
    }
    if flags & update_flags::TRANSPORT != 0 {
        block.transport_time = Some(r.u32()?);
    }
    Ok(block)
}

fn read_living(r: &mut Reader<'_>) -> Result<LivingMovement, DecodeError> {
    let flags = r.u32()?;
    let time = r.u32()?;
    let position = read_position(r)?;

    let transport = if flags & move_flags::ONTRANSPORT != 0 {
        Some(TransportInfo {
            guid: r.guid()?,
            offset: read_position(r)?,
        })
    } else {
        None
    };
    let pitch = if flags & move_flags::SWIMMING != 0 {
        Some(r.f32()?)
    } else {
        None
    };
    let fall_time = r.u32()?;
    let jump = if flags & move_flags::JUMPING != 0 {
        Some(JumpInfo {
            velocity: r.f32()?,
            sin_angle: r.f32()?,
            cos_angle: r.f32()?,
            xy_speed: r.f32()?,
        })
    } else {
        None
    };
    let spline_elevation = if flags & move_flags::SPLINE_ELEVATION != 0 {
        Some(r.f32()?)
    } else {
        None
    };
    let speeds = MovementSpeeds {
        walk: r.f32()?,
        run: r.f32()?,
        run_back: r.f32()?,
        swim: r.f32()?,
        swim_back: r.f32()?,
        turn_rate: r.f32()?,
    };
    let spline = if flags & move_flags::SPLINE_ENABLED != 0 {
        Some(read_spline(r)?)
    } else {
        None
    };

    Ok(LivingMovement {
        flags,
        time,
        position,
        transport,
        pitch,
        fall_time,
        jump,
        spline_elevation,
        speeds,
        spline,
    })
}

fn read_spline(r: &mut Reader<'_>) -> Result<SplinePath, DecodeError> {
    let flags = r.u32()?;
    let facing = if flags & spline_flags::FINAL_POINT != 0 {
        SplineFacing::Point {
            x: r.f32()?,
            y: r.f32()?,
            z: r.f32()?,
        }
    } else if flags & spline_flags::FINAL_TARGET != 0 {
        SplineFacing::Target(r.guid()?)
    } else if flags & spline_flags::FINAL_ANGLE != 0 {
        SplineFacing::Angle(r.f32()?)
    } else {
        SplineFacing::None
    };
    let time_passed = r.u32()?;
    let duration = r.u32()?;
    let id = r.u32()?;

    let node_count = r.u32()? as usize;
    r.require(node_count.saturating_mul(12))?;
    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        nodes.push([r.f32()?, r.f32()?, r.f32()?]);
    }
    let destination = [r.f32()?, r.f32()?, r.f32()?];

    Ok(SplinePath {
        flags,
        facing,
        time_passed,
        duration,
        id,
        nodes,
        destination,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    use super::*;
    use crate::entity::{fields, EntityKind};
    use crate::mutation::MutationOp;
    use crate::wire::Writer;

    const MOB: Guid = Guid::new(0xF130_0000_0000_0099);
    const ME: Guid = Guid::new(0x0000_0000_0000_0010);

    /// Values block with the given (index, value) pairs, indices ascending.
    fn values(w: Writer, pairs: &[(u16, u32)]) -> Writer {
        let max = pairs.iter().map(|(i, _)| *i).max().unwrap_or(0);
        let blocks = usize::from(max / 32) + 1;
        let mut masks = vec![0u32; blocks];
        for (i, _) in pairs {
            masks[usize::from(i / 32)] |= 1 << (i % 32);
        }
        let mut w = w.u8(blocks as u8);
        for m in masks {
            w = w.u32(m);
        }
        for (_, v) in pairs {
            w = w.u32(*v);
        }
        w
    }

    fn living(w: Writer, flags: u8, movement: u32, x: f32) -> Writer {
        w.u8(flags | update_flags::LIVING)
            .u32(movement)
            .u32(1000)
            .f32(x)
            .f32(2.0)
            .f32(3.0)
            .f32(0.5)
            .u32(0)
            .f32(2.5)
            .f32(7.0)
            .f32(4.5)
            .f32(4.72)
            .f32(2.5)
            .f32(3.14)
    }

    fn create_unit_payload() -> Vec<u8> {
        let w = Writer::new().u32(1).u8(0).u8(2).packed_guid(MOB).u8(3);
        let w = living(w, update_flags::HIGHGUID, 0, 1.0).u32(0xF130);
        values(
            w,
            &[
                (fields::OBJECT_FIELD_ENTRY, 299),
                (fields::UNIT_FIELD_HEALTH, 42),
                (fields::UNIT_FIELD_MAXHEALTH, 50),
            ],
        )
        .finish()
    }

    #[test]
    fn create_block_builds_typed_entity() {
        let decoded = decode_update_object(&create_unit_payload(), &DecodeContext::default())
            .unwrap();
        assert_eq!(decoded.mutations.len(), 1);
        let MutationOp::Create(entity) = &decoded.mutations[0].op else {
            panic!("expected create");
        };
        assert_eq!(entity.guid, MOB);
        assert_eq!(entity.object.entry, 299);
        assert_eq!(entity.object.run_speed, Some(7.0));
        assert_eq!(entity.position().unwrap().x, 1.0);
        let EntityKind::Unit(unit) = &entity.kind else {
            panic!("expected unit");
        };
        assert_eq!(unit.health, 42);
        assert_eq!(unit.max_health, 50);

        let Some(GameEvent::ObjectsUpdated(summary)) = decoded.event else {
            panic!("expected summary");
        };
        assert_eq!(summary.created, vec![(MOB, ObjectType::Unit)]);
        assert_eq!(summary.local_player, None);
    }

    #[test]
    fn self_flag_identifies_local_player() {
        let w = Writer::new().u32(1).u8(0).u8(3).packed_guid(ME).u8(4);
        let w = living(w, update_flags::SELF | update_flags::ALL, 0, 5.0).u32(1);
        let payload = values(w, &[(fields::UNIT_FIELD_LEVEL, 12)]).finish();

        let decoded = decode_update_object(&payload, &DecodeContext::default()).unwrap();
        let Some(GameEvent::ObjectsUpdated(summary)) = decoded.event else {
            panic!("expected summary");
        };
        assert_eq!(summary.local_player, Some(ME));
    }

    #[test]
    fn living_optional_fields_follow_flags() {
        let flags = move_flags::ONTRANSPORT
            | move_flags::SWIMMING
            | move_flags::JUMPING
            | move_flags::SPLINE_ELEVATION
            | move_flags::SPLINE_ENABLED;
        let payload = Writer::new()
            .u8(update_flags::LIVING | update_flags::MELEE_ATTACKING)
            .u32(flags)
            .u32(1000)
            .f32(1.0)
            .f32(2.0)
            .f32(3.0)
            .f32(0.0)
            // transport
            .u64(0x1FC0_0000_0000_0001)
            .f32(0.1)
            .f32(0.2)
            .f32(0.3)
            .f32(0.0)
            // pitch
            .f32(0.25)
            .u32(40)
            // jump
            .f32(1.0)
            .f32(0.0)
            .f32(1.0)
            .f32(3.0)
            // spline elevation
            .f32(9.0)
            .f32(2.5)
            .f32(7.0)
            .f32(4.5)
            .f32(4.72)
            .f32(2.5)
            .f32(3.14)
            // spline
            .u32(spline_flags::FINAL_ANGLE)
            .f32(1.5)
            .u32(100)
            .u32(2000)
            .u32(77)
            .u32(2)
            .f32(1.0)
            .f32(1.0)
            .f32(1.0)
            .f32(2.0)
            .f32(2.0)
            .f32(2.0)
            .f32(3.0)
            .f32(3.0)
            .f32(3.0)
            // attacking
            .packed_guid(MOB)
            .finish();

        let mut r = Reader::new(&payload);
        let block = read_movement(&mut r).unwrap();
        assert!(r.is_empty());

        let living = block.living.unwrap();
        assert_eq!(living.transport.unwrap().guid.raw(), 0x1FC0_0000_0000_0001);
        assert_eq!(living.pitch, Some(0.25));
        assert_eq!(living.fall_time, 40);
        assert_eq!(living.jump.unwrap().xy_speed, 3.0);
        assert_eq!(living.spline_elevation, Some(9.0));
        let spline = living.spline.unwrap();
        assert_eq!(spline.facing, SplineFacing::Angle(1.5));
        assert_eq!(spline.nodes.len(), 2);
        assert_eq!(spline.destination, [3.0, 3.0, 3.0]);
        assert_eq!(block.attacking, Some(MOB));
    }

    #[test]
    fn values_and_out_of_range_blocks() {
        let w = Writer::new().u32(2).u8(0).u8(0).packed_guid(MOB);
        let w = values(w, &[(fields::UNIT_FIELD_HEALTH, 10)]);
        let payload = w.u8(4).u32(2).packed_guid(ME).packed_guid(MOB).finish();

        let decoded = decode_update_object(&payload, &DecodeContext::default()).unwrap();
        assert_eq!(decoded.mutations.len(), 3);
        assert_eq!(
            decoded.mutations[0],
            PendingMutation::update(
                MOB,
                vec![FieldChange::Value {
                    index: fields::UNIT_FIELD_HEALTH,
                    value: 10
                }]
            )
        );
        assert_eq!(decoded.mutations[1], PendingMutation::remove(ME));
        assert_eq!(decoded.mutations[2], PendingMutation::remove(MOB));
    }

    #[test]
    fn near_objects_is_event_only() {
        let payload = Writer::new()
            .u32(1)
            .u8(0)
            .u8(5)
            .u32(1)
            .packed_guid(MOB)
            .finish();
        let decoded = decode_update_object(&payload, &DecodeContext::default()).unwrap();
        assert!(decoded.mutations.is_empty());
        let Some(GameEvent::ObjectsUpdated(summary)) = decoded.event else {
            panic!("expected summary");
        };
        assert_eq!(summary.near, vec![MOB]);
    }

    #[test]
    fn unknown_object_type_rejects_whole_message() {
        let payload = Writer::new()
            .u32(1)
            .u8(0)
            .u8(2)
            .packed_guid(MOB)
            .u8(9)
            .finish();
        let err = decode_update_object(&payload, &DecodeContext::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnknownVariant {
                what: "object type",
                value: 9,
                ..
            }
        ));
    }

    #[test]
    fn unknown_update_type_is_rejected() {
        let payload = Writer::new().u32(1).u8(0).u8(6).finish();
        let err = decode_update_object(&payload, &DecodeContext::default()).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownVariant { value: 6, .. }));
    }

    #[test]
    fn second_block_truncated_drops_first_block_too() {
        let mut payload = create_unit_payload();
        payload[0] = 2;
        payload.extend_from_slice(&[0, 0x01]);
        let result = decode_update_object(&payload, &DecodeContext::default());
        assert!(result.unwrap_err().is_truncated());
    }

    #[test]
    fn compressed_matches_plain() {
        let plain = create_unit_payload();
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&plain).unwrap();
        let compressed = enc.finish().unwrap();
        let payload = Writer::new()
            .u32(plain.len() as u32)
            .bytes(&compressed)
            .finish();

        let ctx = DecodeContext::default();
        assert_eq!(
            decode_compressed_update_object(&payload, &ctx).unwrap(),
            decode_update_object(&plain, &ctx).unwrap()
        );
    }

    #[test]
    fn oversized_declared_length_is_rejected_before_inflating() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&create_unit_payload()).unwrap();
        let payload = Writer::new()
            .u32(MAX_INFLATED_LEN + 1)
            .bytes(&enc.finish().unwrap())
            .finish();
        let err = decode_compressed_update_object(&payload, &DecodeContext::default())
            .unwrap_err();
        assert_eq!(err.offset(), 0);
        assert!(matches!(
            err,
            DecodeError::MalformedField {
                field: "inflated size",
                ..
            }
        ));
    }

    #[test]
    fn compressed_size_mismatch_is_malformed() {
        let plain = create_unit_payload();
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&plain).unwrap();
        let payload = Writer::new()
            .u32(plain.len() as u32 + 3)
            .bytes(&enc.finish().unwrap())
            .finish();
        let err = decode_compressed_update_object(&payload, &DecodeContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MalformedField {
                field: "inflated size",
                ..
            }
        ));
    }

    #[test]
    fn garbage_stream_is_malformed() {
        let payload = Writer::new().u32(10).bytes(&[1, 2, 3, 4]).finish();
        let err = decode_compressed_update_object(&payload, &DecodeContext::default())
            .unwrap_err();
        assert!(matches!(err, DecodeError::MalformedField { .. }));
    }
}
