//! MirrorService integration tests

#[cfg(test)]
mod tests {
    use realm_sync::decode::update_object::update_type;
    use realm_sync::entity::{fields, ObjectType};
    use realm_sync::error::Diagnostic;
    use realm_sync::movement::update_flags;
    use realm_sync::opcodes::smsg;
    use realm_sync::wire::Writer;
    use realm_sync::{
        ApplyMode, FrameOutcome, GameEvent, Guid, MirrorConfig, MirrorService, Notification,
    };
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const ME: Guid = Guid::new(0x0000_0000_0000_0010);
    const MOB: Guid = Guid::new(0xF130_0000_0000_0055);

    fn make_service(mode: ApplyMode) -> MirrorService {
        MirrorService::with_config(MirrorConfig {
            apply_mode: mode,
            ..Default::default()
        })
    }

    fn create(guid: Guid, object_type: ObjectType, flags: u8) -> Vec<u8> {
        Writer::new()
            .u32(1)
            .u8(0)
            .u8(update_type::CREATE_OBJECT2)
            .packed_guid(guid)
            .u8(object_type.id())
            .u8(flags | update_flags::HAS_POSITION)
            .f32(1.0)
            .f32(2.0)
            .f32(3.0)
            .f32(0.0)
            .u8(1)
            .u32(1 << fields::OBJECT_FIELD_ENTRY)
            .u32(299)
            .finish()
    }

    fn spell_start(caster: Guid, spell_id: u32, cast_time_ms: u32) -> Vec<u8> {
        Writer::new()
            .packed_guid(caster)
            .packed_guid(caster)
            .u32(spell_id)
            .u16(0)
            .u32(cast_time_ms)
            .u16(0)
            .finish()
    }

    fn spell_go(caster: Guid, spell_id: u32) -> Vec<u8> {
        Writer::new()
            .packed_guid(caster)
            .packed_guid(caster)
            .u32(spell_id)
            .u16(0)
            .u8(0)
            .u8(0)
            .u16(0)
            .finish()
    }

    fn world_entry(len: usize) -> Vec<u8> {
        let full = Writer::new()
            .u32(0)
            .f32(-8949.95)
            .f32(-132.49)
            .f32(83.53)
            .f32(1.57)
            .finish();
        full[..len].to_vec()
    }

    fn logged_in() -> MirrorService {
        let svc = make_service(ApplyMode::Inline);
        svc.handle_frame(
            smsg::UPDATE_OBJECT,
            &create(ME, ObjectType::Player, update_flags::SELF),
        );
        svc
    }

    fn casting(svc: &MirrorService, guid: Guid) -> bool {
        svc.store()
            .get(guid)
            .and_then(|e| e.unit().map(|u| u.is_casting()))
            .unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // World entry
    // -----------------------------------------------------------------------

    #[test]
    fn world_entry_short_form() {
        let svc = make_service(ApplyMode::Inline);
        let outcome = svc.handle_frame(smsg::LOGIN_VERIFY_WORLD, &world_entry(16));
        assert!(matches!(outcome, FrameOutcome::Applied(_)));
        let world = svc.store().profile().world.unwrap();
        assert_eq!(world.map_id, 0);
        assert_eq!((world.x, world.y, world.z), (-8949.95, -132.49, 83.53));
        assert_eq!(world.facing, None);
    }

    #[test]
    fn world_entry_long_form_moves_local_player() {
        let svc = logged_in();
        svc.handle_frame(smsg::LOGIN_VERIFY_WORLD, &world_entry(20));
        assert_eq!(svc.store().profile().world.unwrap().facing, Some(1.57));
        let pos = svc.store().get(ME).unwrap().position().unwrap();
        assert_eq!(pos.x, -8949.95);
        assert_eq!(pos.orientation, 1.57);
    }

    #[test]
    fn world_entry_fifteen_bytes_is_discarded() {
        let svc = make_service(ApplyMode::Inline);
        let (_, rx) = svc.notifier().subscribe_channel();
        let outcome = svc.handle_frame(smsg::LOGIN_VERIFY_WORLD, &world_entry(15));
        let FrameOutcome::Failed(err) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(err.source.is_truncated());
        assert!(svc.store().profile().world.is_none());
        assert_eq!(svc.stats().decode_errors, 1);
        assert!(matches!(
            rx.try_recv().unwrap(),
            Notification::Diagnostic(Diagnostic::DecodeFailed(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Local player + casts
    // -----------------------------------------------------------------------

    #[test]
    fn self_create_records_local_player() {
        let svc = logged_in();
        assert_eq!(svc.local_player(), ME);
        assert_eq!(svc.decode_context().local_guid, ME);
        assert!(svc.store().contains(ME));
    }

    #[test]
    fn cast_failed_clears_local_cast() {
        let svc = logged_in();
        svc.handle_frame(smsg::SPELL_START, &spell_start(ME, 133, 1500));
        assert!(casting(&svc, ME));

        let outcome = svc.handle_frame(smsg::CAST_FAILED, &[133, 0, 0, 0, 2]);
        assert!(matches!(outcome, FrameOutcome::Applied(_)));
        assert!(!casting(&svc, ME));
    }

    #[test]
    fn spell_start_then_go_leaves_no_cast() {
        let svc = logged_in();
        svc.handle_frame(smsg::UPDATE_OBJECT, &create(MOB, ObjectType::Unit, 0));
        svc.handle_frame(smsg::SPELL_START, &spell_start(MOB, 133, 1500));
        assert!(casting(&svc, MOB));
        svc.handle_frame(smsg::SPELL_GO, &spell_go(MOB, 133));
        assert!(!casting(&svc, MOB));
    }

    #[test]
    fn lost_spell_go_is_cleared_by_tick() {
        let svc = logged_in();
        svc.handle_frame(smsg::UPDATE_OBJECT, &create(MOB, ObjectType::Unit, 0));
        svc.handle_frame(smsg::SPELL_START, &spell_start(MOB, 133, 1500));

        let report = svc.tick(Instant::now());
        assert_eq!(report.casts_expiring, 0);
        assert!(casting(&svc, MOB));

        let report = svc.tick(Instant::now() + Duration::from_secs(60));
        assert_eq!(report.casts_expiring, 1);
        assert_eq!(report.applied.casts_expired, 1);
        assert!(!casting(&svc, MOB));
        assert_eq!(svc.stats().casts_expired, 1);
    }

    fn auto_attacking(svc: &MirrorService, guid: Guid) -> bool {
        svc.store()
            .get(guid)
            .and_then(|e| e.unit().map(|u| u.auto_attacking))
            .unwrap_or(false)
    }

    #[test]
    fn local_melee_swing_toggles_auto_attack() {
        let svc = logged_in();
        svc.handle_frame(smsg::UPDATE_OBJECT, &create(MOB, ObjectType::Unit, 0));
        assert!(!auto_attacking(&svc, ME));

        let start = Writer::new().guid(ME).guid(MOB).finish();
        let outcome = svc.handle_frame(smsg::ATTACKSTART, &start);
        assert!(matches!(outcome, FrameOutcome::Applied(r) if r.updated == 1));
        assert!(auto_attacking(&svc, ME));

        let stop = Writer::new().packed_guid(ME).packed_guid(MOB).u32(0).finish();
        svc.handle_frame(smsg::ATTACKSTOP, &stop);
        assert!(!auto_attacking(&svc, ME));
    }

    #[test]
    fn other_units_swinging_leave_auto_attack_alone() {
        let svc = logged_in();
        svc.handle_frame(smsg::UPDATE_OBJECT, &create(MOB, ObjectType::Unit, 0));

        let start = Writer::new().guid(MOB).guid(ME).finish();
        let outcome = svc.handle_frame(smsg::ATTACKSTART, &start);
        assert!(matches!(outcome, FrameOutcome::Applied(r) if r.updated == 0));
        assert!(!auto_attacking(&svc, MOB));
        assert!(!auto_attacking(&svc, ME));
    }

    // -----------------------------------------------------------------------
    // Destroy + unknown opcodes
    // -----------------------------------------------------------------------

    #[test]
    fn destroy_object_removes_entity() {
        let svc = make_service(ApplyMode::Inline);
        let guid = Guid::new(0x0000_0001_0000_0042);
        svc.handle_frame(smsg::UPDATE_OBJECT, &create(guid, ObjectType::Player, 0));
        assert!(svc.store().contains(guid));

        let FrameOutcome::Applied(report) =
            svc.handle_frame(smsg::DESTROY_OBJECT, &guid.raw().to_le_bytes())
        else {
            panic!("expected applied");
        };
        assert_eq!(report.removed, 1);
        assert!(svc.store().get(guid).is_none());
    }

    #[test]
    fn unknown_opcode_reports_and_leaves_store_alone() {
        let svc = logged_in();
        let (_, rx) = svc.notifier().subscribe_channel();
        let before = svc.store().len();

        for _ in 0..2 {
            assert_eq!(
                svc.handle_frame(0x7FE, &[1, 2, 3]),
                FrameOutcome::Unhandled(0x7FE)
            );
        }

        assert_eq!(svc.store().len(), before);
        assert_eq!(svc.stats().unknown_opcodes, 2);
        let diagnostics: Vec<_> = rx
            .try_iter()
            .filter_map(|n| match n {
                Notification::Diagnostic(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(
            diagnostics,
            vec![
                Diagnostic::UnhandledOpcode {
                    opcode: 0x7FE,
                    len: 3
                };
                2
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    #[test]
    fn subscriber_panic_does_not_stop_delivery() {
        let svc = make_service(ApplyMode::Inline);
        svc.notifier().subscribe(|_| panic!("subscriber bug"));
        let (_, rx) = svc.notifier().subscribe_channel();

        svc.handle_frame(smsg::UPDATE_OBJECT, &create(MOB, ObjectType::Unit, 0));

        let names: Vec<_> = rx.try_iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["created", "objects_updated"]);
        assert_eq!(svc.stats().subscriber_panics, 2);
    }

    #[test]
    fn deferred_mode_applies_on_tick_in_order() {
        let svc = Arc::new(make_service(ApplyMode::Deferred));
        let (_, rx) = svc.notifier().subscribe_channel();

        assert_eq!(
            svc.handle_frame(smsg::UPDATE_OBJECT, &create(MOB, ObjectType::Unit, 0)),
            FrameOutcome::Queued
        );
        svc.handle_frame(smsg::DESTROY_OBJECT, &MOB.raw().to_le_bytes());
        assert!(svc.store().is_empty());
        assert!(rx.try_recv().is_err());

        let report = svc.tick(Instant::now());
        assert_eq!(report.applied.batches, 2);
        let names: Vec<_> = rx.try_iter().map(|n| n.name()).collect();
        assert_eq!(
            names,
            vec!["created", "objects_updated", "removed", "object_destroyed"]
        );
        assert!(svc.store().is_empty());
    }

    #[test]
    fn spells_before_player_create_land_in_profile() {
        let svc = make_service(ApplyMode::Inline);
        let initial = Writer::new()
            .u8(0)
            .u16(2)
            .u16(133)
            .u16(0)
            .u16(168)
            .u16(0)
            .u16(0)
            .finish();
        svc.handle_frame(smsg::INITIAL_SPELLS, &initial);
        svc.handle_frame(smsg::LEARNED_SPELL, &5143u32.to_le_bytes());
        svc.handle_frame(smsg::LEARNED_SPELL, &5143u32.to_le_bytes());

        let profile = svc.store().profile();
        assert_eq!(profile.known_spells, vec![133, 168, 5143]);
        assert_eq!(svc.stats().stale_mutations, 0);

        let Some(GameEvent::InitialSpells { spells, .. }) = initial_event(&svc, &initial) else {
            panic!("expected initial spells event");
        };
        assert_eq!(spells.len(), 2);
    }

    fn initial_event(svc: &MirrorService, payload: &[u8]) -> Option<GameEvent> {
        let (_, rx) = svc.notifier().subscribe_channel();
        svc.handle_frame(smsg::INITIAL_SPELLS, payload);
        rx.try_iter().find_map(|n| match n {
            Notification::Event(e) => Some(e),
            _ => None,
        })
    }
}
