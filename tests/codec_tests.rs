//! Packed-guid codec properties

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use realm_sync::guid::{decode_packed, encode_packed, write_packed, Guid, MAX_PACKED_LEN};
    use realm_sync::wire::{Reader, Writer};
    use realm_sync::DecodeError;

    proptest! {
        #[test]
        fn packed_round_trip(raw in any::<u64>()) {
            let guid = Guid::new(raw);
            let packed = encode_packed(guid);
            let (decoded, used) = decode_packed(packed.as_bytes()).unwrap();
            prop_assert_eq!(decoded, guid);
            prop_assert_eq!(used, packed.len());
        }

        #[test]
        fn packed_form_is_minimal(raw in any::<u64>()) {
            let packed = encode_packed(Guid::new(raw));
            let nonzero = raw.to_le_bytes().iter().filter(|b| **b != 0).count();
            prop_assert_eq!(packed.len(), 1 + nonzero);
            prop_assert!(packed.as_bytes()[1..].iter().all(|b| *b != 0));
            prop_assert!(packed.len() <= MAX_PACKED_LEN);
        }

        #[test]
        fn trailing_bytes_are_left_alone(raw in any::<u64>(), tail in proptest::collection::vec(any::<u8>(), 0..8)) {
            let mut buf = Vec::new();
            write_packed(&mut buf, Guid::new(raw));
            let packed_len = buf.len();
            buf.extend_from_slice(&tail);
            let (decoded, used) = decode_packed(&buf).unwrap();
            prop_assert_eq!(decoded.raw(), raw);
            prop_assert_eq!(used, packed_len);
        }

        #[test]
        fn every_short_prefix_is_truncated(raw in any::<u64>()) {
            let packed = encode_packed(Guid::new(raw));
            for cut in 0..packed.len() {
                let err = decode_packed(&packed.as_bytes()[..cut]).unwrap_err();
                prop_assert!(err.is_truncated());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Edge cases
    // -----------------------------------------------------------------------

    #[test]
    fn edge_values() {
        assert_eq!(encode_packed(Guid::EMPTY).as_bytes(), &[0x00]);
        assert_eq!(encode_packed(Guid::new(u64::MAX)).len(), 9);
        assert_eq!(
            encode_packed(Guid::new(0xF130_0000_0000_0042)).as_bytes(),
            &[0b1100_0001, 0x42, 0x30, 0xF1]
        );
    }

    #[test]
    fn mask_claims_more_than_present() {
        assert_eq!(
            decode_packed(&[0xFF, 1, 2, 3]),
            Err(DecodeError::Truncated {
                offset: 4,
                needed: 5
            })
        );
    }

    #[test]
    fn reader_and_writer_agree_on_packed_guids() {
        let guids = [
            Guid::EMPTY,
            Guid::new(1),
            Guid::new(0x0000_0001_0000_0042),
            Guid::new(0xF110_0000_0000_0007),
        ];
        let buf = guids
            .iter()
            .fold(Writer::new(), |w, g| w.packed_guid(*g))
            .finish();
        let mut r = Reader::new(&buf);
        for g in guids {
            assert_eq!(r.packed_guid().unwrap(), g);
        }
        assert!(r.is_empty());
    }
}
