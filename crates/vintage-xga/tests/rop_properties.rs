use proptest::prelude::*;
use vintage_xga::rop::{compare_passes, mix};

proptest! {
    #[test]
    fn every_mix_code_is_total(code in any::<u8>(), s in any::<u32>(), d in any::<u32>()) {
        let out = mix(code, s, d);
        // Only the low five bits select the function.
        prop_assert_eq!(out, mix(code & 0x1f, s, d));
        if (0x16..=0x1f).contains(&(code & 0x1f)) {
            prop_assert_eq!(out, d);
        }
    }

    #[test]
    fn arithmetic_mixes_stay_between_operands(s in 0u32..=0xff, d in 0u32..=0xff) {
        prop_assert_eq!(mix(0x10, s, d), s.max(d));
        prop_assert_eq!(mix(0x11, s, d), s.min(d));
        prop_assert!(mix(0x12, s, d) <= 0xff);
        let avg = mix(0x15, s, d);
        prop_assert!(avg >= s.min(d) && avg <= s.max(d));
    }

    #[test]
    fn compare_conditions_match_their_relations(dest in 0u32..4, cmp in 0u32..4) {
        prop_assert!(!compare_passes(0, dest, cmp));
        prop_assert_eq!(compare_passes(1, dest, cmp), dest > cmp);
        prop_assert_eq!(compare_passes(2, dest, cmp), dest == cmp);
        prop_assert_eq!(compare_passes(3, dest, cmp), dest < cmp);
        prop_assert!(compare_passes(4, dest, cmp));
        prop_assert_eq!(compare_passes(5, dest, cmp), dest >= cmp);
        prop_assert_eq!(compare_passes(6, dest, cmp), dest != cmp);
        prop_assert_eq!(compare_passes(7, dest, cmp), dest <= cmp);
    }
}

#[test]
fn subtracting_mixes_clamp_at_zero() {
    assert_eq!(mix(0x13, 0x30, 0x10), 0);
    assert_eq!(mix(0x13, 0x10, 0x30), 0x20);
    assert_eq!(mix(0x14, 0x10, 0x30), 0);
    assert_eq!(mix(0x14, 0x30, 0x10), 0x20);
    assert_eq!(mix(0x12, 0xf0, 0x20), 0xff);
}
