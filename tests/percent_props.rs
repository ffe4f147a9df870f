use proptest::prelude::*;
use towerstat::percent::{self, Accumulation};

proptest! {
    #[test]
    fn multiply_by_unity_is_identity(x in -1_000_000_i64..1_000_000) {
        prop_assert_eq!(percent::multiply([percent::UNITY, x]), x);
        prop_assert_eq!(percent::multiply([Some(x), None]), x);
    }

    #[test]
    fn sum_ignores_unity_operands(x in -10_000_i64..10_000, n in 0_usize..5) {
        let mut values = vec![x];
        values.extend(std::iter::repeat(percent::UNITY).take(n));
        prop_assert_eq!(percent::sum(values), x);
    }

    #[test]
    fn accumulate_stays_within_bounds(cuts in prop::collection::vec(0_i64..=100, 0..6)) {
        let total = percent::accumulate(cuts.iter().copied());
        prop_assert!((0..=100).contains(&total));
        let largest = cuts.iter().copied().max().unwrap_or(0);
        prop_assert!(total >= largest);
    }

    #[test]
    fn divide_inverts_multiply_for_unity_ratio(x in -1_000_000_i64..1_000_000) {
        prop_assert_eq!(percent::divide(x, percent::UNITY), Some(x));
    }

    #[test]
    fn accumulation_never_exceeds_one_tick_per_cycle_plus_one(
        attack_speed in 0_i64..120,
        interval in 1_i64..240,
        time in 0_i64..10_000,
    ) {
        let ticks = Accumulation { attack_speed, interval, time }.calculate();
        prop_assert!(ticks >= time / interval);
        prop_assert!(ticks <= time / interval + 1);
    }
}
