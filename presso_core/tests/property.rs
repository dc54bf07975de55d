//! Property tests for the segment and profile compilers.

use presso_core::{
    ActuatorConstants, Profile, ProfilePoint, SegmentOutcome, compile, compile_segment,
};
use proptest::prelude::*;

fn pressure() -> impl Strategy<Value = f64> {
    3.0f64..=9.5
}

fn constants() -> impl Strategy<Value = ActuatorConstants> {
    (1u32..=65_536, 0.1f64..=10.0).prop_map(|(s, b)| ActuatorConstants::new(s, b))
}

proptest! {
    #[test]
    fn step_sign_follows_pressure_change(
        t1 in 0.0f64..100.0,
        len in 1.0f64..60.0,
        p1 in pressure(),
        p2 in pressure(),
        k in constants(),
    ) {
        let out = compile_segment(t1, p1, t1 + len, p2, &k);
        if let SegmentOutcome::Command(c) = out {
            if p2 > p1 {
                prop_assert!(c.s >= 0);
            } else if p2 < p1 {
                prop_assert!(c.s <= 0);
            } else {
                prop_assert_eq!(c.s, 0);
            }
            prop_assert_eq!(c.t, t1.trunc() as i64);
        }
    }

    #[test]
    fn compiling_is_deterministic(
        t1 in 0.0f64..100.0,
        t2 in 0.0f64..100.0,
        p1 in pressure(),
        p2 in pressure(),
        k in constants(),
    ) {
        prop_assert_eq!(
            compile_segment(t1, p1, t2, p2, &k),
            compile_segment(t1, p1, t2, p2, &k)
        );
    }

    #[test]
    fn arbitrary_inputs_never_panic(
        t1 in any::<f64>(),
        p1 in any::<f64>(),
        t2 in any::<f64>(),
        p2 in any::<f64>(),
        spr in any::<u32>(),
        bpr in any::<f64>(),
    ) {
        let _ = compile_segment(t1, p1, t2, p2, &ActuatorConstants::new(spr, bpr));
    }

    #[test]
    fn sequence_never_longer_than_segments(
        times in prop::collection::vec(0.0f64..120.0, 0..30),
        k in constants(),
    ) {
        let mut times = times;
        times.sort_by(f64::total_cmp);
        times.dedup();
        let points: Vec<ProfilePoint> =
            times.iter().map(|&t| ProfilePoint::new(t, 6.0)).collect();
        let n = points.len();
        let profile = Profile::from_points(points).unwrap();
        let seq = compile(&profile, &k);
        prop_assert!(seq.len() <= n.saturating_sub(1));
        // start times are non-decreasing
        prop_assert!(seq.commands().windows(2).all(|w| w[0].t <= w[1].t));
    }

    #[test]
    fn whole_profile_wire_is_reproducible(
        raw in prop::collection::vec((0.0f64..120.0, pressure()), 0..20),
        k in constants(),
    ) {
        let points: Vec<ProfilePoint> =
            raw.iter().map(|&(t, p)| ProfilePoint::new(t, p)).collect();
        let Ok(profile) = Profile::from_unsorted(points) else {
            return Ok(());
        };
        let first = compile(&profile, &k);
        let second = compile(&profile, &k);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.to_wire().unwrap(), second.to_wire().unwrap());
    }
}
