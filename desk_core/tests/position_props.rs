use desk_core::{Calibration, DeskError, height_to_percentage, percentage_to_height};
use proptest::prelude::*;
use rstest::rstest;

proptest! {
    #[test]
    fn percentage_round_trips_within_one_point(
        base in 0.0f64..2000.0,
        span in 100.0f64..3000.0,
        pct in 0u8..=100,
    ) {
        let cal = Calibration::new(base, base + span).unwrap();
        let back = height_to_percentage(percentage_to_height(pct, &cal), &cal);
        prop_assert!((i16::from(back) - i16::from(pct)).abs() <= 1, "pct {} -> {}", pct, back);
    }

    #[test]
    fn any_height_maps_into_range(height in proptest::num::f64::ANY) {
        let cal = Calibration::new(620.0, 1270.0).unwrap();
        prop_assert!(cal.height_to_percentage(height) <= 100);
    }

    #[test]
    fn mapping_is_monotonic(a in 500.0f64..1400.0, b in 500.0f64..1400.0) {
        let cal = Calibration::new(620.0, 1270.0).unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(cal.height_to_percentage(lo) <= cal.height_to_percentage(hi));
    }
}

#[rstest]
#[case(620.0, 0)]
#[case(650.0, 5)]
#[case(945.0, 50)]
#[case(1270.0, 100)]
#[case(400.0, 0)]
#[case(1500.0, 100)]
fn office_desk_table(#[case] height: f64, #[case] pct: u8) {
    let cal = Calibration::new(620.0, 1270.0).unwrap();
    assert_eq!(cal.height_to_percentage(height), pct);
}

#[rstest]
#[case(700.0, 700.0)]
#[case(800.0, 700.0)]
#[case(f64::NEG_INFINITY, 700.0)]
fn invalid_bounds_are_rejected(#[case] base: f64, #[case] max: f64) {
    let err = Calibration::new(base, max).unwrap_err();
    assert!(matches!(err, DeskError::CalibrationInvalid { .. }));
}
