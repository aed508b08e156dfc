use desk_core::{MotionState, Opcode, Reconciler};
use rstest::rstest;

#[test]
fn climb_converges_with_exactly_one_stop() {
    let mut r = Reconciler::new(2, 100);
    r.on_position_report(0);
    assert_eq!(r.set_target(50), MotionState::Increasing);

    let mut stops = 0;
    for pct in [10, 20, 30, 40, 46, 48] {
        assert_eq!(r.next_command(), Some(Opcode::Raise));
        if r.on_position_report(pct) == Some(Opcode::Stop) {
            stops += 1;
        }
    }
    assert_eq!(stops, 1);
    assert_eq!(r.state(), MotionState::Stopped);
    assert_eq!(r.target(), 50);
}

#[test]
fn coasting_past_target_does_not_reverse() {
    let mut r = Reconciler::new(2, 100);
    r.on_position_report(0);
    r.set_target(50);
    for pct in [20, 40, 49] {
        r.on_position_report(pct);
    }
    assert_eq!(r.state(), MotionState::Stopped);

    // The actuator coasts past the target after Stop.
    for pct in [51, 52] {
        assert_eq!(r.on_position_report(pct), None);
        assert_eq!(r.target(), pct);
    }
    for _ in 0..50 {
        assert_ne!(r.next_command(), Some(Opcode::Lower));
    }
    assert_eq!(r.state(), MotionState::Stopped);
}

#[test]
fn descent_stops_at_upper_band_edge() {
    let mut r = Reconciler::new(2, 100);
    r.on_position_report(80);
    assert_eq!(r.set_target(30), MotionState::Decreasing);
    assert_eq!(r.next_command(), Some(Opcode::Lower));
    assert_eq!(r.on_position_report(33), None);
    assert_eq!(r.on_position_report(32), Some(Opcode::Stop));
}

#[test]
fn heartbeat_every_hundredth_idle_tick() {
    let mut r = Reconciler::new(2, 100);
    r.on_position_report(40);
    let queries: Vec<usize> = (1..=300)
        .filter(|_| r.next_command() == Some(Opcode::Query))
        .collect();
    assert_eq!(queries, vec![100, 200, 300]);
}

#[test]
fn moving_ticks_reset_heartbeat_counter() {
    let mut r = Reconciler::new(2, 10);
    r.on_position_report(10);
    for _ in 0..9 {
        assert_eq!(r.next_command(), None);
    }
    r.set_target(20);
    assert_eq!(r.next_command(), Some(Opcode::Raise));
    r.on_position_report(19);
    // Counter restarted at convergence; nine more quiet ticks before the Query.
    for _ in 0..9 {
        assert_eq!(r.next_command(), None);
    }
    assert_eq!(r.next_command(), Some(Opcode::Query));
}

#[rstest]
#[case(0)]
#[case(2)]
#[case(5)]
fn zero_or_more_hysteresis_never_overshoots_the_band(#[case] h: u8) {
    let mut r = Reconciler::new(h, 100);
    r.on_position_report(0);
    r.set_target(60);
    let mut pct = 0u8;
    loop {
        match r.next_command() {
            Some(Opcode::Raise) => {
                pct += 1;
                r.on_position_report(pct);
            }
            Some(Opcode::Stop) | None => break,
            other => panic!("unexpected {other:?}"),
        }
        if r.state() == MotionState::Stopped {
            break;
        }
    }
    assert_eq!(pct, 60 - h);
}

#[test]
fn stale_flag_tracks_reports() {
    let mut r = Reconciler::new(2, 100);
    assert!(!r.has_report());
    r.on_position_report(12);
    assert!(r.has_report());
    r.mark_stale();
    assert!(!r.has_report());
    assert_eq!(r.current(), 12);
}

#[test]
fn stale_move_parks_until_next_report() {
    let mut r = Reconciler::new(2, 100);
    r.on_position_report(20);
    r.set_target(60);
    assert_eq!(r.next_command(), Some(Opcode::Raise));

    r.mark_stale();
    assert_eq!(r.state(), MotionState::Stopped);
    for _ in 0..5 {
        assert_eq!(r.next_command(), None);
    }

    // The fresh report does not mirror the target away.
    assert_eq!(r.on_position_report(35), None);
    assert_eq!(r.target(), 60);
    assert_eq!(r.state(), MotionState::Increasing);
    assert_eq!(r.next_command(), Some(Opcode::Raise));
}

#[test]
fn idle_stale_link_mirrors_first_report() {
    let mut r = Reconciler::new(2, 100);
    r.on_position_report(20);
    r.mark_stale();
    r.on_position_report(45);
    assert_eq!(r.target(), 45);
    assert_eq!(r.state(), MotionState::Stopped);
}
