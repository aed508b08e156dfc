//! Control-loop behavior against the in-memory mock transport, driven one
//! tick at a time.

use std::sync::Arc;
use std::time::Duration;

use desk_core::mocks::MockTransport;
use desk_core::{ControlCfg, CurrentPosition, Desk, MotionState, Opcode, Pace};
use desk_traits::clock::test_clock::TestClock;

/// Height in tenths that maps to `pct` on a 620..1270 desk.
fn tenths_for(pct: f64) -> i16 {
    ((620.0 + pct * 6.5) * 10.0).round() as i16
}

fn desk(mock: &MockTransport, clock: &TestClock) -> Desk {
    Desk::builder()
        .with_transport(mock.clone())
        .with_calibration(620.0, 1270.0)
        .with_device_id("AA:BB:CC:DD:EE:FF")
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap()
}

#[test]
fn office_desk_scenario_converges_and_settles() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = desk(&mock, &clock);
    let handle = desk.handle();
    let lp = desk.control_loop();

    assert_eq!(lp.tick(), Pace::Immediate);
    assert_eq!(mock.opcodes(), vec![Opcode::Query]);

    mock.push_height(6500);
    assert_eq!(lp.tick(), Pace::Idle);
    assert_eq!(handle.current_position(), CurrentPosition::Known(5));
    assert_eq!(handle.target_position(), 5);
    assert!(handle.status().has_telemetry);

    mock.clear_frames();
    assert_eq!(handle.set_target_position(50), MotionState::Increasing);
    assert_eq!(lp.tick(), Pace::Command);

    for pct in [15.0, 25.0, 35.0, 45.0] {
        mock.push_height(tenths_for(pct));
        assert_eq!(lp.tick(), Pace::Command);
    }
    // Inside the band: Stop goes out while applying telemetry.
    mock.push_height(tenths_for(49.0));
    assert_eq!(lp.tick(), Pace::Idle);

    // Coasting report after Stop.
    mock.push_height(tenths_for(51.0));
    assert_eq!(lp.tick(), Pace::Idle);

    let ops = mock.opcodes();
    assert_eq!(ops.iter().filter(|o| **o == Opcode::Raise).count(), 5);
    assert_eq!(ops.last(), Some(&Opcode::Stop));
    assert_eq!(ops.iter().filter(|o| **o == Opcode::Stop).count(), 1);
    assert_eq!(handle.current_position(), CurrentPosition::Known(51));
    assert_eq!(handle.target_position(), 51);
    assert_eq!(handle.motion_state(), MotionState::Stopped);
}

#[test]
fn write_failure_latches_fault_then_recovers() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = desk(&mock, &clock);
    let handle = desk.handle();
    let lp = desk.control_loop();

    lp.tick();
    mock.push_height(tenths_for(10.0));
    lp.tick();
    handle.set_target_position(60);

    mock.fail_next_writes(1);
    assert_eq!(lp.tick(), Pace::Immediate);
    let status = handle.status();
    assert!(status.faulted);
    assert_eq!(status.current, CurrentPosition::Fault);
    assert_eq!(handle.target_position(), 60);

    // Next tick reconnects and clears the fault; the target survives.
    assert_eq!(lp.tick(), Pace::Immediate);
    assert_eq!(mock.connects(), 2);
    assert!(!handle.status().faulted);
    assert!(!handle.status().has_telemetry);
    assert_eq!(handle.target_position(), 60);

    mock.clear_frames();
    mock.push_height(tenths_for(12.0));
    assert_eq!(lp.tick(), Pace::Command);
    assert_eq!(mock.opcodes(), vec![Opcode::Raise]);
}

#[test]
fn dropped_link_is_detected_without_a_write() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = desk(&mock, &clock);
    let handle = desk.handle();
    let lp = desk.control_loop();

    lp.tick();
    mock.drop_link();
    assert_eq!(lp.tick(), Pace::Immediate);
    assert_eq!(handle.current_position(), CurrentPosition::Fault);
    lp.tick();
    assert!(mock.is_linked());
    assert!(!handle.status().faulted);
}

#[test]
fn failed_reconnects_back_off_and_never_give_up() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = desk(&mock, &clock);
    let handle = desk.handle();
    let lp = desk.control_loop();

    mock.fail_next_connects(3);
    for _ in 0..3 {
        let pace = lp.tick();
        assert_eq!(pace, Pace::Backoff);
        assert!(handle.status().faulted);
        lp.pause(pace);
    }
    assert_eq!(lp.tick(), Pace::Immediate);
    assert!(!handle.status().faulted);
    assert!(handle.status().connected);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 3]);
}

#[test]
fn target_set_before_telemetry_waits_for_a_report() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = desk(&mock, &clock);
    let handle = desk.handle();

    assert_eq!(handle.current_position(), CurrentPosition::Fault);
    assert_eq!(handle.set_target_position(30), MotionState::Stopped);

    let lp = desk.control_loop();
    assert_eq!(lp.tick(), Pace::Immediate);
    mock.clear_frames();

    // Connected, but nothing reported yet: no motion, no position.
    assert_eq!(lp.tick(), Pace::Idle);
    assert!(mock.opcodes().is_empty());
    assert_eq!(handle.current_position(), CurrentPosition::Fault);

    // The desk is actually high up; head down toward the stored target.
    mock.push_height(tenths_for(80.0));
    assert_eq!(lp.tick(), Pace::Command);
    assert_eq!(mock.opcodes(), vec![Opcode::Lower]);
    assert_eq!(handle.target_position(), 30);
    assert_eq!(handle.motion_state(), MotionState::Decreasing);
    assert_eq!(handle.current_position(), CurrentPosition::Known(80));
}

#[test]
fn move_interrupted_by_reconnect_resumes_from_fresh_report() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = desk(&mock, &clock);
    let handle = desk.handle();
    let lp = desk.control_loop();

    lp.tick();
    mock.push_height(tenths_for(20.0));
    lp.tick();
    handle.set_target_position(60);
    assert_eq!(lp.tick(), Pace::Command);

    mock.drop_link();
    assert_eq!(lp.tick(), Pace::Immediate);
    assert_eq!(lp.tick(), Pace::Immediate);
    assert!(handle.status().connected);
    mock.clear_frames();

    // No Raise against the pre-reconnect position.
    assert_eq!(lp.tick(), Pace::Idle);
    assert!(mock.opcodes().is_empty());
    assert_eq!(handle.target_position(), 60);

    // Moved by hand past the target while the link was down.
    mock.push_height(tenths_for(70.0));
    assert_eq!(lp.tick(), Pace::Command);
    assert_eq!(mock.opcodes(), vec![Opcode::Lower]);
    assert_eq!(handle.target_position(), 60);
}

#[test]
fn readings_from_previous_link_are_discarded_on_reconnect() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = desk(&mock, &clock);
    let handle = desk.handle();
    let lp = desk.control_loop();

    lp.tick();
    // Queued but not applied before the link goes away.
    mock.push_height(tenths_for(10.0));
    mock.drop_link();
    assert_eq!(lp.tick(), Pace::Immediate);
    assert!(handle.status().faulted);

    assert_eq!(lp.tick(), Pace::Immediate);
    assert!(handle.status().connected);
    assert_eq!(lp.tick(), Pace::Idle);
    assert!(!handle.status().has_telemetry);
    assert_eq!(handle.current_position(), CurrentPosition::Fault);
}

#[test]
fn convergence_during_command_wait_sends_stop_promptly() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = Desk::builder()
        .with_transport(mock.clone())
        .with_calibration(620.0, 1270.0)
        .with_device_id("desk")
        .with_clock(Arc::new(clock.clone()))
        .with_control(ControlCfg {
            command_interval_ms: 20,
            ..ControlCfg::default()
        })
        .build()
        .unwrap();
    let handle = desk.handle();
    let lp = desk.control_loop();

    lp.tick();
    mock.push_height(tenths_for(40.0));
    lp.tick();
    handle.set_target_position(45);
    mock.clear_frames();
    assert_eq!(lp.tick(), Pace::Command);

    mock.push_height(tenths_for(44.0));
    lp.pause(Pace::Command);
    assert_eq!(mock.opcodes(), vec![Opcode::Raise, Opcode::Stop]);
    assert_eq!(handle.motion_state(), MotionState::Stopped);
}

#[test]
fn malformed_telemetry_is_dropped_and_link_stays_up() {
    let mock = MockTransport::new();
    let clock = TestClock::new();
    let mut desk = desk(&mock, &clock);
    let handle = desk.handle();
    let lp = desk.control_loop();

    lp.tick();
    mock.push_telemetry(&[0x01, 0x02, 0x03]);
    assert_eq!(lp.tick(), Pace::Idle);
    assert!(!handle.status().faulted);
    assert!(!handle.status().has_telemetry);
    assert_eq!(lp.session().dropped_samples(), 1);
}
