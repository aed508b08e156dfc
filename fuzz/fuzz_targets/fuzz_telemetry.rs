#![no_main]
use desk_core::{Calibration, Frame, TelemetryLayout, decode_telemetry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary notifications must decode or be rejected, never panic, and
    // any decoded height must map into 0..=100.
    let Ok(cal) = Calibration::new(620.0, 1270.0) else {
        return;
    };
    for layout in [TelemetryLayout::Offset4, TelemetryLayout::StatusInterleaved] {
        if let Ok(reading) = decode_telemetry(data, layout) {
            assert!(data.len() >= layout.min_len());
            assert!(cal.height_to_percentage(reading.height()) <= 100);
        }
    }
    if let Ok(frame) = Frame::parse(data) {
        assert_eq!(frame.as_bytes(), data);
    }
});
