#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<desk_config::Config>(data) {
        let _ = cfg.validate();
        if let Ok(cal) = desk_core::Calibration::try_from(&cfg.desk) {
            let pct = cal.height_to_percentage(cfg.desk.base_height);
            assert!(pct <= 100);
        }
    }
});
