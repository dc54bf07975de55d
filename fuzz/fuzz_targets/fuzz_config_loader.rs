#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = presso_config::load_toml(data) {
        if cfg.validate().is_ok() {
            let _ = presso_core::DispatchCfg::from(&cfg);
            let _ = presso_core::ActuatorConstants::from(&cfg.actuator);
        }
    }
});
