#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing, validation and settings layering must never panic; errors are fine.
    if let Ok(mut cfg) = turret_config::load_toml(data) {
        let _ = cfg.validate();
        cfg.set_zero(i64::MIN);
        cfg.set_zero(i64::MAX);
    }
    if let Ok(upd) = turret_config::load_settings(data) {
        let mut cfg = turret_config::Config::default();
        let _ = cfg.apply(&upd);
    }
});
