#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = pump_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // Seeds that made it through the parser must be either stored or rejected cleanly.
    let mut store = pump_core::ProfileStore::new();
    if store.load_seeds(&cfg.profiles).is_ok() {
        let (_, problems) = store.validate_all();
        assert!(problems.is_empty());
    }
});
