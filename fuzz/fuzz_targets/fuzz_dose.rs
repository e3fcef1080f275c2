#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use pump_core::{DoseInputs, ProfileParams, ProfileStore, calculate_dose};

#[derive(Debug, Arbitrary)]
struct Input {
    basal: f32,
    cf: f32,
    icr: f32,
    target: f32,
    glucose: f32,
    carbs: f32,
    iob: f32,
    cf_override: Option<f32>,
    duration_hours: i32,
}

fuzz_target!(|input: Input| {
    let mut store = ProfileStore::new();
    let params = ProfileParams::new(input.basal, input.cf, input.icr, input.target);
    if store.create("Fuzz", params).is_err() {
        return;
    }
    let inputs = DoseInputs {
        glucose_level: input.glucose,
        carb_intake: input.carbs,
        insulin_on_board: input.iob,
        correction_factor_override: input.cf_override,
    };
    if let Ok(b) = calculate_dose(&inputs, store.active()) {
        assert!(!(b.final_dose < 0.0));
        let split = b.extended_split(input.duration_hours);
        assert!(split.duration_hours >= 1);
    }
});
