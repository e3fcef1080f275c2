use pump_config::load_toml;
use rstest::rstest;

const FULL: &str = r#"
[safety]
suspend_below_mg_dl = 70.0
resume_at_or_above_mg_dl = 80.0
glucose_delta_mg_dl = 15.0
initial_glucose_mg_dl = 120.0

[alerts]
low_battery_pct = 20.0
critical_battery_pct = 5.0
low_insulin_units = 50

[iob]
decay_per_tick = 0.01

[logging]
level = "debug"
rotation = "daily"

[[profiles]]
name = "Default"
basal_rate = 1.0
correction_factor = 50.0
carb_ratio = 10.0
target_glucose = 100.0

[[profiles]]
name = "Night"
basal_rate = 0.6
correction_factor = 60.0
carb_ratio = 12.0
target_glucose = 120.0
"#;

#[test]
fn accepts_full_config() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.profiles.len(), 2);
    assert_eq!(cfg.profiles[1].name, "Night");
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[test]
fn partial_sections_fill_defaults() {
    let cfg = load_toml("[safety]\nresume_at_or_above_mg_dl = 90.0\n").expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.safety.resume_at_or_above_mg_dl, 90.0);
    assert_eq!(cfg.safety.suspend_below_mg_dl, 70.0);
    assert_eq!(cfg.alerts.critical_battery_pct, 5.0);
}

#[rstest]
#[case("[safety]\nresume_at_or_above_mg_dl = 70.0\n", "must be greater than")]
#[case("[safety]\nsuspend_below_mg_dl = 0.0\n", "suspend_below_mg_dl must be > 0")]
#[case("[safety]\nglucose_delta_mg_dl = -1.0\n", "glucose_delta_mg_dl must be >= 0")]
#[case("[alerts]\nlow_battery_pct = 150.0\n", "low_battery_pct must be in [0, 100]")]
#[case("[alerts]\ncritical_battery_pct = 25.0\n", "must be below alerts.low_battery_pct")]
#[case("[iob]\ndecay_per_tick = -0.5\n", "decay_per_tick must be >= 0")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
#[case("[safety]\ninitial_glucose_mg_dl = nan\n", "must be a finite number")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn rejects_wrong_types_at_parse_time() {
    assert!(load_toml("[alerts]\nlow_insulin_units = \"many\"\n").is_err());
    assert!(load_toml("[[profiles]]\nname = \"A\"\n").is_err());
}
