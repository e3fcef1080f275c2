use pump_core::{DeliveryController, ProfileParams, ProfileStore, PumpError};
use rstest::rstest;

fn params() -> ProfileParams {
    ProfileParams::new(1.0, 50.0, 10.0, 100.0)
}

#[rstest]
#[case::basal_floor(ProfileParams::new(0.0, 50.0, 10.0, 100.0))]
#[case::basal_ceiling(ProfileParams::new(30.0, 50.0, 10.0, 100.0))]
#[case::cf_bounds(ProfileParams::new(1.0, 1.0, 10.0, 100.0))]
#[case::cf_ceiling(ProfileParams::new(1.0, 400.0, 10.0, 100.0))]
#[case::icr_bounds(ProfileParams::new(1.0, 50.0, 150.0, 100.0))]
#[case::target_floor(ProfileParams::new(1.0, 50.0, 10.0, 70.0))]
#[case::target_ceiling(ProfileParams::new(1.0, 50.0, 10.0, 180.0))]
fn inclusive_bounds_accepted(#[case] p: ProfileParams) {
    let mut store = ProfileStore::new();
    assert_eq!(store.create("Edge", p), Ok(()));
}

#[rstest]
#[case::basal_just_below_floor(ProfileParams::new(-0.01, 50.0, 10.0, 100.0), "basal_rate")]
#[case::basal_just_above_ceiling(ProfileParams::new(30.01, 50.0, 10.0, 100.0), "basal_rate")]
#[case::basal_negative(ProfileParams::new(-0.1, 50.0, 10.0, 100.0), "basal_rate")]
#[case::basal_high(ProfileParams::new(30.5, 50.0, 10.0, 100.0), "basal_rate")]
#[case::cf_low(ProfileParams::new(1.0, 0.5, 10.0, 100.0), "correction_factor")]
#[case::cf_high(ProfileParams::new(1.0, 401.0, 10.0, 100.0), "correction_factor")]
#[case::icr_zero(ProfileParams::new(1.0, 50.0, 0.0, 100.0), "carb_ratio")]
#[case::target_low(ProfileParams::new(1.0, 50.0, 10.0, 69.0), "target_glucose")]
#[case::target_high(ProfileParams::new(1.0, 50.0, 10.0, 181.0), "target_glucose")]
fn out_of_bounds_rejected_without_side_effects(
    #[case] p: ProfileParams,
    #[case] field: &str,
) {
    let mut store = ProfileStore::new();
    match store.create("Bad", p) {
        Err(PumpError::InvalidParameter(v)) => assert_eq!(v.field, field),
        other => panic!("expected InvalidParameter, got {other:?}"),
    }
    assert!(store.is_empty());
    assert_eq!(store.active_name(), None);
}

#[test]
fn duplicate_names_are_rejected_case_sensitively() {
    let mut store = ProfileStore::new();
    store.create("Day", params()).unwrap();
    assert_eq!(
        store.create("Day", params()),
        Err(PumpError::DuplicateName("Day".into()))
    );
    assert_eq!(store.create("day", params()), Ok(()));
    assert_eq!(store.names(), ["Day", "day"]);
}

#[test]
fn active_profile_cannot_be_deleted() {
    let mut store = ProfileStore::new();
    store.create("A", params()).unwrap();
    store.create("B", params()).unwrap();
    assert_eq!(
        store.delete("A"),
        Err(PumpError::CannotDeleteActive("A".into()))
    );
    store.delete("B").unwrap();
    assert_eq!(store.delete("B"), Err(PumpError::NotFound("B".into())));
    assert_eq!(store.active_name(), Some("A"));
}

#[test]
fn update_validates_and_keeps_active_pointer() {
    let mut store = ProfileStore::new();
    store.create("A", params()).unwrap();
    let before = store.read("A").unwrap().params();
    assert!(matches!(
        store.update("A", ProfileParams::new(1.0, 50.0, 10.0, 200.0)),
        Err(PumpError::InvalidParameter(_))
    ));
    assert_eq!(store.read("A").unwrap().params(), before);

    store
        .update("A", ProfileParams::new(2.0, 40.0, 12.0, 110.0))
        .unwrap();
    let a = store.read("A").unwrap();
    assert_eq!(a.basal_rate(), 2.0);
    assert_eq!(a.target_glucose(), 110.0);
    assert!(a.is_active());
    assert_eq!(
        store.update("Missing", params()),
        Err(PumpError::NotFound("Missing".into()))
    );
}

#[test]
fn activate_unknown_leaves_pointer_alone() {
    let mut store = ProfileStore::new();
    store.create("A", params()).unwrap();
    assert_eq!(store.activate("Z"), Err(PumpError::NotFound("Z".into())));
    assert_eq!(store.active_name(), Some("A"));
}

#[test]
fn controller_exposes_profile_commands() {
    let pump = DeliveryController::builder().build().unwrap();
    pump.create_profile("Day", 1.0, 50.0, 10.0, 100.0).unwrap();
    pump.create_profile("Night", 0.8, 60.0, 12.0, 110.0).unwrap();
    assert_eq!(pump.active_profile().unwrap().name(), "Day");

    pump.switch_profile("Night").unwrap();
    assert_eq!(pump.active_profile().unwrap().name(), "Night");
    assert!(pump.profile("Day").is_some_and(|p| !p.is_active()));

    pump.delete_profile("Day").unwrap();
    assert_eq!(pump.profile_names(), ["Night"]);
    assert_eq!(pump.with_store(ProfileStore::len), 1);

    let (ok, errors) = pump.validate_profiles();
    assert!(ok);
    assert!(errors.is_empty());
}

#[test]
fn display_lists_every_parameter() {
    let mut store = ProfileStore::new();
    store.create("Day", params()).unwrap();
    let text = store.read("Day").unwrap().to_string();
    assert!(text.contains("Mode: Day"));
    assert!(text.contains("Basal Rate: 1"));
    assert!(text.contains("Correction Factor: 50"));
    assert!(text.contains("Carbohydrates Ratio: 10"));
    assert!(text.contains("Target Glucose Levels: 100"));
}
