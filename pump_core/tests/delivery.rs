use std::sync::Arc;
use std::thread;

use pump_core::{DeliveryController, DeliveryState, MemoryLog, PumpError, PumpEvent, SafetyCfg};
use rstest::{fixture, rstest};

struct Rig {
    pump: DeliveryController,
    log: Arc<MemoryLog>,
}

#[fixture]
fn rig() -> Rig {
    let log = Arc::new(MemoryLog::new());
    let pump = DeliveryController::builder()
        .with_log_sink(log.clone())
        .build()
        .unwrap();
    pump.create_profile("Day", 1.0, 50.0, 10.0, 100.0).unwrap();
    Rig { pump, log }
}

#[rstest]
fn start_requires_active_profile() {
    let pump = DeliveryController::builder().build().unwrap();
    assert_eq!(pump.start_insulin_delivery(), Err(PumpError::NoProfile));
    assert_eq!(pump.delivery_state(), DeliveryState::Inactive);
    assert!(!pump.is_delivery_active());
}

#[rstest]
fn start_in_range_activates(rig: Rig) {
    rig.pump.start_insulin_delivery().unwrap();
    assert_eq!(rig.pump.delivery_state(), DeliveryState::Active);
    assert!(rig.pump.is_delivery_active());
    let entries = rig.log.entries();
    assert!(entries.contains(&"[Pump] Insulin delivery started.".to_string()));
    assert!(
        entries.contains(&"[STATE] Insulin delivery state changed: INACTIVE -> ACTIVE".to_string())
    );
}

#[rstest]
fn low_start_suspends_and_resume_uses_hysteresis(rig: Rig) {
    let pump = &rig.pump;
    pump.set_current_glucose_level(60.0);
    assert_eq!(
        pump.start_insulin_delivery(),
        Err(PumpError::GlucoseTooLow(60.0))
    );
    assert_eq!(pump.delivery_state(), DeliveryState::Suspended);
    assert!(!pump.is_delivery_active());

    pump.set_current_glucose_level(75.0);
    assert_eq!(
        pump.resume_insulin_delivery(),
        Err(PumpError::GlucoseStillLow(75.0))
    );
    assert_eq!(pump.delivery_state(), DeliveryState::Suspended);

    pump.set_current_glucose_level(80.0);
    pump.resume_insulin_delivery().unwrap();
    assert_eq!(pump.delivery_state(), DeliveryState::Active);
}

#[rstest]
fn large_drop_while_active_auto_suspends(rig: Rig) {
    let pump = &rig.pump;
    pump.start_insulin_delivery().unwrap();
    pump.set_current_glucose_level(60.0);
    assert_eq!(pump.delivery_state(), DeliveryState::Suspended);
    assert!(!pump.is_delivery_active());
    let entries = rig.log.entries();
    assert!(entries.contains(&"[Alert] CGM Alert triggered!".to_string()));

    assert_eq!(
        pump.resume_insulin_delivery(),
        Err(PumpError::GlucoseStillLow(60.0))
    );
}

#[rstest]
fn manual_stop_from_suspended_pauses(rig: Rig) {
    let pump = &rig.pump;
    pump.set_current_glucose_level(60.0);
    let _ = pump.start_insulin_delivery();
    pump.stop_insulin_delivery().unwrap();
    assert_eq!(pump.delivery_state(), DeliveryState::Paused);
    assert!(!pump.is_delivery_active());
}

#[rstest]
#[case::nan(f32::NAN)]
#[case::infinity(f32::INFINITY)]
#[case::neg_infinity(f32::NEG_INFINITY)]
fn non_finite_reading_is_ignored_at_start(rig: Rig, #[case] reading: f32) {
    let pump = &rig.pump;
    pump.set_current_glucose_level(60.0);
    pump.set_current_glucose_level(reading);
    assert_eq!(pump.current_glucose_level(), 60.0);
    assert_eq!(
        pump.start_insulin_delivery(),
        Err(PumpError::GlucoseTooLow(60.0))
    );
    assert_eq!(pump.delivery_state(), DeliveryState::Suspended);
    assert!(
        rig.log
            .entries()
            .iter()
            .any(|e| e.starts_with("[CGM] Ignoring invalid glucose reading"))
    );
}

#[rstest]
fn non_finite_reading_cannot_lift_suspend(rig: Rig) {
    let pump = &rig.pump;
    pump.start_insulin_delivery().unwrap();
    pump.set_current_glucose_level(60.0);
    assert_eq!(pump.delivery_state(), DeliveryState::Suspended);

    pump.set_current_glucose_level(f32::NAN);
    assert_eq!(
        pump.resume_insulin_delivery(),
        Err(PumpError::GlucoseStillLow(60.0))
    );
    assert_eq!(pump.delivery_state(), DeliveryState::Suspended);
    assert!(!pump.is_delivery_active());
}

#[rstest]
fn gradual_drift_does_not_trigger_safety_check(rig: Rig) {
    let pump = &rig.pump;
    pump.start_insulin_delivery().unwrap();
    for level in [110.0, 100.0, 90.0, 80.0, 69.0] {
        pump.set_current_glucose_level(level);
    }
    assert_eq!(pump.delivery_state(), DeliveryState::Active);
    assert_eq!(pump.current_glucose_level(), 69.0);
}

#[rstest]
fn delta_threshold_is_strict(rig: Rig) {
    let pump = &rig.pump;
    pump.set_current_glucose_level(84.0);
    pump.start_insulin_delivery().unwrap();
    // Exactly 15 mg/dL is not "more than" the delta.
    pump.set_current_glucose_level(69.0);
    assert_eq!(pump.delivery_state(), DeliveryState::Active);
    pump.set_current_glucose_level(50.0);
    assert_eq!(pump.delivery_state(), DeliveryState::Suspended);
}

#[rstest]
fn stop_is_idempotent(rig: Rig) {
    let pump = &rig.pump;
    assert_eq!(pump.stop_insulin_delivery(), Ok(()));
    assert_eq!(pump.delivery_state(), DeliveryState::Inactive);

    pump.start_insulin_delivery().unwrap();
    pump.stop_insulin_delivery().unwrap();
    pump.stop_insulin_delivery().unwrap();
    assert_eq!(pump.delivery_state(), DeliveryState::Paused);
    let stops = rig
        .log
        .entries()
        .iter()
        .filter(|e| e.as_str() == "[PUMP] Insulin delivery stopped manually.")
        .count();
    assert_eq!(stops, 1);
}

#[rstest]
#[case::inactive(false)]
#[case::active(true)]
fn resume_outside_paused_or_suspended_fails(rig: Rig, #[case] started: bool) {
    if started {
        rig.pump.start_insulin_delivery().unwrap();
    }
    let before = rig.pump.delivery_state();
    assert_eq!(
        rig.pump.resume_insulin_delivery(),
        Err(PumpError::NotPausedOrSuspended)
    );
    assert_eq!(rig.pump.delivery_state(), before);
}

#[rstest]
fn paused_resume_returns_to_active(rig: Rig) {
    rig.pump.start_insulin_delivery().unwrap();
    rig.pump.stop_insulin_delivery().unwrap();
    rig.pump.resume_insulin_delivery().unwrap();
    assert_eq!(rig.pump.delivery_state(), DeliveryState::Active);
}

#[rstest]
fn occlusion_stops_delivery(rig: Rig) {
    rig.pump.start_insulin_delivery().unwrap();
    rig.pump.occlusion_alert();
    assert_eq!(rig.pump.delivery_state(), DeliveryState::Paused);
    assert!(!rig.pump.is_delivery_active());
    assert!(
        rig.log
            .entries()
            .contains(&"[Alert] Occlusion Alert triggered! Insulin delivery stopped.".to_string())
    );
}

#[rstest]
fn emergency_shutdown_powers_off(rig: Rig) {
    let pump = &rig.pump;
    pump.start_insulin_delivery().unwrap();
    pump.emergency_shutdown();
    assert!(!pump.is_powered());
    assert_eq!(pump.delivery_state(), DeliveryState::Paused);
    assert_eq!(pump.start_insulin_delivery(), Err(PumpError::PoweredOff));
    assert_eq!(pump.resume_insulin_delivery(), Err(PumpError::PoweredOff));

    // Repeating is harmless.
    pump.emergency_shutdown();
    assert!(!pump.is_powered());

    pump.power_on();
    pump.resume_insulin_delivery().unwrap();
    assert_eq!(pump.delivery_state(), DeliveryState::Active);
}

#[rstest]
fn iob_decays_per_tick_and_floors_at_zero(rig: Rig) {
    let pump = &rig.pump;
    pump.set_insulin_on_board(0.05);
    pump.on_tick();
    pump.on_tick();
    assert!((pump.insulin_on_board() - 0.03).abs() < 1e-6);
    for _ in 0..10 {
        pump.on_tick();
    }
    assert_eq!(pump.insulin_on_board(), 0.0);

    pump.set_insulin_on_board(-4.0);
    assert_eq!(pump.insulin_on_board(), 0.0);
}

#[test]
fn custom_thresholds_apply() {
    let pump = DeliveryController::builder()
        .with_safety(SafetyCfg {
            suspend_below: 90.0,
            resume_at_or_above: 100.0,
            delta_trigger: 5.0,
            initial_glucose: 95.0,
        })
        .build()
        .unwrap();
    pump.create_profile("Day", 1.0, 50.0, 10.0, 100.0).unwrap();
    pump.start_insulin_delivery().unwrap();
    pump.set_current_glucose_level(88.0);
    assert_eq!(pump.delivery_state(), DeliveryState::Suspended);
    pump.set_current_glucose_level(99.0);
    assert_eq!(
        pump.resume_insulin_delivery(),
        Err(PumpError::GlucoseStillLow(99.0))
    );
}

#[test]
fn readers_default_without_telemetry() {
    let pump = DeliveryController::builder().build().unwrap();
    assert_eq!(pump.battery_level(), 0.0);
    assert!(!pump.is_charging());
    assert_eq!(pump.insulin_dose_remaining(), 0);
    // No source: polling does nothing.
    pump.poll_telemetry();
    assert_eq!(pump.current_glucose_level(), 120.0);
}

#[test]
fn concurrent_stop_and_glucose_drops_stay_consistent() {
    let pump = Arc::new(DeliveryController::builder().build().unwrap());
    pump.create_profile("Day", 1.0, 50.0, 10.0, 100.0).unwrap();
    let events = pump.subscribe();

    let cgm = {
        let pump = Arc::clone(&pump);
        thread::spawn(move || {
            for i in 0..500 {
                // Alternate a deep drop with recovery so every reading crosses the delta.
                let level = if i % 2 == 0 { 50.0 } else { 150.0 };
                pump.set_current_glucose_level(level);
                let _ = pump.resume_insulin_delivery();
            }
        })
    };
    let operator = {
        let pump = Arc::clone(&pump);
        thread::spawn(move || {
            for _ in 0..500 {
                let _ = pump.start_insulin_delivery();
                pump.stop_insulin_delivery().unwrap();
            }
        })
    };
    cgm.join().unwrap();
    operator.join().unwrap();

    assert_eq!(pump.is_delivery_active(), pump.delivery_state().delivers());

    let mut last = DeliveryState::Inactive;
    let mut changes = 0;
    for ev in events.try_iter() {
        if let PumpEvent::StateChanged { from, to } = ev {
            assert_eq!(from, last, "state change chain broken at change {changes}");
            assert_ne!(from, to);
            last = to;
            changes += 1;
        }
    }
    assert!(changes > 0);
    assert_eq!(last, pump.delivery_state());
}
