//! Settable telemetry source for tests and the scripted CLI.

use std::sync::Mutex;

use pump_traits::TelemetrySource;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub battery_level: f32,
    pub charging: bool,
    pub occlusion: bool,
    pub glucose_level: f32,
    pub insulin_on_board: f32,
    pub insulin_remaining: u32,
}

impl Default for TelemetrySnapshot {
    /// A healthy pump: full battery, full reservoir, in-range glucose.
    fn default() -> Self {
        Self {
            battery_level: 100.0,
            charging: false,
            occlusion: false,
            glucose_level: 120.0,
            insulin_on_board: 0.0,
            insulin_remaining: 300,
        }
    }
}

/// Simulated device readings, changed through `&self` so one `Arc` can be shared
/// between the controller and whatever drives the simulation.
#[derive(Debug, Default)]
pub struct SimTelemetry {
    readings: Mutex<TelemetrySnapshot>,
}

impl SimTelemetry {
    pub fn new(initial: TelemetrySnapshot) -> Self {
        Self {
            readings: Mutex::new(initial),
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        *self.lock()
    }

    /// Mutate readings in place.
    pub fn update(&self, f: impl FnOnce(&mut TelemetrySnapshot)) {
        f(&mut self.lock());
    }

    pub fn set_battery(&self, level: f32, charging: bool) {
        self.update(|r| {
            r.battery_level = level;
            r.charging = charging;
        });
    }

    pub fn set_glucose(&self, level: f32) {
        self.update(|r| r.glucose_level = level);
    }

    pub fn set_occlusion(&self, occluded: bool) {
        self.update(|r| r.occlusion = occluded);
    }

    pub fn set_insulin_remaining(&self, units: u32) {
        self.update(|r| r.insulin_remaining = units);
    }

    pub fn set_insulin_on_board(&self, units: f32) {
        self.update(|r| r.insulin_on_board = units);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TelemetrySnapshot> {
        self.readings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TelemetrySource for SimTelemetry {
    fn battery_level(&self) -> f32 {
        self.lock().battery_level
    }
    fn is_charging(&self) -> bool {
        self.lock().charging
    }
    fn occlusion_detected(&self) -> bool {
        self.lock().occlusion
    }
    fn glucose_level(&self) -> f32 {
        self.lock().glucose_level
    }
    fn insulin_on_board(&self) -> f32 {
        self.lock().insulin_on_board
    }
    fn insulin_remaining(&self) -> u32 {
        self.lock().insulin_remaining
    }
}
