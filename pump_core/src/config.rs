//! Runtime configuration types for the delivery controller.
//!
//! These are separate from the TOML-deserialized config in `pump_config`;
//! see `conversions` for the bridge.

/// Glucose safety thresholds (mg/dL).
#[derive(Debug, Clone)]
pub struct SafetyCfg {
    /// Start is refused, and active delivery auto-suspends, below this level.
    pub suspend_below: f32,
    /// Resuming from Suspended requires glucose at or above this level.
    /// Kept above `suspend_below` so delivery does not flap at the threshold.
    pub resume_at_or_above: f32,
    /// A reading that moves more than this from the previous one triggers the safety check.
    pub delta_trigger: f32,
    /// Last-known glucose at power on.
    pub initial_glucose: f32,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            suspend_below: 70.0,
            resume_at_or_above: 80.0,
            delta_trigger: 15.0,
            initial_glucose: 120.0,
        }
    }
}

/// Telemetry alert thresholds.
#[derive(Debug, Clone)]
pub struct AlertCfg {
    /// Battery percent below which a low-battery warning is raised.
    pub low_battery_pct: f32,
    /// Battery percent at or below which the critical path runs.
    pub critical_battery_pct: f32,
    /// Reservoir units below which a low-insulin warning is raised.
    pub low_insulin_units: u32,
}

impl Default for AlertCfg {
    fn default() -> Self {
        Self {
            low_battery_pct: 20.0,
            critical_battery_pct: 5.0,
            low_insulin_units: 50,
        }
    }
}

/// Insulin-on-board decay.
#[derive(Debug, Clone)]
pub struct IobCfg {
    /// Units removed per `on_tick`.
    pub decay_per_tick: f32,
}

impl Default for IobCfg {
    fn default() -> Self {
        Self {
            decay_per_tick: 0.01,
        }
    }
}
