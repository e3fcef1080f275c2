#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and profile seed parsing for the insulin pump.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; an empty document yields the factory defaults.
//! - Profile seeds come from `[[profiles]]` tables or a strict-header CSV.
//!   Seeds are *not* range-checked here: the profile store owns those bounds
//!   and rejects out-of-range seeds when they are loaded.
use serde::Deserialize;

/// Profile seed schema, shared by TOML `[[profiles]]` entries and CSV rows.
///
/// Expected CSV headers:
/// name,basal_rate,correction_factor,carb_ratio,target_glucose
///
/// Example:
/// name,basal_rate,correction_factor,carb_ratio,target_glucose
/// Default,1.0,50,10,100
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProfileSeed {
    pub name: String,
    /// units/hour
    pub basal_rate: f32,
    /// mg/dL lowered per unit
    pub correction_factor: f32,
    /// grams of carbohydrate per unit
    pub carb_ratio: f32,
    /// mg/dL
    pub target_glucose: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Safety {
    /// Start is refused and active delivery auto-suspends below this glucose (mg/dL).
    pub suspend_below_mg_dl: f32,
    /// Resume from Suspended requires glucose at or above this level (mg/dL).
    pub resume_at_or_above_mg_dl: f32,
    /// Glucose jump (absolute, mg/dL) that triggers the safety check.
    pub glucose_delta_mg_dl: f32,
    /// Last-known glucose assumed at power on (mg/dL).
    pub initial_glucose_mg_dl: f32,
}

impl Default for Safety {
    fn default() -> Self {
        Self {
            suspend_below_mg_dl: 70.0,
            resume_at_or_above_mg_dl: 80.0,
            glucose_delta_mg_dl: 15.0,
            initial_glucose_mg_dl: 120.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Alerts {
    /// Low battery warning below this percentage.
    pub low_battery_pct: f32,
    /// Critical battery at or below this percentage; shuts down when not charging.
    pub critical_battery_pct: f32,
    /// Low insulin warning below this many units in the reservoir.
    pub low_insulin_units: u32,
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            low_battery_pct: 20.0,
            critical_battery_pct: 5.0,
            low_insulin_units: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Iob {
    /// Units of insulin-on-board removed per scheduler tick (linear decay).
    pub decay_per_tick: f32,
}

impl Default for Iob {
    fn default() -> Self {
        Self {
            decay_per_tick: 0.01,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub safety: Safety,
    pub alerts: Alerts,
    pub iob: Iob,
    pub logging: Logging,
    /// Profiles loaded into the store at startup; the first becomes active.
    pub profiles: Vec<ProfileSeed>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_profiles_csv(path: &std::path::Path) -> eyre::Result<Vec<ProfileSeed>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open profiles CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = [
        "name",
        "basal_rate",
        "correction_factor",
        "carb_ratio",
        "target_glucose",
    ];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "profiles CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut seeds = Vec::new();
    for (idx, rec) in rdr.deserialize::<ProfileSeed>().enumerate() {
        match rec {
            Ok(seed) => seeds.push(seed),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    Ok(seeds)
}

fn finite(name: &str, v: f32) -> eyre::Result<()> {
    if !v.is_finite() {
        eyre::bail!("{name} must be a finite number");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Safety
        let s = &self.safety;
        finite("safety.suspend_below_mg_dl", s.suspend_below_mg_dl)?;
        finite("safety.resume_at_or_above_mg_dl", s.resume_at_or_above_mg_dl)?;
        finite("safety.glucose_delta_mg_dl", s.glucose_delta_mg_dl)?;
        finite("safety.initial_glucose_mg_dl", s.initial_glucose_mg_dl)?;
        if s.suspend_below_mg_dl <= 0.0 {
            eyre::bail!("safety.suspend_below_mg_dl must be > 0");
        }
        if s.resume_at_or_above_mg_dl <= s.suspend_below_mg_dl {
            eyre::bail!(
                "safety.resume_at_or_above_mg_dl must be greater than safety.suspend_below_mg_dl"
            );
        }
        if s.glucose_delta_mg_dl < 0.0 {
            eyre::bail!("safety.glucose_delta_mg_dl must be >= 0");
        }
        if s.initial_glucose_mg_dl < 0.0 {
            eyre::bail!("safety.initial_glucose_mg_dl must be >= 0");
        }

        // Alerts
        let a = &self.alerts;
        finite("alerts.low_battery_pct", a.low_battery_pct)?;
        finite("alerts.critical_battery_pct", a.critical_battery_pct)?;
        if !(0.0..=100.0).contains(&a.low_battery_pct) {
            eyre::bail!("alerts.low_battery_pct must be in [0, 100]");
        }
        if !(0.0..=100.0).contains(&a.critical_battery_pct) {
            eyre::bail!("alerts.critical_battery_pct must be in [0, 100]");
        }
        if a.critical_battery_pct >= a.low_battery_pct {
            eyre::bail!("alerts.critical_battery_pct must be below alerts.low_battery_pct");
        }

        // IOB
        finite("iob.decay_per_tick", self.iob.decay_per_tick)?;
        if self.iob.decay_per_tick < 0.0 {
            eyre::bail!("iob.decay_per_tick must be >= 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}
