//! `From` implementations bridging `pump_config` types to `pump_core` types.

use crate::config::{AlertCfg, IobCfg, SafetyCfg};
use crate::error::Result;
use crate::profile::ProfileParams;
use crate::store::ProfileStore;

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&pump_config::Safety> for SafetyCfg {
    fn from(c: &pump_config::Safety) -> Self {
        Self {
            suspend_below: c.suspend_below_mg_dl,
            resume_at_or_above: c.resume_at_or_above_mg_dl,
            delta_trigger: c.glucose_delta_mg_dl,
            initial_glucose: c.initial_glucose_mg_dl,
        }
    }
}

// ── AlertCfg ─────────────────────────────────────────────────────────────────

impl From<&pump_config::Alerts> for AlertCfg {
    fn from(c: &pump_config::Alerts) -> Self {
        Self {
            low_battery_pct: c.low_battery_pct,
            critical_battery_pct: c.critical_battery_pct,
            low_insulin_units: c.low_insulin_units,
        }
    }
}

// ── IobCfg ───────────────────────────────────────────────────────────────────

impl From<&pump_config::Iob> for IobCfg {
    fn from(c: &pump_config::Iob) -> Self {
        Self {
            decay_per_tick: c.decay_per_tick,
        }
    }
}

// ── Profile seeds ────────────────────────────────────────────────────────────

impl From<&pump_config::ProfileSeed> for ProfileParams {
    fn from(s: &pump_config::ProfileSeed) -> Self {
        ProfileParams::new(
            s.basal_rate,
            s.correction_factor,
            s.carb_ratio,
            s.target_glucose,
        )
    }
}

impl ProfileStore {
    /// Create every seed in order, stopping at the first rejected one.
    pub fn load_seeds(&mut self, seeds: &[pump_config::ProfileSeed]) -> Result<usize> {
        for seed in seeds {
            self.create(&seed.name, seed.into())?;
        }
        Ok(seeds.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PumpError;

    fn seed(name: &str, basal: f32) -> pump_config::ProfileSeed {
        pump_config::ProfileSeed {
            name: name.into(),
            basal_rate: basal,
            correction_factor: 50.0,
            carb_ratio: 10.0,
            target_glucose: 100.0,
        }
    }

    #[test]
    fn seeds_load_in_order_and_first_is_active() {
        let mut store = ProfileStore::new();
        let n = store
            .load_seeds(&[seed("Day", 1.0), seed("Night", 0.5)])
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.names(), ["Day", "Night"]);
        assert_eq!(store.active_name(), Some("Day"));
    }

    #[test]
    fn out_of_range_seed_is_rejected_not_clamped() {
        let mut store = ProfileStore::new();
        let err = store
            .load_seeds(&[seed("Ok", 1.0), seed("TooHigh", 31.0)])
            .unwrap_err();
        assert!(matches!(err, PumpError::InvalidParameter(v) if v.field == "basal_rate"));
        assert_eq!(store.names(), ["Ok"]);
    }

    #[test]
    fn config_defaults_map_to_core_defaults() {
        let cfg = pump_config::Config::default();
        let safety: SafetyCfg = (&cfg.safety).into();
        assert_eq!(safety.suspend_below, SafetyCfg::default().suspend_below);
        assert_eq!(safety.resume_at_or_above, 80.0);
        let alerts: AlertCfg = (&cfg.alerts).into();
        assert_eq!(alerts.low_insulin_units, 50);
        let iob: IobCfg = (&cfg.iob).into();
        assert_eq!(iob.decay_per_tick, 0.01);
    }
}
