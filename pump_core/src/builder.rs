//! Builder for `DeliveryController`.
//!
//! Every piece has a default: a fresh builder yields a powered-on pump with an
//! empty store, the standard thresholds, a monotonic clock and log lines routed
//! to `tracing`. Thresholds are checked once, in `build()`.

use std::sync::{Arc, Mutex};

use pump_traits::clock::{Clock, MonotonicClock};
use pump_traits::{LogSink, TelemetrySource};

use crate::config::{AlertCfg, IobCfg, SafetyCfg};
use crate::controller::{DeliveryController, Inner};
use crate::error::{BuildError, PumpError};
use crate::events::EventBus;
use crate::logger::TracingLogSink;
use crate::status::DeliveryState;
use crate::store::ProfileStore;

impl DeliveryController {
    /// Start building a controller.
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }
}

#[derive(Default)]
pub struct ControllerBuilder {
    store: Option<ProfileStore>,
    safety: Option<SafetyCfg>,
    alerts: Option<AlertCfg>,
    iob: Option<IobCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    log: Option<Arc<dyn LogSink + Send + Sync>>,
    telemetry: Option<Arc<dyn TelemetrySource + Send + Sync>>,
}

impl ControllerBuilder {
    pub fn with_store(mut self, store: ProfileStore) -> Self {
        self.store = Some(store);
        self
    }
    pub fn with_safety(mut self, safety: SafetyCfg) -> Self {
        self.safety = Some(safety);
        self
    }
    pub fn with_alerts(mut self, alerts: AlertCfg) -> Self {
        self.alerts = Some(alerts);
        self
    }
    pub fn with_iob(mut self, iob: IobCfg) -> Self {
        self.iob = Some(iob);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Where human-readable log lines go; defaults to `TracingLogSink`.
    pub fn with_log_sink(mut self, log: Arc<dyn LogSink + Send + Sync>) -> Self {
        self.log = Some(log);
        self
    }
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySource + Send + Sync>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Apply thresholds and seed profiles from a loaded TOML config.
    ///
    /// Seeds go through the same validation as `create_profile`; the first
    /// rejected seed aborts.
    pub fn with_config(mut self, cfg: &pump_config::Config) -> Result<Self, PumpError> {
        self.safety = Some(SafetyCfg::from(&cfg.safety));
        self.alerts = Some(AlertCfg::from(&cfg.alerts));
        self.iob = Some(IobCfg::from(&cfg.iob));
        if !cfg.profiles.is_empty() {
            let mut store = self.store.take().unwrap_or_default();
            store.load_seeds(&cfg.profiles)?;
            self.store = Some(store);
        }
        Ok(self)
    }

    pub fn build(self) -> Result<DeliveryController, BuildError> {
        let safety = self.safety.unwrap_or_default();
        let alerts = self.alerts.unwrap_or_default();
        let iob = self.iob.unwrap_or_default();

        if !safety.suspend_below.is_finite() || safety.suspend_below <= 0.0 {
            return Err(BuildError::InvalidConfig("suspend_below must be > 0"));
        }
        if !(safety.resume_at_or_above > safety.suspend_below) {
            return Err(BuildError::InvalidConfig(
                "resume_at_or_above must be greater than suspend_below",
            ));
        }
        if !(safety.delta_trigger >= 0.0) {
            return Err(BuildError::InvalidConfig("delta_trigger must be >= 0"));
        }
        if !safety.initial_glucose.is_finite() || safety.initial_glucose < 0.0 {
            return Err(BuildError::InvalidConfig("initial_glucose must be finite and >= 0"));
        }
        if !(alerts.critical_battery_pct < alerts.low_battery_pct) {
            return Err(BuildError::InvalidConfig(
                "critical_battery_pct must be below low_battery_pct",
            ));
        }
        if !(iob.decay_per_tick >= 0.0) {
            return Err(BuildError::InvalidConfig("decay_per_tick must be >= 0"));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let epoch = clock.now();
        let log: Arc<dyn LogSink + Send + Sync> = match self.log {
            Some(l) => l,
            None => Arc::new(TracingLogSink),
        };

        tracing::debug!(
            suspend_below = safety.suspend_below,
            resume_at_or_above = safety.resume_at_or_above,
            delta_trigger = safety.delta_trigger,
            telemetry = self.telemetry.is_some(),
            "delivery controller built"
        );

        Ok(DeliveryController {
            inner: Mutex::new(Inner {
                store: self.store.unwrap_or_default(),
                state: DeliveryState::Inactive,
                insulin_delivery_active: false,
                current_glucose: safety.initial_glucose,
                insulin_on_board: 0.0,
                bolus: None,
                bolus_seq: 0,
                powered: true,
                safety,
                alerts,
                iob,
                clock,
                epoch,
                log,
                telemetry: self.telemetry,
                events: EventBus::new(),
            }),
        })
    }
}
