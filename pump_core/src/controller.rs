//! The delivery safety state machine (`DeliveryController`).
//!
//! ```text
//!  from        command / trigger                        to
//!  INACTIVE    start, glucose >= suspend                 ACTIVE
//!  INACTIVE    start, glucose <  suspend                 SUSPENDED (error)
//!  ACTIVE      |delta| > trigger and glucose < suspend   SUSPENDED (+ CGM alert)
//!  not INACTIVE stop / occlusion / shutdown              PAUSED
//!  PAUSED      resume                                    ACTIVE
//!  SUSPENDED   resume, glucose >= resume_at              ACTIVE
//! ```
//!
//! All state lives behind one mutex: guard evaluation, the transition and the
//! notifications for a command happen under a single lock acquisition, so a
//! manual stop racing an automatic suspend cannot interleave.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crossbeam_channel as xch;
use pump_traits::clock::Clock;
use pump_traits::{LogSink, TelemetrySource};

use crate::bolus::{Bolus, BolusKind, BolusNotice, BolusOutcome, BolusState};
use crate::config::{AlertCfg, IobCfg, SafetyCfg};
use crate::dose::{DoseBreakdown, DoseInputs, ExtendedSplit};
use crate::error::{PumpError, Result};
use crate::events::{Alert, EventBus, PumpEvent};
use crate::profile::{Profile, ProfileParams};
use crate::status::DeliveryState;
use crate::store::ProfileStore;

/// One bolus command. Quick and extended requests carry no carbohydrates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BolusRequest {
    pub kind: BolusKind,
    pub glucose_level: f32,
    pub carb_intake: f32,
    /// Extended bolus duration; whole hours are used.
    pub duration_minutes: i32,
    pub correction_factor_override: Option<f32>,
    /// Replaces the controller's tracked IOB for this request only.
    pub insulin_on_board: Option<f32>,
}

impl BolusRequest {
    pub fn standard(glucose_level: f32, carb_intake: f32) -> Self {
        Self {
            kind: BolusKind::Standard,
            glucose_level,
            carb_intake,
            duration_minutes: 0,
            correction_factor_override: None,
            insulin_on_board: None,
        }
    }

    pub fn quick(glucose_level: f32, duration_minutes: i32) -> Self {
        Self {
            kind: BolusKind::Quick,
            duration_minutes,
            ..Self::standard(glucose_level, 0.0)
        }
    }

    pub fn extended(glucose_level: f32, duration_minutes: i32) -> Self {
        Self {
            kind: BolusKind::Extended,
            duration_minutes,
            ..Self::standard(glucose_level, 0.0)
        }
    }

    pub fn with_cf_override(mut self, cf: f32) -> Self {
        self.correction_factor_override = Some(cf);
        self
    }

    pub fn with_iob(mut self, units: f32) -> Self {
        self.insulin_on_board = Some(units);
        self
    }
}

/// What a successful bolus request delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct BolusReceipt {
    pub id: String,
    pub kind: BolusKind,
    pub breakdown: DoseBreakdown,
    /// Standard: the final dose. Quick: the immediate share. Extended: the scheduled share.
    pub units: f32,
    pub extended: Option<ExtendedSplit>,
}

pub(crate) struct Inner {
    pub(crate) store: ProfileStore,
    pub(crate) state: DeliveryState,
    pub(crate) insulin_delivery_active: bool,
    pub(crate) current_glucose: f32,
    pub(crate) insulin_on_board: f32,
    pub(crate) bolus: Option<Bolus>,
    pub(crate) bolus_seq: u64,
    pub(crate) powered: bool,
    pub(crate) safety: SafetyCfg,
    pub(crate) alerts: AlertCfg,
    pub(crate) iob: IobCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) log: Arc<dyn LogSink + Send + Sync>,
    pub(crate) telemetry: Option<Arc<dyn TelemetrySource + Send + Sync>>,
    pub(crate) events: EventBus,
}

/// Gatekeeper for insulin flow. Owns the profile store; share it behind an `Arc`.
pub struct DeliveryController {
    pub(crate) inner: Mutex<Inner>,
}

impl core::fmt::Debug for DeliveryController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let g = self.lock();
        f.debug_struct("DeliveryController")
            .field("state", &g.state)
            .field("glucose", &g.current_glucose)
            .field("active_profile", &g.store.active_name())
            .field("powered", &g.powered)
            .finish()
    }
}

impl DeliveryController {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Poison is ignored: every command leaves `Inner` consistent before returning.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an observer for state changes, alerts and bolus notifications.
    pub fn subscribe(&self) -> xch::Receiver<PumpEvent> {
        self.lock().events.subscribe()
    }

    // ── Profiles ─────────────────────────────────────────────────────────────

    pub fn create_profile(
        &self,
        name: &str,
        basal_rate: f32,
        correction_factor: f32,
        carb_ratio: f32,
        target_glucose: f32,
    ) -> Result<()> {
        let params = ProfileParams::new(basal_rate, correction_factor, carb_ratio, target_glucose);
        let mut g = self.lock();
        match g.store.create(name, params) {
            Ok(()) => {
                g.update_log(&format!("[Profile] Created new profile: {name}"));
                Ok(())
            }
            Err(e) => {
                g.update_log(&format!("[Profile] Failed to create profile: {e}"));
                Err(e)
            }
        }
    }

    pub fn update_profile(&self, name: &str, params: ProfileParams) -> Result<()> {
        let mut g = self.lock();
        let res = g.store.update(name, params);
        match &res {
            Ok(()) => g.update_log(&format!("[Profile] Updated profile: {name}")),
            Err(e) => g.update_log(&format!("[Profile] Failed to update profile: {e}")),
        }
        res
    }

    pub fn delete_profile(&self, name: &str) -> Result<()> {
        let mut g = self.lock();
        let res = g.store.delete(name);
        match &res {
            Ok(()) => g.update_log(&format!("[Profile] Deleted profile: {name}")),
            Err(e) => g.update_log(&format!("[Profile] Failed to delete profile: {e}")),
        }
        res
    }

    pub fn switch_profile(&self, name: &str) -> Result<()> {
        let mut g = self.lock();
        match g.store.activate(name) {
            Ok(()) => {
                g.update_log(&format!("[Profile] Switched to profile: {name}"));
                Ok(())
            }
            Err(e) => {
                g.update_log(&format!("[Profile] Failed to switch to profile: {e}"));
                Err(e)
            }
        }
    }

    /// Snapshot of the active profile.
    pub fn active_profile(&self) -> Option<Profile> {
        self.lock().store.active().cloned()
    }

    pub fn profile(&self, name: &str) -> Option<Profile> {
        self.lock().store.read(name).cloned()
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.lock().store.names()
    }

    pub fn validate_profiles(&self) -> (bool, Vec<String>) {
        self.lock().store.validate_all()
    }

    /// Read-only access to the store without copying profiles out.
    pub fn with_store<R>(&self, f: impl FnOnce(&ProfileStore) -> R) -> R {
        f(&self.lock().store)
    }

    // ── Delivery state machine ───────────────────────────────────────────────

    pub fn start_insulin_delivery(&self) -> Result<()> {
        self.lock().start()
    }

    /// Always succeeds; stopping an inactive pump is a silent no-op.
    pub fn stop_insulin_delivery(&self) -> Result<()> {
        self.lock().stop("[PUMP] Insulin delivery stopped manually.");
        Ok(())
    }

    pub fn resume_insulin_delivery(&self) -> Result<()> {
        self.lock().resume()
    }

    pub fn delivery_state(&self) -> DeliveryState {
        self.lock().state
    }

    pub fn is_delivery_active(&self) -> bool {
        self.lock().insulin_delivery_active
    }

    pub fn set_current_glucose_level(&self, level: f32) {
        self.lock().set_glucose(level);
    }

    pub fn current_glucose_level(&self) -> f32 {
        self.lock().current_glucose
    }

    // ── Insulin on board ─────────────────────────────────────────────────────

    pub fn set_insulin_on_board(&self, units: f32) {
        self.lock().set_iob(units);
    }

    pub fn insulin_on_board(&self) -> f32 {
        self.lock().insulin_on_board
    }

    /// Scheduler hook: linear IOB decay, floored at zero. Any cadence works.
    pub fn on_tick(&self) {
        let mut g = self.lock();
        let decayed = g.insulin_on_board - g.iob.decay_per_tick;
        g.insulin_on_board = decayed.max(0.0);
    }

    // ── Boluses ──────────────────────────────────────────────────────────────

    pub fn deliver(&self, request: BolusRequest) -> Result<BolusReceipt> {
        self.lock().deliver(request)
    }

    pub fn deliver_bolus(&self, glucose_level: f32, carb_intake: f32) -> Result<BolusReceipt> {
        self.deliver(BolusRequest::standard(glucose_level, carb_intake))
    }

    pub fn deliver_quick_bolus(
        &self,
        glucose_level: f32,
        duration_minutes: i32,
    ) -> Result<BolusReceipt> {
        self.deliver(BolusRequest::quick(glucose_level, duration_minutes))
    }

    pub fn deliver_extended_bolus(
        &self,
        glucose_level: f32,
        duration_minutes: i32,
    ) -> Result<BolusReceipt> {
        self.deliver(BolusRequest::extended(glucose_level, duration_minutes))
    }

    pub fn pause_bolus(&self) -> BolusOutcome {
        self.lock().pause_bolus()
    }

    pub fn resume_bolus(&self) -> BolusOutcome {
        self.lock().resume_bolus()
    }

    pub fn cancel_bolus(&self) -> BolusOutcome {
        self.lock().cancel_bolus()
    }

    /// Snapshot of the most recent bolus, if any.
    pub fn current_bolus(&self) -> Option<Bolus> {
        self.lock().bolus.clone()
    }

    // ── Power, telemetry and alerts ──────────────────────────────────────────

    pub fn power_on(&self) {
        self.lock().power_on();
    }

    pub fn power_off(&self) {
        self.lock().power_off();
    }

    pub fn is_powered(&self) -> bool {
        self.lock().powered
    }

    /// 0 when no telemetry source is attached.
    pub fn battery_level(&self) -> f32 {
        self.lock()
            .telemetry
            .as_ref()
            .map(|t| t.battery_level())
            .unwrap_or(0.0)
    }

    pub fn is_charging(&self) -> bool {
        self.lock()
            .telemetry
            .as_ref()
            .is_some_and(|t| t.is_charging())
    }

    /// Reservoir units; 0 when no telemetry source is attached.
    pub fn insulin_dose_remaining(&self) -> u32 {
        self.lock()
            .telemetry
            .as_ref()
            .map(|t| t.insulin_remaining())
            .unwrap_or(0)
    }

    pub fn trigger_cgm_alert(&self) {
        self.lock().cgm_alert();
    }

    pub fn occlusion_alert(&self) {
        self.lock().occlusion_alert();
    }

    pub fn handle_low_battery(&self, level: f32) {
        self.lock().low_battery(level);
    }

    pub fn handle_critical_battery(&self, level: f32) {
        self.lock().critical_battery(level);
    }

    pub fn handle_low_insulin(&self, remaining: u32) {
        self.lock().low_insulin(remaining);
    }

    /// Stop delivery, cancel any live bolus, power off. Safe to repeat.
    pub fn emergency_shutdown(&self) {
        self.lock().emergency_shutdown();
    }

    /// Read the attached telemetry source once and dispatch every alert it implies.
    pub fn poll_telemetry(&self) {
        self.lock().poll_telemetry();
    }
}

impl Inner {
    fn update_log(&self, line: &str) {
        self.log.append_text(line);
    }

    fn emit(&mut self, event: PumpEvent) {
        self.events.emit(event);
    }

    /// Apply a state change; no-op transitions neither log nor notify.
    fn transition(&mut self, to: DeliveryState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        self.insulin_delivery_active = to.delivers();
        tracing::info!(%from, %to, "delivery state changed");
        self.update_log(&format!(
            "[STATE] Insulin delivery state changed: {from} -> {to}"
        ));
        self.emit(PumpEvent::StateChanged { from, to });
    }

    fn start(&mut self) -> Result<()> {
        if !self.powered {
            self.update_log("[Error] Cannot start insulin delivery: pump is powered off.");
            return Err(PumpError::PoweredOff);
        }
        if self.store.active().is_none() {
            let e = PumpError::NoProfile;
            self.update_log(&format!("[Error] Cannot start insulin delivery: {e}"));
            return Err(e);
        }
        if self.current_glucose < self.safety.suspend_below {
            let e = PumpError::GlucoseTooLow(self.current_glucose);
            tracing::warn!(glucose = self.current_glucose, "start refused; suspending");
            self.update_log(&format!("[Alert] Cannot start insulin delivery: {e}"));
            self.transition(DeliveryState::Suspended);
            return Err(e);
        }
        self.update_log("[Pump] Insulin delivery started.");
        self.transition(DeliveryState::Active);
        Ok(())
    }

    /// Disable delivery; every state but Inactive lands in Paused.
    fn stop(&mut self, reason: &str) {
        if self.state == DeliveryState::Inactive {
            tracing::debug!("stop ignored: delivery already inactive");
            return;
        }
        self.insulin_delivery_active = false;
        if self.state == DeliveryState::Active {
            self.update_log(reason);
        }
        self.transition(DeliveryState::Paused);
    }

    fn resume(&mut self) -> Result<()> {
        if !self.powered {
            self.update_log("[Error] Cannot resume insulin delivery: pump is powered off.");
            return Err(PumpError::PoweredOff);
        }
        if self.store.active().is_none() {
            let e = PumpError::NoProfile;
            self.update_log(&format!("[Error] Cannot resume insulin delivery: {e}"));
            return Err(e);
        }
        match self.state {
            DeliveryState::Paused => {}
            DeliveryState::Suspended => {
                if self.current_glucose < self.safety.resume_at_or_above {
                    let e = PumpError::GlucoseStillLow(self.current_glucose);
                    self.update_log(&format!("[Alert] Cannot resume insulin delivery: {e}"));
                    return Err(e);
                }
            }
            DeliveryState::Inactive | DeliveryState::Active => {
                let e = PumpError::NotPausedOrSuspended;
                self.update_log(&format!("[Info] {e}"));
                return Err(e);
            }
        }
        self.update_log("[PUMP] Insulin delivery resumed.");
        self.transition(DeliveryState::Active);
        Ok(())
    }

    fn set_glucose(&mut self, level: f32) {
        // Non-finite readings are dropped; the last trusted one stays in force.
        if !level.is_finite() {
            tracing::warn!(reading = %level, "ignoring non-finite glucose reading");
            self.update_log(&format!("[CGM] Ignoring invalid glucose reading: {level}"));
            return;
        }
        let old = self.current_glucose;
        self.current_glucose = level;
        self.update_log(&format!("[CGM] Glucose level updated: {level} mg/dL"));
        if (old - level).abs() > self.safety.delta_trigger {
            self.check_glucose_safety();
        }
    }

    fn check_glucose_safety(&mut self) {
        if self.state == DeliveryState::Active && self.current_glucose < self.safety.suspend_below
        {
            tracing::warn!(
                glucose = self.current_glucose,
                "automatic suspend: glucose below threshold"
            );
            self.update_log(
                "[Alert] Insulin delivery automatically suspended due to low glucose level.",
            );
            self.transition(DeliveryState::Suspended);
            self.cgm_alert();
        }
    }

    fn set_iob(&mut self, units: f32) {
        self.insulin_on_board = clamp_iob(units);
    }

    fn next_bolus_id(&mut self, kind: BolusKind) -> String {
        self.bolus_seq += 1;
        let ms = self.clock.ms_since(self.epoch);
        format!("{}-{}-{}", kind.id_prefix(), ms, self.bolus_seq)
    }

    fn fail_bolus<T>(&mut self, kind: BolusKind, e: PumpError) -> Result<T> {
        tracing::warn!(?kind, error = %e, "bolus delivery failed");
        self.update_log(&format!("[Bolus] Cannot deliver {} bolus: {e}", kind_label(kind)));
        self.emit(PumpEvent::BolusDeliveryFailed {
            reason: e.to_string(),
        });
        Err(e)
    }

    fn deliver(&mut self, req: BolusRequest) -> Result<BolusReceipt> {
        let kind = req.kind;
        if !self.powered {
            return self.fail_bolus(kind, PumpError::PoweredOff);
        }
        if !self.insulin_delivery_active {
            return self.fail_bolus(kind, PumpError::DeliveryNotActive);
        }
        if self.store.active().is_none() {
            return self.fail_bolus(kind, PumpError::NoProfile);
        }

        let id = self.next_bolus_id(kind);
        let carbs = match kind {
            BolusKind::Standard => req.carb_intake,
            BolusKind::Quick | BolusKind::Extended => 0.0,
        };
        let inputs = DoseInputs {
            glucose_level: req.glucose_level,
            carb_intake: carbs,
            insulin_on_board: req.insulin_on_board.map_or(self.insulin_on_board, clamp_iob),
            correction_factor_override: req.correction_factor_override,
        };
        let mut bolus = Bolus::new(id.clone(), kind, inputs);
        if kind == BolusKind::Extended {
            bolus.set_extended_duration(req.duration_minutes / 60);
        }

        let calc = bolus.calculate(self.store.active());
        let breakdown = match calc {
            Ok(b) => b,
            Err(e) => return self.fail_bolus(kind, e),
        };
        self.update_log(&format!(
            "[Bolus] Calculated bolus dose: {} units",
            breakdown.final_dose
        ));

        let extended = bolus.extended();
        let units = match kind {
            BolusKind::Standard => breakdown.final_dose,
            BolusKind::Quick => bolus.quick_units(),
            BolusKind::Extended => extended.map(|x| x.dose).unwrap_or(0.0),
        };
        // A fresh bolus is Paused; a confirmed delivery activates it explicitly.
        bolus.activate()?;

        match (kind, extended) {
            (BolusKind::Extended, Some(x)) => {
                if x.defaulted_duration {
                    self.update_log(
                        "[Warning] Invalid extended bolus time. Defaulting to 1 hour.",
                    );
                }
                self.update_log(&format!(
                    "[Bolus] Extended bolus: {} units scheduled over {} hours ({} units/hour)",
                    x.dose, x.duration_hours, x.hourly_rate
                ));
            }
            (BolusKind::Quick, _) => {
                self.update_log(&format!("[Bolus] Quick bolus delivered: {units} units"));
            }
            _ => {
                self.update_log(&format!("[Bolus] Bolus delivery confirmed: {units} units"));
            }
        }
        tracing::info!(bolus = %id, ?kind, units, "bolus delivered");

        self.bolus = Some(bolus);
        self.emit(PumpEvent::BolusDelivered {
            id: id.clone(),
            kind,
            units,
        });
        Ok(BolusReceipt {
            id,
            kind,
            breakdown,
            units,
            extended,
        })
    }

    fn bolus_outcome(&mut self, outcome: BolusOutcome, verb: &str) -> BolusOutcome {
        match outcome {
            BolusOutcome::Changed { from, to } => {
                let id = self
                    .bolus
                    .as_ref()
                    .map(|b| b.id().to_string())
                    .unwrap_or_default();
                self.update_log(&format!("[Bolus] Bolus delivery {verb}."));
                self.emit(PumpEvent::BolusStateChanged { id, from, to });
            }
            BolusOutcome::Unchanged(notice) => {
                self.update_log(&format!("[Bolus] Nothing to do: {notice}."));
            }
        }
        outcome
    }

    fn pause_bolus(&mut self) -> BolusOutcome {
        let outcome = match self.bolus.as_mut() {
            None => BolusOutcome::Unchanged(BolusNotice::NoBolus),
            Some(b) => b.pause(),
        };
        self.bolus_outcome(outcome, "paused")
    }

    fn resume_bolus(&mut self) -> BolusOutcome {
        let delivering = self.insulin_delivery_active;
        let outcome = match self.bolus.as_mut() {
            None => BolusOutcome::Unchanged(BolusNotice::NoBolus),
            Some(b) if b.state() == BolusState::Canceled => {
                BolusOutcome::Unchanged(BolusNotice::AlreadyCanceled)
            }
            Some(_) if !delivering => BolusOutcome::Unchanged(BolusNotice::DeliveryNotActive),
            Some(b) => b.resume(),
        };
        self.bolus_outcome(outcome, "resumed")
    }

    fn cancel_bolus(&mut self) -> BolusOutcome {
        let outcome = match self.bolus.as_mut() {
            None => BolusOutcome::Unchanged(BolusNotice::NoBolus),
            Some(b) => b.cancel(),
        };
        self.bolus_outcome(outcome, "canceled")
    }

    fn power_on(&mut self) {
        if !self.powered {
            self.powered = true;
            self.emit(PumpEvent::PowerChanged(true));
        }
        self.update_log("Pump powered on.");
    }

    fn power_off(&mut self) {
        self.stop("[PUMP] Insulin delivery stopped for power off.");
        if self.powered {
            self.powered = false;
            self.emit(PumpEvent::PowerChanged(false));
        }
        self.update_log("Pump powered off.");
    }

    fn cgm_alert(&mut self) {
        // An automatic suspend already halted delivery and must keep its resume gate.
        if self.state == DeliveryState::Suspended {
            self.insulin_delivery_active = false;
        } else {
            self.stop("[PUMP] Insulin delivery stopped by CGM alert.");
        }
        self.update_log("[Alert] CGM Alert triggered!");
        self.emit(PumpEvent::Alert(Alert::Cgm));
    }

    fn occlusion_alert(&mut self) {
        tracing::warn!("occlusion detected");
        self.stop("[PUMP] Insulin delivery stopped by occlusion alert.");
        self.update_log("[Alert] Occlusion Alert triggered! Insulin delivery stopped.");
        self.emit(PumpEvent::Alert(Alert::Occlusion));
    }

    fn low_battery(&mut self, level: f32) {
        self.update_log(&format!("[Alert] Low battery warning: {level}% remaining"));
        self.emit(PumpEvent::Alert(Alert::LowBattery(level)));
    }

    fn critical_battery(&mut self, level: f32) {
        tracing::warn!(level, "critical battery");
        self.update_log(&format!("[Alert] CRITICAL BATTERY WARNING: {level}% remaining"));
        self.update_log("[System] Please connect charger immediately to prevent shutdown");
        self.emit(PumpEvent::Alert(Alert::CriticalBattery(level)));
    }

    fn low_insulin(&mut self, remaining: u32) {
        self.update_log(&format!(
            "[Alert] Low insulin warning: {remaining} units remaining"
        ));
        self.emit(PumpEvent::Alert(Alert::LowInsulin(remaining)));
    }

    fn emergency_shutdown(&mut self) {
        tracing::error!("emergency shutdown");
        self.update_log("[System] Emergency shutdown initiated");
        self.emit(PumpEvent::Alert(Alert::EmergencyShutdown));
        self.stop("[PUMP] Insulin delivery stopped for emergency shutdown.");
        let live_bolus = self
            .bolus
            .as_ref()
            .is_some_and(|b| b.state() != BolusState::Canceled);
        if live_bolus {
            self.cancel_bolus();
        }
        self.power_off();
    }

    fn poll_telemetry(&mut self) {
        let Some(t) = self.telemetry.clone() else {
            return;
        };
        self.set_iob(t.insulin_on_board());
        self.set_glucose(t.glucose_level());
        if t.occlusion_detected() {
            self.occlusion_alert();
        }
        let remaining = t.insulin_remaining();
        if remaining < self.alerts.low_insulin_units {
            self.low_insulin(remaining);
        }
        let battery = t.battery_level();
        if battery <= self.alerts.critical_battery_pct {
            self.critical_battery(battery);
            if !t.is_charging() {
                self.emergency_shutdown();
            }
        } else if battery < self.alerts.low_battery_pct {
            self.low_battery(battery);
        }
    }
}

/// IOB is never negative; non-finite input counts as none on board.
fn clamp_iob(units: f32) -> f32 {
    if units.is_finite() { units.max(0.0) } else { 0.0 }
}

fn kind_label(kind: BolusKind) -> &'static str {
    match kind {
        BolusKind::Standard => "standard",
        BolusKind::Quick => "quick",
        BolusKind::Extended => "extended",
    }
}
