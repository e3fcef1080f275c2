//! A single bolus request and its own Active/Paused/Canceled sub-state.

use std::fmt;

use crate::dose::{DoseBreakdown, DoseInputs, ExtendedSplit, calculate_dose};
use crate::error::{PumpError, Result};
use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BolusState {
    Active,
    Paused,
    /// Terminal.
    Canceled,
}

impl fmt::Display for BolusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BolusState::Active => "ACTIVE",
            BolusState::Paused => "PAUSED",
            BolusState::Canceled => "CANCELED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BolusKind {
    Standard,
    Quick,
    Extended,
}

impl BolusKind {
    pub fn id_prefix(self) -> &'static str {
        match self {
            BolusKind::Standard => "Bolus",
            BolusKind::Quick => "QuickBolus",
            BolusKind::Extended => "ExtBolus",
        }
    }
}

/// Why a pause/resume/cancel request left the bolus untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BolusNotice {
    NoBolus,
    AlreadyActive,
    AlreadyPaused,
    AlreadyCanceled,
    DeliveryNotActive,
}

impl fmt::Display for BolusNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BolusNotice::NoBolus => "no bolus in progress",
            BolusNotice::AlreadyActive => "bolus is already active",
            BolusNotice::AlreadyPaused => "bolus is already paused",
            BolusNotice::AlreadyCanceled => "bolus has been canceled",
            BolusNotice::DeliveryNotActive => "insulin delivery not active",
        })
    }
}

/// Result of a bolus sub-state command. Neither variant is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BolusOutcome {
    Changed { from: BolusState, to: BolusState },
    Unchanged(BolusNotice),
}

impl BolusOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, BolusOutcome::Changed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bolus {
    id: String,
    kind: BolusKind,
    inputs: DoseInputs,
    appropriate_dose: f32,
    breakdown: Option<DoseBreakdown>,
    extended_duration_hours: i32,
    state: BolusState,
}

impl Bolus {
    /// New bolus in the `Paused` sub-state with no dose computed yet.
    pub fn new(id: impl Into<String>, kind: BolusKind, inputs: DoseInputs) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs,
            appropriate_dose: 0.0,
            breakdown: None,
            extended_duration_hours: 0,
            state: BolusState::Paused,
        }
    }

    /// Run the dose calculation against `profile`. On failure the dose is 0.
    pub fn calculate(&mut self, profile: Option<&Profile>) -> Result<DoseBreakdown> {
        match calculate_dose(&self.inputs, profile) {
            Ok(b) => {
                self.appropriate_dose = b.final_dose;
                self.breakdown = Some(b);
                Ok(b)
            }
            Err(e) => {
                self.appropriate_dose = 0.0;
                self.breakdown = None;
                Err(e)
            }
        }
    }

    /// Units delivered immediately for a quick bolus (0 before calculation).
    pub fn quick_units(&self) -> f32 {
        self.breakdown.map(|b| b.quick_split()).unwrap_or(0.0)
    }

    pub fn set_extended_duration(&mut self, hours: i32) {
        self.extended_duration_hours = hours;
    }

    /// Extended split for the stored duration, if the dose has been calculated.
    pub fn extended(&self) -> Option<ExtendedSplit> {
        self.breakdown
            .map(|b| b.extended_split(self.extended_duration_hours))
    }

    /// Explicit activation step; refused once canceled.
    pub fn activate(&mut self) -> Result<BolusOutcome> {
        match self.state {
            BolusState::Canceled => Err(PumpError::AlreadyCanceled(self.id.clone())),
            BolusState::Active => Ok(BolusOutcome::Unchanged(BolusNotice::AlreadyActive)),
            BolusState::Paused => Ok(self.transition(BolusState::Active)),
        }
    }

    pub fn pause(&mut self) -> BolusOutcome {
        match self.state {
            BolusState::Active => self.transition(BolusState::Paused),
            BolusState::Paused => BolusOutcome::Unchanged(BolusNotice::AlreadyPaused),
            BolusState::Canceled => BolusOutcome::Unchanged(BolusNotice::AlreadyCanceled),
        }
    }

    pub fn resume(&mut self) -> BolusOutcome {
        match self.state {
            BolusState::Paused => self.transition(BolusState::Active),
            BolusState::Active => BolusOutcome::Unchanged(BolusNotice::AlreadyActive),
            BolusState::Canceled => BolusOutcome::Unchanged(BolusNotice::AlreadyCanceled),
        }
    }

    pub fn cancel(&mut self) -> BolusOutcome {
        match self.state {
            BolusState::Canceled => BolusOutcome::Unchanged(BolusNotice::AlreadyCanceled),
            BolusState::Active | BolusState::Paused => self.transition(BolusState::Canceled),
        }
    }

    fn transition(&mut self, to: BolusState) -> BolusOutcome {
        let from = self.state;
        self.state = to;
        tracing::debug!(bolus = %self.id, %from, %to, "bolus state changed");
        BolusOutcome::Changed { from, to }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn kind(&self) -> BolusKind {
        self.kind
    }
    pub fn state(&self) -> BolusState {
        self.state
    }
    pub fn glucose_level(&self) -> f32 {
        self.inputs.glucose_level
    }
    pub fn carb_intake(&self) -> f32 {
        self.inputs.carb_intake
    }
    pub fn insulin_on_board(&self) -> f32 {
        self.inputs.insulin_on_board
    }
    pub fn correction_factor_override(&self) -> Option<f32> {
        self.inputs.correction_factor_override
    }
    pub fn extended_duration_hours(&self) -> i32 {
        self.extended_duration_hours
    }
    pub fn appropriate_dose(&self) -> f32 {
        self.appropriate_dose
    }
    pub fn breakdown(&self) -> Option<DoseBreakdown> {
        self.breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bolus() -> Bolus {
        Bolus::new("Bolus-1", BolusKind::Standard, DoseInputs::default())
    }

    #[test]
    fn starts_paused() {
        assert_eq!(bolus().state(), BolusState::Paused);
    }

    #[test]
    fn cancel_is_terminal() {
        let mut b = bolus();
        assert!(b.cancel().changed());
        assert_eq!(b.pause(), BolusOutcome::Unchanged(BolusNotice::AlreadyCanceled));
        assert_eq!(b.resume(), BolusOutcome::Unchanged(BolusNotice::AlreadyCanceled));
        assert_eq!(b.cancel(), BolusOutcome::Unchanged(BolusNotice::AlreadyCanceled));
        assert!(matches!(b.activate(), Err(PumpError::AlreadyCanceled(_))));
        assert_eq!(b.state(), BolusState::Canceled);
    }

    #[test]
    fn pause_resume_cycle() {
        let mut b = bolus();
        assert_eq!(b.pause(), BolusOutcome::Unchanged(BolusNotice::AlreadyPaused));
        assert_eq!(
            b.resume(),
            BolusOutcome::Changed {
                from: BolusState::Paused,
                to: BolusState::Active
            }
        );
        assert_eq!(b.resume(), BolusOutcome::Unchanged(BolusNotice::AlreadyActive));
        assert!(b.pause().changed());
        assert_eq!(b.state(), BolusState::Paused);
    }

    #[test]
    fn failed_calculation_zeroes_dose() {
        let mut b = Bolus::new(
            "Bolus-2",
            BolusKind::Standard,
            DoseInputs {
                glucose_level: 200.0,
                carb_intake: 30.0,
                ..DoseInputs::default()
            },
        );
        assert!(b.calculate(None).is_err());
        assert_eq!(b.appropriate_dose(), 0.0);
        assert_eq!(b.quick_units(), 0.0);
        assert!(b.extended().is_none());
    }
}
