//! Bolus dose calculation.
//!
//! Pure functions of the request inputs and a profile snapshot:
//!
//! ```text
//! food       = carbs / ICR
//! correction = max((glucose - target) / CF, 0)
//! total      = food + correction
//! final      = max(total - IOB, 0)
//! ```
//!
//! CF is the per-request override when it is > 0, else the profile's.
//! No rounding happens here.

use crate::error::{PumpError, Result};
use crate::profile::Profile;

/// Share of the final dose delivered at once by a quick bolus.
pub const QUICK_FRACTION: f32 = 0.6;
/// Share of the final dose spread over time by an extended bolus.
pub const EXTENDED_FRACTION: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DoseInputs {
    /// mg/dL
    pub glucose_level: f32,
    /// grams
    pub carb_intake: f32,
    /// units
    pub insulin_on_board: f32,
    /// Takes effect only when > 0.
    pub correction_factor_override: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseBreakdown {
    pub food_bolus: f32,
    pub correction_bolus: f32,
    pub total_bolus: f32,
    pub insulin_on_board: f32,
    pub final_dose: f32,
    /// The correction factor actually used.
    pub effective_cf: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtendedSplit {
    pub dose: f32,
    pub duration_hours: u32,
    pub hourly_rate: f32,
    /// Requested duration was <= 0 and one hour was used instead.
    pub defaulted_duration: bool,
}

impl DoseBreakdown {
    /// Units delivered immediately by a quick bolus.
    pub fn quick_split(&self) -> f32 {
        QUICK_FRACTION * self.final_dose
    }

    /// Units and hourly rate of an extended bolus; non-positive durations become one hour.
    pub fn extended_split(&self, duration_hours: i32) -> ExtendedSplit {
        let dose = EXTENDED_FRACTION * self.final_dose;
        let (hours, defaulted) = if duration_hours <= 0 {
            tracing::warn!(
                requested_hours = duration_hours,
                "invalid extended bolus duration; defaulting to 1 hour"
            );
            (1_u32, true)
        } else {
            (duration_hours.unsigned_abs(), false)
        };
        ExtendedSplit {
            dose,
            duration_hours: hours,
            hourly_rate: dose / hours as f32,
            defaulted_duration: defaulted,
        }
    }
}

/// Compute the dose for one bolus request.
///
/// Fails with `NoProfile` when no profile is given and with `CorruptProfile`
/// when the profile carries non-positive ratios; the store's bounds make the
/// latter unreachable, so it is logged under its own target.
pub fn calculate_dose(inputs: &DoseInputs, profile: Option<&Profile>) -> Result<DoseBreakdown> {
    let Some(profile) = profile else {
        tracing::error!("no profile available; cannot calculate bolus");
        return Err(PumpError::NoProfile);
    };

    let icr = profile.carb_ratio();
    let target = profile.target_glucose();
    let profile_cf = profile.correction_factor();
    if !(icr > 0.0 && profile_cf > 0.0 && target > 0.0) {
        tracing::error!(
            target: "pump_core::invariant",
            profile = profile.name(),
            icr,
            cf = profile_cf,
            target_glucose = target,
            "profile invariant violated: ICR, CF and target must all be > 0"
        );
        return Err(PumpError::CorruptProfile(format!(
            "profile '{}' has ICR={icr}, CF={profile_cf}, target={target}",
            profile.name()
        )));
    }

    let cf = match inputs.correction_factor_override {
        Some(o) if o > 0.0 => o,
        _ => profile_cf,
    };

    let food_bolus = inputs.carb_intake / icr;
    let correction_bolus = ((inputs.glucose_level - target) / cf).max(0.0);
    let total_bolus = food_bolus + correction_bolus;
    let final_dose = (total_bolus - inputs.insulin_on_board).max(0.0);

    tracing::debug!(
        food_bolus,
        correction_bolus,
        iob = inputs.insulin_on_board,
        final_dose,
        "bolus calculation"
    );

    Ok(DoseBreakdown {
        food_bolus,
        correction_bolus,
        total_bolus,
        insulin_on_board: inputs.insulin_on_board,
        final_dose,
        effective_cf: cf,
    })
}
