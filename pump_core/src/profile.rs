//! Dosing profile record and its parameter bounds.

use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{ParamViolation, PumpError, Result};

pub const BASAL_RATE_BOUNDS: RangeInclusive<f32> = 0.0..=30.0;
pub const CORRECTION_FACTOR_BOUNDS: RangeInclusive<f32> = 1.0..=400.0;
pub const CARB_RATIO_BOUNDS: RangeInclusive<f32> = 1.0..=150.0;
pub const TARGET_GLUCOSE_BOUNDS: RangeInclusive<f32> = 70.0..=180.0;

/// The four tunable dosing parameters of a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileParams {
    /// units/hour
    pub basal_rate: f32,
    /// CF: mg/dL lowered per unit
    pub correction_factor: f32,
    /// ICR: grams of carbohydrate per unit
    pub carb_ratio: f32,
    /// mg/dL
    pub target_glucose: f32,
}

impl ProfileParams {
    pub fn new(basal_rate: f32, correction_factor: f32, carb_ratio: f32, target_glucose: f32) -> Self {
        Self {
            basal_rate,
            correction_factor,
            carb_ratio,
            target_glucose,
        }
    }

    /// Check every field against its bounds, reporting the first violation.
    ///
    /// NaN fails every range check, so it is rejected like any other
    /// out-of-range value.
    pub fn validate(&self) -> Result<()> {
        match self.violations().into_iter().next() {
            Some(v) => Err(PumpError::InvalidParameter(v)),
            None => Ok(()),
        }
    }

    /// All bound violations, in field order.
    pub fn violations(&self) -> Vec<ParamViolation> {
        [
            ("basal_rate", BASAL_RATE_BOUNDS, self.basal_rate),
            (
                "correction_factor",
                CORRECTION_FACTOR_BOUNDS,
                self.correction_factor,
            ),
            ("carb_ratio", CARB_RATIO_BOUNDS, self.carb_ratio),
            ("target_glucose", TARGET_GLUCOSE_BOUNDS, self.target_glucose),
        ]
        .into_iter()
        .filter(|(_, bounds, value)| !bounds.contains(value))
        .map(|(field, bounds, value)| ParamViolation {
            field,
            min: *bounds.start(),
            max: *bounds.end(),
            value,
        })
        .collect()
    }
}

/// A named dosing configuration. Only the profile store hands these out.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    name: String,
    params: ProfileParams,
    /// Informational flag mirrored from the store's active pointer.
    pub(crate) is_active: bool,
}

impl Profile {
    pub(crate) fn new(name: String, params: ProfileParams) -> Self {
        Self {
            name,
            params,
            is_active: false,
        }
    }

    /// Build a profile without bounds checks. Only for exercising the
    /// calculator's corrupted-state guard; the store never produces one.
    #[doc(hidden)]
    pub fn unchecked(name: impl Into<String>, params: ProfileParams) -> Self {
        Self::new(name.into(), params)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn params(&self) -> ProfileParams {
        self.params
    }
    pub fn basal_rate(&self) -> f32 {
        self.params.basal_rate
    }
    pub fn correction_factor(&self) -> f32 {
        self.params.correction_factor
    }
    pub fn carb_ratio(&self) -> f32 {
        self.params.carb_ratio
    }
    pub fn target_glucose(&self) -> f32 {
        self.params.target_glucose
    }
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub(crate) fn set_params(&mut self, params: ProfileParams) {
        self.params = params;
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Profile [Mode: {}, Basal Rate: {}, Correction Factor: {}, Carbohydrates Ratio: {}, Target Glucose Levels: {}]",
            self.name,
            self.params.basal_rate,
            self.params.correction_factor,
            self.params.carb_ratio,
            self.params.target_glucose
        )
    }
}
