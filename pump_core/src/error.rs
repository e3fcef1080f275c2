use thiserror::Error;

/// Which profile field broke its bounds, the inclusive bounds, and the rejected value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamViolation {
    pub field: &'static str,
    pub min: f32,
    pub max: f32,
    pub value: f32,
}

impl std::fmt::Display for ParamViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} must be between {} and {} (got {})",
            self.field, self.min, self.max, self.value
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PumpError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(ParamViolation),
    #[error("profile name cannot be empty")]
    EmptyName,
    #[error("profile '{0}' already exists")]
    DuplicateName(String),
    #[error("profile '{0}' not found")]
    NotFound(String),
    #[error("cannot delete the currently active profile '{0}'")]
    CannotDeleteActive(String),
    #[error("no active profile selected")]
    NoProfile,
    #[error("current glucose level is too low ({0} mg/dL)")]
    GlucoseTooLow(f32),
    #[error("glucose level still too low to resume ({0} mg/dL)")]
    GlucoseStillLow(f32),
    #[error("insulin delivery is not paused or suspended")]
    NotPausedOrSuspended,
    #[error("insulin delivery not active")]
    DeliveryNotActive,
    #[error("bolus {0} has already been canceled")]
    AlreadyCanceled(String),
    #[error("corrupted profile state: {0}")]
    CorruptProfile(String),
    #[error("pump is powered off")]
    PoweredOff,
}

/// Rejected controller construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T, E = PumpError> = std::result::Result<T, E>;
