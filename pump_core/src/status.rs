//! Insulin delivery state of the pump.

use std::fmt;

/// Public delivery state. Closed set; every transition is matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryState {
    /// Not started since power on.
    #[default]
    Inactive,
    /// Delivering normally.
    Active,
    /// Stopped manually or by an alert.
    Paused,
    /// Halted automatically for safety (low glucose).
    Suspended,
}

impl DeliveryState {
    /// Whether insulin may flow in this state.
    pub fn delivers(self) -> bool {
        matches!(self, DeliveryState::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryState::Inactive => "INACTIVE",
            DeliveryState::Active => "ACTIVE",
            DeliveryState::Paused => "PAUSED",
            DeliveryState::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
