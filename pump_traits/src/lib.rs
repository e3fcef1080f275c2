//! Collaborator interfaces consumed by the pump control core.
//!
//! The core never owns a battery simulator, a glucose sensor or a log window;
//! it only talks to them through the traits below.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Live device telemetry supplied by the surrounding device simulation.
///
/// Implementations are polled; none of these calls may block.
pub trait TelemetrySource {
    /// Battery charge in percent, `0.0..=100.0`.
    fn battery_level(&self) -> f32;
    fn is_charging(&self) -> bool;
    fn occlusion_detected(&self) -> bool;
    /// Latest CGM reading in mg/dL.
    fn glucose_level(&self) -> f32;
    /// Insulin already active in the body, in units.
    fn insulin_on_board(&self) -> f32;
    /// Units left in the reservoir.
    fn insulin_remaining(&self) -> u32;
}

/// Append-only text log. Fire-and-forget: failures are the sink's problem.
pub trait LogSink {
    fn append_text(&self, message: &str);
}

impl<T: LogSink + ?Sized> LogSink for std::sync::Arc<T> {
    fn append_text(&self, message: &str) {
        (**self).append_text(message);
    }
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for std::sync::Arc<T> {
    fn battery_level(&self) -> f32 {
        (**self).battery_level()
    }
    fn is_charging(&self) -> bool {
        (**self).is_charging()
    }
    fn occlusion_detected(&self) -> bool {
        (**self).occlusion_detected()
    }
    fn glucose_level(&self) -> f32 {
        (**self).glucose_level()
    }
    fn insulin_on_board(&self) -> f32 {
        (**self).insulin_on_board()
    }
    fn insulin_remaining(&self) -> u32 {
        (**self).insulin_remaining()
    }
}
