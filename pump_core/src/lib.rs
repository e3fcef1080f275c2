#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Insulin pump control core (device-agnostic).
//!
//! Everything that touches the outside world goes through
//! `pump_traits::TelemetrySource`, `pump_traits::LogSink` and `pump_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Profiles**: bounded dosing parameters and the single owner of them (`profile`, `store`)
//! - **Dosing**: pure bolus arithmetic, quick and extended splits (`dose`)
//! - **Boluses**: per-request Active/Paused/Canceled sub-state (`bolus`)
//! - **Delivery**: the safety state machine with glucose hysteresis (`controller`)
//! - **Notifications**: channel-based observer fan-out (`events`) and text logs (`logger`)
//! - **Configuration**: runtime thresholds (`config`) bridged from `pump_config` (`conversions`)
//!
//! ## Units
//!
//! Glucose in mg/dL, insulin in units, carbohydrates in grams, basal in units/hour.
//! Doses are never rounded.

pub mod bolus;
pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod dose;
pub mod error;
pub mod events;
pub mod logger;
pub mod mocks;
pub mod profile;
pub mod status;
pub mod store;

pub use bolus::{Bolus, BolusKind, BolusNotice, BolusOutcome, BolusState};
pub use builder::ControllerBuilder;
pub use config::{AlertCfg, IobCfg, SafetyCfg};
pub use controller::{BolusReceipt, BolusRequest, DeliveryController};
pub use dose::{DoseBreakdown, DoseInputs, ExtendedSplit, calculate_dose};
pub use error::{BuildError, ParamViolation, PumpError, Result};
pub use events::{Alert, PumpEvent};
pub use logger::{FileLogSink, MemoryLog, NullLogSink, TracingLogSink};
pub use profile::{Profile, ProfileParams};
pub use status::DeliveryState;
pub use store::ProfileStore;
