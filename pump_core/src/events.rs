//! Notifications emitted by the delivery controller.
//!
//! Observers call `DeliveryController::subscribe` and drain the returned
//! receiver at their own pace. Senders are unbounded, so emitting never
//! blocks the controller's critical section.
use crossbeam_channel as xch;

use crate::bolus::{BolusKind, BolusState};
use crate::status::DeliveryState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alert {
    /// Low-glucose CGM alert; stops delivery.
    Cgm,
    /// Line occlusion; stops delivery.
    Occlusion,
    /// Battery percentage.
    LowBattery(f32),
    CriticalBattery(f32),
    /// Units left in the reservoir.
    LowInsulin(u32),
    EmergencyShutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PumpEvent {
    StateChanged {
        from: DeliveryState,
        to: DeliveryState,
    },
    Alert(Alert),
    BolusDelivered {
        id: String,
        kind: BolusKind,
        /// Units delivered (quick: immediate share; extended: scheduled share).
        units: f32,
    },
    BolusDeliveryFailed {
        reason: String,
    },
    BolusStateChanged {
        id: String,
        from: BolusState,
        to: BolusState,
    },
    PowerChanged(bool),
}

/// Fan-out of events to any number of channel subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<xch::Sender<PumpEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> xch::Receiver<PumpEvent> {
        let (tx, rx) = xch::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn emit(&mut self, event: PumpEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
