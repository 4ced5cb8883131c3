//! The publish trigger is a tagged sum type (§9 design note), not a runtime
//! type-switch: a publish path fires either on a fixed `Timer` interval or
//! whenever its `External` event source signals.

use std::time::Duration;

use tokio::sync::mpsc;

/// What makes a registered publish path fire a tick.
pub enum PublishTrigger {
    /// Fire every `Duration`, per §4.6's timer-triggered mode.
    Timer(Duration),
    /// Fire whenever a value arrives on this channel; `TriggerPublisher`
    /// (§6) sends the unit value here. Only a path registered this way may
    /// be manually triggered — see [`crate::Error::NotRawPublishUrl`].
    External(mpsc::Receiver<()>),
}

impl PublishTrigger {
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::External(_))
    }
}
