//! Client-side publish rate limiter (§4.3).
//!
//! A `Slot` holds the latest raw publish payload received for a URL,
//! independent of whether that URL is also `Subscribe`d. A periodic task
//! sweeps all slots; any with fresh data gets its handler invoked once,
//! with the most recently arrived message, and the flag cleared.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::{sync::Notify, task::JoinHandle, time::Duration};
use vsoa_codec::message::Message;

pub type SlotHandler = Arc<dyn Fn(Message) + Send + Sync>;

struct Slot {
    handler: SlotHandler,
    latest: Mutex<Option<Message>>,
}

#[derive(Default)]
pub struct Regulator {
    slots: RwLock<std::collections::HashMap<String, Arc<Slot>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<Notify>,
}

impl Regulator {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(std::collections::HashMap::new()),
            task: Mutex::new(None),
            stop: Arc::new(Notify::new()),
        }
    }

    pub fn slot(&self, url: impl Into<String>, handler: SlotHandler) {
        self.slots.write().insert(
            url.into(),
            Arc::new(Slot {
                handler,
                latest: Mutex::new(None),
            }),
        );
    }

    pub fn unslot(&self, url: &str) {
        self.slots.write().remove(url);
    }

    /// Feed a publish into its slot, if one is registered for this URL.
    /// Called from the input loops regardless of `Subscribe` state (§4.3).
    pub fn feed(&self, url: &str, message: &Message) {
        if let Some(slot) = self.slots.read().get(url) {
            *slot.latest.lock() = Some(message.clone());
        }
    }

    pub fn start(self: &Arc<Self>, interval: Duration) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let this = self.clone();
        let stop = self.stop.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.sweep(),
                    _ = stop.notified() => break,
                }
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            self.stop.notify_one();
            task.abort();
        }
    }

    fn sweep(&self) {
        for slot in self.slots.read().values() {
            let latest = slot.latest.lock().take();
            if let Some(message) = latest {
                (slot.handler)(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vsoa_codec::message::{Header, MessageType};

    fn publish(url: &str) -> Message {
        Message::new(Header::new(MessageType::Publish), url)
    }

    #[test]
    fn feeding_an_unregistered_url_is_a_silent_no_op() {
        let regulator = Regulator::new();
        regulator.feed("/nobody/home", &publish("/nobody/home"));
    }

    #[test]
    fn feed_keeps_only_the_latest_value_until_swept() {
        let regulator = Regulator::new();
        regulator.slot("/s", Arc::new(|_| {}));
        regulator.feed("/s", &publish("/s"));
        regulator.feed("/s", &publish("/s"));
        assert!(regulator.slots.read().get("/s").unwrap().latest.lock().is_some());
    }

    #[tokio::test]
    async fn sweep_invokes_the_handler_with_the_latest_message_and_clears_the_slot() {
        let regulator = Arc::new(Regulator::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        regulator.slot(
            "/telemetry/speed",
            Arc::new(move |_msg| {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );

        regulator.feed("/telemetry/speed", &publish("/telemetry/speed"));
        regulator.feed("/telemetry/speed", &publish("/telemetry/speed"));

        regulator.start(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        regulator.stop();

        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert!(regulator.slots.read().get("/telemetry/speed").unwrap().latest.lock().is_none());
    }

    #[test]
    fn unslot_removes_the_handler() {
        let regulator = Regulator::new();
        regulator.slot("/s", Arc::new(|_| {}));
        regulator.unslot("/s");
        assert!(regulator.slots.read().get("/s").is_none());
    }
}
