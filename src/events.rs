// EventBus: broadcast channel fan-out for pipeline events
//
// The dispatch path is a synchronous callback list; this bus is the
// channel-shaped alternative for consumers that poll from their own loop
// (the game loop, the diagnostic CLI, a recorder). Clone a sender into a
// callback and any number of subscribers can follow along.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::listener::RawEvent;
use crate::resolver::ResolvedNote;

/// Manages broadcast channels for raw and resolved events
///
/// Channels are created lazily via the init_* methods; subscribing before
/// init returns None. Each subscriber gets an independent receiver and
/// must keep up with the event rate or it will lag (old events drop).
pub struct EventBus {
    raw: Arc<Mutex<Option<broadcast::Sender<RawEvent>>>>,
    resolved: Arc<Mutex<Option<broadcast::Sender<ResolvedNote>>>>,
}

impl EventBus {
    /// Create a bus with no channels initialized
    pub fn new() -> Self {
        Self {
            raw: Arc::new(Mutex::new(None)),
            resolved: Arc::new(Mutex::new(None)),
        }
    }

    /// Initialize the raw-event channel
    ///
    /// Returns the sender to clone into a listener callback. Buffer size
    /// 100 events, plenty for burst traffic at wire-line rates.
    pub fn init_raw(&self) -> broadcast::Sender<RawEvent> {
        let (tx, _) = broadcast::channel(100);
        *self.raw.lock().unwrap() = Some(tx.clone());
        tx
    }

    /// Subscribe to raw events
    ///
    /// Returns None if init_raw() has not been called yet.
    pub fn subscribe_raw(&self) -> Option<broadcast::Receiver<RawEvent>> {
        self.raw.lock().unwrap().as_ref().map(|tx| tx.subscribe())
    }

    /// Initialize the resolved-note channel
    ///
    /// Returns the sender to clone into the resolver's game callback.
    pub fn init_resolved(&self) -> broadcast::Sender<ResolvedNote> {
        let (tx, _) = broadcast::channel(100);
        *self.resolved.lock().unwrap() = Some(tx.clone());
        tx
    }

    /// Subscribe to resolved notes
    ///
    /// Returns None if init_resolved() has not been called yet.
    pub fn subscribe_resolved(&self) -> Option<broadcast::Receiver<ResolvedNote>> {
        self.resolved
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.subscribe())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
