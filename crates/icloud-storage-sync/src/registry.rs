//! Channel → subscription registry.
//!
//! A [`WatchRegistry`] maps channel names to live subscriptions. Each
//! subscription pairs the subscriber's event sink with an optional
//! cancellation hook supplied by the operation that feeds the channel.
//!
//! ## Lifecycle
//!
//! ```text
//! register ──► attach ──► emit* ──► complete | fail    (terminal, sink closed)
//!     │           │
//!     └───────────┴──────► unregister | EventStream dropped   (cancelled)
//! ```
//!
//! Terminal signals are sent only by whoever removes the entry from the map,
//! so a channel sees at most one of them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use icloud_storage_core::domain::{Channel, ChannelEvent, StorageError};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Callback invoked when a subscription is torn down
pub type CancelHook = Box<dyn FnOnce() + Send + Sync>;

// ============================================================================
// Watch
// ============================================================================

struct Watch {
    /// Generation of this registration, unique per registry
    id: u64,
    sink: mpsc::UnboundedSender<ChannelEvent>,
    on_cancel: Option<CancelHook>,
}

impl Watch {
    fn run_hook(self) {
        if let Some(hook) = self.on_cancel {
            hook();
        }
    }
}

// ============================================================================
// WatchRegistry
// ============================================================================

/// Concurrent registry of channel subscriptions
///
/// Cloning is cheap; clones share the same map.
#[derive(Clone, Default)]
pub struct WatchRegistry {
    watches: Arc<DashMap<String, Watch>>,
    next_id: Arc<AtomicU64>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `channel` and returns the subscriber side of it
    ///
    /// # Errors
    /// Returns `StorageError::DuplicateChannel` if the name is already registered.
    pub fn register(&self, channel: &Channel) -> Result<EventStream, StorageError> {
        match self.watches.entry(channel.as_str().to_string()) {
            Entry::Occupied(_) => Err(StorageError::DuplicateChannel(channel.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (sink, events) = mpsc::unbounded_channel();
                slot.insert(Watch {
                    id,
                    sink,
                    on_cancel: None,
                });
                info!(channel = %channel, "Channel registered");
                Ok(EventStream {
                    channel: channel.clone(),
                    id,
                    events,
                    registry: self.clone(),
                })
            }
        }
    }

    /// Binds an operation to a registered channel
    ///
    /// `on_cancel` runs once when the subscription is torn down, whichever
    /// way that happens. The returned [`ChannelSink`] only ever addresses this
    /// registration, never a later one reusing the same name.
    ///
    /// # Errors
    /// - `StorageError::ChannelNotFound` if the channel is not registered
    /// - `StorageError::DuplicateChannel` if another operation is attached
    pub fn attach(
        &self,
        channel: &Channel,
        on_cancel: impl FnOnce() + Send + Sync + 'static,
    ) -> Result<ChannelSink, StorageError> {
        let Some(mut watch) = self.watches.get_mut(channel.as_str()) else {
            return Err(StorageError::ChannelNotFound(channel.to_string()));
        };
        if watch.on_cancel.is_some() {
            return Err(StorageError::DuplicateChannel(format!(
                "{channel} is already in use by another operation"
            )));
        }
        watch.on_cancel = Some(Box::new(on_cancel));
        debug!(channel = %channel, "Operation attached to channel");

        Ok(ChannelSink {
            registry: self.clone(),
            channel: channel.clone(),
            id: watch.id,
        })
    }

    /// Returns true if `channel` is registered
    pub fn contains(&self, channel: &Channel) -> bool {
        self.watches.contains_key(channel.as_str())
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Delivers a non-terminal event; returns false if nothing was listening
    pub fn emit(&self, channel: &Channel, event: ChannelEvent) -> bool {
        self.emit_to(channel, None, event)
    }

    /// Sends `EndOfStream` and tears the channel down
    ///
    /// Returns false if the channel was not registered.
    pub fn complete(&self, channel: &Channel) -> bool {
        self.finish(channel, None, ChannelEvent::EndOfStream)
    }

    /// Sends `error` as the terminal event and tears the channel down
    ///
    /// Returns false if the channel was not registered.
    pub fn fail(&self, channel: &Channel, error: StorageError) -> bool {
        self.finish(channel, None, ChannelEvent::Error(error))
    }

    /// Tears the channel down without a terminal event. Idempotent.
    pub fn unregister(&self, channel: &Channel) {
        if let Some((_, watch)) = self.watches.remove(channel.as_str()) {
            info!(channel = %channel, "Channel unregistered");
            watch.run_hook();
        }
    }

    // ------------------------------------------------------------------------
    // Generation-scoped helpers
    // ------------------------------------------------------------------------

    fn remove(&self, channel: &Channel, id: Option<u64>) -> Option<Watch> {
        self.watches
            .remove_if(channel.as_str(), |_, watch| id.map_or(true, |id| watch.id == id))
            .map(|(_, watch)| watch)
    }

    fn emit_to(&self, channel: &Channel, id: Option<u64>, event: ChannelEvent) -> bool {
        debug_assert!(!event.is_terminal());
        match self.watches.get(channel.as_str()) {
            Some(watch) if id.map_or(true, |id| watch.id == id) => watch.sink.send(event).is_ok(),
            _ => {
                debug!(channel = %channel, "Dropping event for unregistered channel");
                false
            }
        }
    }

    fn finish(&self, channel: &Channel, id: Option<u64>, terminal: ChannelEvent) -> bool {
        let Some(watch) = self.remove(channel, id) else {
            return false;
        };
        info!(channel = %channel, event = ?terminal, "Channel finished");
        let _ = watch.sink.send(terminal);
        watch.run_hook();
        true
    }
}

impl fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("channels", &self.watches.len())
            .finish()
    }
}

// ============================================================================
// ChannelSink
// ============================================================================

/// Producer side of one channel registration
///
/// Held by the monitor feeding the channel. Every method is a silent no-op
/// once the registration is gone.
#[derive(Clone)]
pub struct ChannelSink {
    registry: WatchRegistry,
    channel: Channel,
    id: u64,
}

impl ChannelSink {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns true while this registration is still live
    pub fn is_open(&self) -> bool {
        self.registry
            .watches
            .get(self.channel.as_str())
            .is_some_and(|watch| watch.id == self.id)
    }

    pub fn emit(&self, event: ChannelEvent) -> bool {
        self.registry.emit_to(&self.channel, Some(self.id), event)
    }

    pub fn complete(&self) -> bool {
        self.registry
            .finish(&self.channel, Some(self.id), ChannelEvent::EndOfStream)
    }

    pub fn fail(&self, error: StorageError) -> bool {
        self.registry
            .finish(&self.channel, Some(self.id), ChannelEvent::Error(error))
    }
}

impl fmt::Debug for ChannelSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSink")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Subscriber side of a channel
///
/// Yields events until the terminal one, then `None`. Dropping the stream
/// cancels the operation feeding it.
pub struct EventStream {
    channel: Channel,
    id: u64,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    registry: WatchRegistry,
}

impl EventStream {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Waits for the next event
    ///
    /// Cancel-safe.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Returns the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(watch) = self.registry.remove(&self.channel, Some(self.id)) {
            info!(channel = %self.channel, "Subscriber dropped, cancelling channel");
            watch.run_hook();
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}
