//! Change notifications from the controller to its consumers.
//!
//! The controller publishes [`ControllerEvent`]s to every subscriber over a
//! bounded crossbeam channel. Consumers hold a [`ControllerBridge`] and drain
//! it from their own event loop; delivery never blocks the controller.

use crate::pipeline::id::Generation;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Messages sent from the controller to field pickers and the preview panel.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The resolved field sets changed.
    FieldsChanged { generation: Generation },

    /// A CUSTOM stage could not be formatted; its last valid payload was kept.
    StageFormatFailed { index: usize, message: String },

    /// The schema of a resource has been resolved and installed.
    SchemaLoaded { resource: String },

    /// Resolving the root type of a resource failed.
    SchemaFailed { resource: String, message: String },

    /// The preview text changed.
    PreviewUpdated { text: String },
}

/// Channel capacity per subscriber.
/// Events are coarse (one per recomputation), so a full channel means the
/// consumer has stopped draining.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Consumer-side handle for controller events.
pub struct ControllerBridge {
    pub event_rx: Receiver<ControllerEvent>,
}

impl ControllerBridge {
    /// Drain all pending events.
    pub fn drain(&self) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Try to receive a single event without blocking.
    pub fn try_recv(&self) -> Option<ControllerEvent> {
        self.event_rx.try_recv().ok()
    }
}

/// Publisher side: the set of live subscriber channels.
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<Sender<ControllerEvent>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new consumer.
    pub fn subscribe(&mut self) -> ControllerBridge {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
        self.senders.push(tx);
        ControllerBridge { event_rx: rx }
    }

    /// Send to every subscriber, dropping the ones that hung up.
    pub fn publish(&mut self, event: ControllerEvent) {
        self.senders.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Subscriber channel full, dropping {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
