//! Events emitted by a subscription and their fan-out to listeners.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use push_messaging::{MessagingError, StatusReport};
use tokio::sync::mpsc;

use crate::error::SubscriptionError;

/// Underlying cause attached to an [`ErrorEvent`]
#[derive(Debug, Clone)]
pub enum ErrorDetail {
    /// A control-plane or local failure during renewal
    Request(Arc<SubscriptionError>),
    /// An error-flagged status report from the messaging service
    Status(StatusReport),
    /// An inbound payload that could not be decrypted
    Decrypt(Arc<MessagingError>),
}

/// Error surfaced to listeners because no caller is awaiting it
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Human-readable description
    pub message: String,
    /// What went wrong underneath
    pub detail: ErrorDetail,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>, detail: ErrorDetail) -> Self {
        Self {
            message: message.into(),
            detail,
        }
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Events delivered to subscription listeners.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// Decrypted notification payload
    Message(String),
    /// Asynchronous failure
    Error(ErrorEvent),
}

type Callback = Arc<dyn Fn(&SubscriptionEvent) + Send + Sync>;

#[derive(Clone)]
enum Listener {
    Channel(mpsc::UnboundedSender<SubscriptionEvent>),
    Callback(Callback),
}

/// Fan-out of subscription events to any number of listeners.
///
/// Listeners see events in emission order. Channel listeners whose receiver
/// was dropped are pruned on the next emission.
#[derive(Clone, Default)]
pub(crate) struct EventHub {
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl EventHub {
    pub(crate) fn add_callback(&self, callback: Callback) {
        self.listeners.lock().push(Listener::Callback(callback));
    }

    pub(crate) fn add_channel(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().push(Listener::Channel(tx));
        EventReceiver { rx }
    }

    pub(crate) fn emit(&self, event: SubscriptionEvent) {
        // Callbacks run outside the lock so they may register more listeners
        let listeners = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|l| match l {
                Listener::Channel(tx) => !tx.is_closed(),
                Listener::Callback(_) => true,
            });
            listeners.clone()
        };

        for listener in listeners {
            match listener {
                Listener::Channel(tx) => {
                    let _ = tx.send(event.clone());
                }
                Listener::Callback(callback) => callback(&event),
            }
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

/// Receiving end of [`Subscription::events`](crate::Subscription::events)
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once the subscription is dropped.
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<SubscriptionEvent> {
        self.rx.try_recv().ok()
    }
}
