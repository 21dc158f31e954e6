//! Handoff of decoded hub events from the HTTP accept path to a consumer.
//!
//! This module provides the `EventRouter`, the only piece of the listener that
//! touches the outside world: it pushes each decoded request body into a
//! bounded channel and never looks at what the body contains.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

/// A JSON body POSTed to the listener by the hub.
///
/// The payload is decoded but otherwise untouched: interpreting the
/// `content` envelope is the consumer's job.
#[derive(Debug, Clone)]
pub struct EventPayload {
    /// Address the request came from, when the transport exposes it
    pub remote: Option<SocketAddr>,
    /// The decoded JSON body
    pub body: Value,
}

impl EventPayload {
    /// Create a payload with no known remote address.
    pub fn new(body: Value) -> Self {
        Self { remote: None, body }
    }
}

/// Routes decoded event payloads from HTTP handlers to a channel.
///
/// Every listener instance created for the same consumer shares a clone of
/// the same sender, so restarting the listener never loses the consumer.
#[derive(Debug, Clone)]
pub struct EventRouter {
    /// Channel for sending event payloads to the consumer
    event_sender: mpsc::Sender<EventPayload>,
    /// Number of payloads accepted by the consumer's channel
    routed: Arc<AtomicU64>,
}

impl EventRouter {
    /// Create a new event router.
    ///
    /// # Example
    ///
    /// ```
    /// use tokio::sync::mpsc;
    /// use callback_server::router::{EventRouter, EventPayload};
    ///
    /// let (tx, _rx) = mpsc::channel::<EventPayload>(16);
    /// let router = EventRouter::new(tx);
    /// assert_eq!(router.routed(), 0);
    /// ```
    pub fn new(event_sender: mpsc::Sender<EventPayload>) -> Self {
        Self {
            event_sender,
            routed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Hand a payload over to the consumer.
    ///
    /// Waits for channel capacity when the consumer is behind. Only the
    /// request that carried this payload waits; the accept loop keeps going.
    /// Returns `false` when the consumer has gone away.
    ///
    /// # Example
    ///
    /// ```
    /// # use tokio::sync::mpsc;
    /// # use callback_server::router::{EventRouter, EventPayload};
    /// # #[tokio::main]
    /// # async fn main() {
    /// let (tx, mut rx) = mpsc::channel::<EventPayload>(16);
    /// let router = EventRouter::new(tx);
    /// let routed = router
    ///     .route_event(EventPayload::new(serde_json::json!({"content": {}})))
    ///     .await;
    /// assert!(routed);
    /// assert!(rx.recv().await.is_some());
    /// # }
    /// ```
    pub async fn route_event(&self, payload: EventPayload) -> bool {
        match self.event_sender.send(payload).await {
            Ok(()) => {
                self.routed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                tracing::debug!("event consumer dropped, discarding payload");
                false
            }
        }
    }

    /// Number of payloads handed over so far.
    pub fn routed(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }

    /// Whether the consumer side of the channel is gone.
    pub fn is_closed(&self) -> bool {
        self.event_sender.is_closed()
    }
}
