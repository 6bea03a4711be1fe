//! Real-time channel abstraction.
//!
//! [`RealtimeChannel`] is the connect/emit half of a socket-style transport;
//! [`EventRegistry`] is the `on`/`off` half every implementation shares.
//! [`LocalChannel`] runs entirely in-process against a [`LocalHub`] and picks
//! its endpoint through [`EndpointFallback`].

use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use pitstop_engine::EndpointFallback;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Identifies a registered handler for [`EventRegistry::off`].
pub type HandlerId = u64;

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// A named event with a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub event: String,
    pub payload: Value,
}

/// Event name to handler fan-out.
#[derive(Default)]
pub struct EventRegistry {
    handlers: DashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one handler. Returns whether it was registered.
    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        let Some(mut handlers) = self.handlers.get_mut(event) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        let removed = handlers.len() != before;

        if handlers.is_empty() {
            drop(handlers);
            self.handlers.remove(event);
        }
        removed
    }

    /// Call every handler for `event`. Returns how many ran.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<Handler> = match self.handlers.get(event) {
            Some(entry) => entry.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map(|h| h.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.handlers.len())
            .finish()
    }
}

/// A socket-style transport.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Make one connection attempt.
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Send an event to the server.
    async fn emit(&self, event: &str, payload: Value) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Handlers for server-sent events.
    fn events(&self) -> &EventRegistry;
}

/// In-process server side for [`LocalChannel`].
///
/// Tracks which endpoints accept connections, collects events emitted by
/// clients and broadcasts server events to every connected channel.
#[derive(Debug)]
pub struct LocalHub {
    reachable: DashMap<String, ()>,
    connections: DashMap<String, mpsc::UnboundedSender<ChannelEvent>>,
    inbox: mpsc::UnboundedSender<ChannelEvent>,
}

impl LocalHub {
    /// Create a hub and the receiver of everything clients emit.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (inbox, rx) = mpsc::unbounded_channel();
        let hub = Arc::new(Self {
            reachable: DashMap::new(),
            connections: DashMap::new(),
            inbox,
        });
        (hub, rx)
    }

    /// Accept or refuse connections on `endpoint`.
    pub fn set_reachable(&self, endpoint: impl Into<String>, reachable: bool) {
        let endpoint = endpoint.into();
        if reachable {
            self.reachable.insert(endpoint, ());
        } else {
            self.reachable.remove(&endpoint);
        }
    }

    /// Send an event to every connected channel. Returns the recipient count.
    pub fn broadcast(&self, event: &str, payload: Value) -> usize {
        let message = ChannelEvent {
            event: event.to_string(),
            payload,
        };
        let mut sent_count = 0;
        for conn in self.connections.iter() {
            if conn.value().send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        tracing::debug!(event = %event, recipients = sent_count, "broadcast event");
        sent_count
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn register(&self, endpoint: &str, sender: mpsc::UnboundedSender<ChannelEvent>) -> Option<String> {
        if !self.reachable.contains_key(endpoint) {
            return None;
        }
        let conn_id = uuid::Uuid::new_v4().to_string();
        self.connections.insert(conn_id.clone(), sender);
        tracing::info!(conn_id = %conn_id, endpoint = %endpoint, "channel connected");
        Some(conn_id)
    }

    fn unregister(&self, conn_id: &str) {
        if self.connections.remove(conn_id).is_some() {
            tracing::info!(conn_id = %conn_id, "channel disconnected");
        }
    }

    fn receive(&self, event: ChannelEvent) -> Result<()> {
        self.inbox
            .send(event)
            .map_err(|_| Error::Channel("hub inbox closed".into()))
    }
}

struct Connection {
    conn_id: String,
    endpoint: String,
    reader: JoinHandle<()>,
}

/// [`RealtimeChannel`] connected to a [`LocalHub`].
pub struct LocalChannel {
    hub: Arc<LocalHub>,
    fallback: Mutex<EndpointFallback>,
    connection: Mutex<Option<Connection>>,
    connected: AtomicBool,
    events: Arc<EventRegistry>,
}

impl LocalChannel {
    pub fn new(hub: Arc<LocalHub>, fallback: EndpointFallback) -> Self {
        Self {
            hub,
            fallback: Mutex::new(fallback),
            connection: Mutex::new(None),
            connected: AtomicBool::new(false),
            events: Arc::new(EventRegistry::new()),
        }
    }

    /// Endpoint of the live connection, if any.
    pub async fn endpoint(&self) -> Option<String> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.endpoint.clone())
    }

    /// Endpoint the next connection attempt will use.
    pub async fn next_endpoint(&self) -> String {
        self.fallback.lock().await.current().to_string()
    }
}

#[async_trait]
impl RealtimeChannel for LocalChannel {
    async fn connect(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            return Ok(());
        }

        let mut fallback = self.fallback.lock().await;
        let endpoint = fallback.current().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel::<ChannelEvent>();

        let Some(conn_id) = self.hub.register(&endpoint, tx) else {
            let next = fallback.record_failure();
            tracing::warn!(endpoint = %endpoint, next = %next, "connection attempt failed");
            return Err(Error::Channel(format!("endpoint unreachable: {endpoint}")));
        };
        fallback.record_success();

        let events = self.events.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                events.dispatch(&message.event, &message.payload);
            }
        });

        *connection = Some(Connection {
            conn_id,
            endpoint,
            reader,
        });
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(conn) = self.connection.lock().await.take() {
            self.hub.unregister(&conn.conn_id);
            conn.reader.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn emit(&self, event: &str, payload: Value) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.hub.receive(ChannelEvent {
            event: event.to_string(),
            payload,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn events(&self) -> &EventRegistry {
        &self.events
    }
}

impl std::fmt::Debug for LocalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalChannel")
            .field("connected", &self.is_connected())
            .finish()
    }
}
