//! Online/offline status and the worker that drains the queue on reconnect.

use crate::executor::RequestExecutor;
use crate::queue::OfflineQueue;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Current network status as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub is_connected: bool,
    /// Descriptive type such as `wifi`, `cellular` or `none`
    #[serde(rename = "type")]
    pub network_type: String,
}

impl NetworkState {
    pub fn online(network_type: impl Into<String>) -> Self {
        Self {
            is_connected: true,
            network_type: network_type.into(),
        }
    }

    pub fn offline() -> Self {
        Self {
            is_connected: false,
            network_type: "none".to_string(),
        }
    }
}

/// Push-based source of network status.
#[async_trait]
pub trait ConnectivityProvider: Send + Sync {
    /// The latest known state.
    async fn fetch_current_state(&self) -> NetworkState;

    /// A receiver that wakes on every state change.
    fn subscribe(&self) -> watch::Receiver<NetworkState>;
}

/// Connectivity state fed by the host platform through [`report`](Self::report).
#[derive(Debug)]
pub struct ConnectivityObserver {
    state: watch::Sender<NetworkState>,
}

impl ConnectivityObserver {
    pub fn new(initial: NetworkState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Record a new state. Returns whether it differed from the previous one.
    pub fn report(&self, next: NetworkState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if current.is_connected != next.is_connected {
                tracing::info!(
                    online = next.is_connected,
                    network_type = %next.network_type,
                    "connectivity changed"
                );
            }
            *current = next;
            true
        })
    }

    pub fn current(&self) -> NetworkState {
        self.state.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().is_connected
    }
}

impl Default for ConnectivityObserver {
    fn default() -> Self {
        Self::new(NetworkState::offline())
    }
}

#[async_trait]
impl ConnectivityProvider for ConnectivityObserver {
    async fn fetch_current_state(&self) -> NetworkState {
        self.current()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state.subscribe()
    }
}

/// Background task that drains the queue whenever the device comes online.
#[derive(Debug)]
pub struct DrainWorker {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl DrainWorker {
    /// Start watching `provider`.
    ///
    /// The queue is drained on every offline to online transition, and once
    /// at start if already online with requests pending.
    pub fn spawn<S, E, P>(queue: Arc<OfflineQueue<S>>, executor: Arc<E>, provider: &P) -> Self
    where
        S: KeyValueStore + 'static,
        E: RequestExecutor + ?Sized + 'static,
        P: ConnectivityProvider + ?Sized,
    {
        let mut status = provider.subscribe();
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut was_online = status.borrow_and_update().is_connected;
            if was_online && !queue.is_empty() {
                queue.process_queue(executor.as_ref()).await;
            }

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    changed = status.changed() => {
                        if changed.is_err() {
                            tracing::debug!("connectivity source closed, drain worker exiting");
                            break;
                        }
                        let online = status.borrow_and_update().is_connected;
                        if online && !was_online {
                            tracing::debug!(pending = queue.len(), "back online, draining queue");
                            queue.process_queue(executor.as_ref()).await;
                        }
                        was_online = online;
                    }
                }
            }
        });

        Self {
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "drain worker ended abnormally");
        }
    }
}
