//! Durable FIFO of deferred network requests.
//!
//! Every mutation follows the same path: update the in-memory queue, persist
//! the whole queue under [`keys::QUEUED_REQUESTS`], then notify subscribers.
//! Mutations are serialized through an async mutex so concurrent callers can
//! not lose each other's writes.
//!
//! Replay is strictly in enqueue order. A request leaves the queue only once
//! the executor reports success; the first failure stops the pass.
//!
//! If the stored queue cannot be read at open, nothing is written back until a
//! later read succeeds; the stored requests are then merged ahead of the ones
//! queued in the meantime. A stored queue that cannot be decoded is copied to
//! [`keys::UNREADABLE_QUEUE`] before it is overwritten.

use crate::error::{Error, Result};
use crate::executor::RequestExecutor;
use crate::storage::{keys, KeyValueStore};
use dashmap::DashMap;
use pitstop_engine::{HttpMethod, QueueSnapshot, QueuedRequest, RequestId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex};

type Listener = Arc<dyn Fn(&[QueuedRequest]) + Send + Sync>;
type Listeners = DashMap<u64, Listener>;

/// Outcome of one [`OfflineQueue::process_queue`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Requests replayed successfully, in order
    pub sent: Vec<RequestId>,
    /// The request that failed and stopped the pass
    pub failed: Option<RequestId>,
    /// Requests still queued when the pass ended
    pub remaining: usize,
    /// Another pass was already running, so this one did nothing
    pub already_running: bool,
}

impl DrainReport {
    /// Whether the pass emptied the queue.
    pub fn is_complete(&self) -> bool {
        !self.already_running && self.failed.is_none() && self.remaining == 0
    }
}

/// Handle returned by [`OfflineQueue::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// The offline request queue.
pub struct OfflineQueue<S> {
    store: S,
    state: watch::Sender<Vec<QueuedRequest>>,
    listeners: Arc<Listeners>,
    next_listener: AtomicU64,
    write_lock: Mutex<()>,
    drain_lock: Mutex<()>,
    /// Set when the last persist failed
    dirty: AtomicBool,
    /// Set while the stored queue has not been read back yet
    detached: AtomicBool,
    disposed: AtomicBool,
}

impl<S: KeyValueStore> OfflineQueue<S> {
    /// Open the queue, rehydrating it from `store`.
    ///
    /// Opening never fails. A corrupt stored queue is moved aside and the
    /// queue starts empty. A failed read also starts empty, but the stored
    /// queue is left untouched until it can be read and merged.
    pub async fn open(store: S) -> Self {
        let (requests, detached) = match read_stored(&store).await {
            Ok(requests) => (requests, false),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to read stored queue, holding writes until it can be read"
                );
                (Vec::new(), true)
            }
        };

        tracing::info!(pending = requests.len(), "offline queue opened");

        let (state, _) = watch::channel(requests);
        Self {
            store,
            state,
            listeners: Arc::new(DashMap::new()),
            next_listener: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            drain_lock: Mutex::new(()),
            dirty: AtomicBool::new(detached),
            detached: AtomicBool::new(detached),
            disposed: AtomicBool::new(false),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Queue a new request and return it.
    pub async fn enqueue(
        &self,
        method: HttpMethod,
        endpoint: impl Into<String>,
        body: Option<serde_json::Value>,
    ) -> Result<QueuedRequest> {
        let request = QueuedRequest::new(method, endpoint, body);
        self.push(request.clone()).await?;
        Ok(request)
    }

    /// Append an already-built request.
    pub async fn push(&self, request: QueuedRequest) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;

        let duplicate = self.state.borrow().iter().any(|r| r.id == request.id);
        if duplicate {
            return Err(pitstop_engine::Error::DuplicateOperation(request.id).into());
        }

        tracing::debug!(
            request_id = %request.id,
            method = %request.method,
            endpoint = %request.endpoint,
            "request queued"
        );
        self.state.send_modify(|queue| queue.push(request));
        self.persist_and_notify().await;
        Ok(())
    }

    /// Pending requests, oldest first.
    pub fn queue(&self) -> Vec<QueuedRequest> {
        self.state.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Whether the in-memory queue has changes the store has not seen.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Call `listener` with the full queue after every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[QueuedRequest]) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Replay queued requests in order until the queue is empty or one fails.
    ///
    /// Only one pass runs at a time; a concurrent call returns at once with
    /// [`DrainReport::already_running`] set.
    pub async fn process_queue<E>(&self, executor: &E) -> DrainReport
    where
        E: RequestExecutor + ?Sized,
    {
        let Ok(_drain) = self.drain_lock.try_lock() else {
            tracing::debug!("queue drain already running");
            return DrainReport {
                already_running: true,
                remaining: self.len(),
                ..DrainReport::default()
            };
        };

        let mut report = DrainReport::default();

        loop {
            if self.disposed.load(Ordering::SeqCst) {
                break;
            }
            let head = self.state.borrow().first().cloned();
            let Some(head) = head else {
                break;
            };

            match executor.execute(&head).await {
                Ok(_) => {
                    tracing::debug!(request_id = %head.id, "queued request replayed");
                    let _guard = self.write_lock.lock().await;
                    self.state.send_modify(|queue| queue.retain(|r| r.id != head.id));
                    self.persist_and_notify().await;
                    report.sent.push(head.id);
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %head.id,
                        retry_count = head.retry_count + 1,
                        error = %e,
                        "queued request failed, stopping drain"
                    );
                    let _guard = self.write_lock.lock().await;
                    self.state.send_modify(|queue| {
                        if let Some(r) = queue.iter_mut().find(|r| r.id == head.id) {
                            r.retry_count = r.retry_count.saturating_add(1);
                        }
                    });
                    self.persist_and_notify().await;
                    report.failed = Some(head.id);
                    break;
                }
            }
        }

        report.remaining = self.len();
        tracing::info!(
            sent = report.sent.len(),
            remaining = report.remaining,
            failed = report.failed.is_some(),
            "queue drain finished"
        );
        report
    }

    /// Discard one request. Returns whether it was queued.
    pub async fn remove(&self, request_id: &str) -> Result<bool> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;

        let removed = self.state.send_if_modified(|queue| {
            let before = queue.len();
            queue.retain(|r| r.id != request_id);
            queue.len() != before
        });

        if removed {
            tracing::debug!(request_id = %request_id, "queued request removed");
            self.persist_and_notify().await;
        }
        Ok(removed)
    }

    /// Discard every queued request, including stored ones not read back yet.
    pub async fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;

        self.detached.store(false, Ordering::SeqCst);
        let dropped = self.state.send_replace(Vec::new()).len();
        tracing::info!(dropped, "offline queue cleared");
        self.persist_and_notify().await;
        Ok(())
    }

    /// Write the in-memory queue to the store, reporting failure.
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.persist().await
    }

    /// Flush, drop all subscribers and refuse further writes.
    pub async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.listeners.clear();
        let _guard = self.write_lock.lock().await;
        self.persist().await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let result = self.write_stored().await;
        self.dirty.store(result.is_err(), Ordering::SeqCst);
        result
    }

    async fn write_stored(&self) -> Result<()> {
        if self.detached.load(Ordering::SeqCst) {
            self.reattach().await?;
        }
        let raw = QueueSnapshot::new(self.queue()).to_json()?;
        self.store.set(keys::QUEUED_REQUESTS, &raw).await
    }

    /// Read the stored queue back and put its requests ahead of the ones
    /// queued since open.
    async fn reattach(&self) -> Result<()> {
        let stored = read_stored(&self.store).await?;
        let restored = stored.len();
        let known: HashSet<RequestId> = stored.iter().map(|r| r.id.clone()).collect();

        self.state.send_modify(|queue| {
            let local = std::mem::take(queue);
            let mut merged = stored;
            merged.extend(local.into_iter().filter(|r| !known.contains(&r.id)));
            *queue = merged;
        });
        self.detached.store(false, Ordering::SeqCst);

        tracing::info!(restored, pending = self.len(), "stored queue read back, resuming writes");
        Ok(())
    }

    async fn persist_and_notify(&self) {
        if let Err(e) = self.persist().await {
            tracing::error!(
                error = %e,
                pending = self.len(),
                "failed to persist offline queue, keeping it in memory"
            );
        }
        self.notify();
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self.listeners.iter().map(|l| l.value().clone()).collect();
        if listeners.is_empty() {
            return;
        }
        let snapshot = self.queue();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// Load the stored queue. A blob that cannot be decoded is copied to
/// [`keys::UNREADABLE_QUEUE`] and treated as empty.
async fn read_stored<S: KeyValueStore>(store: &S) -> Result<Vec<QueuedRequest>> {
    let Some(raw) = store.get(keys::QUEUED_REQUESTS).await? else {
        return Ok(Vec::new());
    };
    match QueueSnapshot::from_json(&raw) {
        Ok(snapshot) => Ok(snapshot.requests),
        Err(e) => {
            tracing::warn!(
                error = %e,
                moved_to = keys::UNREADABLE_QUEUE,
                "stored queue is corrupt, moving it aside"
            );
            store.set(keys::UNREADABLE_QUEUE, &raw).await?;
            Ok(Vec::new())
        }
    }
}

impl<S> std::fmt::Debug for OfflineQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("pending", &self.state.borrow().len())
            .field("subscribers", &self.listeners.len())
            .finish()
    }
}
