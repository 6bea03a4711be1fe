//! Integration tests for the offline queue.

use async_trait::async_trait;
use pitstop_client::{
    ConnectivityObserver, DrainWorker, Error, KeyValueStore, MemoryStore, NetworkState,
    OfflineQueue, RequestExecutor, Result, SqliteStore,
};
use pitstop_engine::{HttpMethod, QueuedRequest};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Mock network: records endpoints in order, fails the listed ones.
#[derive(Default)]
struct MockNetwork {
    received: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
}

impl MockNetwork {
    fn failing(endpoints: &[&str]) -> Self {
        Self {
            failing: Mutex::new(endpoints.iter().map(|e| e.to_string()).collect()),
            ..Self::default()
        }
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestExecutor for MockNetwork {
    async fn execute(&self, request: &QueuedRequest) -> Result<Value> {
        self.received.lock().unwrap().push(request.endpoint.clone());
        if self.failing.lock().unwrap().contains(&request.endpoint) {
            return Err(Error::Status {
                method: request.method.to_string(),
                endpoint: request.endpoint.clone(),
                status: 500,
                body: None,
            });
        }
        Ok(json!({"ok": true}))
    }
}

/// Executor that reports each request on a channel.
struct Notifying(mpsc::UnboundedSender<String>);

#[async_trait]
impl RequestExecutor for Notifying {
    async fn execute(&self, request: &QueuedRequest) -> Result<Value> {
        let _ = self.0.send(request.endpoint.clone());
        Ok(Value::Null)
    }
}

/// Store whose next `failing_reads` reads fail.
struct FlakyReads {
    inner: MemoryStore,
    failing_reads: AtomicUsize,
}

impl FlakyReads {
    fn new(inner: MemoryStore, failing_reads: usize) -> Self {
        Self {
            inner,
            failing_reads: AtomicUsize::new(failing_reads),
        }
    }

    fn heal(&self) {
        self.failing_reads.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for FlakyReads {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let failing = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::StoreUnavailable("read timed out".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

async fn enqueue_three<S: KeyValueStore>(queue: &OfflineQueue<S>) {
    queue
        .enqueue(HttpMethod::Post, "/r1", Some(json!({"n": 1})))
        .await
        .unwrap();
    queue
        .enqueue(HttpMethod::Post, "/r2", Some(json!({"n": 2})))
        .await
        .unwrap();
    queue
        .enqueue(HttpMethod::Post, "/r3", Some(json!({"n": 3})))
        .await
        .unwrap();
}

fn endpoints(queue: &[QueuedRequest]) -> Vec<&str> {
    queue.iter().map(|r| r.endpoint.as_str()).collect()
}

#[tokio::test]
async fn replay_is_fifo() {
    let queue = OfflineQueue::open(MemoryStore::new()).await;
    enqueue_three(&queue).await;

    let network = MockNetwork::default();
    let report = queue.process_queue(&network).await;

    assert_eq!(network.received(), vec!["/r1", "/r2", "/r3"]);
    assert!(report.is_complete());
    assert_eq!(report.sent.len(), 3);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn failure_stops_the_pass() {
    let queue = OfflineQueue::open(MemoryStore::new()).await;
    enqueue_three(&queue).await;

    let network = MockNetwork::failing(&["/r2"]);
    let report = queue.process_queue(&network).await;

    assert_eq!(network.received(), vec!["/r1", "/r2"]);
    assert_eq!(report.sent.len(), 1);
    assert!(report.failed.is_some());
    assert_eq!(report.remaining, 2);
    assert_eq!(endpoints(&queue.queue()), vec!["/r2", "/r3"]);

    // Next pass picks up where the last one stopped.
    network.heal();
    let report = queue.process_queue(&network).await;
    assert!(report.is_complete());
    assert_eq!(network.received(), vec!["/r1", "/r2", "/r2", "/r3"]);
}

#[tokio::test]
async fn queue_survives_restart_in_memory() {
    let store = MemoryStore::new();
    let request = {
        let queue = OfflineQueue::open(store.clone()).await;
        queue
            .enqueue(HttpMethod::Patch, "/jobs/7/status", Some(json!({"status": "done"})))
            .await
            .unwrap()
    };

    let reopened = OfflineQueue::open(store).await;
    assert_eq!(reopened.queue(), vec![request]);
}

#[tokio::test]
async fn queue_survives_restart_on_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    let db_url = format!("sqlite://{}?mode=rwc", temp_dir.path().join("queue.db").display());

    {
        let store = SqliteStore::connect(&db_url).await.unwrap();
        let queue = OfflineQueue::open(store.clone()).await;
        enqueue_three(&queue).await;
        queue.dispose().await.unwrap();
        store.close().await;
    }

    let store = SqliteStore::connect(&db_url).await.unwrap();
    let queue = OfflineQueue::open(store).await;
    assert_eq!(endpoints(&queue.queue()), vec!["/r1", "/r2", "/r3"]);
}

#[tokio::test]
async fn reads_queue_written_as_bare_array() {
    use pitstop_client::keys;

    let store = MemoryStore::new();
    store
        .set(
            keys::QUEUED_REQUESTS,
            r#"[{"id": "legacy-1", "method": "PUT", "endpoint": "/parts/9", "createdAt": 1700000000000}]"#,
        )
        .await
        .unwrap();

    let queue = OfflineQueue::open(store).await;
    assert_eq!(queue.queue()[0].id, "legacy-1");
}

#[tokio::test]
async fn failed_read_at_open_does_not_overwrite_stored_queue() {
    let store = MemoryStore::new();
    {
        let queue = OfflineQueue::open(store.clone()).await;
        queue.enqueue(HttpMethod::Post, "/r1", None).await.unwrap();
        queue.enqueue(HttpMethod::Post, "/r2", None).await.unwrap();
    }

    let queue = OfflineQueue::open(FlakyReads::new(store.clone(), 1)).await;
    assert!(queue.is_empty());

    queue.enqueue(HttpMethod::Post, "/notes", None).await.unwrap();
    assert_eq!(endpoints(&queue.queue()), vec!["/r1", "/r2", "/notes"]);
    assert!(!queue.is_dirty());

    let reopened = OfflineQueue::open(store).await;
    assert_eq!(endpoints(&reopened.queue()), vec!["/r1", "/r2", "/notes"]);
}

#[tokio::test]
async fn writes_wait_until_stored_queue_is_readable() {
    let store = MemoryStore::new();
    {
        let queue = OfflineQueue::open(store.clone()).await;
        queue.enqueue(HttpMethod::Put, "/jobs/1", None).await.unwrap();
    }

    let flaky = Arc::new(FlakyReads::new(store.clone(), usize::MAX));
    let queue = OfflineQueue::open(flaky.clone()).await;
    queue.enqueue(HttpMethod::Post, "/notes", None).await.unwrap();

    assert!(queue.is_dirty());
    assert!(queue.flush().await.is_err());
    assert_eq!(endpoints(&OfflineQueue::open(store.clone()).await.queue()), vec!["/jobs/1"]);

    flaky.heal();
    queue.flush().await.unwrap();
    assert!(!queue.is_dirty());
    assert_eq!(
        endpoints(&OfflineQueue::open(store).await.queue()),
        vec!["/jobs/1", "/notes"]
    );
}

#[tokio::test]
async fn concurrent_enqueues_are_not_lost() {
    let store = MemoryStore::new();
    let queue = Arc::new(OfflineQueue::open(store.clone()).await);

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .enqueue(HttpMethod::Post, format!("/notes/{i}"), None)
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(queue.len(), 20);
    let reopened = OfflineQueue::open(store).await;
    assert_eq!(reopened.len(), 20);
}

#[tokio::test]
async fn drain_worker_replays_on_reconnect() {
    let queue = Arc::new(OfflineQueue::open(MemoryStore::new()).await);
    let observer = ConnectivityObserver::new(NetworkState::offline());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let worker = DrainWorker::spawn(queue.clone(), Arc::new(Notifying(tx)), &observer);
    enqueue_three(&queue).await;

    observer.report(NetworkState::online("wifi"));

    let mut seen = Vec::new();
    for _ in 0..3 {
        let endpoint = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(endpoint);
    }
    assert_eq!(seen, vec!["/r1", "/r2", "/r3"]);

    worker.shutdown().await;
}

#[tokio::test]
async fn drain_worker_drains_at_start_when_online() {
    let queue = Arc::new(OfflineQueue::open(MemoryStore::new()).await);
    queue.enqueue(HttpMethod::Delete, "/bills/4", None).await.unwrap();

    let observer = ConnectivityObserver::new(NetworkState::online("cellular"));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = DrainWorker::spawn(queue.clone(), Arc::new(Notifying(tx)), &observer);

    let endpoint = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert_eq!(endpoint.as_deref(), Some("/bills/4"));

    worker.shutdown().await;
}
