//! Persisted form of the offline request queue.
//!
//! Snapshots are the bridge between the in-memory queue and the key-value
//! store. Order is significant: requests are stored oldest first.

use crate::{error::Result, Error, QueuedRequest};
use serde::{Deserialize, Serialize};

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// The queue as written to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Pending requests, FIFO order
    pub requests: Vec<QueuedRequest>,
}

/// Either the versioned envelope or the bare array older clients wrote.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredQueue {
    Versioned(QueueSnapshot),
    Legacy(Vec<QueuedRequest>),
}

impl QueueSnapshot {
    /// Create a snapshot of the given requests.
    pub fn new(requests: Vec<QueuedRequest>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            requests,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let stored: StoredQueue =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        let snapshot = match stored {
            StoredQueue::Versioned(snapshot) => snapshot,
            StoredQueue::Legacy(requests) => Self::new(requests),
        };

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::UnsupportedFormat {
                found: snapshot.format_version,
                supported: SNAPSHOT_FORMAT_VERSION,
            });
        }

        Ok(snapshot)
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the snapshot holds no requests.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
