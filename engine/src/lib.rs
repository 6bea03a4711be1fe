//! # Pitstop Engine
//!
//! Optimistic-update reconciliation for the Pitstop mobile clients.
//!
//! This crate holds the pure, IO-free half of the offline layer: applying a
//! local change to a collection before the server has seen it, and undoing
//! or confirming that change once the server answers. The async half (the
//! durable request queue, connectivity and mutation lifecycle) lives in
//! `pitstop-client`.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Portable**: Exposed to the mobile host through a JSON-over-C ABI
//!
//! ## Core Concepts
//!
//! ### Entities
//!
//! Anything stored in a cached collection implements [`Entity`]: it may carry
//! an id, and it knows how to merge a partial update into itself. Plain
//! `serde_json::Value` objects are entities out of the box.
//!
//! ### Optimistic updates
//!
//! An [`OptimisticUpdate`] is a tagged change (create, update or delete)
//! with a unique operation id. [`apply_optimistic_update`] and
//! [`rollback_optimistic_update`] are the stateless primitives.
//!
//! ### Controllers
//!
//! - [`OptimisticList`] tracks pending changes and pre-images for a collection
//! - [`OptimisticItem`] does the same for a single focal record
//!
//! ## Quick Start
//!
//! ```rust
//! use pitstop_engine::{OptimisticList, OptimisticUpdate, RollbackOutcome};
//! use serde_json::json;
//!
//! let mut jobs = OptimisticList::with_data(vec![
//!     json!({"id": "job-1", "status": "pending"}),
//! ]);
//!
//! jobs.add_optimistic_update(OptimisticUpdate::update(
//!     "op-1",
//!     json!({"id": "job-1", "status": "accepted"}),
//!     1706745600000,
//! ))
//! .unwrap();
//! assert_eq!(jobs.data()[0]["status"], "accepted");
//!
//! // The server refused: put it back.
//! assert_eq!(jobs.rollback_update("op-1"), RollbackOutcome::Restored);
//! assert_eq!(jobs.data()[0]["status"], "pending");
//! ```
//!
//! ## Offline queue format
//!
//! [`QueuedRequest`] and [`QueueSnapshot`] define the persisted form of the
//! offline request queue, so that every host reads and writes the same blob.

pub mod entity;
pub mod error;
pub mod fallback;
pub mod ffi;
pub mod item;
pub mod list;
pub mod optimistic;
pub mod request;
pub mod snapshot;
pub mod temp_id;
pub mod update;

// Re-export main types at crate root
pub use entity::Entity;
pub use error::Error;
pub use fallback::{EndpointFallback, DEFAULT_MAX_PRIMARY_FAILURES};
pub use item::OptimisticItem;
pub use list::{OptimisticList, RollbackOutcome};
pub use optimistic::{apply_optimistic_update, replace_entity, rollback_optimistic_update};
pub use request::{HttpMethod, QueuedRequest};
pub use snapshot::{QueueSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use temp_id::{generate_temp_id, is_temp_id, TEMP_ID_PREFIX};
pub use update::{now_millis, OptimisticUpdate, UpdateKind};

/// Type aliases for clarity
pub type EntityId = String;
pub type OperationId = String;
pub type RequestId = String;
pub type Timestamp = u64;
