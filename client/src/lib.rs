//! Pitstop Client - offline runtime for the Pitstop mobile clients.
//!
//! Builds on [`pitstop_engine`] with the pieces that need IO: a durable
//! request queue, connectivity tracking that drains it on reconnect, the
//! mutation lifecycle with per-entity serialization, and a real-time channel
//! abstraction. Nothing here is a global; the host constructs each piece and
//! passes it where it is needed.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod executor;
pub mod mutation;
pub mod queue;
pub mod realtime;
pub mod storage;

pub use config::{ClientConfig, ConfigError};
pub use connectivity::{ConnectivityObserver, ConnectivityProvider, DrainWorker, NetworkState};
pub use error::{Error, Result};
pub use executor::{HttpExecutor, RequestExecutor};
pub use mutation::{EntityLocks, Mutation};
pub use queue::{DrainReport, OfflineQueue, Subscription};
pub use realtime::{ChannelEvent, EventRegistry, HandlerId, LocalChannel, LocalHub, RealtimeChannel};
pub use storage::{keys, JsonStorage, KeyValueStore, MemoryStore, SqliteStore};
