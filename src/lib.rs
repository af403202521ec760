//! Client-side state synchronization for the Docker Ant backend.
//!
//! The backend owns the Docker daemon; this crate keeps a local mirror of it.
//! A realtime WebSocket feed pushes events into a per-collection resource
//! cache and a bounded activity log, while a REST client dispatches commands
//! with optimistic cache updates that authoritative events later supersede.

pub mod activity;
pub mod api;
pub mod cache;
pub mod context;
pub mod error;
pub mod protocol;
pub mod sync;

pub use activity::{ActivityLog, LogEntry, LogLevel};
pub use api::DockerApi;
pub use cache::{CollectionKey, ResourceCache, Snapshot};
pub use context::SyncContext;
pub use error::{Result, SyncError};
pub use sync::{ConnectionState, SyncHandle, WsConnector};
