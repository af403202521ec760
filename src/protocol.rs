//! Wire contract for the realtime channel.
//!
//! The backend pushes JSON-framed messages tagged by a `type` field. This
//! taxonomy is fixed by the backend; unknown tags must be ignored without
//! error, which the `Unknown` catch-all variant handles.

use serde::Deserialize;

use crate::activity::LogEntry;
use crate::cache::Snapshot;

/// Inbound realtime message. Receive-only: the client never sends on the
/// channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Full state push on connect: all four collections at once.
    Init {
        containers: Snapshot,
        images: Snapshot,
        networks: Snapshot,
        volumes: Snapshot,
    },
    /// Wholesale replacement of the containers collection.
    ContainerUpdate { containers: Snapshot },
    ContainerCreated { data: CreatedResource },
    /// Lifecycle change on a single container; the collection itself must
    /// be refetched.
    ContainerEvent {
        #[serde(rename = "containerId")]
        container_id: String,
        #[serde(default)]
        action: String,
        #[serde(default)]
        status: String,
        #[serde(default)]
        message: Option<String>,
    },
    NetworkCreated { data: CreatedResource },
    VolumeCreated { data: CreatedResource },
    /// A log entry authored by the backend, appended verbatim.
    ActivityLog { data: LogEntry },
    #[serde(other)]
    Unknown,
}

/// Payload of the `*_created` messages.
#[derive(Debug, Deserialize)]
pub struct CreatedResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CreatedResource {
    /// Human-readable label: the name when present, else the id.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.id.as_deref())
            .unwrap_or("<unnamed>")
    }
}
