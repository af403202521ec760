//! Keyed resource cache.
//!
//! One snapshot per collection (containers, images, networks, volumes),
//! replaced wholesale by the sync client or an explicit refetch. Snapshots
//! are opaque backend records; the only in-place mutation supported is the
//! optimistic status patch for container lifecycle commands, guarded by a
//! version stamp so a late command completion can never clobber newer
//! authoritative data.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

/// The full current record list for one collection, as last known.
pub type Snapshot = Vec<Value>;

/// The four resource collections tracked by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKey {
    Containers,
    Images,
    Networks,
    Volumes,
}

impl CollectionKey {
    pub const ALL: [CollectionKey; 4] = [
        CollectionKey::Containers,
        CollectionKey::Images,
        CollectionKey::Networks,
        CollectionKey::Volumes,
    ];

    /// REST path segment for this collection.
    pub fn path(&self) -> &'static str {
        match self {
            CollectionKey::Containers => "containers",
            CollectionKey::Images => "images",
            CollectionKey::Networks => "networks",
            CollectionKey::Volumes => "volumes",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    snapshot: Option<Snapshot>,
    version: u64,
    stale: bool,
}

/// Receipt for an optimistic status patch. Holds everything needed to undo
/// the patch, valid only while the collection version is unchanged.
#[derive(Debug, Clone)]
pub struct OptimisticPatch {
    pub key: CollectionKey,
    pub container_id: String,
    pub version: u64,
    previous_state: Option<Value>,
}

/// Snapshot store for all four collections.
#[derive(Debug)]
pub struct ResourceCache {
    entries: [CacheEntry; 4],
    next_version: u64,
    changed: watch::Sender<u64>,
}

impl ResourceCache {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            entries: Default::default(),
            next_version: 0,
            changed,
        }
    }

    /// Current snapshot, or `None` before the first `set`.
    pub fn get(&self, key: CollectionKey) -> Option<&Snapshot> {
        self.entries[key.index()].snapshot.as_ref()
    }

    /// Wholesale replace. Bumps the collection version and clears staleness.
    pub fn set(&mut self, key: CollectionKey, snapshot: Snapshot) {
        let version = self.bump();
        let entry = &mut self.entries[key.index()];
        entry.snapshot = Some(snapshot);
        entry.version = version;
        entry.stale = false;
        self.notify();
    }

    /// Atomic four-way replace for the `init` message: all collections move
    /// to the same version epoch under one `&mut self`, so a reader never
    /// observes a mix of old and new snapshots.
    pub fn set_all(
        &mut self,
        containers: Snapshot,
        images: Snapshot,
        networks: Snapshot,
        volumes: Snapshot,
    ) {
        let version = self.bump();
        for (key, snapshot) in CollectionKey::ALL
            .into_iter()
            .zip([containers, images, networks, volumes])
        {
            let entry = &mut self.entries[key.index()];
            entry.snapshot = Some(snapshot);
            entry.version = version;
            entry.stale = false;
        }
        self.notify();
    }

    /// Mark a collection stale, signaling that a refetch is needed.
    /// Does not fetch and does not touch the snapshot.
    pub fn invalidate(&mut self, key: CollectionKey) {
        self.entries[key.index()].stale = true;
        self.notify();
    }

    pub fn is_stale(&self, key: CollectionKey) -> bool {
        self.entries[key.index()].stale
    }

    /// Version of the last wholesale write to this collection.
    pub fn version(&self, key: CollectionKey) -> u64 {
        self.entries[key.index()].version
    }

    /// Observers see a revision bump on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Speculatively set a container record's `state` field (e.g. to
    /// `starting`) ahead of backend confirmation. Returns a receipt for
    /// [`revert`](Self::revert), or `None` when the record is not cached.
    /// Does not bump the collection version: the patch is a guess layered
    /// on the current authoritative snapshot, not a new snapshot.
    pub fn patch_optimistic(
        &mut self,
        key: CollectionKey,
        container_id: &str,
        transient_state: &str,
    ) -> Option<OptimisticPatch> {
        let entry = &mut self.entries[key.index()];
        let version = entry.version;
        let snapshot = entry.snapshot.as_mut()?;
        let record = snapshot
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(container_id))?;
        let previous_state = record
            .as_object_mut()?
            .insert("state".to_string(), Value::String(transient_state.to_string()));
        self.notify();
        Some(OptimisticPatch {
            key,
            container_id: container_id.to_string(),
            version,
            previous_state,
        })
    }

    /// Undo an optimistic patch after a failed command. A no-op if an
    /// authoritative `set` has replaced the snapshot since the patch was
    /// taken: authoritative data always wins.
    pub fn revert(&mut self, patch: OptimisticPatch) {
        let entry = &mut self.entries[patch.key.index()];
        if entry.version != patch.version {
            return;
        }
        let Some(snapshot) = entry.snapshot.as_mut() else {
            return;
        };
        let record = snapshot
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(patch.container_id.as_str()));
        if let Some(Value::Object(map)) = record {
            match patch.previous_state {
                Some(prev) => {
                    map.insert("state".to_string(), prev);
                }
                None => {
                    map.remove("state");
                }
            }
            self.notify();
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn notify(&self) {
        self.changed.send_modify(|rev| *rev += 1);
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}
