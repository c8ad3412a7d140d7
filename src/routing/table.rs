//! In-memory routing table.
//!
//! # Responsibilities
//! - Hold the authoritative external port → backend pool mapping
//! - Report whether each mutation changed anything
//! - Hand out immutable snapshots for rendering
//! - Reconcile the whole table to a freshly fetched desired state
//!
//! # Design Decisions
//! - A single internal lock makes every mutation and every snapshot atomic
//! - Set comparison, so backend order never counts as a change
//! - Snapshots are owned copies; the lock is released before rendering

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::routing::types::{BackendHostInfo, ExternalPort, MappingRequest};

/// The deduplicated backend pool of one external port.
pub type RoutingTableEntry = BTreeSet<BackendHostInfo>;

/// Immutable copy of the table, ordered by port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTableSnapshot {
    entries: BTreeMap<ExternalPort, RoutingTableEntry>,
}

impl RoutingTableSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, port: ExternalPort) -> Option<&RoutingTableEntry> {
        self.entries.get(&port)
    }

    /// Ports ascending, each with its backends sorted by (address, port).
    pub fn iter(&self) -> impl Iterator<Item = (ExternalPort, &RoutingTableEntry)> {
        self.entries.iter().map(|(port, entry)| (*port, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_mapping_requests(&self) -> Vec<MappingRequest> {
        self.iter()
            .map(|(port, entry)| MappingRequest::new(port, entry.iter().cloned().collect()))
            .collect()
    }
}

/// Requests naming the same port are merged; requests without backends
/// contribute nothing, so the snapshot never holds an empty entry.
impl FromIterator<MappingRequest> for RoutingTableSnapshot {
    fn from_iter<I: IntoIterator<Item = MappingRequest>>(iter: I) -> Self {
        let mut entries: BTreeMap<ExternalPort, RoutingTableEntry> = BTreeMap::new();
        for request in iter {
            if request.backends.is_empty() {
                continue;
            }
            entries
                .entry(request.external_port)
                .or_default()
                .extend(request.backends);
        }
        Self { entries }
    }
}

/// Ports touched by a reconciliation, each list ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileDiff {
    pub added: Vec<ExternalPort>,
    pub removed: Vec<ExternalPort>,
    pub updated: Vec<ExternalPort>,
}

impl ReconcileDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// The process-wide routing table.
///
/// Invariant: every port present has at least one backend, and no backend
/// appears twice within an entry.
#[derive(Debug, Default)]
pub struct RoutingTable {
    entries: Mutex<BTreeMap<ExternalPort, RoutingTableEntry>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic cannot leave an entry half-written: every mutation replaces or
    // removes whole entries, so the data behind a poisoned lock is still valid.
    fn entries(&self) -> MutexGuard<'_, BTreeMap<ExternalPort, RoutingTableEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the entry for `port`. Returns true iff the backend set changed.
    /// An empty backend set removes the port.
    pub fn set<I>(&self, port: ExternalPort, backends: I) -> bool
    where
        I: IntoIterator<Item = BackendHostInfo>,
    {
        let entry: RoutingTableEntry = backends.into_iter().collect();
        let mut entries = self.entries();

        if entry.is_empty() {
            return entries.remove(&port).is_some();
        }

        match entries.get(&port) {
            Some(existing) if *existing == entry => false,
            _ => {
                entries.insert(port, entry);
                true
            }
        }
    }

    /// Remove `port`. Returns true iff it existed.
    pub fn remove(&self, port: ExternalPort) -> bool {
        self.entries().remove(&port).is_some()
    }

    pub fn snapshot(&self) -> RoutingTableSnapshot {
        RoutingTableSnapshot {
            entries: self.entries().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Make the table equal `desired` with the fewest edits. Ports missing
    /// from `desired` are removed.
    pub fn reconcile_to(&self, desired: &RoutingTableSnapshot) -> ReconcileDiff {
        let mut diff = ReconcileDiff::default();
        let mut entries = self.entries();

        entries.retain(|port, _| {
            let keep = desired.entries.contains_key(port);
            if !keep {
                diff.removed.push(*port);
            }
            keep
        });

        for (port, entry) in &desired.entries {
            match entries.get(port) {
                None => {
                    diff.added.push(*port);
                    entries.insert(*port, entry.clone());
                }
                Some(existing) if existing != entry => {
                    diff.updated.push(*port);
                    entries.insert(*port, entry.clone());
                }
                Some(_) => {}
            }
        }

        diff
    }
}
