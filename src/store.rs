//! Bounded, expiring, keyed observation store.
//!
//! `ObservationStore` is a plain (non-thread-safe) struct: the single
//! coarse mutex that serializes every mutation lives one level up, in
//! [`crate::server`], alongside the Lamport clock — matching the "single
//! coarse mutex is acceptable" guidance for this service. That keeps the
//! store itself trivial to unit test without any concurrency machinery.

use crate::observation::{Observation, StationId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One entry: the observation plus the wall-clock time of its last PUT,
/// in milliseconds since the Unix epoch (so it survives a snapshot
/// round-trip through a process restart).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    pub observation: SerializableObservation,
    pub last_update_ms: u64,
}

/// Newtype so `Observation` (which wraps `serde_json::Map` directly) has a
/// serde impl scoped to persistence rather than bolted onto the type used
/// everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializableObservation(serde_json::Map<String, serde_json::Value>);

impl From<Observation> for SerializableObservation {
    fn from(obs: Observation) -> Self {
        Self(obs.into_json())
    }
}

impl From<SerializableObservation> for Observation {
    fn from(s: SerializableObservation) -> Self {
        Observation::from(s.0)
    }
}

/// On-disk / in-transit representation of the whole store: a flat map of
/// station id to entry. The reference implementation keeps a redundant
/// nested `id -> { id -> entry }` map; that duplication is not preserved
/// here (see the REDESIGN FLAGS section of SPEC_FULL.md).
pub type Snapshot = HashMap<StationId, StoreEntry>;

/// What happened as a result of a `put_or_replace` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// First time this station id has been seen.
    Created,
    /// An existing entry for this station id was replaced.
    Updated,
}

/// The bounded, TTL-expiring, keyed observation store.
#[derive(Debug, Default)]
pub struct ObservationStore {
    entries: HashMap<StationId, StoreEntry>,
    capacity: usize,
    ttl: Duration,
}

impl ObservationStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the observation for `id`, evicting the oldest
    /// entry first if the store is full and `id` is new. Ties in eviction
    /// are broken by the lexicographically smallest station id, fixing an
    /// otherwise-unspecified iteration order for deterministic tests.
    ///
    /// Returns the outcome plus the id evicted to make room, if any.
    pub fn put_or_replace(
        &mut self,
        id: StationId,
        observation: Observation,
        now: SystemTime,
    ) -> (PutOutcome, Option<StationId>) {
        let now_ms = to_millis(now);
        let is_new = !self.entries.contains_key(&id);

        let evicted = if is_new && self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.insert(
            id,
            StoreEntry {
                observation: observation.into(),
                last_update_ms: now_ms,
            },
        );

        let outcome = if is_new {
            PutOutcome::Created
        } else {
            PutOutcome::Updated
        };
        (outcome, evicted)
    }

    fn evict_oldest(&mut self) -> Option<StationId> {
        let victim = self
            .entries
            .iter()
            .min_by(|(id_a, a), (id_b, b)| {
                a.last_update_ms
                    .cmp(&b.last_update_ms)
                    .then_with(|| id_a.cmp(id_b))
            })
            .map(|(id, _)| id.clone())?;
        self.entries.remove(&victim);
        Some(victim)
    }

    /// All live (non-expired) observations, in a stable (sorted-by-id)
    /// order so a single response's body is deterministic.
    pub fn get_all(&self, now: SystemTime) -> Vec<Observation> {
        let now_ms = to_millis(now);
        let mut ids: Vec<&StationId> = self
            .entries
            .iter()
            .filter(|(_, entry)| !self.is_expired(entry, now_ms))
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids.into_iter()
            .map(|id| Observation::from(self.entries[id].observation.clone()))
            .collect()
    }

    /// The observation for `id`, iff present and not expired.
    pub fn get_one(&self, id: &str, now: SystemTime) -> Option<Observation> {
        let now_ms = to_millis(now);
        let entry = self.entries.get(id)?;
        if self.is_expired(entry, now_ms) {
            None
        } else {
            Some(Observation::from(entry.observation.clone()))
        }
    }

    /// Remove every entry whose `last_update_ms` is more than `ttl` stale,
    /// returning the ids that were evicted.
    pub fn expire(&mut self, now: SystemTime) -> Vec<StationId> {
        let now_ms = to_millis(now);
        let stale: Vec<StationId> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now_ms))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            self.entries.remove(id);
        }
        stale
    }

    fn is_expired(&self, entry: &StoreEntry, now_ms: u64) -> bool {
        now_ms.saturating_sub(entry.last_update_ms) > self.ttl.as_millis() as u64
    }

    /// Serialize the full store to its flat, persistable form.
    pub fn snapshot(&self) -> Snapshot {
        self.entries.clone()
    }

    /// Replace the store's contents with a previously-taken snapshot.
    /// Used on startup to repopulate from disk.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.entries = snapshot;
    }
}

fn to_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
