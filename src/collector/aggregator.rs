//! Aggregation of parsed queue records into a flat metric snapshot.
//!
//! Key scheme:
//! - `pmap.mapped`, `pmap.used`, `pmap.shared`
//! - `ctl.<vhost>.messages`, `ctl.<vhost>.memory`, `ctl.<vhost>.consumers`
//! - `ctl.<vhost>.<queue>.messages|memory|consumers` for durable queues only
//!
//! Vhost and queue names are used verbatim, so a name containing `.` yields
//! a key that cannot be split back unambiguously.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::collector::parser::{MemoryMapSample, QueueRecord};

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '.';

const MESSAGES: &str = "messages";
const MEMORY: &str = "memory";
const CONSUMERS: &str = "consumers";

/// Flat mapping of metric key to gauge value for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetricSnapshot {
    values: BTreeMap<String, u64>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: String, value: u64) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.values.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Per-vhost sums of the three queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueTotals {
    pub messages: u64,
    pub memory: u64,
    pub consumers: u64,
}

impl QueueTotals {
    /// Sums all records, saturating at `u64::MAX`.
    pub fn from_records(records: &[QueueRecord]) -> Self {
        records.iter().fold(Self::default(), |acc, r| Self {
            messages: acc.messages.saturating_add(r.messages),
            memory: acc.memory.saturating_add(r.memory),
            consumers: acc.consumers.saturating_add(r.consumers),
        })
    }
}

/// Key of a per-vhost aggregate, e.g. `ctl./.messages`.
pub fn vhost_key(vhost: &str, field: &str) -> String {
    format!("ctl{sep}{vhost}{sep}{field}", sep = KEY_SEPARATOR)
}

/// Key of a per-queue value, e.g. `ctl./.orders.messages`.
pub fn queue_key(vhost: &str, queue: &str, field: &str) -> String {
    format!("ctl{sep}{vhost}{sep}{queue}{sep}{field}", sep = KEY_SEPARATOR)
}

/// Key of a memory-map value, e.g. `pmap.mapped`.
pub fn pmap_key(field: &str) -> String {
    format!("pmap{}{}", KEY_SEPARATOR, field)
}

/// Builds the snapshot for one poll cycle.
///
/// Every host in `hosts` gets its three aggregate keys, zero when `records`
/// has no entry for it. Durable queues additionally get three per-queue keys.
/// A host listed twice is aggregated once.
pub fn aggregate(
    hosts: &[String],
    records: &BTreeMap<String, Vec<QueueRecord>>,
    sample: &MemoryMapSample,
) -> MetricSnapshot {
    let mut snapshot = MetricSnapshot::new();

    for vhost in hosts {
        let queues = records.get(vhost).map(Vec::as_slice).unwrap_or_default();
        let totals = QueueTotals::from_records(queues);

        snapshot.set(vhost_key(vhost, MESSAGES), totals.messages);
        snapshot.set(vhost_key(vhost, MEMORY), totals.memory);
        snapshot.set(vhost_key(vhost, CONSUMERS), totals.consumers);

        for queue in queues.iter().filter(|q| q.durable) {
            snapshot.set(queue_key(vhost, &queue.name, MESSAGES), queue.messages);
            snapshot.set(queue_key(vhost, &queue.name, MEMORY), queue.memory);
            snapshot.set(queue_key(vhost, &queue.name, CONSUMERS), queue.consumers);
        }
    }

    snapshot.set(pmap_key("mapped"), sample.mapped);
    snapshot.set(pmap_key("used"), sample.used);
    snapshot.set(pmap_key("shared"), sample.shared);

    snapshot
}
