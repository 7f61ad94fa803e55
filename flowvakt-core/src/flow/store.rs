//! Concurrent flow table.
//!
//! Every packet goes through a single `DashMap::entry` call, which holds the
//! key's shard lock for the whole create-or-update decision. Two first
//! packets of the same new flow racing on different workers therefore
//! produce exactly one entry, and concurrent updates never lose increments.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use super::key::FlowKey;
use super::metrics::FlowMetrics;
use crate::error::FlowStoreError;
use crate::packet::PacketRecord;

/// Upper bound used when no explicit size is configured.
pub const DEFAULT_MAX_ENTRIES: usize = 1 << 24;

/// What `record_packet` did with a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowUpdate {
    /// A new entry was opened by a flow-start packet.
    Created,
    /// An existing entry absorbed the packet.
    Updated,
    /// No entry exists and the packet may not open one.
    Ignored,
}

/// Owned copy of one flow table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FlowEntry {
    pub key: FlowKey,
    pub metrics: FlowMetrics,
}

/// Flow key → counters, shared by every packet-processing context.
pub struct FlowMetricsStore {
    flows: DashMap<FlowKey, FlowMetrics>,
    active: AtomicUsize,
    max_entries: usize,
}

impl Default for FlowMetricsStore {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl FlowMetricsStore {
    /// Creates an empty table that refuses new flows beyond `max_entries`.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            flows: DashMap::new(),
            active: AtomicUsize::new(0),
            max_entries,
        }
    }

    /// Folds `record` into the flow identified by `key`.
    ///
    /// Existing flows are updated regardless of flags. Unknown flows are
    /// created only for flow-start packets (TCP SYN or any UDP); a mid-stream
    /// TCP packet for an unknown flow is ignored.
    pub fn record_packet(
        &self,
        key: FlowKey,
        record: &PacketRecord,
    ) -> Result<FlowUpdate, FlowStoreError> {
        match self.flows.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().observe(record);
                Ok(FlowUpdate::Updated)
            }
            Entry::Vacant(entry) => {
                if !record.is_flow_start() {
                    return Ok(FlowUpdate::Ignored);
                }
                // Reserve a slot before inserting; `len()` would need every shard lock.
                if self.active.fetch_add(1, Ordering::AcqRel) >= self.max_entries {
                    self.active.fetch_sub(1, Ordering::AcqRel);
                    return Err(FlowStoreError::TableFull {
                        max_entries: self.max_entries,
                    });
                }
                entry.insert(FlowMetrics::start(record));
                Ok(FlowUpdate::Created)
            }
        }
    }

    /// Copy of the counters for `key`, if tracked.
    pub fn get(&self, key: &FlowKey) -> Option<FlowMetrics> {
        self.flows.get(key).map(|entry| *entry.value())
    }

    /// Number of tracked flows.
    #[inline]
    pub fn len(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Owned copy of every entry, ordered by key.
    pub fn snapshot(&self) -> Vec<FlowEntry> {
        let mut entries: Vec<FlowEntry> = self
            .flows
            .iter()
            .map(|entry| FlowEntry {
                key: *entry.key(),
                metrics: *entry.value(),
            })
            .collect();
        entries.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Drops flows whose last packet is more than `max_idle` older than
    /// `now_ns`. Returns how many were removed.
    ///
    /// Administrative operation; never called from the packet path.
    pub fn prune_idle(&self, now_ns: u64, max_idle: Duration) -> usize {
        let max_idle_ns = u64::try_from(max_idle.as_nanos()).unwrap_or(u64::MAX);
        let mut removed = 0usize;

        self.flows.retain(|_, metrics| {
            let idle = now_ns.saturating_sub(metrics.ts_current) > max_idle_ns;
            if idle {
                // Release the slot while the shard is still locked.
                self.active.fetch_sub(1, Ordering::AcqRel);
                removed += 1;
            }
            !idle
        });

        removed
    }
}
