//! Lossy event bus between the packet pipelines and an external consumer.
//!
//! Backed by crossbeam's `ArrayQueue`, a pre-allocated lock-free MPMC ring,
//! so any number of pipeline workers can publish concurrently while one
//! consumer drains. Publishing on a full queue rejects the new record
//! (newest-drop) and bumps a drop counter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use thiserror::Error;

use crate::packet::PacketRecord;

/// Event bus error conditions.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Event queue capacity exceeded")]
    QueueFull,
    #[error("Invalid capacity (must be a power of two)")]
    InvalidCapacity,
    #[error("Event bus closed")]
    Closed,
}

/// Cache-line aligned atomic counter to prevent false sharing
#[repr(align(64))]
struct AlignedCounter(AtomicU64);

impl AlignedCounter {
    #[inline]
    fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    #[inline]
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

struct InnerBus {
    queue: ArrayQueue<PacketRecord>,
    published: AlignedCounter,
    dropped: AlignedCounter,
    closed: AtomicBool,
}

/// Shared handle to a bounded event bus.
pub struct EventBus {
    inner: Arc<InnerBus>,
}

impl EventBus {
    /// Creates new event bus with specified capacity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Must be a power of two, mirroring ring buffer sizing.
    pub fn with_capacity(capacity: usize) -> Result<Self, EventError> {
        if !capacity.is_power_of_two() {
            return Err(EventError::InvalidCapacity);
        }

        Ok(Self {
            inner: Arc::new(InnerBus {
                queue: ArrayQueue::new(capacity),
                published: AlignedCounter::new(0),
                dropped: AlignedCounter::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Creates new handle to shared event bus.
    #[inline]
    pub fn share(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Publishes a record without blocking.
    ///
    /// On a full queue the record is discarded and counted as dropped.
    #[inline]
    pub fn publish(&self, record: PacketRecord) -> Result<(), EventError> {
        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.dropped.bump();
            return Err(EventError::Closed);
        }

        match self.inner.queue.push(record) {
            Ok(()) => {
                self.inner.published.bump();
                Ok(())
            }
            Err(_rejected) => {
                self.inner.dropped.bump();
                Err(EventError::QueueFull)
            }
        }
    }

    /// Attempts to receive a record from the bus.
    ///
    /// Returns `None` if the queue is empty.
    #[inline]
    pub fn recv(&self) -> Option<PacketRecord> {
        self.inner.queue.pop()
    }

    /// Stops accepting new records. Records already queued can still be
    /// received.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Closed and nothing left to receive.
    pub fn is_drained(&self) -> bool {
        self.is_closed() && self.inner.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.queue.capacity()
    }

    /// Records accepted since creation.
    pub fn published(&self) -> u64 {
        self.inner.published.get()
    }

    /// Records rejected since creation.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.get()
    }
}
