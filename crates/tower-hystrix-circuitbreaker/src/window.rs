//! Time-bucketed ring shared by the rolling counters and the rolling
//! latency percentiles.
//!
//! Time is divided into fixed-length buckets numbered from the moment the
//! window was created. The ring keeps the newest `bucket_count` bucket
//! numbers; anything older falls out lazily the next time the ring is
//! touched, so an idle window needs no background timer.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Maps instants to bucket numbers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BucketClock {
    origin: Instant,
    bucket_millis: u64,
}

impl BucketClock {
    /// `window` must be a whole multiple of `buckets` milliseconds; the
    /// config builder enforces this.
    pub(crate) fn new(window: Duration, buckets: usize) -> Self {
        let bucket_millis = (window.as_millis() as u64 / buckets.max(1) as u64).max(1);
        Self {
            origin: Instant::now(),
            bucket_millis,
        }
    }

    pub(crate) fn index_at(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.origin).as_millis() as u64 / self.bucket_millis
    }

    pub(crate) fn current(&self) -> u64 {
        self.index_at(Instant::now())
    }
}

#[derive(Debug)]
struct Slot<T> {
    index: u64,
    data: T,
}

/// Ring of the newest `capacity` buckets.
#[derive(Debug)]
pub(crate) struct BucketRing<T> {
    capacity: u64,
    slots: VecDeque<Slot<T>>,
}

impl<T: Default> BucketRing<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1) as u64,
            slots: VecDeque::with_capacity(capacity),
        }
    }

    fn expire(&mut self, index: u64) {
        while let Some(front) = self.slots.front() {
            if front.index + self.capacity <= index {
                self.slots.pop_front();
            } else {
                break;
            }
        }
    }

    /// The bucket for `index`, opening it if needed.
    pub(crate) fn current(&mut self, index: u64) -> &mut T {
        self.expire(index);
        let open = match self.slots.back() {
            Some(slot) => slot.index < index,
            None => true,
        };
        if open {
            self.slots.push_back(Slot {
                index,
                data: T::default(),
            });
        }
        // Non-empty: either pushed above or already holding `index`.
        let last = self.slots.len() - 1;
        &mut self.slots[last].data
    }

    /// Buckets still inside the window at `index`, oldest first.
    pub(crate) fn visible(&mut self, index: u64) -> impl Iterator<Item = &T> {
        self.expire(index);
        self.slots.iter().map(|slot| &slot.data)
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}
