//! Bounded single-producer/single-consumer ring of fixed-size byte slots.
//!
//! Not a lock-free queue: a [`parking_lot::Mutex`] plus
//! [`parking_lot::Condvar`] guard the head/tail indices, the same blocking
//! wait shape the ring buffer's wait strategy in this workspace uses
//! elsewhere. The producer never blocks — a commit against a full ring
//! is dropped and counted, never retried and never awaited.

use std::cell::UnsafeCell;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::counters::Counters;
use crate::error::{Result, SgError};

/// A preallocated, fixed-capacity byte buffer with a mutable length.
pub struct Slot {
    data: Vec<u8>,
    len: usize,
}

impl Slot {
    fn new(capacity: usize) -> Self {
        Self { data: vec![0u8; capacity], len: 0 }
    }

    /// Bytes currently held in the slot.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Length of the bytes currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the slot holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total byte capacity of the slot (the ring's slot size `B`).
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Reset the slot to empty without touching its backing allocation.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append bytes, growing the logical length. Fails without writing
    /// anything if the append would exceed the slot's capacity — the
    /// caller is expected to treat this as the payload-too-large
    /// boundary case and count it rather than truncate silently.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self.len + bytes.len();
        if needed > self.data.len() {
            return Err(SgError::Overflow { needed, capacity: self.data.len() });
        }
        self.data[self.len..needed].copy_from_slice(bytes);
        self.len = needed;
        Ok(())
    }
}

struct RingState {
    head: usize,
    tail: usize,
}

/// A bounded SPSC ring of `n` slots of `b` bytes each.
///
/// Safety argument for the interior mutability below: the producer only
/// ever dereferences the slot at `head`, the consumer only ever
/// dereferences the slot at `tail`; `commit`/`pop` hold the mutex while
/// advancing whichever index they own, and the full/empty checks ensure
/// the two indices are never equal to a slot the other side is
/// currently touching. This mirrors the `*mut T` slot access the
/// workspace's other ring buffer implementation relies on, but replaces
/// its lock-free cursor discipline with the mutex this design requires.
pub struct Ring {
    slots: Box<[UnsafeCell<Slot>]>,
    n: usize,
    state: Mutex<RingState>,
    not_empty: Condvar,
    counters: Arc<Counters>,
}

unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Ring {
    /// Allocate `n` slots of `b` bytes, head = 0, tail = n - 1.
    pub fn alloc(n: usize, b: usize, counters: Arc<Counters>) -> Result<Self> {
        if n < 2 {
            return Err(SgError::config("ring slot count must be at least 2"));
        }
        let mut slots = Vec::with_capacity(n);
        for _ in 0..n {
            slots.push(UnsafeCell::new(Slot::new(b)));
        }
        Ok(Self {
            slots: slots.into_boxed_slice(),
            n,
            state: Mutex::new(RingState { head: 0, tail: n - 1 }),
            not_empty: Condvar::new(),
            counters,
        })
    }

    /// Total slot count `N`.
    pub fn capacity(&self) -> usize {
        self.n
    }

    /// Per-slot byte capacity `B`.
    pub fn slot_capacity(&self) -> usize {
        unsafe { &*self.slots[0].get() }.capacity()
    }

    /// Mutable borrow of the slot currently at `head`. Only the producer
    /// thread should call this. Does not touch `head`/`tail`.
    #[allow(clippy::mut_from_ref)]
    pub fn head_slot(&self) -> &mut Slot {
        let head = self.state.lock().head;
        unsafe { &mut *self.slots[head].get() }
    }

    /// Commit the current head slot. Advances `head` and wakes the
    /// consumer, unless the ring is full, in which case the commit is
    /// dropped: `overruns` is incremented, the head slot is recycled
    /// (length reset to 0), and `head` does **not** advance.
    ///
    /// Returns `true` if the commit succeeded, `false` on drop-on-full.
    pub fn commit(&self) -> bool {
        let mut state = self.state.lock();
        let next = (state.head + 1) % self.n;
        if next != state.tail {
            state.head = next;
            drop(state);
            self.not_empty.notify_all();
            true
        } else {
            self.counters.inc_overruns();
            unsafe { &mut *self.slots[state.head].get() }.clear();
            tracing::debug!(head = state.head, overruns = self.counters.overruns(), "ring full, dropping delivery");
            false
        }
    }

    /// Block until a slot is available, then return a read-only borrow
    /// of the newly consumed tail slot. Only the consumer thread should
    /// call this.
    pub fn pop(&self) -> RingGuard<'_> {
        let mut state = self.state.lock();
        let mut next = (state.tail + 1) % self.n;
        while next == state.head {
            self.counters.inc_queue_block();
            self.not_empty.wait(&mut state);
            next = (state.tail + 1) % self.n;
        }
        unsafe { &mut *self.slots[state.tail].get() }.clear();
        state.tail = next;
        self.counters.inc_processed();
        let tail = state.tail;
        drop(state);
        RingGuard { ring: self, index: tail }
    }

    /// Like [`Ring::pop`], but returns `None` instead of blocking
    /// forever once `running` is cleared and no message ever arrives.
    /// Used by the egress worker so it can observe shutdown between
    /// wakeups rather than being forcibly cancelled while holding the
    /// ring mutex.
    pub fn pop_while(&self, running: &std::sync::atomic::AtomicBool) -> Option<RingGuard<'_>> {
        use std::sync::atomic::Ordering;
        let mut state = self.state.lock();
        let mut next = (state.tail + 1) % self.n;
        while next == state.head {
            if !running.load(Ordering::Acquire) {
                return None;
            }
            self.counters.inc_queue_block();
            self.not_empty.wait_for(&mut state, std::time::Duration::from_millis(200));
            if !running.load(Ordering::Acquire) {
                return None;
            }
            next = (state.tail + 1) % self.n;
        }
        unsafe { &mut *self.slots[state.tail].get() }.clear();
        state.tail = next;
        self.counters.inc_processed();
        let tail = state.tail;
        drop(state);
        Some(RingGuard { ring: self, index: tail })
    }

    /// Free slot count using the unambiguous formula documented in
    /// the design notes: `free = N - ((head - tail + N) mod N) - 1`.
    pub fn free_count(&self) -> usize {
        let state = self.state.lock();
        Self::free_count_locked(self.n, state.head, state.tail)
    }

    /// Count of committed-but-unconsumed slots currently queued.
    pub fn in_use(&self) -> usize {
        let state = self.state.lock();
        Self::in_use_locked(self.n, state.head, state.tail)
    }

    fn free_count_locked(n: usize, head: usize, tail: usize) -> usize {
        let diff = ((head as isize) - (tail as isize) + (n as isize)) % (n as isize);
        n - (diff as usize) - 1
    }

    fn in_use_locked(n: usize, head: usize, tail: usize) -> usize {
        let diff = ((head as isize) - (tail as isize) - 1 + (n as isize)) % (n as isize);
        diff as usize
    }

    /// Wake any blocked consumer without mutating state — used during
    /// shutdown so `pop_while` re-checks its running flag promptly.
    pub fn wake_all(&self) {
        self.not_empty.notify_all();
    }
}

/// Read-only borrow of a just-consumed slot, valid for the lifetime of
/// the borrow, returned by [`Ring::pop`] and [`Ring::pop_while`].
pub struct RingGuard<'a> {
    ring: &'a Ring,
    index: usize,
}

impl<'a> RingGuard<'a> {
    /// The consumed slot's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { &*self.ring.slots[self.index].get() }.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: usize, b: usize) -> Ring {
        Ring::alloc(n, b, Arc::new(Counters::new())).unwrap()
    }

    #[test]
    fn empty_ring_reports_expected_free_capacity() {
        // With head = 0 and tail = N - 1, the resolved free-count formula
        // (SPEC_FULL.md section 9) yields N - 2 immediately usable slots
        // before the first overrun, not the naive N - 1.
        let r = ring(4, 16);
        assert_eq!(r.free_count(), 2);
        assert_eq!(r.in_use(), 0);
    }

    #[test]
    fn commit_advances_head_and_wakes_consumer() {
        let r = ring(4, 16);
        r.head_slot().extend_from_slice(b"hello").unwrap();
        assert!(r.commit());
        assert_eq!(r.in_use(), 1);
        let slot = r.pop();
        assert_eq!(slot.as_bytes(), b"hello");
        assert_eq!(r.in_use(), 0);
    }

    #[test]
    fn full_ring_drops_and_counts_overrun() {
        let counters = Arc::new(Counters::new());
        // capacity for N=3 is N-2=1 usable slot before the consumer runs.
        let r = Ring::alloc(3, 16, counters.clone()).unwrap();
        r.head_slot().extend_from_slice(b"a").unwrap();
        assert!(r.commit());
        r.head_slot().extend_from_slice(b"b").unwrap();
        assert!(!r.commit());
        assert_eq!(counters.overruns(), 1);
        assert_eq!(r.in_use(), 1);
    }

    #[test]
    fn extend_beyond_capacity_is_rejected_not_truncated() {
        let r = ring(4, 4);
        let slot = r.head_slot();
        assert!(slot.extend_from_slice(b"1234").is_ok());
        assert!(slot.extend_from_slice(b"5").is_err());
        assert_eq!(slot.len(), 4);
    }

    #[test]
    fn fill_and_overrun_scenario() {
        // Scenario 2 from the testable-properties section: N=2, push 5
        // deliveries of "A" with nobody consuming.
        let counters = Arc::new(Counters::new());
        let r = Ring::alloc(2, 8, counters.clone()).unwrap();
        let mut committed = 0;
        for _ in 0..5 {
            r.head_slot().extend_from_slice(b"A").unwrap();
            if r.commit() {
                committed += 1;
            }
        }
        assert_eq!(committed + counters.overruns() as usize, 5);
        assert!(counters.overruns() >= 3);
        assert!(r.in_use() <= 2);
    }
}
