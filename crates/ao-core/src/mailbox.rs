//! Lock-free single-slot snapshot handoff, and deferred reclamation for the
//! snapshots it retires.
//!
//! Mirrors the atomic owned-pointer handoff `rf-event::manager` uses to pass
//! `EventManagerShared` state between producer and processor: a writer
//! builds a new, fully-initialized snapshot off the hot path, swaps it in
//! with a single `AcqRel` exchange, and the old snapshot is pushed onto a
//! `FreeList` rather than dropped in place, since a concurrent reader may
//! still hold a borrow taken just before the swap.

use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_queue::SegQueue;

/// A single-slot mailbox for atomically publishing an immutable snapshot of
/// type `T` from a control thread to a real-time reader.
pub struct UpdateSlot<T> {
    ptr: AtomicPtr<T>,
}

impl<T> UpdateSlot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            ptr: AtomicPtr::new(Box::into_raw(Box::new(initial))),
        }
    }

    /// Publish `new` as the current snapshot, returning the one it
    /// replaced. The caller should hand the returned box to a `FreeList`
    /// rather than drop it immediately.
    pub fn publish(&self, new: Box<T>) -> Box<T> {
        let new_ptr = Box::into_raw(new);
        let old_ptr = self.ptr.swap(new_ptr, Ordering::AcqRel);
        // SAFETY: old_ptr was produced by a prior `publish`/`new` call and
        // is only ever freed once, here.
        unsafe { Box::from_raw(old_ptr) }
    }

    /// Borrow the current snapshot.
    ///
    /// # Safety
    /// The returned reference must not outlive the mix cycle in which it
    /// was taken: retirement of a superseded snapshot is deferred, not
    /// synchronized with readers.
    #[inline]
    pub unsafe fn load(&self) -> &T {
        &*self.ptr.load(Ordering::Acquire)
    }
}

impl<T> Drop for UpdateSlot<T> {
    fn drop(&mut self) {
        let ptr = *self.ptr.get_mut();
        // SAFETY: unique access via `&mut self`, and the slot always holds
        // exactly one live allocation.
        unsafe {
            drop(Box::from_raw(ptr));
        }
    }
}

// SAFETY: `UpdateSlot<T>` only ever exposes `&T`, so it is Send/Sync
// whenever T is.
unsafe impl<T: Send> Send for UpdateSlot<T> {}
unsafe impl<T: Sync> Sync for UpdateSlot<T> {}

/// A queue of retired snapshots, drained periodically from a non-real-time
/// thread once it is safe to assume no reader still holds a reference
/// (after the mix cycle in which they were superseded has completed).
pub struct FreeList<T> {
    queue: SegQueue<Box<T>>,
}

impl<T> FreeList<T> {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
        }
    }

    #[inline]
    pub fn retire(&self, item: Box<T>) {
        self.queue.push(item);
    }

    /// Drop all pending retired snapshots. Call once per mix cycle from the
    /// control thread, after the cycle that superseded them has finished.
    pub fn reclaim(&self) {
        while self.queue.pop().is_some() {}
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<T> Default for FreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_returns_previous_snapshot() {
        let slot = UpdateSlot::new(1u32);
        let old = slot.publish(Box::new(2));
        assert_eq!(*old, 1);
        assert_eq!(unsafe { *slot.load() }, 2);
    }

    #[test]
    fn free_list_reclaims_retired_snapshots() {
        let list: FreeList<u32> = FreeList::new();
        list.retire(Box::new(7));
        list.retire(Box::new(8));
        assert_eq!(list.pending(), 2);
        list.reclaim();
        assert_eq!(list.pending(), 0);
    }
}
