//! The voice-change queue: a singly-linked list the API thread appends to
//! and the mixer drains once per commit phase. Entries are boxed and
//! chained through `next` rather than stored in a `Vec` so the API thread
//! can append via a single atomic CAS on the tail without touching
//! anything the mixer might be mid-traversal on.

use std::sync::atomic::{AtomicPtr, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Reset,
    Stop,
    Play,
    Pause,
    Restart,
}

pub struct VoiceChange {
    pub old_voice: Option<usize>,
    pub new_voice: Option<usize>,
    pub state: TransitionKind,
    pub source_id: u64,
    next: AtomicPtr<VoiceChange>,
}

impl VoiceChange {
    fn new(old_voice: Option<usize>, new_voice: Option<usize>, state: TransitionKind, source_id: u64) -> Box<Self> {
        Box::new(Self { old_voice, new_voice, state, source_id, next: AtomicPtr::new(std::ptr::null_mut()) })
    }
}

/// Tail-appending singly-linked queue; the mixer owns traversal from
/// `current` and advances it past each entry it consumes. `head` never
/// moves — it exists solely so `Drop` can reclaim the whole chain.
pub struct VoiceChangeQueue {
    head: *mut VoiceChange,
    tail: AtomicPtr<VoiceChange>,
    current: *mut VoiceChange,
}

unsafe impl Send for VoiceChangeQueue {}
unsafe impl Sync for VoiceChangeQueue {}

impl VoiceChangeQueue {
    pub fn new() -> Self {
        let sentinel = Box::into_raw(VoiceChange::new(None, None, TransitionKind::Stop, 0));
        Self { head: sentinel, tail: AtomicPtr::new(sentinel), current: sentinel }
    }

    /// Appends a new transition to the tail. Safe to call from the API
    /// thread concurrently with the mixer draining from `current`.
    pub fn push(&self, old_voice: Option<usize>, new_voice: Option<usize>, state: TransitionKind, source_id: u64) {
        let node = Box::into_raw(VoiceChange::new(old_voice, new_voice, state, source_id));
        let prev = self.tail.swap(node, Ordering::AcqRel);
        unsafe { (*prev).next.store(node, Ordering::Release) };
    }

    /// Drains every entry appended since the last commit, calling `f` on
    /// each in order. Mixer-thread only.
    pub fn drain(&mut self, mut f: impl FnMut(&VoiceChange)) {
        loop {
            let next = unsafe { (*self.current).next.load(Ordering::Acquire) };
            if next.is_null() {
                break;
            }
            f(unsafe { &*next });
            self.current = next;
        }
    }
}

impl Default for VoiceChangeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VoiceChangeQueue {
    fn drop(&mut self) {
        let mut cursor = self.head;
        while !cursor.is_null() {
            let next = unsafe { (*cursor).next.load(Ordering::Acquire) };
            unsafe { drop(Box::from_raw(cursor)) };
            cursor = next;
        }
    }
}
