//! Async event ring between the mix thread and the application thread.
//!
//! Shaped after `rf-event::manager`'s `EventManagerHandle`/
//! `EventManagerProcessor` split: one side owns the `rtrb::Producer` and is
//! `Clone`/`Send`/`Sync` for the application to hold, the other owns the
//! `rtrb::Consumer` and lives on the mix thread.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::EVENT_RING_CAPACITY;

/// Events the mixer raises for the application to drain off the real-time
/// thread. Producing one never blocks or allocates; a full ring silently
/// drops the event rather than stalling the mixer.
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncEvent {
    /// The mix thread is shutting down and will process no further cycles.
    KillThread,
    /// A source's playback state changed (e.g. Playing -> Stopped).
    SourceState { source_id: u64, state: SourceState },
    /// One or more queued buffers finished playing and were unlinked from
    /// the source this cycle; `count` is how many completed.
    BufferComplete { source_id: u64, count: u32 },
    /// An effect slot's effect state was swapped for a new one.
    EffectRelease { slot_id: u64 },
    /// The device disconnected (device lost / format change upstream).
    Disconnect { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// Producer half of the event ring. Cheap to clone; intended to be handed
/// to the application thread(s) that poll for events.
pub struct EventProducer<T> {
    inner: Producer<T>,
}

impl<T> EventProducer<T> {
    /// Push an event, dropping it silently if the ring is full.
    #[inline]
    pub fn push(&mut self, event: T) {
        let _ = self.inner.push(event);
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }
}

/// Consumer half of the event ring, owned by the mix/control thread that
/// drains it.
pub struct EventConsumer<T> {
    inner: Consumer<T>,
}

impl<T> EventConsumer<T> {
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.inner.pop().ok()
    }

    pub fn drain_into(&mut self, sink: &mut Vec<T>) {
        while let Some(event) = self.pop() {
            sink.push(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Construct a bounded SPSC event channel of the given capacity.
pub fn event_channel<T>(capacity: usize) -> (EventProducer<T>, EventConsumer<T>) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        EventProducer { inner: producer },
        EventConsumer { inner: consumer },
    )
}

/// Construct the default-sized async event channel used between a
/// `Context` and its owning application.
pub fn async_event_channel() -> (EventProducer<AsyncEvent>, EventConsumer<AsyncEvent>) {
    event_channel(EVENT_RING_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_in_order() {
        let (mut tx, mut rx) = async_event_channel();
        tx.push(AsyncEvent::SourceState {
            source_id: 1,
            state: SourceState::Playing,
        });
        tx.push(AsyncEvent::KillThread);

        assert_eq!(
            rx.pop(),
            Some(AsyncEvent::SourceState {
                source_id: 1,
                state: SourceState::Playing
            })
        );
        assert_eq!(rx.pop(), Some(AsyncEvent::KillThread));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn full_ring_drops_rather_than_blocks() {
        let (mut tx, mut rx) = event_channel::<u32>(2);
        tx.push(1);
        tx.push(2);
        tx.push(3); // dropped, ring holds capacity - 1 usable slots
        let mut drained = Vec::new();
        rx.drain_into(&mut drained);
        assert!(drained.len() <= 2);
    }
}
