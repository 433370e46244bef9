//! Auxiliary effect slots and their target-dependency ordering.

use crate::{EffectProps, EffectState};

/// Where an effect slot's wet output is routed: straight to the device's
/// real mix, or into another slot's wet-input accumulator (effect chaining).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTarget {
    Device,
    Slot(u64),
}

/// One auxiliary effect slot: an id, a routing target, the currently-active
/// effect state, and the per-channel gains the mixer last resolved for
/// `target`.
pub struct EffectSlot {
    pub id: u64,
    pub target: EffectTarget,
    pub props: EffectProps,
    pub state: Box<dyn EffectState>,
    pub gain: f32,
    /// `true` between a property/target change and the next `update()`
    /// call that re-derives the state's internal coefficients.
    pub needs_update: bool,
}

impl EffectSlot {
    pub fn new(id: u64, sample_rate: f32, num_channels: usize) -> Self {
        let props = EffectProps::Null;
        let state = props.new_state(sample_rate, num_channels);
        Self {
            id,
            target: EffectTarget::Device,
            props,
            state,
            gain: 1.0,
            needs_update: true,
        }
    }

    pub fn set_props(&mut self, props: EffectProps, sample_rate: f32, num_channels: usize) {
        // A different effect kind needs a freshly constructed state; the
        // same kind can just re-derive coefficients on the existing one.
        if std::mem::discriminant(&self.props) != std::mem::discriminant(&props) {
            self.state = props.new_state(sample_rate, num_channels);
        }
        self.props = props;
        self.needs_update = true;
    }

    pub fn set_target(&mut self, target: EffectTarget) {
        if self.target != target {
            self.target = target;
            self.needs_update = true;
        }
    }
}

/// Order `N` active slots so that if `slots[i].target == Slot(slots[j].id)`
/// then `i` sorts before `j` (producer before consumer). Returns a
/// permutation of `0..slots.len()` giving the mix-cycle processing order.
///
/// Uses a reverse partition-copy: slots targeting the device occupy the tail
/// first, then slots whose target already sits in the sorted tail region are
/// pulled into the position immediately before it, repeating until every
/// slot is placed. A target cycle (or a target that names a retired slot)
/// can't be resolved; the remaining slots are placed arbitrarily rather than
/// looping forever.
pub fn sort_effect_slots(slots: &[EffectSlot]) -> Vec<usize> {
    let n = slots.len();
    let mut sorted = vec![0usize; n];
    let mut tail = n;

    let mut pending = Vec::with_capacity(n);
    for (idx, slot) in slots.iter().enumerate() {
        match slot.target {
            EffectTarget::Device => {
                tail -= 1;
                sorted[tail] = idx;
            }
            EffectTarget::Slot(_) => pending.push(idx),
        }
    }

    while !pending.is_empty() {
        let placed_ids: Vec<u64> = sorted[tail..].iter().map(|&i| slots[i].id).collect();
        let before = pending.len();
        pending.retain(|&idx| {
            if let EffectTarget::Slot(target_id) = slots[idx].target {
                if placed_ids.contains(&target_id) {
                    tail -= 1;
                    sorted[tail] = idx;
                    return false;
                }
            }
            true
        });
        if pending.len() == before {
            // Cycle or dangling target: break the stall by placing the rest
            // in their current relative order ahead of what's sorted.
            for idx in pending.drain(..) {
                tail -= 1;
                sorted[tail] = idx;
            }
            break;
        }
    }

    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_slot(id: u64, target: EffectTarget) -> EffectSlot {
        let mut slot = EffectSlot::new(id, 48000.0, 2);
        slot.target = target;
        slot
    }

    #[test]
    fn producer_sorts_before_its_consumer_target() {
        let slots = vec![
            dummy_slot(1, EffectTarget::Slot(2)),
            dummy_slot(2, EffectTarget::Device),
        ];
        let order = sort_effect_slots(&slots);
        let pos_of = |id: u64| order.iter().position(|&i| slots[i].id == id).unwrap();
        assert!(pos_of(1) < pos_of(2));
    }

    #[test]
    fn chain_of_three_sorts_transitively() {
        let slots = vec![
            dummy_slot(1, EffectTarget::Slot(2)),
            dummy_slot(2, EffectTarget::Slot(3)),
            dummy_slot(3, EffectTarget::Device),
        ];
        let order = sort_effect_slots(&slots);
        let pos_of = |id: u64| order.iter().position(|&i| slots[i].id == id).unwrap();
        assert!(pos_of(1) < pos_of(2));
        assert!(pos_of(2) < pos_of(3));
    }

    #[test]
    fn cycle_still_produces_a_full_permutation() {
        let slots = vec![
            dummy_slot(1, EffectTarget::Slot(2)),
            dummy_slot(2, EffectTarget::Slot(1)),
        ];
        let order = sort_effect_slots(&slots);
        let mut seen: Vec<usize> = order.clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
    }
}
