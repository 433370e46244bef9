//! `Context`: the listener, the active voice array, the effect-slot chain
//! and the voice-change queue bound to one device. `process` runs the
//! three-phase commit/mix/effect cycle once per block.

use ao_core::{AsyncEvent, ChannelBuffer, EventConsumer, EventProducer, SourceState, async_event_channel};
use ao_fx::{EffectSlot, EffectTarget, sort_effect_slots};

use crate::params::{AuxSendParams, ListenerParams, calc_voice_params};
use crate::voice::{PlayState, Voice};
use crate::voice_change::{TransitionKind, VoiceChangeQueue};

pub struct Context {
    pub listener: ListenerParams,
    pub gain: f32,
    pub dry_ambi_order: usize,

    voices: Vec<Voice>,
    slots: Vec<EffectSlot>,
    sort_order: Vec<usize>,
    sort_dirty: bool,

    changes: VoiceChangeQueue,
    events_tx: EventProducer<AsyncEvent>,
    events_rx: EventConsumer<AsyncEvent>,

    hold_updates: bool,
    update_count: u64,
}

impl Context {
    pub fn new(num_voices: usize, sample_rate: f32, dry_ambi_order: usize) -> Self {
        let ambi_channels = (dry_ambi_order + 1) * (dry_ambi_order + 1);
        let (events_tx, events_rx) = async_event_channel();
        Self {
            listener: ListenerParams::default(),
            gain: 1.0,
            dry_ambi_order,
            voices: (0..num_voices).map(|_| Voice::new(sample_rate, ambi_channels)).collect(),
            slots: Vec::new(),
            sort_order: Vec::new(),
            sort_dirty: true,
            changes: VoiceChangeQueue::new(),
            events_tx,
            events_rx,
            hold_updates: false,
            update_count: 0,
        }
    }

    pub fn voice_changes(&self) -> &VoiceChangeQueue {
        &self.changes
    }

    pub fn add_slot(&mut self, id: u64, sample_rate: f32, num_channels: usize) -> usize {
        self.slots.push(EffectSlot::new(id, sample_rate, num_channels));
        self.sort_dirty = true;
        self.slots.len() - 1
    }

    pub fn set_slot_target(&mut self, slot_idx: usize, target: EffectTarget) {
        if let Some(slot) = self.slots.get_mut(slot_idx) {
            slot.set_target(target);
            self.sort_dirty = true;
        }
    }

    pub fn voice(&mut self, idx: usize) -> &mut Voice {
        &mut self.voices[idx]
    }

    pub fn events(&mut self) -> &mut EventConsumer<AsyncEvent> {
        &mut self.events_rx
    }

    pub fn set_hold_updates(&mut self, hold: bool) {
        self.hold_updates = hold;
    }

    /// Emits a disconnect event and, if this context opted in, resets
    /// every voice to Stopped. Called once per context by
    /// `Device::do_disconnect`.
    pub fn notify_disconnect(&mut self, message: &str, stop_voices: bool) {
        self.events_tx.push(AsyncEvent::Disconnect { message: message.to_string() });
        if stop_voices {
            for voice in &mut self.voices {
                voice.reset_to_stopped();
            }
        }
    }

    /// The three-phase per-block cycle: drain queued voice-changes, then
    /// recompute parameters (unless held), then mix every playing voice
    /// and run the effect-slot chain in dependency order. `dry` is the
    /// device's shared ambisonic mix; the caller zeroes it once per block
    /// before the first context, since multiple contexts accumulate into it.
    pub fn process(&mut self, dry: &mut ChannelBuffer, block: usize, device_time: f64, device_rate: f32) {
        self.commit();

        self.update_count = self.update_count.wrapping_add(1);
        if !self.hold_updates {
            self.recalculate();
        }
        self.update_count = self.update_count.wrapping_add(1);

        let mut wet_buffers: Vec<ChannelBuffer> = self.slots.iter().map(|_| ChannelBuffer::new(1, block)).collect();

        let sends: Vec<AuxSendParams> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| AuxSendParams {
                slot_index: Some(i),
                gain: slot.gain,
                gain_hf: 1.0,
                room_rolloff: 0.0,
                gain_auto: true,
                gain_hf_auto: true,
                decay: None,
            })
            .collect();

        for voice in self.voices.iter_mut() {
            if !matches!(voice.play_state(), PlayState::Playing | PlayState::Stopping) {
                continue;
            }
            let source = unsafe { *voice.props.load() };
            let params = calc_voice_params(&self.listener, &source, self.gain, device_rate, self.dry_ambi_order, &sends);
            let mut refs: Vec<&mut ChannelBuffer> = wet_buffers.iter_mut().collect();
            voice.mix(dry, &mut refs, &params, block, device_time, &mut self.events_tx);
        }

        self.run_effects(dry, &mut wet_buffers);

        if !self.events_rx.is_empty() {
            // A real backend would notify a futex/condvar here; our event
            // consumer is polled directly by the app thread instead.
        }
    }

    fn commit(&mut self) {
        let mut stop_events = Vec::new();
        let voices = &mut self.voices;
        self.changes.drain(|change| {
            match change.state {
                TransitionKind::Reset | TransitionKind::Stop => {
                    if let Some(old) = change.old_voice {
                        if let Some(voice) = voices.get_mut(old) {
                            let changed = voice.request_stop();
                            voice.set_source_id(0);
                            if changed || change.state == TransitionKind::Reset {
                                stop_events.push(change.source_id);
                            }
                        }
                    }
                }
                TransitionKind::Pause => {
                    if let Some(old) = change.old_voice {
                        if let Some(voice) = voices.get_mut(old) {
                            if voice.request_stop() {
                                stop_events.push(change.source_id);
                            }
                        }
                    }
                }
                TransitionKind::Play => {
                    let mut old_was_stopped = true;
                    if let Some(old) = change.old_voice {
                        if let Some(voice) = voices.get_mut(old) {
                            old_was_stopped = !voice.request_stop();
                            voice.set_source_id(0);
                        }
                    }
                    if let Some(new) = change.new_voice {
                        if let Some(voice) = voices.get_mut(new) {
                            voice.set_source_id(change.source_id);
                            voice.set_play_state(PlayState::Playing);
                        }
                    }
                    if change.old_voice.is_none() || !old_was_stopped {
                        stop_events.push(change.source_id);
                    }
                }
                TransitionKind::Restart => {
                    let mut prior_playing = false;
                    if let Some(old) = change.old_voice {
                        if let Some(voice) = voices.get_mut(old) {
                            prior_playing = voice.source_id() != 0;
                            voice.request_stop();
                            voice.set_source_id(0);
                        }
                    }
                    if let Some(new) = change.new_voice {
                        if let Some(voice) = voices.get_mut(new) {
                            voice.set_source_id(change.source_id);
                            voice.set_play_state(if prior_playing { PlayState::Playing } else { PlayState::Stopped });
                        }
                    }
                }
            }
        });
        for source_id in stop_events {
            self.events_tx.push(AsyncEvent::SourceState { source_id, state: SourceState::Stopped });
        }
    }

    fn recalculate(&mut self) {
        if self.sort_dirty {
            self.sort_order = sort_effect_slots(&self.slots);
            self.sort_dirty = false;
        }
        for slot in &mut self.slots {
            slot.needs_update = false;
        }
    }

    fn run_effects(&mut self, dry: &mut ChannelBuffer, wet_buffers: &mut [ChannelBuffer]) {
        let device_channels = dry.channels();
        for &idx in &self.sort_order {
            let target = self.slots[idx].target;
            // Both destinations (the device's ambisonic W channel, or a
            // target slot's mono wet accumulator) read back from index 0,
            // so the same equal-power stereo-to-mono gain vector serves
            // either case.
            let mut gains = ao_fx::TargetGains::silence(device_channels);
            gains.left[0] = std::f32::consts::FRAC_1_SQRT_2;
            gains.right[0] = std::f32::consts::FRAC_1_SQRT_2;
            let props = self.slots[idx].props.clone();
            self.slots[idx].state.update(&props, &gains);
            let input = wet_buffers[idx].channel(0).to_vec();
            match target {
                EffectTarget::Device => {
                    self.slots[idx].state.process(&input, dry);
                }
                EffectTarget::Slot(target_id) => {
                    let target_idx = self.slots.iter().position(|s| s.id == target_id);
                    if let Some(target_idx) = target_idx {
                        if target_idx == idx {
                            // Self-target cycle: the sort tolerates this by
                            // leaving the slot unreachable, so its signal is
                            // dropped rather than fed back into itself.
                            continue;
                        }
                        let split_at = target_idx.max(idx);
                        let (head, tail) = wet_buffers.split_at_mut(split_at);
                        let target_buf = if target_idx > idx { &mut tail[0] } else { &mut head[target_idx] };
                        let mut stereo_as_mono = ChannelBuffer::new(1, target_buf.frames());
                        self.slots[idx].state.process(&input, &mut stereo_as_mono);
                        let src = stereo_as_mono.channel(0);
                        target_buf.mix_add(0, src, 1.0, src.len());
                    }
                }
            }
        }
    }
}
