//! The per-voice state machine and mix routine: decode, resample, filter
//! and pan one source into the device's dry ambisonic bus plus whichever
//! auxiliary sends it's currently routed to.
//!
//! Panning always lands in the ambisonic intermediate (see `params.rs`):
//! the device's dry mix is itself a set of ambisonic channels, so a voice
//! never needs to know whether the final output is a 5.1 speaker rig or
//! an HRTF binaural pair — that choice is made once, downstream, at
//! device post-process.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use ao_core::{AsyncEvent, ChannelBuffer, EventProducer, Sample, UpdateSlot};
use ao_dsp::MonoProcessor;
use ao_dsp::biquad::BiquadTDF2;

use crate::buffer::{BufferItem, BufferStorage};
use crate::decoder::{decode_ima4_block, decode_ms_adpcm_block, decode_trivial, SampleFormat};
use crate::params::{SourceParams, VoiceParams};
use crate::resampler::{resample, ResamplerKind};

/// How many frames a streaming callback is asked to fill per pull. Chosen
/// to cover a typical device block plus resampler edge history in one
/// round trip without growing unbounded.
const STREAM_PULL_FRAMES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayState {
    Stopped = 0,
    Playing = 1,
    Stopping = 2,
    Pending = 3,
}

impl PlayState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PlayState::Playing,
            2 => PlayState::Stopping,
            3 => PlayState::Pending,
            _ => PlayState::Stopped,
        }
    }
}

/// One link in a voice's buffer queue: the `BufferItem` plus its decoded
/// per-channel sample cache. Static items decode fully up front; a
/// callback-backed item decodes incrementally as playback reaches new
/// frames, via `ensure_decoded`.
struct QueuedBuffer {
    item: BufferItem,
    decoded: Vec<Vec<Sample>>,
    channels: usize,
    frame_count: Option<usize>,
    loop_points: Option<(usize, usize)>,
}

impl QueuedBuffer {
    fn new(item: BufferItem) -> Self {
        let channels = item.channels().max(1);
        let frame_count = item.frame_count();
        let loop_points = item.loop_points();
        let decoded = if item.is_streaming() { vec![Vec::new(); channels] } else { decode_whole(&item) };
        Self { item, decoded, channels, frame_count, loop_points }
    }

    /// Pulls from the streaming callback until at least `frames` frames are
    /// buffered or the callback signals end-of-stream (a short or
    /// non-positive fill), at which point `frame_count` is fixed to however
    /// many frames were actually produced.
    fn ensure_decoded(&mut self, frames: usize) {
        if self.frame_count.is_some() || self.decoded[0].len() >= frames {
            return;
        }
        let BufferStorage::Callback(callback) = self.item.storage() else { return };
        let fmt = self.item.format();
        let Some(bps) = fmt.bytes_per_sample() else { return };
        let frame_bytes = bps * self.channels;
        if frame_bytes == 0 {
            return;
        }
        while self.decoded[0].len() < frames {
            let mut chunk = vec![0u8; frame_bytes * STREAM_PULL_FRAMES];
            let n = callback.fill(&mut chunk);
            if n <= 0 {
                self.frame_count = Some(self.decoded[0].len());
                return;
            }
            let produced = (n as usize / frame_bytes).min(STREAM_PULL_FRAMES);
            if produced == 0 {
                self.frame_count = Some(self.decoded[0].len());
                return;
            }
            for frame in 0..produced {
                for ch in 0..self.channels {
                    let idx = frame * self.channels + ch;
                    self.decoded[ch].push(decode_trivial(fmt, &chunk, idx));
                }
            }
        }
    }

    fn sample_at(&self, channel: usize, idx: i64) -> Sample {
        if idx < 0 || channel >= self.channels {
            return 0.0;
        }
        let idx = idx as usize;
        let data = &self.decoded[channel];
        if let Some((loop_start, loop_end)) = self.loop_points {
            if loop_end > loop_start && idx >= loop_end {
                let span = loop_end - loop_start;
                let wrapped = loop_start + (idx - loop_start) % span;
                return data.get(wrapped).copied().unwrap_or(0.0);
            }
        }
        data.get(idx).copied().unwrap_or(0.0)
    }
}

pub struct Voice {
    play_state: AtomicU8,
    source_id: AtomicU64,
    pub props: UpdateSlot<SourceParams>,

    step: u32,
    resampler: ResamplerKind,
    position: i64,
    frac: u32,

    current: Option<QueuedBuffer>,
    queue: VecDeque<QueuedBuffer>,
    channels: usize,

    direct_filters: Vec<(BiquadTDF2, BiquadTDF2)>,
    send_filters: Vec<Vec<(BiquadTDF2, BiquadTDF2)>>,

    current_gain: Vec<f32>,
    target_gain: Vec<f32>,
    /// Total length in samples of the ramp currently in progress; `counter`
    /// counts down from this to 0 as blocks are mixed.
    ramp_len: usize,
    counter: usize,
    fading: bool,

    start_time: Option<f64>,
    sample_rate: f32,
}

impl Voice {
    pub fn new(sample_rate: f32, ambi_channels: usize) -> Self {
        Self {
            play_state: AtomicU8::new(PlayState::Stopped as u8),
            source_id: AtomicU64::new(0),
            props: UpdateSlot::new(SourceParams::default()),
            step: ao_core::MIXER_FRAC_ONE,
            resampler: ResamplerKind::Linear,
            position: 0,
            frac: 0,
            current: None,
            queue: VecDeque::new(),
            channels: 0,
            direct_filters: Vec::new(),
            send_filters: Vec::new(),
            current_gain: vec![0.0; ambi_channels],
            target_gain: vec![0.0; ambi_channels],
            ramp_len: 1,
            counter: 0,
            fading: false,
            start_time: None,
            sample_rate,
        }
    }

    pub fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.play_state.load(Ordering::Acquire))
    }

    pub fn set_play_state(&self, state: PlayState) {
        self.play_state.store(state as u8, Ordering::Release);
    }

    pub fn source_id(&self) -> u64 {
        self.source_id.load(Ordering::Acquire)
    }

    pub fn set_source_id(&self, id: u64) {
        self.source_id.store(id, Ordering::Release);
    }

    /// Idempotent Playing/Pending -> Stopping transition used by the
    /// commit phase's Reset/Stop/Pause dispatch. Returns whether the
    /// state actually changed (callers use this to decide whether to
    /// emit a source-state event).
    pub fn request_stop(&self) -> bool {
        let prev = self.play_state.swap(PlayState::Stopping as u8, Ordering::AcqRel);
        matches!(PlayState::from_u8(prev), PlayState::Playing | PlayState::Pending)
    }

    pub fn reset_to_stopped(&mut self) {
        self.set_play_state(PlayState::Stopped);
        self.set_source_id(0);
        self.current = None;
        self.queue.clear();
        self.position = 0;
        self.frac = 0;
        self.current_gain.fill(0.0);
        self.target_gain.fill(0.0);
        self.counter = 0;
        self.fading = false;
    }

    fn resize_for_current(&mut self) {
        self.channels = self.current.as_ref().map(|b| b.channels).unwrap_or(1);
        self.direct_filters = (0..self.channels).map(|_| (BiquadTDF2::new(self.sample_rate), BiquadTDF2::new(self.sample_rate))).collect();
    }

    /// Clears any queued buffers and starts playback of `item` immediately.
    pub fn attach_buffer(&mut self, item: BufferItem, start_time: Option<f64>) {
        self.queue.clear();
        self.current = Some(QueuedBuffer::new(item));
        self.resize_for_current();
        self.position = 0;
        self.frac = 0;
        self.start_time = start_time;
        self.set_play_state(PlayState::Playing);
    }

    /// Appends `item` to the playback queue. If nothing is currently
    /// playing it becomes the current buffer immediately; otherwise it
    /// plays gaplessly once every buffer ahead of it finishes.
    pub fn enqueue_buffer(&mut self, item: BufferItem) {
        if self.current.is_none() {
            self.current = Some(QueuedBuffer::new(item));
            self.resize_for_current();
            self.position = 0;
            self.frac = 0;
            self.set_play_state(PlayState::Playing);
        } else {
            self.queue.push_back(QueuedBuffer::new(item));
        }
    }

    pub fn ensure_send_filters(&mut self, num_sends: usize) {
        while self.send_filters.len() < num_sends {
            let filters = (0..self.channels.max(1))
                .map(|_| (BiquadTDF2::new(self.sample_rate), BiquadTDF2::new(self.sample_rate)))
                .collect();
            self.send_filters.push(filters);
        }
    }

    /// Reads one sample at a position relative to the start of `current`,
    /// transparently continuing into queued buffers once `current` (and any
    /// buffers ahead of it) run out — this is what makes the scratch window
    /// the resampler reads from gapless across a buffer boundary. A
    /// buffer with loop points never falls through to the next one. Reads
    /// into a queued buffer that hasn't started streaming yet return
    /// silence rather than priming it early.
    #[inline]
    fn sample_at(&self, channel: usize, idx: i64) -> Sample {
        if idx < 0 {
            return 0.0;
        }
        let Some(current) = &self.current else { return 0.0 };
        let idx = idx as usize;
        if let Some(len) = current.frame_count {
            if current.loop_points.is_none() && idx >= len {
                let mut remaining = idx - len;
                for buf in &self.queue {
                    match buf.frame_count {
                        Some(buf_len) if buf.loop_points.is_none() && remaining >= buf_len => {
                            remaining -= buf_len;
                        }
                        _ => return buf.sample_at(channel, remaining as i64),
                    }
                }
                return 0.0;
            }
        }
        current.sample_at(channel, idx as i64)
    }

    /// Advances past any buffers that finished during this mix cycle,
    /// rebasing `position` onto the new current buffer and resizing the
    /// per-channel filter state if its channel count differs. Returns how
    /// many buffers completed, for the `BufferComplete` event count.
    fn advance_finished_buffers(&mut self) -> u32 {
        let mut completed = 0u32;
        loop {
            let finished = match &self.current {
                Some(cur) => cur.frame_count.is_some_and(|len| cur.loop_points.is_none() && self.position as usize >= len),
                None => false,
            };
            if !finished {
                break;
            }
            let len = self.current.as_ref().unwrap().frame_count.unwrap() as i64;
            self.position -= len;
            completed += 1;
            self.current = self.queue.pop_front();
            if self.current.as_ref().map(|c| c.channels) != Some(self.channels) {
                self.resize_for_current();
            }
        }
        completed
    }

    /// Runs one block of the mix routine: resample, direct-filter, pan
    /// into `dry` (ambisonic) and each active send's wet buffer.
    pub fn mix(
        &mut self,
        dry: &mut ChannelBuffer,
        send_buffers: &mut [&mut ChannelBuffer],
        params: &VoiceParams,
        block: usize,
        device_time: f64,
        events: &mut EventProducer<AsyncEvent>,
    ) {
        let state = self.play_state();
        if !matches!(state, PlayState::Playing | PlayState::Stopping) {
            return;
        }
        if params.step < 1 {
            self.set_play_state(PlayState::Stopped);
            return;
        }

        if let Some(start) = self.start_time {
            if start > device_time {
                let delay_frames = ((start - device_time) * self.sample_rate as f64).round() as usize;
                if delay_frames >= block || (start - device_time) > 1.0 {
                    return;
                }
            }
            self.start_time = None;
        }

        self.step = params.step;
        self.resampler = params.resampler.resolve(params.step);

        if self.target_gain != params.ambi_gains {
            self.ramp_len = if self.fading { block.min(64) } else { block.max(1) };
            self.counter = self.ramp_len;
            self.target_gain = params.ambi_gains.clone();
            if self.target_gain.len() != self.current_gain.len() {
                self.current_gain.resize(self.target_gain.len(), 0.0);
            }
        }

        if self.current.is_none() {
            self.set_play_state(PlayState::Stopping);
            return;
        }

        let max_slot = params.sends.iter().map(|s| s.slot_index + 1).max().unwrap_or(0);
        self.ensure_send_filters(max_slot);

        let edge = self.resampler.edge_samples();
        if let Some(cur) = self.current.as_mut() {
            cur.ensure_decoded((self.position.max(0) as usize) + block + edge);
        }

        // Per-sample ramp progress for this block: `consumed` counts
        // 1..=ramp_len samples into the ramp that started `ramp_len - counter`
        // samples ago, so gain at sample `k` (1-indexed into the ramp) is
        // exactly `current + (target - current) * k / ramp_len`.
        let counter_before = self.counter;
        let ramp_len = self.ramp_len.max(1);
        let mut progress = vec![1.0f32; block];
        if counter_before > 0 {
            for (s, p) in progress.iter_mut().enumerate() {
                let consumed = (ramp_len - counter_before) + s + 1;
                *p = (consumed as f32 / ramp_len as f32).min(1.0);
            }
        }

        let mut consumed = 0i64;
        let mut frac_after = self.frac;

        for ch in 0..self.channels {
            let mut scratch = vec![0.0; edge + block + 4];
            for (i, slot) in scratch.iter_mut().enumerate() {
                *slot = self.sample_at(ch, self.position - edge as i64 + i as i64);
            }

            let mut local_pos = 0i64;
            let mut frac = self.frac;
            let mut dst = vec![0.0; block];
            resample(self.resampler, &scratch, edge, &mut local_pos, &mut frac, self.step, &mut dst, block);
            consumed = local_pos;
            frac_after = frac;

            let (lo, hi) = &mut self.direct_filters[ch];
            lo.set_coeffs(params.direct_filter.0);
            hi.set_coeffs(params.direct_filter.1);
            for s in dst.iter_mut() {
                *s = hi.process_sample(lo.process_sample(*s));
            }

            for (i, &target) in self.target_gain.iter().enumerate() {
                let current = self.current_gain.get(i).copied().unwrap_or(0.0);
                if (target - current).abs() < f32::EPSILON {
                    dry.mix_add(i, &dst, target * params.dry_gain, dst.len().min(dry.frames()));
                    continue;
                }
                let ramped: Vec<Sample> = dst
                    .iter()
                    .zip(progress.iter())
                    .map(|(&s, &p)| s * (current + (target - current) * p) * params.dry_gain)
                    .collect();
                dry.mix_add(i, &ramped, 1.0, ramped.len().min(dry.frames()));
            }

            for send in &params.sends {
                if let Some(buf) = send_buffers.get_mut(send.slot_index) {
                    let filters = &mut self.send_filters[send.slot_index];
                    let idx = ch.min(filters.len() - 1);
                    let (slo, shi) = &mut filters[idx];
                    let mut wet = dst.clone();
                    for s in wet.iter_mut() {
                        *s = shi.process_sample(slo.process_sample(*s)) * send.gain;
                    }
                    buf.mix_add(0, &wet, 1.0, wet.len().min(buf.frames()));
                }
            }
        }

        // Carry the exact gain reached this block forward as the new
        // ramp-start reference, even if the ramp hasn't finished — a
        // retarget mid-ramp must continue from where this block left off,
        // not from the last completed ramp's endpoint.
        let final_progress = progress.last().copied().unwrap_or(1.0);
        for i in 0..self.current_gain.len() {
            let target = self.target_gain.get(i).copied().unwrap_or(0.0);
            self.current_gain[i] += (target - self.current_gain[i]) * final_progress;
        }

        self.position += consumed;
        self.frac = frac_after;
        self.counter = self.counter.saturating_sub(block);
        self.fading = true;

        let completed = self.advance_finished_buffers();
        if completed > 0 {
            events.push(AsyncEvent::BufferComplete { source_id: self.source_id(), count: completed });
        }
        if self.current.is_none() {
            self.set_play_state(PlayState::Stopping);
        }

        if matches!(state, PlayState::Stopping) && self.counter == 0 && self.current.is_none() {
            self.set_play_state(PlayState::Stopped);
            events.push(AsyncEvent::SourceState { source_id: self.source_id(), state: ao_core::SourceState::Stopped });
        }
    }
}

/// Eagerly decodes a static `BufferItem` into per-channel float scratch.
/// Multichannel ADPCM falls back to silence rather than guessing a layout;
/// callback-backed items are never passed here (see `QueuedBuffer::new`).
fn decode_whole(item: &BufferItem) -> Vec<Vec<Sample>> {
    let channels = item.channels().max(1);
    let Some(bytes) = item.as_bytes() else {
        return vec![Vec::new(); channels];
    };

    match item.format() {
        SampleFormat::ImaAdpcm | SampleFormat::MsAdpcm if channels == 1 => {
            let mut out = vec![0.0; bytes.len() * 2];
            let written = if item.format() == SampleFormat::ImaAdpcm {
                decode_ima4_block(bytes, &mut out)
            } else {
                decode_ms_adpcm_block(bytes, &mut out)
            };
            out.truncate(written);
            vec![out]
        }
        SampleFormat::ImaAdpcm | SampleFormat::MsAdpcm => vec![Vec::new(); channels],
        fmt => {
            let Some(bps) = fmt.bytes_per_sample() else { return vec![Vec::new(); channels] };
            let frame_bytes = bps * channels;
            let frames = if frame_bytes == 0 { 0 } else { bytes.len() / frame_bytes };
            let mut out = vec![Vec::with_capacity(frames); channels];
            for frame in 0..frames {
                for ch in 0..channels {
                    let idx = frame * channels + ch;
                    out[ch].push(decode_trivial(fmt, bytes, idx));
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_core::ChannelLayout;
    use std::sync::{Arc, Mutex};

    fn silent_source() -> VoiceParams {
        use ao_dsp::biquad::BiquadCoeffs;
        VoiceParams {
            step: ao_core::MIXER_FRAC_ONE,
            resampler: ResamplerKind::Linear,
            distance: 1.0,
            spread: 0.0,
            dry_gain: 1.0,
            dry_gain_hf: 1.0,
            dry_gain_lf: 1.0,
            ambi_gains: vec![1.0, 0.0, 0.0, 0.0],
            sends: vec![],
            direct_filter: (BiquadCoeffs::IDENTITY, BiquadCoeffs::IDENTITY),
        }
    }

    #[test]
    fn stopped_voice_produces_nothing() {
        let mut voice = Voice::new(48_000.0, 4);
        let mut dry = ChannelBuffer::new(4, 64);
        let (mut tx, _rx) = ao_core::async_event_channel();
        voice.mix(&mut dry, &mut [], &silent_source(), 64, 0.0, &mut tx);
        assert!(dry.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn playing_voice_mixes_constant_samples_into_dry() {
        let bytes: Arc<[u8]> = Arc::from(vec![0x00, 0x40].repeat(64));
        let item = BufferItem::from_bytes(bytes, SampleFormat::I16, ChannelLayout::Mono, 48_000);
        let mut voice = Voice::new(48_000.0, 4);
        voice.attach_buffer(item, None);
        let mut dry = ChannelBuffer::new(4, 64);
        let (mut tx, _rx) = ao_core::async_event_channel();
        voice.mix(&mut dry, &mut [], &silent_source(), 64, 0.0, &mut tx);
        assert!(dry.channel(0).iter().any(|&s| s.abs() > 0.0));
    }

    #[test]
    fn gain_ramp_is_linear_per_sample_within_the_block() {
        let bytes: Arc<[u8]> = Arc::from(vec![0x00, 0x40].repeat(64));
        let item = BufferItem::from_bytes(bytes, SampleFormat::I16, ChannelLayout::Mono, 48_000);
        let mut voice = Voice::new(48_000.0, 4);
        voice.attach_buffer(item, None);

        let mut dry = ChannelBuffer::new(4, 32);
        let (mut tx, _rx) = ao_core::async_event_channel();
        let mut params = silent_source();
        params.ambi_gains = vec![1.0, 0.0, 0.0, 0.0];
        voice.mix(&mut dry, &mut [], &params, 32, 0.0, &mut tx);

        let constant_input = 0.5f32;
        let sample_16 = dry.channel(0)[15];
        let sample_32 = dry.channel(0)[31];
        assert!((sample_16 / constant_input - 0.5).abs() < 0.02);
        assert!((sample_32 / constant_input - 1.0).abs() < 0.02);
    }

    #[test]
    fn queued_buffers_play_gaplessly_and_each_emits_a_completion() {
        let make_item = || {
            let bytes: Arc<[u8]> = Arc::from(vec![0x00, 0x40].repeat(1024));
            BufferItem::from_bytes(bytes, SampleFormat::I16, ChannelLayout::Mono, 48_000)
        };

        let mut voice = Voice::new(48_000.0, 4);
        voice.attach_buffer(make_item(), None);
        voice.enqueue_buffer(make_item());
        voice.enqueue_buffer(make_item());

        let mut dry = ChannelBuffer::new(4, 1024);
        let params = silent_source();
        let (mut tx, mut rx) = ao_core::async_event_channel();

        let mut total_completed = 0u32;
        for _ in 0..4 {
            voice.mix(&mut dry, &mut [], &params, 1024, 0.0, &mut tx);
            while let Some(AsyncEvent::BufferComplete { count, .. }) = rx.pop() {
                total_completed += count;
            }
        }
        assert_eq!(total_completed, 3);
    }

    #[test]
    fn callback_backed_buffer_streams_through_sample_callback() {
        use crate::buffer::SampleCallback;

        struct FixedTone {
            remaining: Mutex<usize>,
        }
        impl SampleCallback for FixedTone {
            fn fill(&self, dest: &mut [u8]) -> i32 {
                let mut remaining = self.remaining.lock().unwrap();
                let frames = (dest.len() / 2).min(*remaining);
                for frame in 0..frames {
                    dest[frame * 2..frame * 2 + 2].copy_from_slice(&0x4000i16.to_le_bytes());
                }
                *remaining -= frames;
                (frames * 2) as i32
            }
        }

        let item = BufferItem::from_callback(
            Arc::new(FixedTone { remaining: Mutex::new(2048) }),
            SampleFormat::I16,
            ChannelLayout::Mono,
            48_000,
        );
        let mut voice = Voice::new(48_000.0, 4);
        voice.attach_buffer(item, None);

        let mut dry = ChannelBuffer::new(4, 512);
        let (mut tx, mut rx) = ao_core::async_event_channel();
        voice.mix(&mut dry, &mut [], &silent_source(), 512, 0.0, &mut tx);
        assert!(dry.channel(0).iter().any(|&s| s.abs() > 0.0));

        // Drain past end-of-stream: the callback reports 0 remaining frames
        // once exhausted, which should fix the buffer's length and emit
        // exactly one completion.
        for _ in 0..4 {
            voice.mix(&mut dry, &mut [], &silent_source(), 512, 0.0, &mut tx);
        }
        let mut completed = 0u32;
        while let Some(AsyncEvent::BufferComplete { count, .. }) = rx.pop() {
            completed += count;
        }
        assert_eq!(completed, 1);
    }
}
