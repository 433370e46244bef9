//! Sample types and audio buffer definitions.
//!
//! The mix runs in 32-bit IEEE-754 float throughout (spec §6); intermediate
//! effect accumulators that need extra range normalize internally rather
//! than widening the sample type.

use wide::f32x8;

/// Type alias for audio samples.
pub type Sample = f32;

/// SIMD lane width used by the mixer's inner loops.
pub type SampleLane = f32x8;
pub const LANE_WIDTH: usize = 8;

/// Audio buffer trait for generic buffer operations.
pub trait AudioBuffer {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&mut self);
}

/// Mono audio buffer, used for per-channel scratch during mixing.
#[derive(Debug, Clone)]
pub struct MonoBuffer {
    samples: Vec<Sample>,
}

impl MonoBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            samples: vec![0.0; size],
        }
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    pub fn resize(&mut self, size: usize) {
        self.samples.resize(size, 0.0);
    }
}

impl AudioBuffer for MonoBuffer {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn clear(&mut self) {
        self.samples.fill(0.0);
    }
}

/// A flat, channel-major scratch buffer: `channels` rows of `frames` samples
/// each, contiguous. Backs `Device::Dry`, `EffectSlot::Wet`, and per-voice
/// resample scratch.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    data: Vec<Sample>,
    channels: usize,
    frames: usize,
}

impl ChannelBuffer {
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            data: vec![0.0; channels * frames],
            channels,
            frames,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn channel(&self, idx: usize) -> &[Sample] {
        let start = idx * self.frames;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, idx: usize) -> &mut [Sample] {
        let start = idx * self.frames;
        &mut self.data[start..start + self.frames]
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Mix `src` additively into channel `idx`, scaled by `gain`, for the
    /// first `count` frames.
    #[inline]
    pub fn mix_add(&mut self, idx: usize, src: &[Sample], gain: Sample, count: usize) {
        let dst = &mut self.channel_mut(idx)[..count];
        for (d, s) in dst.iter_mut().zip(src.iter()) {
            *d += *s * gain;
        }
    }
}
