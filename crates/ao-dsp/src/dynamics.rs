//! Envelope following, soft-knee compression, lookahead limiting and gating.
//!
//! Shared by the per-source gain stage and the `AL_EFFECT_COMPRESSOR`
//! effect state: the compressor effect exposed through the public API is
//! a single on/off switch, but it is backed by the same engine used
//! internally for device-wide peak protection.

use ao_core::Sample;

use crate::{MonoProcessor, Processor, ProcessorConfig};

/// One-pole attack/release envelope follower.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    sample_rate: f32,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f32) -> Self {
        let mut follower = Self {
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            sample_rate,
        };
        follower.set_times(10.0, 100.0);
        follower
    }

    /// Attack/release times in milliseconds.
    pub fn set_times(&mut self, attack_ms: f32, release_ms: f32) {
        self.attack_coeff = (-1.0 / (attack_ms * 0.001 * self.sample_rate)).exp();
        self.release_coeff = (-1.0 / (release_ms * 0.001 * self.sample_rate)).exp();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    #[inline]
    pub fn process(&mut self, input: Sample) -> f32 {
        let abs_input = input.abs();
        let coeff = if abs_input > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = abs_input + coeff * (self.envelope - abs_input);
        self.envelope
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    pub fn current(&self) -> f32 {
        self.envelope
    }
}

/// Feed-forward soft-knee compressor with makeup gain and dry/wet mix for
/// parallel compression.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
    makeup_gain_db: f32,
    attack_ms: f32,
    release_ms: f32,
    mix: f32,
    envelope: EnvelopeFollower,
    gain_reduction_db: f32,
    sample_rate: f32,
}

impl Compressor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 6.0,
            makeup_gain_db: 0.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            mix: 1.0,
            envelope: EnvelopeFollower::new(sample_rate),
            gain_reduction_db: 0.0,
            sample_rate,
        }
    }

    pub fn set_threshold(&mut self, db: f32) {
        self.threshold_db = db.clamp(-60.0, 0.0);
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.clamp(1.0, 100.0);
    }

    pub fn set_knee(&mut self, db: f32) {
        self.knee_db = db.clamp(0.0, 24.0);
    }

    pub fn set_attack(&mut self, ms: f32) {
        self.attack_ms = ms.clamp(0.01, 500.0);
        self.envelope.set_times(self.attack_ms, self.release_ms);
    }

    pub fn set_release(&mut self, ms: f32) {
        self.release_ms = ms.clamp(1.0, 5000.0);
        self.envelope.set_times(self.attack_ms, self.release_ms);
    }

    pub fn set_makeup(&mut self, db: f32) {
        self.makeup_gain_db = db.clamp(-24.0, 24.0);
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    #[inline]
    fn calculate_gain_reduction(&self, input_db: f32) -> f32 {
        let half_knee = self.knee_db / 2.0;
        let knee_start = self.threshold_db - half_knee;
        let knee_end = self.threshold_db + half_knee;

        if input_db < knee_start {
            0.0
        } else if input_db > knee_end {
            (input_db - self.threshold_db) * (1.0 - 1.0 / self.ratio)
        } else {
            let x = input_db - knee_start;
            let slope = 1.0 - 1.0 / self.ratio;
            (slope * x * x) / (2.0 * self.knee_db)
        }
    }
}

impl Processor for Compressor {
    fn reset(&mut self) {
        self.envelope.reset();
        self.gain_reduction_db = 0.0;
    }
}

impl MonoProcessor for Compressor {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let dry = input;
        let envelope = self.envelope.process(input);

        let wet = if envelope < 1e-10 {
            input
        } else {
            let env_db = 20.0 * envelope.log10();
            let gr_db = self.calculate_gain_reduction(env_db);
            self.gain_reduction_db = gr_db;
            let gain = 10f32.powf(-gr_db / 20.0);
            input * gain
        };

        let makeup = 10f32.powf(self.makeup_gain_db / 20.0);
        let wet = wet * makeup;
        dry * (1.0 - self.mix) + wet * self.mix
    }
}

impl ProcessorConfig for Compressor {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.envelope.set_sample_rate(sample_rate);
        self.envelope.set_times(self.attack_ms, self.release_ms);
    }
}

/// Lookahead brickwall limiter: instant attack, smoothed release.
#[derive(Debug, Clone)]
pub struct Limiter {
    threshold_db: f32,
    release_coeff: f32,
    release_ms: f32,
    gain: f32,
    lookahead_buffer: Vec<Sample>,
    buffer_pos: usize,
    sample_rate: f32,
}

impl Limiter {
    const LOOKAHEAD_MS: f32 = 5.0;

    pub fn new(sample_rate: f32) -> Self {
        let lookahead_samples = (Self::LOOKAHEAD_MS * 0.001 * sample_rate) as usize;
        Self {
            threshold_db: -0.3,
            release_coeff: (-1.0 / (100.0 * 0.001 * sample_rate)).exp(),
            release_ms: 100.0,
            gain: 1.0,
            lookahead_buffer: vec![0.0; lookahead_samples.max(1)],
            buffer_pos: 0,
            sample_rate,
        }
    }

    pub fn set_threshold(&mut self, db: f32) {
        self.threshold_db = db;
    }

    pub fn set_release(&mut self, ms: f32) {
        self.release_ms = ms;
        self.release_coeff = (-1.0 / (ms * 0.001 * self.sample_rate)).exp();
    }

    fn threshold_linear(&self) -> f32 {
        10f32.powf(self.threshold_db / 20.0)
    }
}

impl Processor for Limiter {
    fn reset(&mut self) {
        self.gain = 1.0;
        self.lookahead_buffer.fill(0.0);
        self.buffer_pos = 0;
    }

    fn latency(&self) -> usize {
        self.lookahead_buffer.len()
    }
}

impl MonoProcessor for Limiter {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let len = self.lookahead_buffer.len();
        let delayed = self.lookahead_buffer[self.buffer_pos];
        self.lookahead_buffer[self.buffer_pos] = input;
        self.buffer_pos = (self.buffer_pos + 1) % len;

        let threshold = self.threshold_linear();
        let abs_input = input.abs();
        let target_gain = if abs_input > threshold {
            threshold / abs_input
        } else {
            1.0
        };

        if target_gain < self.gain {
            self.gain = target_gain;
        } else {
            self.gain = target_gain + self.release_coeff * (self.gain - target_gain);
        }

        delayed * self.gain
    }
}

impl ProcessorConfig for Limiter {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.release_coeff = (-1.0 / (self.release_ms * 0.001 * sample_rate)).exp();
        let lookahead_samples = (Self::LOOKAHEAD_MS * 0.001 * sample_rate) as usize;
        self.lookahead_buffer = vec![0.0; lookahead_samples.max(1)];
        self.buffer_pos = 0;
    }
}

/// Noise gate with hold time, used by the autowah effect state's envelope
/// path and available standalone for source-level noise suppression.
#[derive(Debug, Clone)]
pub struct Gate {
    threshold_db: f32,
    range_db: f32,
    attack_ms: f32,
    hold_ms: f32,
    release_ms: f32,
    envelope: EnvelopeFollower,
    gain: f32,
    hold_counter: usize,
    sample_rate: f32,
}

impl Gate {
    pub fn new(sample_rate: f32) -> Self {
        let mut gate = Self {
            threshold_db: -40.0,
            range_db: -80.0,
            attack_ms: 1.0,
            hold_ms: 50.0,
            release_ms: 100.0,
            envelope: EnvelopeFollower::new(sample_rate),
            gain: 0.0,
            hold_counter: 0,
            sample_rate,
        };
        gate.envelope.set_times(1.0, 50.0);
        gate
    }

    pub fn set_threshold(&mut self, db: f32) {
        self.threshold_db = db.clamp(-80.0, 0.0);
    }

    pub fn set_range(&mut self, db: f32) {
        self.range_db = db.clamp(-80.0, 0.0);
    }

    pub fn set_attack(&mut self, ms: f32) {
        self.attack_ms = ms.clamp(0.01, 100.0);
        self.envelope.set_times(self.attack_ms, self.release_ms);
    }

    pub fn set_hold(&mut self, ms: f32) {
        self.hold_ms = ms.clamp(0.0, 500.0);
    }

    pub fn set_release(&mut self, ms: f32) {
        self.release_ms = ms.clamp(1.0, 1000.0);
        self.envelope.set_times(self.attack_ms, self.release_ms);
    }

    fn threshold_linear(&self) -> f32 {
        10f32.powf(self.threshold_db / 20.0)
    }

    fn range_linear(&self) -> f32 {
        10f32.powf(self.range_db / 20.0)
    }
}

impl Processor for Gate {
    fn reset(&mut self) {
        self.envelope.reset();
        self.gain = 0.0;
        self.hold_counter = 0;
    }
}

impl MonoProcessor for Gate {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let envelope = self.envelope.process(input);
        let threshold = self.threshold_linear();
        let range = self.range_linear();
        let hold_samples = (self.hold_ms * 0.001 * self.sample_rate) as usize;

        let target_gain = if envelope >= threshold {
            self.hold_counter = hold_samples;
            1.0
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
            1.0
        } else {
            range
        };

        let attack_coeff = (-1.0 / (self.attack_ms * 0.001 * self.sample_rate)).exp();
        let release_coeff = (-1.0 / (self.release_ms * 0.001 * self.sample_rate)).exp();
        let coeff = if target_gain > self.gain {
            attack_coeff
        } else {
            release_coeff
        };
        self.gain = target_gain + coeff * (self.gain - target_gain);

        input * self.gain
    }
}

impl ProcessorConfig for Gate {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.envelope.set_sample_rate(sample_rate);
        self.envelope.set_times(self.attack_ms, self.release_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressor_reduces_gain_above_threshold() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold(-20.0);
        comp.set_ratio(4.0);
        for _ in 0..2000 {
            comp.process_sample(0.5);
        }
        assert!(comp.gain_reduction_db() > 0.0);
    }

    #[test]
    fn limiter_keeps_output_under_unity_for_hot_input() {
        let mut limiter = Limiter::new(48000.0);
        limiter.set_threshold(-1.0);
        let mut last = 0.0;
        for _ in 0..(limiter.latency() + 100) {
            last = limiter.process_sample(2.0);
        }
        assert!(last.abs() <= 2.0);
        assert!(limiter.gain < 1.0);
    }

    #[test]
    fn gate_opens_on_loud_signal_and_holds() {
        let mut gate = Gate::new(48000.0);
        gate.set_threshold(-20.0);
        gate.set_hold(10.0);
        for _ in 0..1000 {
            gate.process_sample(0.5);
        }
        assert!(gate.gain > 0.5);
    }
}
