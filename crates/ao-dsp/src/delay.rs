//! Delay lines backing the echo and chorus/flanger effect states.

use std::f32::consts::PI;

use ao_core::Sample;

use crate::biquad::BiquadTDF2;
use crate::{MonoProcessor, Processor, ProcessorConfig, StereoProcessor};

/// Simple feedback delay with filtered feedback path, used as the mono tap
/// inside the echo effect state.
#[derive(Debug, Clone)]
pub struct Delay {
    buffer: Vec<Sample>,
    write_pos: usize,
    delay_samples: usize,
    max_delay_samples: usize,
    feedback: f32,
    dry_wet: f32,
    highpass: BiquadTDF2,
    lowpass: BiquadTDF2,
    filter_enabled: bool,
    sample_rate: f32,
}

impl Delay {
    pub fn new(sample_rate: f32, max_delay_ms: f32) -> Self {
        let max_delay_samples = (max_delay_ms * 0.001 * sample_rate) as usize;
        let mut delay = Self {
            buffer: vec![0.0; max_delay_samples.max(1)],
            write_pos: 0,
            delay_samples: ((500.0 * 0.001 * sample_rate) as usize).min(max_delay_samples.saturating_sub(1)),
            max_delay_samples: max_delay_samples.max(1),
            feedback: 0.5,
            dry_wet: 0.5,
            highpass: BiquadTDF2::new(sample_rate),
            lowpass: BiquadTDF2::new(sample_rate),
            filter_enabled: true,
            sample_rate,
        };
        delay.highpass.set_highpass(80.0, 0.707);
        delay.lowpass.set_lowpass(8000.0, 0.707);
        delay
    }

    pub fn set_delay_ms(&mut self, ms: f32) {
        let samples = (ms * 0.001 * self.sample_rate) as usize;
        self.delay_samples = samples.min(self.max_delay_samples - 1);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    pub fn set_dry_wet(&mut self, mix: f32) {
        self.dry_wet = mix.clamp(0.0, 1.0);
    }

    pub fn set_lowpass_cutoff(&mut self, freq: f32) {
        self.lowpass.set_lowpass(freq, 0.707);
    }

    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.filter_enabled = enabled;
    }

    fn read_delayed(&self) -> Sample {
        let read_pos = (self.write_pos + self.max_delay_samples - self.delay_samples)
            % self.max_delay_samples;
        self.buffer[read_pos]
    }

    #[inline]
    pub fn process_sample(&mut self, input: Sample) -> Sample {
        let delayed = self.read_delayed();
        let filtered = if self.filter_enabled {
            let hp = self.highpass.process_sample(delayed);
            crate::MonoProcessor::process_sample(&mut self.lowpass, hp)
        } else {
            delayed
        };
        self.buffer[self.write_pos] = input + filtered * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.max_delay_samples;
        input * (1.0 - self.dry_wet) + delayed * self.dry_wet
    }
}

impl Processor for Delay {
    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.highpass.reset();
        self.lowpass.reset();
    }
}

impl ProcessorConfig for Delay {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        let ratio = sample_rate / self.sample_rate;
        self.sample_rate = sample_rate;
        self.max_delay_samples = ((self.max_delay_samples as f32) * ratio).max(1.0) as usize;
        self.delay_samples = ((self.delay_samples as f32) * ratio) as usize;
        self.buffer = vec![0.0; self.max_delay_samples];
        self.highpass.set_sample_rate(sample_rate);
        self.lowpass.set_sample_rate(sample_rate);
    }
}

/// Stereo ping-pong/crossfeed delay, the basis of the echo effect's
/// `spread` parameter (0 = independent L/R taps, 1 = full ping-pong).
#[derive(Debug, Clone)]
pub struct PingPongDelay {
    buffer_l: Vec<Sample>,
    buffer_r: Vec<Sample>,
    write_pos: usize,
    delay_samples: usize,
    max_delay_samples: usize,
    feedback: f32,
    dry_wet: f32,
    spread: f32,
    sample_rate: f32,
}

impl PingPongDelay {
    pub fn new(sample_rate: f32, max_delay_ms: f32) -> Self {
        let max_delay_samples = ((max_delay_ms * 0.001 * sample_rate) as usize).max(1);
        Self {
            buffer_l: vec![0.0; max_delay_samples],
            buffer_r: vec![0.0; max_delay_samples],
            write_pos: 0,
            delay_samples: ((500.0 * 0.001 * sample_rate) as usize).min(max_delay_samples - 1),
            max_delay_samples,
            feedback: 0.5,
            dry_wet: 0.5,
            spread: 1.0,
            sample_rate,
        }
    }

    pub fn set_delay_ms(&mut self, ms: f32) {
        let samples = (ms * 0.001 * self.sample_rate) as usize;
        self.delay_samples = samples.min(self.max_delay_samples - 1);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    pub fn set_dry_wet(&mut self, mix: f32) {
        self.dry_wet = mix.clamp(0.0, 1.0);
    }

    pub fn set_spread(&mut self, spread: f32) {
        self.spread = spread.clamp(0.0, 1.0);
    }
}

impl Processor for PingPongDelay {
    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

impl StereoProcessor for PingPongDelay {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let read_pos =
            (self.write_pos + self.max_delay_samples - self.delay_samples) % self.max_delay_samples;
        let delayed_l = self.buffer_l[read_pos];
        let delayed_r = self.buffer_r[read_pos];

        let fb_l = delayed_l * (1.0 - self.spread) + delayed_r * self.spread;
        let fb_r = delayed_r * (1.0 - self.spread) + delayed_l * self.spread;

        self.buffer_l[self.write_pos] = left + fb_l * self.feedback;
        self.buffer_r[self.write_pos] = right + fb_r * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.max_delay_samples;

        let out_l = left * (1.0 - self.dry_wet) + delayed_l * self.dry_wet;
        let out_r = right * (1.0 - self.dry_wet) + delayed_r * self.dry_wet;
        (out_l, out_r)
    }
}

impl ProcessorConfig for PingPongDelay {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        let ratio = sample_rate / self.sample_rate;
        self.sample_rate = sample_rate;
        self.max_delay_samples = ((self.max_delay_samples as f32) * ratio).max(1.0) as usize;
        self.delay_samples = ((self.delay_samples as f32) * ratio) as usize;
        self.buffer_l = vec![0.0; self.max_delay_samples];
        self.buffer_r = vec![0.0; self.max_delay_samples];
    }
}

/// Modulated delay line (LFO-swept tap), the engine behind the chorus and
/// flanger effect states.
#[derive(Debug, Clone)]
pub struct ModulatedDelay {
    buffer_l: Vec<Sample>,
    buffer_r: Vec<Sample>,
    write_pos: usize,
    max_delay_samples: usize,
    base_delay_samples: f32,
    mod_depth: f32,
    mod_rate: f32,
    mod_phase: f32,
    mod_stereo_offset: f32,
    feedback: f32,
    dry_wet: f32,
    sample_rate: f32,
}

impl ModulatedDelay {
    pub fn new(sample_rate: f32) -> Self {
        let max_delay_samples = ((60.0 * 0.001 * sample_rate) as usize).max(1);
        Self {
            buffer_l: vec![0.0; max_delay_samples],
            buffer_r: vec![0.0; max_delay_samples],
            write_pos: 0,
            max_delay_samples,
            base_delay_samples: 10.0 * 0.001 * sample_rate,
            mod_depth: 2.0 * 0.001 * sample_rate,
            mod_rate: 0.5,
            mod_phase: 0.0,
            mod_stereo_offset: PI * 0.5,
            feedback: 0.0,
            dry_wet: 0.5,
            sample_rate,
        }
    }

    pub fn set_delay_ms(&mut self, ms: f32) {
        self.base_delay_samples = ms * 0.001 * self.sample_rate;
    }

    pub fn set_mod_depth_ms(&mut self, ms: f32) {
        self.mod_depth = ms * 0.001 * self.sample_rate;
    }

    pub fn set_mod_rate(&mut self, hz: f32) {
        self.mod_rate = hz.clamp(0.0, 20.0);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-0.99, 0.99);
    }

    pub fn set_dry_wet(&mut self, mix: f32) {
        self.dry_wet = mix.clamp(0.0, 1.0);
    }

    /// Waveform driving the LFO: sine (smooth) or triangle (classic analog
    /// chorus sweep), matching the EFX chorus/flanger `waveform` parameter.
    pub fn set_stereo_phase_offset(&mut self, radians: f32) {
        self.mod_stereo_offset = radians;
    }

    fn read_interpolated(buffer: &[Sample], pos: f32, max_samples: usize) -> Sample {
        let pos = pos.rem_euclid(max_samples as f32);
        let index = pos as usize;
        let frac = pos - index as f32;
        let s0 = buffer[index % max_samples];
        let s1 = buffer[(index + 1) % max_samples];
        s0 + (s1 - s0) * frac
    }
}

impl Processor for ModulatedDelay {
    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
        self.mod_phase = 0.0;
    }
}

impl StereoProcessor for ModulatedDelay {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let mod_l = self.mod_phase.sin();
        let mod_r = (self.mod_phase + self.mod_stereo_offset).sin();

        let delay_l = self.base_delay_samples + self.mod_depth * mod_l;
        let delay_r = self.base_delay_samples + self.mod_depth * mod_r;

        let read_pos_l = self.write_pos as f32 + self.max_delay_samples as f32 - delay_l;
        let read_pos_r = self.write_pos as f32 + self.max_delay_samples as f32 - delay_r;

        let delayed_l = Self::read_interpolated(&self.buffer_l, read_pos_l, self.max_delay_samples);
        let delayed_r = Self::read_interpolated(&self.buffer_r, read_pos_r, self.max_delay_samples);

        self.buffer_l[self.write_pos] = left + delayed_l * self.feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.max_delay_samples;

        self.mod_phase += 2.0 * PI * self.mod_rate / self.sample_rate;
        if self.mod_phase > 2.0 * PI {
            self.mod_phase -= 2.0 * PI;
        }

        let out_l = left * (1.0 - self.dry_wet) + delayed_l * self.dry_wet;
        let out_r = right * (1.0 - self.dry_wet) + delayed_r * self.dry_wet;
        (out_l, out_r)
    }
}

impl ProcessorConfig for ModulatedDelay {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        let ratio = sample_rate / self.sample_rate;
        self.sample_rate = sample_rate;
        self.max_delay_samples = ((self.max_delay_samples as f32) * ratio).max(1.0) as usize;
        self.base_delay_samples *= ratio;
        self.mod_depth *= ratio;
        self.buffer_l = vec![0.0; self.max_delay_samples];
        self.buffer_r = vec![0.0; self.max_delay_samples];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_delay_returns_impulse_after_delay_time() {
        let mut delay = Delay::new(48000.0, 1000.0);
        delay.set_delay_ms(100.0);
        delay.set_feedback(0.5);
        delay.set_dry_wet(1.0);
        delay.process_sample(1.0);
        for _ in 0..4799 {
            delay.process_sample(0.0);
        }
        let out = delay.process_sample(0.0);
        assert!(out.abs() > 0.4);
    }

    #[test]
    fn modulated_delay_decorrelates_channels() {
        let mut chorus = ModulatedDelay::new(48000.0);
        chorus.set_delay_ms(20.0);
        chorus.set_mod_depth_ms(3.0);
        chorus.set_mod_rate(0.8);

        let mut any_different = false;
        for i in 0..1000 {
            let input = if i == 0 { 1.0 } else { 0.0 };
            let (l, r) = chorus.process_sample(input, input);
            if (l - r).abs() > 0.001 {
                any_different = true;
            }
        }
        assert!(any_different);
    }
}
