//! Algorithmic reverb engine backing the EAX-style reverb effect state.
//!
//! Topology: PreDelay -> EarlyReflections (8 prime-spaced taps) ->
//! Diffusion (serial allpass chain) -> FDN 8x8 (Hadamard-mixed feedback
//! delay network with per-band decay) -> stereo width -> dry/wet. The FDN
//! shape and Hadamard mixing matrix follow the teacher's algorithmic
//! reverb; the parameter surface is EFX's (Density/Diffusion/DecayTime/
//! DecayHFRatio/Reflections.../LateReverb...) rather than the teacher's
//! artistic knob set.

use std::f32::consts::{FRAC_PI_2, PI};

use ao_core::Sample;

use crate::{Processor, ProcessorConfig, StereoProcessor};

#[derive(Debug, Clone)]
struct DiffusionAllpass {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
}

impl DiffusionAllpass {
    fn new(delay_samples: usize, feedback: f32) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            pos: 0,
            feedback,
        }
    }

    #[inline(always)]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = delayed - input * self.feedback;
        self.buffer[self.pos] = input + delayed * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

const ER_TAP_MS: [f32; 8] = [7.0, 11.0, 17.0, 23.0, 31.0, 41.0, 53.0, 67.0];
const ER_TAP_GAINS: [f32; 8] = [0.85, 0.78, 0.72, 0.65, 0.58, 0.50, 0.42, 0.35];

#[derive(Debug, Clone)]
struct ERTap {
    delay_samples: usize,
    gain: f32,
    lpf_coeff: f32,
    lpf_state_l: f32,
    lpf_state_r: f32,
}

#[derive(Debug, Clone)]
struct EarlyReflectionEngine {
    taps: [ERTap; 8],
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    max_delay: usize,
}

impl EarlyReflectionEngine {
    fn new(sample_rate: f32) -> Self {
        let max_delay_samples = ((0.1 * sample_rate) as usize).max(1);
        let taps = std::array::from_fn(|i| {
            let delay_samples = (ER_TAP_MS[i] * 0.001 * sample_rate) as usize;
            ERTap {
                delay_samples: delay_samples.min(max_delay_samples - 1),
                gain: ER_TAP_GAINS[i],
                lpf_coeff: 0.3,
                lpf_state_l: 0.0,
                lpf_state_r: 0.0,
            }
        });
        Self {
            taps,
            buffer_l: vec![0.0; max_delay_samples],
            buffer_r: vec![0.0; max_delay_samples],
            write_pos: 0,
            max_delay: max_delay_samples,
        }
    }

    /// `reflections_delay` in seconds, `air_absorption_hf` as a linear gain
    /// per meter equivalent scaled 0..1 (darker as it approaches 0).
    fn configure(&mut self, reflections_delay_samples: usize, air_absorption_hf: f32) {
        let lpf = (1.0 - air_absorption_hf).clamp(0.0, 0.9);
        for tap in &mut self.taps {
            tap.lpf_coeff = lpf;
            tap.delay_samples = (tap.delay_samples + reflections_delay_samples).min(self.max_delay - 1);
        }
    }

    #[inline(always)]
    fn process(&mut self, left: f32, right: f32, reflections_gain: f32) -> (f32, f32) {
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;

        let mut out_l = 0.0;
        let mut out_r = 0.0;
        for tap in &mut self.taps {
            let read_pos = (self.write_pos + self.max_delay - tap.delay_samples) % self.max_delay;
            let raw_l = self.buffer_l[read_pos];
            let raw_r = self.buffer_r[read_pos];
            tap.lpf_state_l += (raw_l - tap.lpf_state_l) * (1.0 - tap.lpf_coeff);
            tap.lpf_state_r += (raw_r - tap.lpf_state_r) * (1.0 - tap.lpf_coeff);
            out_l += tap.lpf_state_l * tap.gain;
            out_r += tap.lpf_state_r * tap.gain;
        }
        self.write_pos = (self.write_pos + 1) % self.max_delay;
        (out_l * reflections_gain, out_r * reflections_gain)
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
        for tap in &mut self.taps {
            tap.lpf_state_l = 0.0;
            tap.lpf_state_r = 0.0;
        }
    }
}

const DIFFUSION_DELAYS: [usize; 6] = [113, 157, 211, 269, 337, 409];

#[derive(Debug, Clone)]
struct DiffusionStage {
    allpasses_l: [DiffusionAllpass; 6],
    allpasses_r: [DiffusionAllpass; 6],
    active_count: usize,
}

impl DiffusionStage {
    fn new(sample_rate: f32) -> Self {
        let scale = sample_rate / 48000.0;
        let spread = 23;
        let allpasses_l =
            std::array::from_fn(|i| DiffusionAllpass::new((DIFFUSION_DELAYS[i] as f32 * scale) as usize, 0.5));
        let allpasses_r = std::array::from_fn(|i| {
            DiffusionAllpass::new(((DIFFUSION_DELAYS[i] + spread) as f32 * scale) as usize, 0.5)
        });
        Self {
            allpasses_l,
            allpasses_r,
            active_count: 4,
        }
    }

    /// `density`/`diffusion` are the EFX 0.0-1.0 reverb properties.
    fn configure(&mut self, density: f32, diffusion: f32) {
        self.active_count = (2.0 + diffusion * 4.0) as usize;
        let feedback = (0.3 + density * 0.3).clamp(0.0, 0.6);
        for ap in &mut self.allpasses_l {
            ap.feedback = feedback;
        }
        for ap in &mut self.allpasses_r {
            ap.feedback = feedback;
        }
    }

    #[inline(always)]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mut l = left;
        let mut r = right;
        for i in 0..self.active_count {
            l = self.allpasses_l[i].process(l);
            r = self.allpasses_r[i].process(r);
        }
        (l, r)
    }

    fn reset(&mut self) {
        for ap in &mut self.allpasses_l {
            ap.reset();
        }
        for ap in &mut self.allpasses_r {
            ap.reset();
        }
    }
}

#[derive(Debug, Clone)]
struct FDNDelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    base_delay: usize,
    lp_state: f32,
    hp_state: f32,
}

impl FDNDelayLine {
    fn new(base_delay: usize) -> Self {
        let buf_size = base_delay + 64;
        Self {
            buffer: vec![0.0; buf_size],
            write_pos: 0,
            base_delay,
            lp_state: 0.0,
            hp_state: 0.0,
        }
    }

    #[inline(always)]
    fn read(&self) -> f32 {
        let buf_len = self.buffer.len();
        let pos = (self.write_pos + buf_len - self.base_delay) % buf_len;
        self.buffer[pos]
    }

    #[inline(always)]
    fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// One-pole two-band split feedback shaping: decay_hf_ratio < 1 darkens
    /// the tail (EFX `DecayHFRatio`), low_mult scales the sub-band (used to
    /// approximate `DecayLFRatio`).
    #[inline(always)]
    fn shape_feedback(&mut self, sample: f32, base_feedback: f32, low_mult: f32, high_mult: f32) -> f32 {
        self.lp_state += (sample - self.lp_state) * 0.15;
        let low = self.lp_state;
        self.hp_state += (sample - self.hp_state) * 0.35;
        let high = sample - self.hp_state;
        let mid = sample - low - high;
        low * base_feedback * low_mult + mid * base_feedback + high * base_feedback * high_mult
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.lp_state = 0.0;
        self.hp_state = 0.0;
    }
}

const FDN_BASE_DELAYS: [usize; 8] = [1087, 1283, 1481, 1669, 1877, 2083, 2293, 2503];

const HADAMARD_8: [[f32; 8]; 8] = {
    const P: f32 = 0.353_553_39;
    const N: f32 = -0.353_553_39;
    [
        [P, P, P, P, P, P, P, P],
        [P, N, P, N, P, N, P, N],
        [P, P, N, N, P, P, N, N],
        [P, N, N, P, P, N, N, P],
        [P, P, P, P, N, N, N, N],
        [P, N, P, N, N, P, N, P],
        [P, P, N, N, N, N, P, P],
        [P, N, N, P, N, P, P, N],
    ]
};

#[derive(Debug, Clone)]
struct FDNCore {
    delay_lines: [FDNDelayLine; 8],
    feedback_gain: f32,
    lfo_phases: [f32; 8],
    lfo_increment: f32,
    mod_depth: f32,
}

impl FDNCore {
    fn new(sample_rate: f32) -> Self {
        let scale = sample_rate / 48000.0;
        let delay_lines =
            std::array::from_fn(|i| FDNDelayLine::new((FDN_BASE_DELAYS[i] as f32 * scale) as usize));
        let lfo_phases = std::array::from_fn(|i| i as f32 * std::f32::consts::FRAC_PI_4);
        let lfo_increment = 2.0 * PI * 0.3 / sample_rate;
        Self {
            delay_lines,
            feedback_gain: 0.85,
            lfo_phases,
            lfo_increment,
            mod_depth: 0.002,
        }
    }

    /// `decay_time` in seconds and the per-line delay in seconds determine
    /// the -60dB feedback gain: g = 10^(-3 * delay / decay_time).
    fn set_decay_time(&mut self, decay_time: f32, sample_rate: f32) {
        let avg_delay_s = FDN_BASE_DELAYS.iter().sum::<usize>() as f32 / 8.0 / sample_rate;
        let exponent = -3.0 * avg_delay_s / decay_time.max(0.01);
        self.feedback_gain = 10f32.powf(exponent).clamp(0.0, 0.995);
    }

    #[inline(always)]
    fn process(&mut self, left: f32, right: f32, low_mult: f32, high_mult: f32) -> (f32, f32) {
        let mut outputs = [0.0f32; 8];
        for i in 0..8 {
            outputs[i] = self.delay_lines[i].read();
        }

        let mut mixed = [0.0f32; 8];
        for i in 0..8 {
            let mut sum = 0.0;
            for j in 0..8 {
                sum += HADAMARD_8[i][j] * outputs[j];
            }
            mixed[i] = sum;
        }

        let input_gain = 0.15;
        let inputs = [
            left * input_gain,
            (left * 0.8 + right * 0.2) * input_gain,
            (left * 0.6 + right * 0.4) * input_gain,
            (left * 0.35 + right * 0.65) * input_gain,
            right * input_gain,
            (right * 0.8 + left * 0.2) * input_gain,
            (right * 0.6 + left * 0.4) * input_gain,
            (right * 0.35 + left * 0.65) * input_gain,
        ];

        for i in 0..8 {
            let mod_offset = self.lfo_phases[i].sin() * self.mod_depth;
            let shaped = self.delay_lines[i].shape_feedback(
                mixed[i] * (1.0 + mod_offset),
                self.feedback_gain,
                low_mult,
                high_mult,
            );
            self.delay_lines[i].write(shaped + inputs[i]);
        }

        for phase in &mut self.lfo_phases {
            *phase += self.lfo_increment;
            if *phase > 2.0 * PI {
                *phase -= 2.0 * PI;
            }
        }

        let out_l = outputs[0] * 0.30 + outputs[1] * 0.27 + outputs[2] * 0.23 + outputs[3] * 0.20;
        let out_r = outputs[4] * 0.30 + outputs[5] * 0.27 + outputs[6] * 0.23 + outputs[7] * 0.20;
        (out_l, out_r)
    }

    fn reset(&mut self) {
        for dl in &mut self.delay_lines {
            dl.reset();
        }
        for (i, phase) in self.lfo_phases.iter_mut().enumerate() {
            *phase = i as f32 * std::f32::consts::FRAC_PI_4;
        }
    }
}

/// Algorithmic reverb driven by the EFX-style reverb property set.
#[derive(Debug, Clone)]
pub struct AlgorithmicReverb {
    er_engine: EarlyReflectionEngine,
    diffusion: DiffusionStage,
    fdn: FDNCore,

    density: f32,
    diffusion_param: f32,
    gain: f32,
    gain_hf: f32,
    decay_time: f32,
    decay_hf_ratio: f32,
    reflections_gain: f32,
    reflections_delay: f32,
    late_reverb_gain: f32,
    late_reverb_delay: f32,
    air_absorption_gain_hf: f32,

    late_delay_buffer_l: Vec<Sample>,
    late_delay_buffer_r: Vec<Sample>,
    late_delay_pos: usize,
    late_delay_samples: usize,

    sample_rate: f32,
}

impl AlgorithmicReverb {
    pub fn new(sample_rate: f32) -> Self {
        let max_late_delay = ((sample_rate * 0.1) as usize).max(1);
        let mut reverb = Self {
            er_engine: EarlyReflectionEngine::new(sample_rate),
            diffusion: DiffusionStage::new(sample_rate),
            fdn: FDNCore::new(sample_rate),

            density: 1.0,
            diffusion_param: 1.0,
            gain: 0.32,
            gain_hf: 0.89,
            decay_time: 1.49,
            decay_hf_ratio: 0.83,
            reflections_gain: 0.05,
            reflections_delay: 0.007,
            late_reverb_gain: 1.26,
            late_reverb_delay: 0.011,
            air_absorption_gain_hf: 0.994,

            late_delay_buffer_l: vec![0.0; max_late_delay],
            late_delay_buffer_r: vec![0.0; max_late_delay],
            late_delay_pos: 0,
            late_delay_samples: 0,

            sample_rate,
        };
        reverb.recalc();
        reverb
    }

    fn recalc(&mut self) {
        self.er_engine
            .configure((self.reflections_delay * self.sample_rate) as usize, self.air_absorption_gain_hf);
        self.diffusion.configure(self.density, self.diffusion_param);
        self.fdn.set_decay_time(self.decay_time, self.sample_rate);
        self.late_delay_samples = ((self.late_reverb_delay * self.sample_rate) as usize)
            .min(self.late_delay_buffer_l.len() - 1);
    }

    pub fn set_density(&mut self, v: f32) {
        self.density = v.clamp(0.0, 1.0);
        self.recalc();
    }
    pub fn set_diffusion(&mut self, v: f32) {
        self.diffusion_param = v.clamp(0.0, 1.0);
        self.recalc();
    }
    pub fn set_gain(&mut self, v: f32) {
        self.gain = v.clamp(0.0, 1.0);
    }
    pub fn set_gain_hf(&mut self, v: f32) {
        self.gain_hf = v.clamp(0.0, 1.0);
    }
    pub fn set_decay_time(&mut self, seconds: f32) {
        self.decay_time = seconds.clamp(0.1, 20.0);
        self.recalc();
    }
    pub fn set_decay_hf_ratio(&mut self, ratio: f32) {
        self.decay_hf_ratio = ratio.clamp(0.1, 2.0);
    }
    pub fn set_reflections_gain(&mut self, v: f32) {
        self.reflections_gain = v.clamp(0.0, 3.16);
    }
    pub fn set_reflections_delay(&mut self, seconds: f32) {
        self.reflections_delay = seconds.clamp(0.0, 0.3);
        self.recalc();
    }
    pub fn set_late_reverb_gain(&mut self, v: f32) {
        self.late_reverb_gain = v.clamp(0.0, 10.0);
    }
    pub fn set_late_reverb_delay(&mut self, seconds: f32) {
        self.late_reverb_delay = seconds.clamp(0.0, 0.1);
        self.recalc();
    }
    pub fn set_air_absorption_gain_hf(&mut self, v: f32) {
        self.air_absorption_gain_hf = v.clamp(0.892, 1.0);
        self.recalc();
    }
}

impl Processor for AlgorithmicReverb {
    fn reset(&mut self) {
        self.er_engine.reset();
        self.diffusion.reset();
        self.fdn.reset();
        self.late_delay_buffer_l.fill(0.0);
        self.late_delay_buffer_r.fill(0.0);
        self.late_delay_pos = 0;
    }

    fn latency(&self) -> usize {
        (self.reflections_delay * self.sample_rate) as usize
    }
}

impl StereoProcessor for AlgorithmicReverb {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let (er_l, er_r) = self.er_engine.process(left, right, self.reflections_gain);

        let (diff_l, diff_r) = self.diffusion.process(er_l, er_r);

        let high_mult = self.decay_hf_ratio.min(1.0);
        let low_mult = if self.decay_hf_ratio > 1.0 {
            1.0 / self.decay_hf_ratio
        } else {
            1.0
        };
        let (fdn_l, fdn_r) = self.fdn.process(diff_l, diff_r, low_mult, high_mult);

        let buf_len = self.late_delay_buffer_l.len();
        self.late_delay_buffer_l[self.late_delay_pos] = fdn_l;
        self.late_delay_buffer_r[self.late_delay_pos] = fdn_r;
        let read_pos = (self.late_delay_pos + buf_len - self.late_delay_samples) % buf_len;
        let late_l = self.late_delay_buffer_l[read_pos] * self.late_reverb_gain;
        let late_r = self.late_delay_buffer_r[read_pos] * self.late_reverb_gain;
        self.late_delay_pos = (self.late_delay_pos + 1) % buf_len;

        let wet_l = late_l * self.gain * self.gain_hf;
        let wet_r = late_r * self.gain * self.gain_hf;

        (left + wet_l, right + wet_r)
    }
}

impl ProcessorConfig for AlgorithmicReverb {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        if (sample_rate - self.sample_rate).abs() > 1.0 {
            *self = Self::new(sample_rate);
        }
    }
}

/// Equal-power dry/wet crossfade shared by the convolution and algorithmic
/// reverb states.
#[inline]
pub fn equal_power_mix(dry: Sample, wet: Sample, mix: f32) -> Sample {
    let angle = mix.clamp(0.0, 1.0) * FRAC_PI_2;
    dry * angle.cos() + wet * angle.sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverb_tail_does_not_diverge() {
        let mut reverb = AlgorithmicReverb::new(48000.0);
        reverb.set_decay_time(2.0);
        reverb.process_sample(1.0, 1.0);
        for _ in 0..48000 {
            let (l, r) = reverb.process_sample(0.0, 0.0);
            assert!(l.is_finite() && r.is_finite());
        }
    }

    #[test]
    fn silent_decay_time_settles_toward_zero() {
        let mut reverb = AlgorithmicReverb::new(48000.0);
        reverb.set_decay_time(0.2);
        reverb.process_sample(1.0, 1.0);
        let mut last_energy = 1.0;
        for _ in 0..48000 * 4 {
            let (l, r) = reverb.process_sample(0.0, 0.0);
            last_energy = l.abs() + r.abs();
        }
        assert!(last_energy < 1e-2);
    }
}
