//! Distortion: 4x-oversampled soft-clip waveshaper, band-passed and
//! decimated back down to the device rate.
//!
//! Pipeline per input sample: upsample 4x (linear interpolation + a
//! lowpass to suppress imaging), soft-clip three times with alternating
//! polarity (clip, invert, clip, invert, clip, invert back — cancels the DC
//! bias a single-polarity clip would introduce), band-pass to taste, then
//! decimate back to 1x by keeping every 4th sample.

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::biquad::BiquadTDF2;
use ao_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

#[derive(Debug, Clone)]
pub struct DistortionProps {
    /// Clip edge, 0 (gentle) .. 1 (hard); scales the pre-clip drive gain.
    pub edge: f32,
    pub gain: f32,
    pub lowpass_cutoff: f32,
    pub eq_center: f32,
    pub eq_bandwidth: f32,
}

impl Default for DistortionProps {
    fn default() -> Self {
        Self {
            edge: 0.2,
            gain: 0.05,
            lowpass_cutoff: 8000.0,
            eq_center: 3600.0,
            eq_bandwidth: 3000.0,
        }
    }
}

const OVERSAMPLE: usize = 4;

pub struct DistortionEffect {
    sample_rate: f32,
    prev_input: f32,
    imaging_lpf: BiquadTDF2,
    bandpass: BiquadTDF2,
    drive: f32,
    gain: f32,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl DistortionEffect {
    pub fn new(sample_rate: f32) -> Self {
        let mut imaging_lpf = BiquadTDF2::new(sample_rate * OVERSAMPLE as f32);
        imaging_lpf.set_lowpass(sample_rate * 0.45, 0.707);
        Self {
            sample_rate,
            prev_input: 0.0,
            imaging_lpf,
            bandpass: BiquadTDF2::new(sample_rate),
            drive: 4.0,
            gain: 0.05,
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }

    #[inline]
    fn soft_clip(x: f32, drive: f32) -> f32 {
        let mut y = x * drive;
        // Three clips with alternating polarity, as the spec calls for.
        y = y.tanh();
        y = -y;
        y = y.tanh();
        y = -y;
        y.tanh()
    }

    fn process_one(&mut self, input: Sample) -> Sample {
        let mut last = 0.0;
        for step in 0..OVERSAMPLE {
            let frac = step as f32 / OVERSAMPLE as f32;
            let upsampled = self.prev_input + (input - self.prev_input) * frac;
            let imaged = self.imaging_lpf.process_sample(upsampled);
            last = Self::soft_clip(imaged, self.drive) * self.gain;
        }
        self.prev_input = input;
        self.bandpass.process_sample(last)
    }
}

impl EffectState for DistortionEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        self.sample_rate = sample_rate;
        self.imaging_lpf.set_sample_rate(sample_rate * OVERSAMPLE as f32);
        self.bandpass.set_sample_rate(sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::Distortion(p) = props else { return };
        self.drive = 1.0 + p.edge.clamp(0.0, 1.0) * 20.0;
        self.gain = p.gain.clamp(0.01, 1.0);
        self.imaging_lpf.set_lowpass(p.lowpass_cutoff.min(self.sample_rate * 0.45), 0.707);
        let q = (p.eq_center / p.eq_bandwidth.max(1.0)).clamp(0.2, 10.0);
        self.bandpass.set_coeffs(ao_dsp::biquad::BiquadCoeffs::bandpass(
            self.sample_rate,
            p.eq_center.clamp(80.0, self.sample_rate * 0.45),
            q,
        ));
    }

    fn process(&mut self, input: &[Sample], output: &mut ChannelBuffer) {
        self.scratch_l.resize(input.len(), 0.0);
        self.scratch_r.resize(input.len(), 0.0);
        for (i, &sample) in input.iter().enumerate() {
            let wet = self.process_one(sample);
            self.scratch_l[i] = wet;
            self.scratch_r[i] = wet;
        }
        pan_stereo_into(output, &self.scratch_l, &self.scratch_r, &self.gains);
    }

    fn reset(&mut self) {
        self.prev_input = 0.0;
        self.imaging_lpf.reset();
        Processor::reset(&mut self.bandpass);
    }
}
