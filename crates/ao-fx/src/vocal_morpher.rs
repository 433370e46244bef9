//! Vocal morpher: two four-formant filter banks, each tuned to a phoneme
//! preset, summed and crossfaded by a slow LFO so the voice appears to
//! glide between vowels.

use std::f32::consts::TAU;

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::biquad::{BiquadCoeffs, BiquadTDF2};
use ao_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

/// Four-formant center frequencies per vowel, loosely modeled on a typical
/// adult voice (not tied to any one speaker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phoneme {
    A,
    E,
    I,
    O,
    U,
}

impl Phoneme {
    fn formants(self) -> [f32; 4] {
        match self {
            Phoneme::A => [800.0, 1150.0, 2800.0, 3500.0],
            Phoneme::E => [400.0, 1600.0, 2700.0, 3300.0],
            Phoneme::I => [270.0, 2300.0, 3000.0, 3700.0],
            Phoneme::O => [450.0, 800.0, 2830.0, 3500.0],
            Phoneme::U => [325.0, 700.0, 2530.0, 3500.0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct VocalMorpherProps {
    pub phoneme_a: Phoneme,
    pub phoneme_b: Phoneme,
    pub rate_hz: f32,
}

impl Default for VocalMorpherProps {
    fn default() -> Self {
        Self {
            phoneme_a: Phoneme::A,
            phoneme_b: Phoneme::O,
            rate_hz: 1.5,
        }
    }
}

struct FormantBank {
    bands: [BiquadTDF2; 4],
}

impl FormantBank {
    fn new(sample_rate: f32) -> Self {
        Self { bands: std::array::from_fn(|_| BiquadTDF2::new(sample_rate)) }
    }

    fn set_phoneme(&mut self, sample_rate: f32, phoneme: Phoneme) {
        for (band, freq) in self.bands.iter_mut().zip(phoneme.formants()) {
            band.set_coeffs(BiquadCoeffs::peaking(sample_rate, freq, 8.0, 12.0));
        }
    }

    fn process(&mut self, input: Sample) -> Sample {
        self.bands.iter_mut().map(|band| band.process_sample(input)).sum::<f32>() * 0.25
    }

    fn reset(&mut self) {
        self.bands.iter_mut().for_each(|b| Processor::reset(b));
    }
}

pub struct VocalMorpherEffect {
    sample_rate: f32,
    bank_a: FormantBank,
    bank_b: FormantBank,
    phase: f32,
    rate_hz: f32,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl VocalMorpherEffect {
    pub fn new(sample_rate: f32) -> Self {
        let mut bank_a = FormantBank::new(sample_rate);
        let mut bank_b = FormantBank::new(sample_rate);
        bank_a.set_phoneme(sample_rate, Phoneme::A);
        bank_b.set_phoneme(sample_rate, Phoneme::O);
        Self {
            sample_rate,
            bank_a,
            bank_b,
            phase: 0.0,
            rate_hz: 1.5,
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }

    fn process_one(&mut self, input: Sample) -> Sample {
        let mix = 0.5 - 0.5 * (self.phase * TAU).cos();
        self.phase += self.rate_hz / self.sample_rate;
        self.phase -= self.phase.floor();
        let a = self.bank_a.process(input);
        let b = self.bank_b.process(input);
        a * (1.0 - mix) + b * mix
    }
}

impl EffectState for VocalMorpherEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        self.sample_rate = sample_rate;
        for band in self.bank_a.bands.iter_mut().chain(self.bank_b.bands.iter_mut()) {
            band.set_sample_rate(sample_rate);
        }
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::VocalMorpher(p) = props else { return };
        self.bank_a.set_phoneme(self.sample_rate, p.phoneme_a);
        self.bank_b.set_phoneme(self.sample_rate, p.phoneme_b);
        self.rate_hz = p.rate_hz.max(0.0);
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
        self.bank_a.reset();
        self.bank_b.reset();
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phoneme_swap_changes_formant_response() {
        let mut morpher = VocalMorpherEffect::new(48000.0);
        morpher.bank_a.set_phoneme(48000.0, Phoneme::A);
        morpher.bank_b.set_phoneme(48000.0, Phoneme::U);
        let out_a = morpher.bank_a.process(1.0);
        let out_b = morpher.bank_b.process(1.0);
        assert_ne!(out_a, out_b);
    }
}
