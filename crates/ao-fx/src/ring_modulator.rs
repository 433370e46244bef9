//! Ring modulator: multiplies the input against a bare oscillator, then
//! optionally highpasses the result to tame the carrier frequency's own
//! leak-through at low modulation rates.

use std::f32::consts::TAU;

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::biquad::BiquadTDF2;
use ao_dsp::{MonoProcessor, Processor, ProcessorConfig};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingModulatorWaveform {
    Sine,
    Sawtooth,
    Square,
}

#[derive(Debug, Clone)]
pub struct RingModulatorProps {
    pub frequency_hz: f32,
    pub highpass_cutoff: f32,
    pub waveform: RingModulatorWaveform,
}

impl Default for RingModulatorProps {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            highpass_cutoff: 800.0,
            waveform: RingModulatorWaveform::Sine,
        }
    }
}

pub struct RingModulatorEffect {
    sample_rate: f32,
    phase: f32,
    frequency_hz: f32,
    waveform: RingModulatorWaveform,
    highpass: BiquadTDF2,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl RingModulatorEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            phase: 0.0,
            frequency_hz: 440.0,
            waveform: RingModulatorWaveform::Sine,
            highpass: BiquadTDF2::new(sample_rate),
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }

    fn oscillate(&self) -> f32 {
        match self.waveform {
            RingModulatorWaveform::Sine => (self.phase * TAU).sin(),
            RingModulatorWaveform::Sawtooth => 2.0 * self.phase - 1.0,
            RingModulatorWaveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }

    fn process_one(&mut self, input: Sample) -> Sample {
        let carrier = self.oscillate();
        self.phase += self.frequency_hz / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.highpass.process_sample(input * carrier)
    }
}

impl EffectState for RingModulatorEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        self.sample_rate = sample_rate;
        self.highpass.set_sample_rate(sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::RingModulator(p) = props else { return };
        self.frequency_hz = p.frequency_hz.clamp(0.0, self.sample_rate * 0.45);
        self.waveform = p.waveform;
        self.highpass
            .set_highpass(p.highpass_cutoff.clamp(20.0, self.sample_rate * 0.45), 0.707);
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
        self.phase = 0.0;
        Processor::reset(&mut self.highpass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulating_silence_stays_silent() {
        let mut rm = RingModulatorEffect::new(48000.0);
        rm.frequency_hz = 200.0;
        for _ in 0..256 {
            assert_eq!(rm.process_one(0.0), 0.0);
        }
    }
}
