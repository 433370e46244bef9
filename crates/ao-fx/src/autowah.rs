//! Autowah: an envelope follower drives a peaking filter's center
//! frequency across a fixed range, swept louder input toward the top.

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::biquad::BiquadTDF2;
use ao_dsp::dynamics::EnvelopeFollower;
use ao_dsp::{MonoProcessor, Processor};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

const MIN_FREQ: f32 = 20.0;
const MAX_FREQ: f32 = 2500.0;

#[derive(Debug, Clone)]
pub struct AutowahProps {
    pub attack_ms: f32,
    pub release_ms: f32,
    pub resonance: f32,
    pub peak_gain_db: f32,
}

impl Default for AutowahProps {
    fn default() -> Self {
        Self {
            attack_ms: 6.0,
            release_ms: 60.0,
            resonance: 1000.0,
            peak_gain_db: 18.0,
        }
    }
}

pub struct AutowahEffect {
    sample_rate: f32,
    envelope: EnvelopeFollower,
    filter: BiquadTDF2,
    q: f32,
    peak_gain_db: f32,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl AutowahEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            envelope: EnvelopeFollower::new(sample_rate),
            filter: BiquadTDF2::new(sample_rate),
            q: 2.0,
            peak_gain_db: 18.0,
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }

    fn process_one(&mut self, input: Sample) -> Sample {
        let envelope = self.envelope.process(input).clamp(0.0, 1.0);
        let center = MIN_FREQ + (MAX_FREQ - MIN_FREQ) * envelope;
        self.filter.set_peaking(center, self.q, self.peak_gain_db * envelope);
        self.filter.process_sample(input)
    }
}

impl EffectState for AutowahEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        self.sample_rate = sample_rate;
        self.envelope.set_sample_rate(sample_rate);
        ao_dsp::ProcessorConfig::set_sample_rate(&mut self.filter, sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::Autowah(p) = props else { return };
        self.envelope.set_times(p.attack_ms, p.release_ms);
        self.q = (p.resonance / 500.0).clamp(0.3, 10.0);
        self.peak_gain_db = p.peak_gain_db;
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
        self.envelope.reset();
        Processor::reset(&mut self.filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loud_input_sweeps_envelope_up() {
        let mut wah = AutowahEffect::new(48000.0);
        wah.envelope.set_times(1.0, 50.0);
        for _ in 0..2000 {
            wah.envelope.process(0.8);
        }
        assert!(wah.envelope.current() > 0.5);
    }
}
