//! The primary effect: a four-line FDN algorithmic reverb driven by the
//! EAX-style `ReverbProps` snapshot.

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::{AlgorithmicReverb, StereoProcessor};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

/// EAX-style reverb property set (matches `AL_EFFECT_REVERB`/`AL_EFFECT_EAXREVERB`
/// field names, with the reflections/late-reverb panning vectors folded into
/// the mixer's own target-gain resolution rather than carried here).
#[derive(Debug, Clone)]
pub struct ReverbProps {
    pub density: f32,
    pub diffusion: f32,
    pub gain: f32,
    pub gain_hf: f32,
    pub gain_lf: f32,
    pub decay_time: f32,
    pub decay_hf_ratio: f32,
    pub decay_lf_ratio: f32,
    pub reflections_gain: f32,
    pub reflections_delay: f32,
    pub late_reverb_gain: f32,
    pub late_reverb_delay: f32,
    pub air_absorption_gain_hf: f32,
}

impl Default for ReverbProps {
    fn default() -> Self {
        Self {
            density: 1.0,
            diffusion: 1.0,
            gain: 0.32,
            gain_hf: 0.89,
            gain_lf: 1.0,
            decay_time: 1.49,
            decay_hf_ratio: 0.83,
            decay_lf_ratio: 1.0,
            reflections_gain: 0.05,
            reflections_delay: 0.007,
            late_reverb_gain: 1.26,
            late_reverb_delay: 0.011,
            air_absorption_gain_hf: 0.994,
        }
    }
}

pub struct ReverbEffect {
    engine: AlgorithmicReverb,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl ReverbEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            engine: AlgorithmicReverb::new(sample_rate),
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }
}

impl EffectState for ReverbEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        ao_dsp::ProcessorConfig::set_sample_rate(&mut self.engine, sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::Reverb(p) = props else { return };
        self.engine.set_density(p.density);
        self.engine.set_diffusion(p.diffusion);
        self.engine.set_gain(p.gain);
        self.engine.set_gain_hf(p.gain_hf);
        self.engine.set_decay_time(p.decay_time);
        self.engine.set_decay_hf_ratio(p.decay_hf_ratio);
        self.engine.set_reflections_gain(p.reflections_gain);
        self.engine.set_reflections_delay(p.reflections_delay);
        self.engine.set_late_reverb_gain(p.late_reverb_gain);
        self.engine.set_late_reverb_delay(p.late_reverb_delay);
        self.engine.set_air_absorption_gain_hf(p.air_absorption_gain_hf);
    }

    fn process(&mut self, input: &[Sample], output: &mut ChannelBuffer) {
        self.scratch_l.resize(input.len(), 0.0);
        self.scratch_r.resize(input.len(), 0.0);
        for (i, &sample) in input.iter().enumerate() {
            let (l, r) = self.engine.process_sample(sample, sample);
            self.scratch_l[i] = l;
            self.scratch_r[i] = r;
        }
        pan_stereo_into(output, &self.scratch_l, &self.scratch_r, &self.gains);
    }

    fn reset(&mut self) {
        ao_dsp::Processor::reset(&mut self.engine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_produces_a_finite_tail() {
        let mut fx = ReverbEffect::new(48000.0);
        fx.update(
            &EffectProps::Reverb(ReverbProps::default()),
            &TargetGains {
                left: vec![1.0, 0.0],
                right: vec![0.0, 1.0],
            },
        );
        let mut input = vec![0.0; 4096];
        input[0] = 1.0;
        let mut out = ChannelBuffer::new(2, 4096);
        fx.process(&input, &mut out);
        assert!(out.channel(0).iter().all(|s| s.is_finite()));
        assert!(out.channel(0).iter().any(|&s| s != 0.0));
    }
}
