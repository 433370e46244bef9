//! Chorus/flanger: one LFO-modulated stereo delay line, shared between the
//! `AL_EFFECT_CHORUS` and `AL_EFFECT_FLANGER` parameter shapes (flanger is
//! just a chorus with a shorter delay, larger feedback and no triangle
//! option disabled at the property layer, not a different DSP path).

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::{ModulatedDelay, StereoProcessor};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChorusWaveform {
    Sine,
    Triangle,
}

#[derive(Debug, Clone)]
pub struct ChorusProps {
    pub waveform: ChorusWaveform,
    pub phase_degrees: f32,
    pub rate_hz: f32,
    pub depth: f32,
    pub feedback: f32,
    pub delay_seconds: f32,
}

impl Default for ChorusProps {
    fn default() -> Self {
        Self {
            waveform: ChorusWaveform::Triangle,
            phase_degrees: 90.0,
            rate_hz: 1.1,
            depth: 0.1,
            feedback: 0.25,
            delay_seconds: 0.016,
        }
    }
}

pub struct ChorusEffect {
    delay: ModulatedDelay,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl ChorusEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            delay: ModulatedDelay::new(sample_rate),
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }
}

impl EffectState for ChorusEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        ao_dsp::ProcessorConfig::set_sample_rate(&mut self.delay, sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::Chorus(p) = props else { return };
        self.delay.set_delay_ms(p.delay_seconds * 1000.0);
        self.delay.set_mod_depth_ms(p.depth * p.delay_seconds * 1000.0);
        self.delay.set_mod_rate(p.rate_hz);
        self.delay.set_feedback(p.feedback);
        self.delay.set_dry_wet(1.0);
        self.delay.set_stereo_phase_offset(p.phase_degrees.to_radians());
    }

    fn process(&mut self, input: &[Sample], output: &mut ChannelBuffer) {
        self.scratch_l.resize(input.len(), 0.0);
        self.scratch_r.resize(input.len(), 0.0);
        for (i, &sample) in input.iter().enumerate() {
            let (l, r) = self.delay.process_sample(sample, sample);
            self.scratch_l[i] = l;
            self.scratch_r[i] = r;
        }
        pan_stereo_into(output, &self.scratch_l, &self.scratch_r, &self.gains);
    }

    fn reset(&mut self) {
        ao_dsp::Processor::reset(&mut self.delay);
    }
}
