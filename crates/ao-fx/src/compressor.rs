//! Compressor: EFX exposes this as a single on/off switch rather than a
//! parametric device, so the property struct only carries `enabled` and
//! the fixed curve matches the limiter-adjacent defaults the device-wide
//! protection stage already ships.

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::{Compressor, MonoProcessor, Processor, ProcessorConfig};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

#[derive(Debug, Clone)]
pub struct CompressorProps {
    pub enabled: bool,
}

impl Default for CompressorProps {
    fn default() -> Self {
        Self { enabled: true }
    }
}

pub struct CompressorEffect {
    engine: Compressor,
    enabled: bool,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl CompressorEffect {
    pub fn new(sample_rate: f32) -> Self {
        let mut engine = Compressor::new(sample_rate);
        engine.set_threshold(-18.0);
        engine.set_ratio(3.0);
        engine.set_knee(6.0);
        engine.set_attack(10.0);
        engine.set_release(120.0);
        engine.set_makeup(6.0);
        engine.set_mix(1.0);
        Self {
            engine,
            enabled: true,
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }
}

impl EffectState for CompressorEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        self.engine.set_sample_rate(sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::Compressor(p) = props else { return };
        self.enabled = p.enabled;
    }

    fn process(&mut self, input: &[Sample], output: &mut ChannelBuffer) {
        self.scratch_l.resize(input.len(), 0.0);
        self.scratch_r.resize(input.len(), 0.0);
        for (i, &sample) in input.iter().enumerate() {
            let wet = if self.enabled { self.engine.process_sample(sample) } else { sample };
            self.scratch_l[i] = wet;
            self.scratch_r[i] = wet;
        }
        pan_stereo_into(output, &self.scratch_l, &self.scratch_r, &self.gains);
    }

    fn reset(&mut self) {
        Processor::reset(&mut self.engine);
    }
}
