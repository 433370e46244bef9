//! The null effect: a valid, silent [`EffectState`] so a freshly-created or
//! explicitly-cleared slot always has something to call `process` on.

use ao_core::{ChannelBuffer, Sample};

use crate::{EffectProps, EffectState};

pub struct NullEffect;

impl NullEffect {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectState for NullEffect {
    fn device_update(&mut self, _sample_rate: f32, _num_channels: usize) {}

    fn update(&mut self, _props: &EffectProps, _target_gains: &crate::TargetGains) {}

    fn process(&mut self, _input: &[Sample], _output: &mut ChannelBuffer) {}

    fn reset(&mut self) {}
}
