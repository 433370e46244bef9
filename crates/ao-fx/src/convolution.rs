//! Convolution reverb: segmented overlap-add FFT, driven by a loaded
//! impulse response rather than a parametric decay model.

use std::sync::Arc;

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::{ConvolutionReverb, StereoProcessor};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

#[derive(Debug, Clone)]
pub struct ConvolutionProps {
    /// Mono impulse response, already resampled to the device rate by the
    /// loader; shared rather than cloned since IRs can be several seconds.
    pub impulse_response: Arc<Vec<Sample>>,
    pub gain: f32,
}

impl Default for ConvolutionProps {
    fn default() -> Self {
        Self {
            impulse_response: Arc::new(vec![1.0]),
            gain: 1.0,
        }
    }
}

pub struct ConvolutionEffect {
    engine: ConvolutionReverb,
    loaded_ir: Option<Arc<Vec<Sample>>>,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl ConvolutionEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            engine: ConvolutionReverb::new(sample_rate),
            loaded_ir: None,
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }
}

impl EffectState for ConvolutionEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        ao_dsp::ProcessorConfig::set_sample_rate(&mut self.engine, sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::Convolution(p) = props else { return };
        self.engine.set_dry_wet(1.0);
        let already_loaded = self
            .loaded_ir
            .as_ref()
            .is_some_and(|ir| Arc::ptr_eq(ir, &p.impulse_response));
        if !already_loaded {
            self.engine.load_ir_mono(&p.impulse_response);
            self.loaded_ir = Some(p.impulse_response.clone());
        }
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
