//! Equalizer: the fixed low-shelf/peak/peak/high-shelf chain.

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::{ParametricEq, StereoProcessor};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

#[derive(Debug, Clone)]
pub struct EqualizerProps {
    pub low_gain: f32,
    pub low_cutoff: f32,
    pub mid1_gain: f32,
    pub mid1_center: f32,
    pub mid1_width: f32,
    pub mid2_gain: f32,
    pub mid2_center: f32,
    pub mid2_width: f32,
    pub high_gain: f32,
    pub high_cutoff: f32,
}

impl Default for EqualizerProps {
    fn default() -> Self {
        Self {
            low_gain: 1.0,
            low_cutoff: 200.0,
            mid1_gain: 1.0,
            mid1_center: 500.0,
            mid1_width: 1.0,
            mid2_gain: 1.0,
            mid2_center: 3000.0,
            mid2_width: 1.0,
            high_gain: 1.0,
            high_cutoff: 6000.0,
        }
    }
}

pub struct EqualizerEffect {
    eq: ParametricEq,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl EqualizerEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            eq: ParametricEq::efx_default(sample_rate),
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }
}

fn db(linear: f32) -> f32 {
    20.0 * linear.max(1e-6).log10()
}

impl EffectState for EqualizerEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        ao_dsp::ProcessorConfig::set_sample_rate(&mut self.eq, sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::Equalizer(p) = props else { return };
        use ao_dsp::EqFilterType;
        self.eq
            .set_band(0, p.low_cutoff, db(p.low_gain), 0.71, EqFilterType::LowShelf);
        self.eq
            .set_band(1, p.mid1_center, db(p.mid1_gain), p.mid1_width, EqFilterType::Bell);
        self.eq
            .set_band(2, p.mid2_center, db(p.mid2_gain), p.mid2_width, EqFilterType::Bell);
        self.eq
            .set_band(3, p.high_cutoff, db(p.high_gain), 0.71, EqFilterType::HighShelf);
    }

    fn process(&mut self, input: &[Sample], output: &mut ChannelBuffer) {
        self.scratch_l.resize(input.len(), 0.0);
        self.scratch_r.resize(input.len(), 0.0);
        for (i, &sample) in input.iter().enumerate() {
            let (l, r) = self.eq.process_sample(sample, sample);
            self.scratch_l[i] = l;
            self.scratch_r[i] = r;
        }
        pan_stereo_into(output, &self.scratch_l, &self.scratch_r, &self.gains);
    }

    fn reset(&mut self) {
        ao_dsp::Processor::reset(&mut self.eq);
    }
}
