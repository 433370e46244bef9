//! Echo: a two-tap ping-pong delay with damped feedback and stereo spread.

use ao_core::{ChannelBuffer, Sample};
use ao_dsp::{PingPongDelay, StereoProcessor};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

#[derive(Debug, Clone)]
pub struct EchoProps {
    pub delay_seconds: f32,
    pub lr_delay_seconds: f32,
    pub damping: f32,
    pub feedback: f32,
    pub spread: f32,
}

impl Default for EchoProps {
    fn default() -> Self {
        Self {
            delay_seconds: 0.1,
            lr_delay_seconds: 0.1,
            damping: 0.5,
            feedback: 0.5,
            spread: -1.0,
        }
    }
}

pub struct EchoEffect {
    delay: PingPongDelay,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl EchoEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            delay: PingPongDelay::new(sample_rate, 500.0),
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }
}

impl EffectState for EchoEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        ao_dsp::ProcessorConfig::set_sample_rate(&mut self.delay, sample_rate);
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::Echo(p) = props else { return };
        self.delay.set_delay_ms(p.delay_seconds * 1000.0);
        self.delay.set_feedback(p.feedback * (1.0 - p.damping * 0.3));
        self.delay.set_dry_wet(1.0);
        // `spread` in EFX runs -1 (independent taps) .. 1 (full ping-pong);
        // the delay line takes 0..1, symmetric around independent taps.
        self.delay.set_spread(p.spread.abs());
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
