//! Dedicated dialog/LFE: routes a send straight to one physical output
//! channel at a fixed gain, bypassing the stereo-pan-then-spread path
//! every other effect state uses. There is nothing to pan: a dedicated
//! send already knows which channel it belongs on.

use ao_core::{ChannelBuffer, Sample};

use crate::{EffectProps, EffectState, TargetGains};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedicatedKind {
    LowFrequencyEffect,
    Dialogue,
}

#[derive(Debug, Clone)]
pub struct DedicatedProps {
    pub kind: DedicatedKind,
    pub gain: f32,
}

impl Default for DedicatedProps {
    fn default() -> Self {
        Self { kind: DedicatedKind::LowFrequencyEffect, gain: 1.0 }
    }
}

pub struct DedicatedEffect {
    num_channels: usize,
    kind: DedicatedKind,
    gain: f32,
}

impl DedicatedEffect {
    pub fn new(_sample_rate: f32) -> Self {
        Self {
            num_channels: 2,
            kind: DedicatedKind::LowFrequencyEffect,
            gain: 1.0,
        }
    }

    /// Surround layouts carry the LFE as their last channel by convention;
    /// dialogue has no standard slot so it falls back to the first (center
    /// on discrete surround buses, the sole channel on mono/stereo).
    fn target_channel(&self) -> usize {
        match self.kind {
            DedicatedKind::LowFrequencyEffect => self.num_channels.saturating_sub(1),
            DedicatedKind::Dialogue => 0,
        }
    }
}

impl EffectState for DedicatedEffect {
    fn device_update(&mut self, _sample_rate: f32, num_channels: usize) {
        self.num_channels = num_channels.max(1);
    }

    fn update(&mut self, props: &EffectProps, _target_gains: &TargetGains) {
        let EffectProps::Dedicated(p) = props else { return };
        self.kind = p.kind;
        self.gain = p.gain;
    }

    fn process(&mut self, input: &[Sample], output: &mut ChannelBuffer) {
        if self.gain.abs() < ao_core::GAIN_SILENCE_THRESHOLD {
            return;
        }
        let ch = self.target_channel().min(output.channels().saturating_sub(1));
        let frames = input.len();
        let dst = &mut output.channel_mut(ch)[..frames];
        for (d, &s) in dst.iter_mut().zip(input) {
            *d += s * self.gain;
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_core::ChannelBuffer;

    #[test]
    fn lfe_routes_to_the_last_channel() {
        let mut fx = DedicatedEffect::new(48000.0);
        fx.device_update(48000.0, 6);
        fx.kind = DedicatedKind::LowFrequencyEffect;
        fx.gain = 1.0;
        let mut output = ChannelBuffer::new(6, 4);
        fx.process(&[1.0, 1.0, 1.0, 1.0], &mut output);
        assert_eq!(output.channel_mut(5)[0], 1.0);
        assert_eq!(output.channel_mut(0)[0], 0.0);
    }
}
