//! Frequency shifter: single-sideband modulation via a quadrature Hilbert
//! transformer, rather than the chorus/pitch-shifter's delay-line tricks.
//!
//! The in-phase and quadrature signals come from two four-stage allpass
//! cascades with the well-known wideband-90-degree coefficient set, offset
//! by a single sample of delay on the quadrature path to align them. Mixed
//! against a sine/cosine carrier pair, that gives a single-sideband shift
//! up or down with the mirror sideband suppressed across most of the audio
//! band (the allpass network's phase accuracy degrades below ~30 Hz).

use std::f32::consts::TAU;

use ao_core::{ChannelBuffer, Sample};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

const INPHASE_COEFFS: [f32; 4] = [0.6923877, 0.9360654322959, 0.9882295226860, 0.9987488452737];
const QUADRATURE_COEFFS: [f32; 4] = [0.4021921162426, 0.8561710882420, 0.9722909545651, 0.9952884791278];

#[derive(Debug, Clone, Copy, Default)]
struct AllpassStage {
    coeff: f32,
    x1: f32,
    y1: f32,
}

impl AllpassStage {
    fn new(coeff: f32) -> Self {
        Self { coeff, x1: 0.0, y1: 0.0 }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let y = self.coeff * (x - self.y1) + self.x1;
        self.x1 = x;
        self.y1 = y;
        y
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

#[derive(Debug, Clone, Copy)]
struct AllpassChain([AllpassStage; 4]);

impl AllpassChain {
    fn new(coeffs: [f32; 4]) -> Self {
        Self(coeffs.map(AllpassStage::new))
    }

    fn process(&mut self, x: f32) -> f32 {
        self.0.iter_mut().fold(x, |acc, stage| stage.process(acc))
    }

    fn reset(&mut self) {
        self.0.iter_mut().for_each(AllpassStage::reset);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    Up,
    Down,
    Both,
}

#[derive(Debug, Clone)]
pub struct FrequencyShifterProps {
    pub frequency_hz: f32,
    pub left_direction: ShiftDirection,
    pub right_direction: ShiftDirection,
}

impl Default for FrequencyShifterProps {
    fn default() -> Self {
        Self {
            frequency_hz: 0.0,
            left_direction: ShiftDirection::Down,
            right_direction: ShiftDirection::Down,
        }
    }
}

pub struct FrequencyShifterEffect {
    sample_rate: f32,
    inphase: AllpassChain,
    quadrature: AllpassChain,
    quadrature_delay: f32,
    phase: f32,
    frequency_hz: f32,
    direction: ShiftDirection,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl FrequencyShifterEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            inphase: AllpassChain::new(INPHASE_COEFFS),
            quadrature: AllpassChain::new(QUADRATURE_COEFFS),
            quadrature_delay: 0.0,
            phase: 0.0,
            frequency_hz: 0.0,
            direction: ShiftDirection::Down,
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }

    fn process_one(&mut self, input: Sample) -> Sample {
        let i = self.inphase.process(input);
        let q_raw = self.quadrature.process(input);
        let q = self.quadrature_delay;
        self.quadrature_delay = q_raw;

        let carrier_phase = self.phase * TAU;
        self.phase += self.frequency_hz / self.sample_rate;
        self.phase -= self.phase.floor();

        let (sin_c, cos_c) = carrier_phase.sin_cos();
        match self.direction {
            ShiftDirection::Up => i * cos_c - q * sin_c,
            ShiftDirection::Down => i * cos_c + q * sin_c,
            ShiftDirection::Both => 0.5 * (i * cos_c - q * sin_c) + 0.5 * (i * cos_c + q * sin_c),
        }
    }
}

impl EffectState for FrequencyShifterEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        self.sample_rate = sample_rate;
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::FrequencyShifter(p) = props else { return };
        self.frequency_hz = p.frequency_hz.max(0.0);
        self.direction = p.left_direction;
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
        self.inphase.reset();
        self.quadrature.reset();
        self.quadrature_delay = 0.0;
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_in_is_silence_out() {
        let mut shifter = FrequencyShifterEffect::new(48000.0);
        shifter.frequency_hz = 100.0;
        for _ in 0..512 {
            assert_eq!(shifter.process_one(0.0), 0.0);
        }
    }
}
