//! ao-fx: auxiliary effect states for the per-context effect-slot chain.
//!
//! Every effect renders from a slot's mono wet-send accumulator to a stereo
//! pair internally (even the effects that are conceptually mono, like the
//! autowah, duplicate left/right so the panning stage below is uniform),
//! then that pair is panned into the device's actual output channels using
//! the gains the mixer resolved for the slot's target. This mirrors the
//! `deviceUpdate`/`update`/`process` lifecycle every effect state exposes,
//! and the [`EffectProps`] sum type mirrors the per-effect property structs
//! the mixer publishes to a slot on a property-update boundary.

#![allow(dead_code)]

pub mod autowah;
pub mod chorus;
pub mod compressor;
pub mod convolution;
pub mod dedicated;
pub mod distortion;
pub mod echo;
pub mod equalizer;
pub mod frequency_shifter;
pub mod null;
pub mod pitch_shifter;
pub mod reverb;
pub mod ring_modulator;
pub mod slot;
pub mod vocal_morpher;

mod error;

pub use error::{EffectError, EffectResult};
pub use slot::{EffectSlot, EffectTarget, sort_effect_slots};

use ao_core::{ChannelBuffer, Sample};

/// Per-channel left/right send gains the mixer resolves for a slot's
/// target (the device's real outputs, or another slot's wet input) once per
/// `CalcEffectSlotParams` pass.
#[derive(Debug, Clone)]
pub struct TargetGains {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl TargetGains {
    pub fn silence(num_channels: usize) -> Self {
        Self {
            left: vec![0.0; num_channels],
            right: vec![0.0; num_channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.left.len()
    }
}

/// Mix an internally-rendered stereo wet pair into `output`'s channels
/// using `gains`, additive so multiple slots (and the dry path) can share
/// one device buffer.
pub fn pan_stereo_into(output: &mut ChannelBuffer, left: &[Sample], right: &[Sample], gains: &TargetGains) {
    let frames = left.len();
    for ch in 0..gains.channels().min(output.channels()) {
        let lg = gains.left[ch];
        let rg = gains.right[ch];
        if lg.abs() < ao_core::GAIN_SILENCE_THRESHOLD && rg.abs() < ao_core::GAIN_SILENCE_THRESHOLD {
            continue;
        }
        let dst = &mut output.channel_mut(ch)[..frames];
        for i in 0..frames {
            dst[i] += left[i] * lg + right[i] * rg;
        }
    }
}

/// Every effect state is driven through this lifecycle: `device_update`
/// when the device sample rate or channel count changes, `update` when the
/// slot's properties or routing target changes, and `process` once per mix
/// block on the real-time thread.
pub trait EffectState: Send {
    /// (Re)allocate anything sized by sample rate or output channel count.
    fn device_update(&mut self, sample_rate: f32, num_channels: usize);

    /// Recompute internal coefficients from `props` and remember the
    /// per-channel gains the wet output should be panned to.
    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains);

    /// Render `input` (the slot's accumulated mono wet-send buffer for this
    /// block) into `output`, adding into whatever the device/next slot
    /// already holds.
    fn process(&mut self, input: &[Sample], output: &mut ChannelBuffer);

    fn reset(&mut self);
}

/// Effect-specific parameter snapshot, published atomically to a slot's
/// [`EffectState`] on an `update` boundary.
#[derive(Debug, Clone)]
pub enum EffectProps {
    Null,
    Reverb(reverb::ReverbProps),
    Convolution(convolution::ConvolutionProps),
    Chorus(chorus::ChorusProps),
    Echo(echo::EchoProps),
    Equalizer(equalizer::EqualizerProps),
    Distortion(distortion::DistortionProps),
    Autowah(autowah::AutowahProps),
    RingModulator(ring_modulator::RingModulatorProps),
    FrequencyShifter(frequency_shifter::FrequencyShifterProps),
    PitchShifter(pitch_shifter::PitchShifterProps),
    VocalMorpher(vocal_morpher::VocalMorpherProps),
    Compressor(compressor::CompressorProps),
    Dedicated(dedicated::DedicatedProps),
}

impl EffectProps {
    /// Construct the effect state matching this property kind, primed for
    /// `sample_rate`/`num_channels`.
    pub fn new_state(&self, sample_rate: f32, num_channels: usize) -> Box<dyn EffectState> {
        let mut state: Box<dyn EffectState> = match self {
            EffectProps::Null => Box::new(null::NullEffect::new()),
            EffectProps::Reverb(_) => Box::new(reverb::ReverbEffect::new(sample_rate)),
            EffectProps::Convolution(_) => Box::new(convolution::ConvolutionEffect::new(sample_rate)),
            EffectProps::Chorus(_) => Box::new(chorus::ChorusEffect::new(sample_rate)),
            EffectProps::Echo(_) => Box::new(echo::EchoEffect::new(sample_rate)),
            EffectProps::Equalizer(_) => Box::new(equalizer::EqualizerEffect::new(sample_rate)),
            EffectProps::Distortion(_) => Box::new(distortion::DistortionEffect::new(sample_rate)),
            EffectProps::Autowah(_) => Box::new(autowah::AutowahEffect::new(sample_rate)),
            EffectProps::RingModulator(_) => Box::new(ring_modulator::RingModulatorEffect::new(sample_rate)),
            EffectProps::FrequencyShifter(_) => {
                Box::new(frequency_shifter::FrequencyShifterEffect::new(sample_rate))
            }
            EffectProps::PitchShifter(_) => Box::new(pitch_shifter::PitchShifterEffect::new(sample_rate)),
            EffectProps::VocalMorpher(_) => Box::new(vocal_morpher::VocalMorpherEffect::new(sample_rate)),
            EffectProps::Compressor(_) => Box::new(compressor::CompressorEffect::new(sample_rate)),
            EffectProps::Dedicated(_) => Box::new(dedicated::DedicatedEffect::new(sample_rate)),
        };
        state.device_update(sample_rate, num_channels);
        state
    }
}
