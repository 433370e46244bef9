//! ao-dsp: real-time DSP processors shared by the spatializer and the
//! auxiliary effect states.
//!
//! ## Modules
//! - `simd` - runtime SIMD capability detection, `wide`-backed lane helpers
//! - `smoothing` - lock-free parameter smoothing for click-free updates
//! - `biquad` - TDF-II biquad filters (lowpass, highpass, peaking, shelving)
//! - `eq` - multi-band parametric EQ (the `AL_EFFECT_EQUALIZER` effect state)
//! - `dynamics` - envelope followers, compressor/limiter/gate/expander
//! - `delay` - simple, ping-pong and modulated delay lines
//! - `reverb` - FDN algorithmic reverb (the `AL_EFFECT_REVERB` effect state)
//! - `convolution` - partitioned FFT convolution reverb
//! - `spatial` - constant-power panning and stereo-width helpers
//! - `metering` - peak/RMS metering tap used by device meter callbacks

#![allow(dead_code)]

pub mod biquad;
pub mod convolution;
pub mod delay;
pub mod dynamics;
pub mod eq;
pub mod metering;
pub mod reverb;
pub mod simd;
pub mod smoothing;
pub mod spatial;

pub use biquad::{BiquadCoeffs, BiquadTDF2};
pub use convolution::ConvolutionReverb;
pub use delay::{Delay, ModulatedDelay, PingPongDelay};
pub use dynamics::{Compressor, EnvelopeFollower, Gate, Limiter};
pub use eq::{EqBand, EqFilterType, ParametricEq};
pub use metering::{PeakMeter, RmsMeter};
pub use reverb::{AlgorithmicReverb, equal_power_mix};
pub use simd::{SimdLevel, detect_simd_level, simd_level};
pub use smoothing::{SmoothedParam, SmoothingType};
pub use spatial::{constant_power_gains, equal_power_crossfade};

use ao_core::Sample;

/// Common interface for every real-time DSP processor: resettable state,
/// a reported latency in samples for delay-compensation bookkeeping.
pub trait Processor: Send + Sync {
    fn reset(&mut self);

    fn latency(&self) -> usize {
        0
    }
}

/// A processor operating on a single channel.
pub trait MonoProcessor: Processor {
    fn process_sample(&mut self, input: Sample) -> Sample;

    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// A processor operating on an interleaved stereo pair.
pub trait StereoProcessor: Processor {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample);

    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process_sample(*l, *r);
        }
    }
}

/// Processors whose internal coefficients depend on the device sample rate
/// must implement this so the mixer can retune them on device reset.
pub trait ProcessorConfig {
    fn set_sample_rate(&mut self, sample_rate: f32);
}
