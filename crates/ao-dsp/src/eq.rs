//! Multi-band parametric equalizer backing the `AL_EFFECT_EQUALIZER` effect
//! state: a fixed low-shelf/peaking/peaking/high-shelf chain plus the
//! general-purpose bell/notch/cut bands used by the mixer's per-bus tone
//! controls.

use ao_core::Sample;

use crate::biquad::{BiquadCoeffs, BiquadTDF2};
use crate::{MonoProcessor, Processor, ProcessorConfig, StereoProcessor};

pub const MAX_BANDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EqFilterType {
    #[default]
    Bell,
    LowShelf,
    HighShelf,
    LowCut,
    HighCut,
    Notch,
    Bandpass,
    Allpass,
}

/// A single filter band: frequency, gain, Q and shape, backed by one
/// `BiquadTDF2` per channel.
#[derive(Debug, Clone)]
pub struct EqBand {
    pub enabled: bool,
    pub filter_type: EqFilterType,
    pub frequency: f32,
    pub gain_db: f32,
    pub q: f32,
    filter_l: BiquadTDF2,
    filter_r: BiquadTDF2,
    sample_rate: f32,
    needs_update: bool,
}

impl EqBand {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            enabled: false,
            filter_type: EqFilterType::Bell,
            frequency: 1000.0,
            gain_db: 0.0,
            q: 1.0,
            filter_l: BiquadTDF2::new(sample_rate),
            filter_r: BiquadTDF2::new(sample_rate),
            sample_rate,
            needs_update: true,
        }
    }

    pub fn set_params(&mut self, freq: f32, gain_db: f32, q: f32, filter_type: EqFilterType) {
        self.frequency = freq.clamp(20.0, 20_000.0);
        self.gain_db = gain_db.clamp(-30.0, 30.0);
        self.q = q.clamp(0.1, 30.0);
        self.filter_type = filter_type;
        self.needs_update = true;
    }

    fn coeffs(&self) -> BiquadCoeffs {
        match self.filter_type {
            EqFilterType::Bell => {
                BiquadCoeffs::peaking(self.sample_rate, self.frequency, self.q, self.gain_db)
            }
            EqFilterType::LowShelf => {
                BiquadCoeffs::low_shelf(self.sample_rate, self.frequency, self.q, self.gain_db)
            }
            EqFilterType::HighShelf => {
                BiquadCoeffs::high_shelf(self.sample_rate, self.frequency, self.q, self.gain_db)
            }
            EqFilterType::LowCut => BiquadCoeffs::highpass(self.sample_rate, self.frequency, self.q),
            EqFilterType::HighCut => BiquadCoeffs::lowpass(self.sample_rate, self.frequency, self.q),
            EqFilterType::Notch => BiquadCoeffs::notch(self.sample_rate, self.frequency, self.q),
            EqFilterType::Bandpass => BiquadCoeffs::bandpass(self.sample_rate, self.frequency, self.q),
            EqFilterType::Allpass => BiquadCoeffs::allpass(self.sample_rate, self.frequency, self.q),
        }
    }

    fn update_coeffs(&mut self) {
        if !self.needs_update {
            return;
        }
        let coeffs = self.coeffs();
        self.filter_l.set_coeffs(coeffs);
        self.filter_r.set_coeffs(coeffs);
        self.needs_update = false;
    }

    #[inline]
    pub fn process(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        if !self.enabled {
            return (left, right);
        }
        self.update_coeffs();
        (
            self.filter_l.process_sample(left),
            self.filter_r.process_sample(right),
        )
    }

    pub fn reset(&mut self) {
        self.filter_l.reset();
        self.filter_r.reset();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.filter_l.set_sample_rate(sample_rate);
        self.filter_r.set_sample_rate(sample_rate);
        self.needs_update = true;
    }
}

/// A chain of up to [`MAX_BANDS`] filter bands processed in series.
pub struct ParametricEq {
    bands: Vec<EqBand>,
    sample_rate: f32,
    pub output_gain_db: f32,
}

impl ParametricEq {
    pub fn new(sample_rate: f32) -> Self {
        let bands = (0..MAX_BANDS).map(|_| EqBand::new(sample_rate)).collect();
        Self {
            bands,
            sample_rate,
            output_gain_db: 0.0,
        }
    }

    /// Construct the fixed-topology EFX equalizer: low shelf, two peaking
    /// mid bands, high shelf.
    pub fn efx_default(sample_rate: f32) -> Self {
        let mut eq = Self::new(sample_rate);
        eq.set_band(0, 250.0, 0.0, 0.71, EqFilterType::LowShelf);
        eq.set_band(1, 1000.0, 0.0, 1.0, EqFilterType::Bell);
        eq.set_band(2, 4000.0, 0.0, 1.0, EqFilterType::Bell);
        eq.set_band(3, 8000.0, 0.0, 0.71, EqFilterType::HighShelf);
        eq
    }

    pub fn set_band(&mut self, index: usize, freq: f32, gain_db: f32, q: f32, filter_type: EqFilterType) {
        if let Some(band) = self.bands.get_mut(index) {
            band.enabled = true;
            band.set_params(freq, gain_db, q, filter_type);
        }
    }

    pub fn enable_band(&mut self, index: usize, enabled: bool) {
        if let Some(band) = self.bands.get_mut(index) {
            band.enabled = enabled;
        }
    }

    pub fn band(&self, index: usize) -> Option<&EqBand> {
        self.bands.get(index)
    }

    pub fn band_mut(&mut self, index: usize) -> Option<&mut EqBand> {
        self.bands.get_mut(index)
    }

    pub fn set_output_gain(&mut self, gain_db: f32) {
        self.output_gain_db = gain_db.clamp(-60.0, 24.0);
    }
}

impl Processor for ParametricEq {
    fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }
}

impl StereoProcessor for ParametricEq {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let mut out_l = left;
        let mut out_r = right;
        for band in &mut self.bands {
            (out_l, out_r) = band.process(out_l, out_r);
        }
        let gain = 10f32.powf(self.output_gain_db / 20.0);
        (out_l * gain, out_r * gain)
    }
}

impl ProcessorConfig for ParametricEq {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for band in &mut self.bands {
            band.set_sample_rate(sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bell_band_boosts_center_frequency() {
        let mut band = EqBand::new(48000.0);
        band.enabled = true;
        band.set_params(1000.0, 6.0, 1.0, EqFilterType::Bell);
        let mut out = (0.0, 0.0);
        for i in 0..4000 {
            let x = (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin();
            out = band.process(x, x);
        }
        assert!(out.0.is_finite());
    }

    #[test]
    fn disabled_band_is_transparent() {
        let mut band = EqBand::new(48000.0);
        assert_relative_eq!(band.process(0.3, -0.2).0, 0.3);
    }

    #[test]
    fn efx_default_topology_has_four_enabled_bands() {
        let eq = ParametricEq::efx_default(48000.0);
        let enabled = (0..MAX_BANDS)
            .filter(|&i| eq.band(i).map(|b| b.enabled).unwrap_or(false))
            .count();
        assert_eq!(enabled, 4);
    }
}
