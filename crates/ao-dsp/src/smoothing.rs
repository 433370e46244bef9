//! Lock-free parameter smoothing: a UI/control thread publishes a target
//! via an atomic store, the mix thread ramps toward it sample-by-sample.
//! Used for per-voice gain, per-send gain, and effect-slot mix level
//! changes so that a parameter update never produces a click.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use ao_core::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothingType {
    #[default]
    Linear,
    Exponential,
    Logarithmic,
    SCurve,
    None,
}

/// A single smoothed scalar parameter, safe to update from another thread
/// via [`SmoothedParam::set_target`] while the audio thread calls
/// [`SmoothedParam::next`].
#[derive(Debug)]
pub struct SmoothedParam {
    target: AtomicU32,
    current: f32,
    coeff: f32,
    smoothing_type: SmoothingType,
    smoothing_samples: f32,
    linear_step: f32,
    linear_remaining: i32,
    dirty: AtomicBool,
    sample_rate: f32,
    min_value: f32,
    max_value: f32,
}

impl SmoothedParam {
    pub fn new(
        initial_value: f32,
        smoothing_time_ms: f32,
        sample_rate: f32,
        smoothing_type: SmoothingType,
    ) -> Self {
        let smoothing_samples = (smoothing_time_ms / 1000.0) * sample_rate;
        let coeff = Self::calculate_coeff(smoothing_samples);

        Self {
            target: AtomicU32::new(initial_value.to_bits()),
            current: initial_value,
            coeff,
            smoothing_type,
            smoothing_samples,
            linear_step: 0.0,
            linear_remaining: 0,
            dirty: AtomicBool::new(false),
            sample_rate,
            min_value: f32::NEG_INFINITY,
            max_value: f32::INFINITY,
        }
    }

    pub fn with_range(
        initial_value: f32,
        smoothing_time_ms: f32,
        sample_rate: f32,
        smoothing_type: SmoothingType,
        min: f32,
        max: f32,
    ) -> Self {
        let mut param = Self::new(initial_value, smoothing_time_ms, sample_rate, smoothing_type);
        param.min_value = min;
        param.max_value = max;
        param
    }

    fn calculate_coeff(samples: f32) -> f32 {
        if samples <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / samples).exp()
        }
    }

    pub fn set_smoothing_time(&mut self, time_ms: f32) {
        self.smoothing_samples = (time_ms / 1000.0) * self.sample_rate;
        self.coeff = Self::calculate_coeff(self.smoothing_samples);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let time_ms = (self.smoothing_samples / self.sample_rate) * 1000.0;
        self.set_smoothing_time(time_ms);
    }

    pub fn set_smoothing_type(&mut self, smoothing_type: SmoothingType) {
        self.smoothing_type = smoothing_type;
    }

    #[inline]
    pub fn set_target(&self, value: f32) {
        let clamped = value.clamp(self.min_value, self.max_value);
        self.target.store(clamped.to_bits(), Ordering::Relaxed);
        self.dirty.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn target(&self) -> f32 {
        f32::from_bits(self.target.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn set_immediate(&mut self, value: f32) {
        let clamped = value.clamp(self.min_value, self.max_value);
        self.current = clamped;
        self.target.store(clamped.to_bits(), Ordering::Relaxed);
        self.linear_remaining = 0;
        self.dirty.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        match self.smoothing_type {
            SmoothingType::None => false,
            SmoothingType::Linear => self.linear_remaining > 0,
            _ => (self.current - self.target()).abs() > 1e-6,
        }
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let target = self.target();

        match self.smoothing_type {
            SmoothingType::None => {
                self.current = target;
            }
            SmoothingType::Exponential => {
                self.current += self.coeff * (target - self.current);
            }
            SmoothingType::Linear => {
                if self.dirty.swap(false, Ordering::Relaxed) {
                    let diff = target - self.current;
                    self.linear_remaining = self.smoothing_samples as i32;
                    if self.linear_remaining > 0 {
                        self.linear_step = diff / self.linear_remaining as f32;
                    } else {
                        self.current = target;
                        self.linear_step = 0.0;
                    }
                }

                if self.linear_remaining > 0 {
                    self.current += self.linear_step;
                    self.linear_remaining -= 1;
                } else {
                    self.current = target;
                }
            }
            SmoothingType::Logarithmic => {
                let diff = target - self.current;
                let t = self.coeff * 2.0;
                self.current += t * diff.signum() * diff.abs().sqrt().copysign(diff);
            }
            SmoothingType::SCurve => {
                let diff = (target - self.current).abs();
                let adaptive_coeff = self.coeff * (1.0 + diff.min(1.0));
                self.current += adaptive_coeff * (target - self.current);
            }
        }

        self.current
    }

    pub fn apply_gain(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample *= self.next();
        }
    }

    pub fn reset(&mut self) {
        let target = self.target();
        self.current = target;
        self.linear_remaining = 0;
        self.dirty.store(false, Ordering::Relaxed);
    }
}

/// A stereo pair of smoothed gains, driven together from a pan value.
#[derive(Debug)]
pub struct SmoothedStereoParam {
    pub left: SmoothedParam,
    pub right: SmoothedParam,
}

impl SmoothedStereoParam {
    pub fn from_pan(
        pan: f32,
        smoothing_time_ms: f32,
        sample_rate: f32,
        smoothing_type: SmoothingType,
    ) -> Self {
        let (left_gain, right_gain) = Self::pan_to_gains(pan);
        Self {
            left: SmoothedParam::new(left_gain, smoothing_time_ms, sample_rate, smoothing_type),
            right: SmoothedParam::new(right_gain, smoothing_time_ms, sample_rate, smoothing_type),
        }
    }

    pub fn set_pan(&self, pan: f32) {
        let (left_gain, right_gain) = Self::pan_to_gains(pan);
        self.left.set_target(left_gain);
        self.right.set_target(right_gain);
    }

    fn pan_to_gains(pan: f32) -> (f32, f32) {
        let pan = pan.clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * 0.25 * std::f32::consts::PI;
        (angle.cos(), angle.sin())
    }

    pub fn apply(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            *l *= self.left.next();
            *r *= self.right.next();
        }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

/// A named collection of smoothed parameters sharing a sample rate, used
/// by effect states with many simultaneously-updatable knobs.
#[derive(Debug)]
pub struct ParameterBank {
    params: Vec<SmoothedParam>,
    sample_rate: f32,
    default_smoothing_ms: f32,
    default_smoothing_type: SmoothingType,
}

impl ParameterBank {
    pub fn new(sample_rate: f32, default_smoothing_ms: f32, default_smoothing_type: SmoothingType) -> Self {
        Self {
            params: Vec::new(),
            sample_rate,
            default_smoothing_ms,
            default_smoothing_type,
        }
    }

    pub fn add(&mut self, initial_value: f32) -> usize {
        let index = self.params.len();
        self.params.push(SmoothedParam::new(
            initial_value,
            self.default_smoothing_ms,
            self.sample_rate,
            self.default_smoothing_type,
        ));
        index
    }

    pub fn add_with_range(&mut self, initial_value: f32, min: f32, max: f32) -> usize {
        let index = self.params.len();
        self.params.push(SmoothedParam::with_range(
            initial_value,
            self.default_smoothing_ms,
            self.sample_rate,
            self.default_smoothing_type,
            min,
            max,
        ));
        index
    }

    pub fn get(&self, index: usize) -> Option<&SmoothedParam> {
        self.params.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SmoothedParam> {
        self.params.get_mut(index)
    }

    pub fn set_target(&self, index: usize, value: f32) {
        if let Some(param) = self.params.get(index) {
            param.set_target(value);
        }
    }

    pub fn current(&self, index: usize) -> f32 {
        self.params.get(index).map(|p| p.current()).unwrap_or(0.0)
    }

    pub fn next_all(&mut self) -> Vec<f32> {
        self.params.iter_mut().map(|p| p.next()).collect()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for param in &mut self.params {
            param.set_sample_rate(sample_rate);
        }
    }

    pub fn reset_all(&mut self) {
        for param in &mut self.params {
            param.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_smoothing_converges_to_target() {
        let mut param = SmoothedParam::new(0.0, 10.0, 48000.0, SmoothingType::Exponential);
        param.set_target(1.0);
        for _ in 0..10000 {
            param.next();
        }
        assert!((param.current() - 1.0).abs() < 0.01);
    }

    #[test]
    fn linear_smoothing_reaches_target_in_ramp_samples() {
        let mut param = SmoothedParam::new(0.0, 10.0, 1000.0, SmoothingType::Linear);
        param.set_target(1.0);
        for _ in 0..10 {
            param.next();
        }
        assert!((param.current() - 1.0).abs() < 0.01);
    }

    #[test]
    fn no_smoothing_jumps_immediately() {
        let mut param = SmoothedParam::new(0.0, 10.0, 48000.0, SmoothingType::None);
        param.set_target(1.0);
        assert!((param.next() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn value_is_clamped_to_range() {
        let param = SmoothedParam::with_range(0.5, 10.0, 48000.0, SmoothingType::Exponential, 0.0, 1.0);
        param.set_target(2.0);
        assert!((param.target() - 1.0).abs() < 1e-6);
        param.set_target(-1.0);
        assert!((param.target() - 0.0).abs() < 1e-6);
    }

    #[test]
    fn parameter_bank_tracks_many_targets() {
        let mut bank = ParameterBank::new(48000.0, 10.0, SmoothingType::Exponential);
        let idx1 = bank.add(0.0);
        let idx2 = bank.add_with_range(0.5, 0.0, 1.0);
        bank.set_target(idx1, 1.0);
        bank.set_target(idx2, 0.75);
        for _ in 0..10000 {
            bank.next_all();
        }
        assert!((bank.current(idx1) - 1.0).abs() < 0.01);
        assert!((bank.current(idx2) - 0.75).abs() < 0.01);
    }
}
