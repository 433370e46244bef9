//! Peak and RMS metering taps used by the device meter callback
//! (`alcGetAudioDataCallback`-style output monitoring isn't core to the
//! rendering graph, but every device render pass feeds its output through
//! one of these so API consumers can read a level without their own DSP).

use ao_core::Sample;

/// Peak level meter with exponential release, decaying from the loudest
/// sample seen since the last decay step.
#[derive(Debug, Clone)]
pub struct PeakMeter {
    current_peak: f32,
    release_coeff: f32,
}

impl PeakMeter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            current_peak: 0.0,
            release_coeff: (-1.0 / (0.3 * sample_rate)).exp(),
        }
    }

    pub fn process(&mut self, sample: Sample) {
        let abs = sample.abs();
        if abs > self.current_peak {
            self.current_peak = abs;
        } else {
            self.current_peak *= self.release_coeff;
        }
    }

    pub fn process_block(&mut self, samples: &[Sample]) {
        for &sample in samples {
            self.process(sample);
        }
    }

    pub fn peak(&self) -> f32 {
        self.current_peak
    }

    pub fn peak_dbfs(&self) -> f32 {
        20.0 * self.current_peak.max(1e-10).log10()
    }

    pub fn reset(&mut self) {
        self.current_peak = 0.0;
    }
}

/// Windowed RMS level meter over a fixed-length ring buffer.
#[derive(Debug, Clone)]
pub struct RmsMeter {
    sum_squares: f32,
    window: Vec<f32>,
    write_pos: usize,
}

impl RmsMeter {
    pub fn new(sample_rate: f32, window_ms: f32) -> Self {
        let window_samples = ((window_ms * 0.001 * sample_rate) as usize).max(1);
        Self {
            sum_squares: 0.0,
            window: vec![0.0; window_samples],
            write_pos: 0,
        }
    }

    pub fn process(&mut self, sample: Sample) {
        let squared = sample * sample;
        self.sum_squares -= self.window[self.write_pos];
        self.sum_squares += squared;
        self.window[self.write_pos] = squared;
        self.write_pos = (self.write_pos + 1) % self.window.len();
    }

    pub fn process_block(&mut self, samples: &[Sample]) {
        for &sample in samples {
            self.process(sample);
        }
    }

    pub fn rms(&self) -> f32 {
        (self.sum_squares / self.window.len() as f32).max(0.0).sqrt()
    }

    pub fn rms_dbfs(&self) -> f32 {
        20.0 * self.rms().max(1e-10).log10()
    }

    pub fn reset(&mut self) {
        self.sum_squares = 0.0;
        self.window.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_meter_tracks_loudest_sample_and_decays() {
        let mut meter = PeakMeter::new(48000.0);
        meter.process(0.8);
        assert!((meter.peak() - 0.8).abs() < 1e-6);
        for _ in 0..48000 {
            meter.process(0.0);
        }
        assert!(meter.peak() < 0.01);
    }

    #[test]
    fn rms_meter_reads_unity_for_full_scale_dc() {
        let mut meter = RmsMeter::new(48000.0, 100.0);
        for _ in 0..4800 {
            meter.process(1.0);
        }
        assert!((meter.rms() - 1.0).abs() < 1e-3);
    }
}
