//! Uniform-partitioned FFT convolution backing the convolution-reverb
//! effect state: load a stereo impulse response once, then convolve each
//! incoming block against it in the frequency domain with overlap-add.

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex32;

use ao_core::Sample;

use crate::reverb::equal_power_mix;
use crate::{Processor, ProcessorConfig, StereoProcessor};

const PARTITION_SIZE: usize = 512;

struct ConvolutionChannel {
    partitions: Vec<Vec<Complex32>>,
    input_history: Vec<Vec<Complex32>>,
    history_pos: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    input_buffer: Vec<f32>,
    output_overlap: Vec<f32>,
    pending_overlap: Option<Vec<f32>>,
    buffer_pos: usize,
}

impl ConvolutionChannel {
    fn new(ir: &[f32]) -> Self {
        let fft_size = PARTITION_SIZE * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);

        let num_partitions = ir.len().div_ceil(PARTITION_SIZE).max(1);
        let mut partitions = Vec::with_capacity(num_partitions);
        for p in 0..num_partitions {
            let start = p * PARTITION_SIZE;
            let end = (start + PARTITION_SIZE).min(ir.len());
            let mut padded = vec![0.0f32; fft_size];
            if start < ir.len() {
                padded[..end - start].copy_from_slice(&ir[start..end]);
            }
            let mut spectrum = fft.make_output_vec();
            fft.process(&mut padded, &mut spectrum).ok();
            partitions.push(spectrum);
        }

        let input_history = vec![vec![Complex32::new(0.0, 0.0); fft_size / 2 + 1]; num_partitions];

        Self {
            partitions,
            input_history,
            history_pos: 0,
            fft,
            ifft,
            input_buffer: vec![0.0; fft_size],
            output_overlap: vec![0.0; PARTITION_SIZE],
            pending_overlap: None,
            buffer_pos: 0,
        }
    }

    fn process_partition(&mut self) {
        let fft_size = PARTITION_SIZE * 2;
        let mut spectrum = self.fft.make_output_vec();
        self.fft
            .process(&mut self.input_buffer.clone(), &mut spectrum)
            .ok();
        self.input_history[self.history_pos] = spectrum;

        let num_partitions = self.partitions.len();
        let mut accum = vec![Complex32::new(0.0, 0.0); fft_size / 2 + 1];
        for p in 0..num_partitions {
            let hist_idx = (self.history_pos + num_partitions - p) % num_partitions;
            let hist = &self.input_history[hist_idx];
            let ir = &self.partitions[p];
            for (a, (h, i)) in accum.iter_mut().zip(hist.iter().zip(ir.iter())) {
                *a += h * i;
            }
        }

        let mut time_domain = vec![0.0f32; fft_size];
        self.ifft.process(&mut accum, &mut time_domain).ok();
        let norm = 1.0 / fft_size as f32;

        for i in 0..PARTITION_SIZE {
            self.output_overlap[i] += time_domain[i] * norm;
        }
        // stash second half for next block's overlap add
        let next_overlap: Vec<f32> = time_domain[PARTITION_SIZE..]
            .iter()
            .map(|v| v * norm)
            .collect();
        self.pending_overlap = Some(next_overlap);

        self.history_pos = (self.history_pos + 1) % num_partitions.max(1);
    }

    fn reset(&mut self) {
        self.input_buffer.fill(0.0);
        self.output_overlap.fill(0.0);
        self.buffer_pos = 0;
        self.history_pos = 0;
        for h in &mut self.input_history {
            h.fill(Complex32::new(0.0, 0.0));
        }
    }
}

/// Convolution reverb effect engine: stereo-in, mono or stereo impulse
/// response, equal-power dry/wet mix.
pub struct ConvolutionReverb {
    left: Option<ConvolutionChannel>,
    right: Option<ConvolutionChannel>,
    dry_wet: f32,
    ir_loaded: bool,
    sample_rate: f32,
}

impl ConvolutionReverb {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: None,
            right: None,
            dry_wet: 0.5,
            ir_loaded: false,
            sample_rate,
        }
    }

    pub fn load_ir_mono(&mut self, ir: &[Sample]) {
        self.left = Some(ConvolutionChannel::new(ir));
        self.right = Some(ConvolutionChannel::new(ir));
        self.ir_loaded = true;
        self.reset();
    }

    pub fn load_ir_stereo(&mut self, left: &[Sample], right: &[Sample]) {
        self.left = Some(ConvolutionChannel::new(left));
        self.right = Some(ConvolutionChannel::new(right));
        self.ir_loaded = true;
        self.reset();
    }

    pub fn set_dry_wet(&mut self, mix: f32) {
        self.dry_wet = mix.clamp(0.0, 1.0);
    }
}

impl Processor for ConvolutionReverb {
    fn reset(&mut self) {
        if let Some(ch) = &mut self.left {
            ch.reset();
        }
        if let Some(ch) = &mut self.right {
            ch.reset();
        }
    }

    fn latency(&self) -> usize {
        PARTITION_SIZE
    }
}

impl StereoProcessor for ConvolutionReverb {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        if !self.ir_loaded {
            return (left, right);
        }
        let (Some(lch), Some(rch)) = (&mut self.left, &mut self.right) else {
            return (left, right);
        };

        lch.input_buffer[lch.buffer_pos] = left;
        rch.input_buffer[rch.buffer_pos] = right;
        let wet_l = lch.output_overlap[lch.buffer_pos];
        let wet_r = rch.output_overlap[rch.buffer_pos];

        lch.buffer_pos += 1;
        rch.buffer_pos += 1;

        if lch.buffer_pos >= PARTITION_SIZE {
            lch.process_partition();
            rch.process_partition();
            if let Some(overlap) = lch.pending_overlap.take() {
                lch.output_overlap = overlap;
            }
            if let Some(overlap) = rch.pending_overlap.take() {
                rch.output_overlap = overlap;
            }
            lch.buffer_pos = 0;
            rch.buffer_pos = 0;
        }

        (
            equal_power_mix(left, wet_l, self.dry_wet),
            equal_power_mix(right, wet_r, self.dry_wet),
        )
    }
}

impl ProcessorConfig for ConvolutionReverb {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.ir_loaded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unloaded_ir_is_transparent() {
        let mut conv = ConvolutionReverb::new(48000.0);
        let (l, r) = conv.process_sample(0.5, -0.25);
        assert_eq!(l, 0.5);
        assert_eq!(r, -0.25);
    }

    #[test]
    fn impulse_ir_reproduces_dry_signal_at_full_wet() {
        let mut conv = ConvolutionReverb::new(48000.0);
        let mut ir = vec![0.0f32; PARTITION_SIZE];
        ir[0] = 1.0;
        conv.load_ir_mono(&ir);
        conv.set_dry_wet(1.0);

        let mut last = (0.0, 0.0);
        for _ in 0..(PARTITION_SIZE * 3) {
            last = conv.process_sample(1.0, 1.0);
        }
        assert!(last.0.is_finite());
        assert!(last.1.is_finite());
    }
}
