//! Runtime SIMD capability probing and `wide`-backed lane helpers used by
//! the mixer's per-voice gain and mix-down stages.

use std::sync::OnceLock;

use wide::f32x8;

use ao_core::{LANE_WIDTH, Sample};

/// Detected SIMD capability level. `wide` already picks the best available
/// instruction set per-platform at compile time; this is reported for
/// diagnostics and to size batch loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SimdLevel {
    Scalar = 0,
    Sse = 1,
    Avx2 = 2,
    Neon = 3,
}

impl SimdLevel {
    pub const fn width(self) -> usize {
        match self {
            SimdLevel::Scalar => 1,
            SimdLevel::Sse | SimdLevel::Neon => 4,
            SimdLevel::Avx2 => LANE_WIDTH,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SimdLevel::Scalar => "scalar",
            SimdLevel::Sse => "SSE",
            SimdLevel::Avx2 => "AVX2",
            SimdLevel::Neon => "NEON",
        }
    }
}

static DETECTED_SIMD_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

pub fn detect_simd_level() -> SimdLevel {
    *DETECTED_SIMD_LEVEL.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                SimdLevel::Avx2
            } else if is_x86_feature_detected!("sse4.2") {
                SimdLevel::Sse
            } else {
                SimdLevel::Scalar
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            SimdLevel::Neon
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            SimdLevel::Scalar
        }
    })
}

#[inline]
pub fn simd_level() -> SimdLevel {
    detect_simd_level()
}

/// Apply a constant gain to a buffer, 8 samples at a time via `wide`.
pub fn apply_gain(buffer: &mut [Sample], gain: Sample) {
    let gain_lane = f32x8::splat(gain);
    let len = buffer.len();
    let simd_len = len - (len % LANE_WIDTH);

    for chunk_start in (0..simd_len).step_by(LANE_WIDTH) {
        let chunk = &mut buffer[chunk_start..chunk_start + LANE_WIDTH];
        let lane = f32x8::from(<[f32; 8]>::try_from(&*chunk).unwrap());
        let out = (lane * gain_lane).to_array();
        chunk.copy_from_slice(&out);
    }
    for sample in &mut buffer[simd_len..] {
        *sample *= gain;
    }
}

/// Mix `src * gain` into `dest`, 8 samples at a time.
pub fn mix_add(dest: &mut [Sample], src: &[Sample], gain: Sample) {
    let gain_lane = f32x8::splat(gain);
    let len = dest.len().min(src.len());
    let simd_len = len - (len % LANE_WIDTH);

    for chunk_start in (0..simd_len).step_by(LANE_WIDTH) {
        let d = &mut dest[chunk_start..chunk_start + LANE_WIDTH];
        let s = &src[chunk_start..chunk_start + LANE_WIDTH];
        let d_lane = f32x8::from(<[f32; 8]>::try_from(&*d).unwrap());
        let s_lane = f32x8::from(<[f32; 8]>::try_from(s).unwrap());
        let out = (d_lane + s_lane * gain_lane).to_array();
        d.copy_from_slice(&out);
    }
    for i in simd_len..len {
        dest[i] += src[i] * gain;
    }
}

/// Apply a constant gain to an interleaved stereo pair of buffers.
pub fn apply_stereo_gain(left: &mut [Sample], right: &mut [Sample], gain: Sample) {
    apply_gain(left, gain);
    apply_gain(right, gain);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simd_level_has_nonzero_width() {
        assert!(detect_simd_level().width() >= 1);
    }

    #[test]
    fn apply_gain_scales_every_sample() {
        let mut buffer = vec![1.0f32; 20];
        apply_gain(&mut buffer, 0.5);
        assert!(buffer.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn mix_add_accumulates_scaled_source() {
        let mut dest = vec![1.0f32; 20];
        let src = vec![2.0f32; 20];
        mix_add(&mut dest, &src, 0.5);
        assert!(dest.iter().all(|&s| (s - 2.0).abs() < 1e-6));
    }
}
