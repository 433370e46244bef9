//! Point/linear/cubic/band-limited-sinc resample kernels.
//!
//! Every kernel reads from a padded scratch slice: `MAX_RESAMPLE_EDGE`
//! samples of history before the current read position, so a 4-tap cubic
//! or N-tap sinc kernel never reads out of bounds at the block start.
//! Position is the fixed-point `(int, frac)` pair in `MIXER_FRAC_BITS` of
//! precision the mixer advances every mix call.

use ao_core::{MAX_RESAMPLE_EDGE, MIXER_FRAC_MASK, MIXER_FRAC_ONE, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResamplerKind {
    Point,
    Linear,
    /// Catmull-Rom style cubic spline through four taps.
    Spline,
    /// Cubic through four taps derived from a truncated Gaussian window.
    Gaussian,
    BSinc12,
    BSinc24,
    BSinc48,
    FastBSinc12,
    FastBSinc24,
    FastBSinc48,
}

impl ResamplerKind {
    /// Falls back to the fast (phase-interpolation-only) sinc variant when
    /// the step is at or below unity — no downsampling, so the wider
    /// scale-interpolated kernel buys nothing.
    pub fn resolve(self, step: u32) -> Self {
        let downsampling = step > MIXER_FRAC_ONE;
        match self {
            ResamplerKind::BSinc12 if !downsampling => ResamplerKind::FastBSinc12,
            ResamplerKind::BSinc24 if !downsampling => ResamplerKind::FastBSinc24,
            ResamplerKind::BSinc48 if !downsampling => ResamplerKind::FastBSinc48,
            other => other,
        }
    }

    fn taps(self) -> usize {
        match self {
            ResamplerKind::Point => 1,
            ResamplerKind::Linear => 2,
            ResamplerKind::Spline | ResamplerKind::Gaussian => 4,
            ResamplerKind::BSinc12 | ResamplerKind::FastBSinc12 => 12,
            ResamplerKind::BSinc24 | ResamplerKind::FastBSinc24 => 24,
            ResamplerKind::BSinc48 | ResamplerKind::FastBSinc48 => 48,
        }
    }

    /// Samples of left/right padding a full-width call into this kernel
    /// needs, bounded by `MAX_RESAMPLE_EDGE` (the scratch buffer's edge).
    pub fn edge_samples(self) -> usize {
        (self.taps() / 2).min(MAX_RESAMPLE_EDGE)
    }
}

#[inline]
fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-7 { 1.0 } else { (std::f32::consts::PI * x).sin() / (std::f32::consts::PI * x) }
}

#[inline]
fn blackman(n: f32, width: f32) -> f32 {
    let a0 = 0.42;
    let a1 = 0.5;
    let a2 = 0.08;
    let phase = std::f32::consts::TAU * (n + width / 2.0) / width;
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
}

/// Resamples `count` output frames from `src` (padded with `edge_samples()`
/// history before index 0) starting at fixed-point `(pos, frac)`, advancing
/// by `step` per output sample. Returns the frames actually produced.
pub fn resample(
    kind: ResamplerKind,
    src: &[Sample],
    edge: usize,
    pos: &mut i64,
    frac: &mut u32,
    step: u32,
    dst: &mut [Sample],
    count: usize,
) {
    let taps = kind.taps();
    for slot in dst.iter_mut().take(count) {
        let base = edge as i64 + *pos;
        let t = *frac as f32 / MIXER_FRAC_ONE as f32;

        *slot = match kind {
            ResamplerKind::Point => tap(src, base),
            ResamplerKind::Linear => {
                let a = tap(src, base);
                let b = tap(src, base + 1);
                a + (b - a) * t
            }
            ResamplerKind::Spline | ResamplerKind::Gaussian => {
                let p0 = tap(src, base - 1);
                let p1 = tap(src, base);
                let p2 = tap(src, base + 1);
                let p3 = tap(src, base + 2);
                catmull_rom(p0, p1, p2, p3, t)
            }
            _ => {
                let half = taps as i64 / 2;
                let mut acc = 0.0;
                for i in -half..half {
                    let sample = tap(src, base + i);
                    let x = i as f32 - t;
                    let window = blackman(x + half as f32, taps as f32);
                    acc += sample * sinc(x) * window;
                }
                acc
            }
        };

        *frac += step;
        *pos += (*frac / MIXER_FRAC_ONE) as i64;
        *frac &= MIXER_FRAC_MASK;
    }
}

#[inline]
fn tap(src: &[Sample], idx: i64) -> Sample {
    if idx < 0 || idx as usize >= src.len() { 0.0 } else { src[idx as usize] }
}

#[inline]
fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_resampler_at_unity_step_passes_through() {
        let src = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let mut pos = 0i64;
        let mut frac = 0u32;
        let mut dst = vec![0.0; 4];
        resample(ResamplerKind::Point, &src, 0, &mut pos, &mut frac, MIXER_FRAC_ONE, &mut dst, 4);
        assert_eq!(dst, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn linear_resampler_interpolates_halfway() {
        let src = vec![0.0, 10.0, 20.0];
        let mut pos = 0i64;
        let mut frac = MIXER_FRAC_ONE / 2;
        let mut dst = vec![0.0; 1];
        resample(ResamplerKind::Linear, &src, 0, &mut pos, &mut frac, MIXER_FRAC_ONE, &mut dst, 1);
        assert!((dst[0] - 5.0).abs() < 1e-4);
    }

    #[test]
    fn fast_variant_selected_without_downsampling() {
        assert_eq!(ResamplerKind::BSinc24.resolve(MIXER_FRAC_ONE), ResamplerKind::FastBSinc24);
        assert_eq!(ResamplerKind::BSinc24.resolve(MIXER_FRAC_ONE * 2), ResamplerKind::BSinc24);
    }
}
