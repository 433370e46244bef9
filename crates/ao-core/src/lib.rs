//! ao-core: shared sample types, format conversion, error taxonomy and
//! lock-free handoff primitives for the ao mixing core.

mod channel_layout;
mod constants;
mod error;
mod events;
mod format;
mod mailbox;
mod sample;

pub use channel_layout::*;
pub use constants::*;
pub use error::*;
pub use events::*;
pub use format::*;
pub use mailbox::*;
pub use sample::*;

/// Device output sample rate, in Hz. Any positive value is accepted; the
/// common rates are listed for convenience and config validation.
pub type SampleRateHz = u32;

pub const SAMPLE_RATE_MIN: SampleRateHz = 8_000;
pub const SAMPLE_RATE_MAX: SampleRateHz = 384_000;

/// Device mixing/callback period, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BufferSize(pub u32);

impl BufferSize {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn latency_ms(self, sample_rate: SampleRateHz) -> f64 {
        (self.0 as f64 / sample_rate as f64) * 1000.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self(1024)
    }
}

/// Decibel value wrapper, convertible to/from linear gain.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f32);

impl Decibels {
    pub const ZERO: Self = Self(0.0);
    pub const NEG_INF: Self = Self(f32::NEG_INFINITY);

    #[inline]
    pub fn from_gain(gain: f32) -> Self {
        if gain <= 0.0 {
            Self::NEG_INF
        } else {
            Self(20.0 * gain.log10())
        }
    }

    #[inline]
    pub fn to_gain(self) -> f32 {
        if self.0 <= -144.0 {
            0.0
        } else {
            10.0_f32.powf(self.0 / 20.0)
        }
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}
