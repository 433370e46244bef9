//! Fixed-point and buffer-sizing constants shared across the mixing core.

/// Fractional bits of the per-voice fixed-point playback position
/// (`Q(32-N).N`). Matches the precision the resample kernels are built
/// against.
pub const MIXER_FRAC_BITS: u32 = 12;
pub const MIXER_FRAC_ONE: u32 = 1 << MIXER_FRAC_BITS;
pub const MIXER_FRAC_MASK: u32 = MIXER_FRAC_ONE - 1;

/// Frames held in the device's internal ring/line buffers.
pub const BUFFER_LINE_SIZE: usize = 1024;

/// Extra input samples a resampler kernel may read before/after the
/// requested span, on each side.
pub const MAX_RESAMPLER_PADDING: usize = 24;
pub const MAX_RESAMPLE_EDGE: usize = MAX_RESAMPLER_PADDING / 2;

/// Number of past samples retained per ear for HRTF convolution history.
pub const HRTF_HISTORY_LENGTH: usize = 896;
pub const HRTF_DIRECT_DELAY: usize = 32;

/// Maximum channels the mixer's internal (ambisonic) bus carries. Third
/// order ambisonics, ACN ordered: (3+1)^2 = 16.
pub const MAX_AMBI_ORDER: usize = 3;
pub const MAX_AMBI_CHANNELS: usize = (MAX_AMBI_ORDER + 1) * (MAX_AMBI_ORDER + 1);

/// Maximum physical output channels a device may mix to (7.1.4-class).
pub const MAX_OUTPUT_CHANNELS: usize = 16;

/// Default / maximum auxiliary effect-slot sends per source.
pub const DEFAULT_NUM_SENDS: usize = 2;
pub const MAX_NUM_SENDS: usize = 16;

/// Clamp applied to any single per-channel mix gain to guard against
/// runaway energy from pathological panning coefficients.
pub const GAIN_MIX_MAX: f32 = 1000.0;
/// Gains below this are treated as silence and skip the mix-add entirely.
pub const GAIN_SILENCE_THRESHOLD: f32 = 0.00001;

/// Capacity of the lock-free SPSC event ring between the mixer and its
/// owning context.
pub const EVENT_RING_CAPACITY: usize = 256;
