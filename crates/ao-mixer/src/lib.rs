//! ao-mixer: per-device real-time mixing pipeline.
//!
//! Owns the voice state machines, the resampler, the twelve-step parameter
//! calculation that turns listener/source state into per-voice gains and
//! filters, the effect-slot graph, and the device render loop that decodes
//! the shared ambisonic mix to speakers, HRTF binaural output, or straight
//! passthrough.

// Audio engine uses explicit indexing for SIMD-friendly access patterns
#![allow(clippy::needless_range_loop)]
// Complex routing types are intentional
#![allow(clippy::type_complexity)]
// Too many arguments is common in audio processing functions
#![allow(clippy::too_many_arguments)]

mod buffer;
mod context;
mod decoder;
mod device;
mod error;
mod params;
mod resampler;
mod voice;
mod voice_change;

pub use buffer::{AmbisonicMeta, BufferItem, BufferStorage, SampleCallback};
pub use context::Context;
pub use decoder::SampleFormat;
pub use device::{Device, DeviceConfig, PostProcess};
pub use error::{MixerError, MixerResult};
pub use params::{
    AuxSendParams, DistanceModel, ListenerParams, SendGain, SourceParams, VoiceParams,
    calc_voice_params,
};
pub use resampler::{ResamplerKind, resample};
pub use voice::{PlayState, Voice};
pub use voice_change::{TransitionKind, VoiceChange, VoiceChangeQueue};
