//! Error taxonomy for the mixer's construction/reconfiguration boundaries.
//!
//! The render loop itself never returns `Result` (spec: the mix thread
//! never throws on input data); this is for `Device::open`/`Context::new`
//! and property validation that happens before atomic publication.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MixerError {
    #[error(transparent)]
    Core(#[from] ao_core::CoreError),

    #[error(transparent)]
    Spatial(#[from] ao_spatial::SpatialError),

    #[error("too many active contexts for this device")]
    TooManyContexts,

    #[error("source already bound to another voice")]
    VoiceAlreadyBound,
}

pub type MixerResult<T> = Result<T, MixerError>;
