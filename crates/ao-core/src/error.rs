//! Error taxonomy for the mixing core.
//!
//! The render hot path (`Device::render_samples`, `Voice::mix`,
//! `EffectState::process`) never returns `Result`: per spec, all parameter
//! validation happens before atomic publication, so the mixer never observes
//! an invalid snapshot. `CoreError` covers the boundaries that do fail:
//! device construction, HRTF table loading, and resource exhaustion.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid channel configuration: {0}")]
    InvalidChannelConfig(String),

    #[error("no free voices available")]
    NoFreeVoices,

    #[error("auxiliary send count {requested} exceeds device maximum {max}")]
    TooManyAuxSends { requested: usize, max: usize },

    #[error("HRTF data error: {0}")]
    Hrtf(String),

    #[error("malformed sample block: {0}")]
    MalformedBlock(String),

    #[error("device is disconnected")]
    Disconnected,
}

pub type CoreResult<T> = Result<T, CoreError>;
