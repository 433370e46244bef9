//! Error taxonomy for effect construction/reconfiguration boundaries.
//!
//! Mirrors [`ao_core::CoreError`]: the render hot path (`EffectState::process`)
//! never returns `Result`, only `deviceUpdate`/`update`-adjacent setup code.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EffectError {
    #[error("invalid effect parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("impulse response load failed: {0}")]
    ImpulseResponse(String),

    #[error("effect target would create a routing cycle")]
    TargetCycle,
}

pub type EffectResult<T> = Result<T, EffectError>;
