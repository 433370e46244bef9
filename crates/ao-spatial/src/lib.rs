//! Spatialization: Ambisonic (B-format) encode/decode and HRTF binaural
//! rendering for the per-voice 3D mix. A [`crate::hoa::AmbisonicEncoder`]
//! projects a mono voice onto a B-format bus; a [`crate::hoa::AmbisonicDecoder`]
//! or [`crate::binaural::BinauralRenderer`] resolves that bus (or a voice
//! directly) onto the device's actual output layout.

#![allow(dead_code)]

pub mod binaural;
pub mod hoa;

mod error;
mod position;

pub use error::{SpatialError, SpatialResult};
pub use position::{CartesianCoord, Orientation, Position3D, SphericalCoord};

use serde::{Deserialize, Serialize};

/// Speaker layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerLayout {
    pub name: String,
    pub speakers: Vec<Speaker>,
    pub has_lfe: bool,
}

/// Single speaker definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub label: String,
    pub position: Position3D,
    pub channel: usize,
    pub is_lfe: bool,
}

impl SpeakerLayout {
    pub fn mono() -> Self {
        Self {
            name: "Mono".into(),
            speakers: vec![Speaker::new("C", Position3D::from_spherical(0.0, 0.0, 1.0), 0)],
            has_lfe: false,
        }
    }

    pub fn stereo() -> Self {
        Self {
            name: "Stereo".into(),
            speakers: vec![
                Speaker::new("L", Position3D::from_spherical(-30.0, 0.0, 1.0), 0),
                Speaker::new("R", Position3D::from_spherical(30.0, 0.0, 1.0), 1),
            ],
            has_lfe: false,
        }
    }

    pub fn quad() -> Self {
        Self {
            name: "Quad".into(),
            speakers: vec![
                Speaker::new("L", Position3D::from_spherical(-45.0, 0.0, 1.0), 0),
                Speaker::new("R", Position3D::from_spherical(45.0, 0.0, 1.0), 1),
                Speaker::new("Ls", Position3D::from_spherical(-135.0, 0.0, 1.0), 2),
                Speaker::new("Rs", Position3D::from_spherical(135.0, 0.0, 1.0), 3),
            ],
            has_lfe: false,
        }
    }

    pub fn surround_5_1() -> Self {
        Self {
            name: "5.1".into(),
            speakers: vec![
                Speaker::new("L", Position3D::from_spherical(-30.0, 0.0, 1.0), 0),
                Speaker::new("R", Position3D::from_spherical(30.0, 0.0, 1.0), 1),
                Speaker::new("C", Position3D::from_spherical(0.0, 0.0, 1.0), 2),
                Speaker::new_lfe("LFE", 3),
                Speaker::new("Ls", Position3D::from_spherical(-110.0, 0.0, 1.0), 4),
                Speaker::new("Rs", Position3D::from_spherical(110.0, 0.0, 1.0), 5),
            ],
            has_lfe: true,
        }
    }

    pub fn surround_7_1() -> Self {
        Self {
            name: "7.1".into(),
            speakers: vec![
                Speaker::new("L", Position3D::from_spherical(-30.0, 0.0, 1.0), 0),
                Speaker::new("R", Position3D::from_spherical(30.0, 0.0, 1.0), 1),
                Speaker::new("C", Position3D::from_spherical(0.0, 0.0, 1.0), 2),
                Speaker::new_lfe("LFE", 3),
                Speaker::new("Lss", Position3D::from_spherical(-90.0, 0.0, 1.0), 4),
                Speaker::new("Rss", Position3D::from_spherical(90.0, 0.0, 1.0), 5),
                Speaker::new("Lsr", Position3D::from_spherical(-135.0, 0.0, 1.0), 6),
                Speaker::new("Rsr", Position3D::from_spherical(135.0, 0.0, 1.0), 7),
            ],
            has_lfe: true,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.speakers.iter().filter(|s| !s.is_lfe).count()
    }

    pub fn total_channels(&self) -> usize {
        self.speakers.len()
    }
}

impl Speaker {
    pub fn new(label: &str, position: Position3D, channel: usize) -> Self {
        Self {
            label: label.to_string(),
            position,
            channel,
            is_lfe: false,
        }
    }

    pub fn new_lfe(label: &str, channel: usize) -> Self {
        Self {
            label: label.to_string(),
            position: Position3D::origin(),
            channel,
            is_lfe: true,
        }
    }
}

/// A single voice's spatial snapshot for one render pass: enough to encode
/// or pan it without reaching back into the mixer's voice state.
#[derive(Debug, Clone)]
pub struct SpatialSource {
    pub id: u64,
    pub position: Position3D,
    pub gain: f32,
    pub audio: Vec<f32>,
}

/// Renders a set of [`SpatialSource`]s to an interleaved output buffer on a
/// fixed speaker layout. Implemented by [`binaural::BinauralRenderer`]; the
/// ambisonic path instead composes [`hoa::AmbisonicEncoder`] with
/// [`hoa::AmbisonicDecoder`] directly in the mixer's render loop.
pub trait SpatialRenderer: Send + Sync {
    fn render(
        &mut self,
        sources: &[SpatialSource],
        output: &mut [f32],
        output_channels: usize,
    ) -> SpatialResult<()>;

    fn output_layout(&self) -> &SpeakerLayout;

    fn set_listener_position(&mut self, position: Position3D, orientation: Orientation);

    fn latency_samples(&self) -> usize;

    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_layouts_report_expected_channel_counts() {
        let stereo = SpeakerLayout::stereo();
        assert_eq!(stereo.total_channels(), 2);
        assert!(!stereo.has_lfe);

        let surround = SpeakerLayout::surround_5_1();
        assert_eq!(surround.total_channels(), 6);
        assert!(surround.has_lfe);
    }
}
