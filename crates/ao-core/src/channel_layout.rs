//! Channel layouts a buffer or device output bus may carry.

use serde::{Deserialize, Serialize};

/// Speaker/ambisonic channel layout of a buffer or device bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Quad,
    X51,
    X61,
    X71,
    /// First-order ambisonics, ACN/SN3D, 4 channels.
    Ambi1,
    /// Second-order ambisonics, 9 channels.
    Ambi2,
    /// Third-order ambisonics, 16 channels.
    Ambi3,
}

impl ChannelLayout {
    /// Number of discrete channels this layout carries.
    pub fn channel_count(self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
            ChannelLayout::Quad => 4,
            ChannelLayout::X51 => 6,
            ChannelLayout::X61 => 7,
            ChannelLayout::X71 => 8,
            ChannelLayout::Ambi1 => 4,
            ChannelLayout::Ambi2 => 9,
            ChannelLayout::Ambi3 => 16,
        }
    }

    /// Ambisonic order, or `None` for a discrete speaker layout.
    pub fn ambi_order(self) -> Option<usize> {
        match self {
            ChannelLayout::Ambi1 => Some(1),
            ChannelLayout::Ambi2 => Some(2),
            ChannelLayout::Ambi3 => Some(3),
            _ => None,
        }
    }

    pub fn is_ambisonic(self) -> bool {
        self.ambi_order().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_counts_match_layout() {
        assert_eq!(ChannelLayout::Stereo.channel_count(), 2);
        assert_eq!(ChannelLayout::X71.channel_count(), 8);
        assert_eq!(ChannelLayout::Ambi3.channel_count(), 16);
    }

    #[test]
    fn only_ambi_layouts_report_an_order() {
        assert_eq!(ChannelLayout::Ambi2.ambi_order(), Some(2));
        assert_eq!(ChannelLayout::X51.ambi_order(), None);
    }
}
