//! `BufferItem`: the immutable, reference-counted sample store a `Voice`
//! reads from. Shared between the API thread that created it and the
//! mixer that plays it back; the mixer never mutates one once attached.

use std::sync::Arc;

use ao_core::ChannelLayout;

use crate::decoder::SampleFormat;

/// Raw encoded sample storage backing a `BufferItem`.
#[derive(Debug, Clone)]
pub enum BufferStorage {
    /// Owned byte-encoded samples in `format`, interleaved per channel.
    Bytes(Arc<[u8]>),
    /// Samples are pulled on demand from an application-supplied callback
    /// rather than stored up front.
    Callback(Arc<dyn SampleCallback>),
}

/// An application-supplied streaming source. `fill` writes up to
/// `dest.len()` bytes of encoded samples and returns the number of bytes
/// actually written; a short count marks end-of-stream, a negative
/// count-as-i32 marks an error.
pub trait SampleCallback: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> i32;
}

impl std::fmt::Debug for dyn SampleCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SampleCallback")
    }
}

/// Ambisonic metadata for a buffer whose `layout` is one of the `Ambi*`
/// variants: the channel ordering/normalization it was authored with, so
/// the voice can convert into the mixer's internal ACN/SN3D convention if
/// it differs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbisonicMeta {
    pub order: usize,
    /// Scaling applied to the W channel relative to SN3D, e.g. the
    /// sqrt(2) some authoring tools bake into FuMa-style content.
    pub w_scale: f32,
}

/// An immutable sample store a voice's buffer queue links to. Cheap to
/// clone — clones share the same underlying storage.
#[derive(Debug, Clone)]
pub struct BufferItem {
    storage: BufferStorage,
    format: SampleFormat,
    channels: usize,
    layout: ChannelLayout,
    sample_rate: u32,
    frame_count: Option<usize>,
    loop_start: Option<usize>,
    loop_end: Option<usize>,
    ambisonic: Option<AmbisonicMeta>,
}

impl BufferItem {
    /// A fully-decoded, fixed-length buffer backed by raw bytes.
    pub fn from_bytes(
        bytes: Arc<[u8]>,
        format: SampleFormat,
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Self {
        let channels = layout.channel_count();
        let frame_count = format.bytes_per_sample().map(|bps| {
            if channels == 0 { 0 } else { bytes.len() / (bps * channels) }
        });
        Self {
            storage: BufferStorage::Bytes(bytes),
            format,
            channels,
            layout,
            sample_rate,
            frame_count,
            loop_start: None,
            loop_end: None,
            ambisonic: None,
        }
    }

    /// An open-ended buffer that decodes on demand through `callback`.
    /// Frame count is unknown until the callback signals end-of-stream.
    pub fn from_callback(
        callback: Arc<dyn SampleCallback>,
        format: SampleFormat,
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Self {
        Self {
            storage: BufferStorage::Callback(callback),
            format,
            channels: layout.channel_count(),
            layout,
            sample_rate,
            frame_count: None,
            loop_start: None,
            loop_end: None,
            ambisonic: None,
        }
    }

    pub fn with_loop_points(mut self, start: usize, end: usize) -> Self {
        self.loop_start = Some(start);
        self.loop_end = Some(end);
        self
    }

    pub fn with_ambisonic_meta(mut self, meta: AmbisonicMeta) -> Self {
        self.ambisonic = Some(meta);
        self
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// `None` for a callback-backed buffer whose length isn't known yet.
    pub fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }

    pub fn loop_points(&self) -> Option<(usize, usize)> {
        match (self.loop_start, self.loop_end) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }

    pub fn ambisonic_meta(&self) -> Option<AmbisonicMeta> {
        self.ambisonic
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.storage, BufferStorage::Callback(_))
    }

    pub fn storage(&self) -> &BufferStorage {
        &self.storage
    }

    /// Byte slice view for a `Bytes`-backed item, or `None` for a callback
    /// source (the caller must pull through `SampleCallback::fill` instead).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.storage {
            BufferStorage::Bytes(b) => Some(b),
            BufferStorage::Callback(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_derives_from_byte_length_and_format() {
        let bytes: Arc<[u8]> = Arc::from(vec![0u8; 2 * 2 * 100]);
        let item = BufferItem::from_bytes(bytes, SampleFormat::I16, ChannelLayout::Stereo, 48_000);
        assert_eq!(item.frame_count(), Some(100));
    }

    #[test]
    fn callback_backed_item_has_no_known_length() {
        struct Zeros;
        impl SampleCallback for Zeros {
            fn fill(&self, dest: &mut [u8]) -> i32 {
                dest.fill(0);
                dest.len() as i32
            }
        }
        let item = BufferItem::from_callback(Arc::new(Zeros), SampleFormat::F32, ChannelLayout::Mono, 48_000);
        assert_eq!(item.frame_count(), None);
        assert!(item.is_streaming());
    }

    #[test]
    fn loop_points_round_trip() {
        let bytes: Arc<[u8]> = Arc::from(vec![0u8; 4 * 10]);
        let item = BufferItem::from_bytes(bytes, SampleFormat::F32, ChannelLayout::Mono, 48_000)
            .with_loop_points(2, 8);
        assert_eq!(item.loop_points(), Some((2, 8)));
    }
}
