//! `Device`: owns the shared ambisonic dry mix, the post-processor that
//! decodes it to real output (speakers, HRTF binaural, or straight
//! ambisonic passthrough), the limiter, dither and the final sample
//! conversion/interleave into backend bytes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ao_core::{BUFFER_LINE_SIZE, ChannelBuffer, Sample};
use ao_dsp::MonoProcessor;
use ao_dsp::biquad::BiquadTDF2;
use ao_dsp::dynamics::Limiter;
use ao_spatial::SpeakerLayout;
use ao_spatial::binaural::{BinauralConfig, BinauralRenderer};
use ao_spatial::hoa::{AmbisonicDecoder, AmbisonicOrder};

use crate::context::Context;

/// Speed of sound used by the distance-compensation delay, in meters per
/// second. Independent of any listener's `speed_of_sound` (which feeds
/// doppler/reverb instead) since this models the physical speaker rig, not
/// a simulated environment.
const DISTANCE_COMP_SPEED_OF_SOUND: f32 = 343.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    AmbiDec,
    Hrtf,
    /// BS2B-style headphone crossfeed: decodes to a fixed stereo pair, then
    /// bleeds a lowpassed, delayed copy of each side into the other.
    Bs2b,
    /// Decodes to the full speaker layout like `AmbiDec`, then reinforces
    /// the front-correlated (phantom center) content through a real center
    /// channel, or subtly back into L/R when there isn't one.
    Stablizer,
    /// Ambisonic channels copied straight through; used when the output
    /// bus itself is ambisonic (e.g. feeding another process).
    Passthrough,
}

/// A plain ring-buffer delay line with no feedback or dry/wet mix — just
/// `samples` of latency. Backs both the BS2B crossfeed tap and the
/// per-channel distance-compensation lines.
#[derive(Debug, Clone)]
struct FixedDelay {
    buffer: Vec<Sample>,
    pos: usize,
}

impl FixedDelay {
    fn new(samples: usize) -> Self {
        Self { buffer: vec![0.0; samples.max(1)], pos: 0 }
    }

    #[inline]
    fn process(&mut self, input: Sample) -> Sample {
        let out = self.buffer[self.pos];
        self.buffer[self.pos] = input;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }
}

/// Headphone crossfeed: each ear gets a lowpassed, ~0.3ms-delayed bleed of
/// the opposite channel, approximating the inter-aural crosstalk a pair of
/// speakers would naturally provide and that headphones don't.
#[derive(Debug, Clone)]
struct Bs2bCrossfeed {
    lowpass_l: BiquadTDF2,
    lowpass_r: BiquadTDF2,
    delay_l: FixedDelay,
    delay_r: FixedDelay,
    feed: f32,
}

impl Bs2bCrossfeed {
    fn new(sample_rate: f32) -> Self {
        let mut lowpass_l = BiquadTDF2::new(sample_rate);
        let mut lowpass_r = BiquadTDF2::new(sample_rate);
        lowpass_l.set_lowpass(700.0, 0.707);
        lowpass_r.set_lowpass(700.0, 0.707);
        let delay_samples = ((0.0003 * sample_rate as f64).round() as usize).max(1);
        Self {
            lowpass_l,
            lowpass_r,
            delay_l: FixedDelay::new(delay_samples),
            delay_r: FixedDelay::new(delay_samples),
            feed: 0.333,
        }
    }

    #[inline]
    fn process(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let cross_to_l = self.delay_r.process(self.lowpass_r.process_sample(right)) * self.feed;
        let cross_to_r = self.delay_l.process(self.lowpass_l.process_sample(left)) * self.feed;
        (left * (1.0 - self.feed) + cross_to_l, right * (1.0 - self.feed) + cross_to_r)
    }
}

/// Reinforces the front L/R-correlated (phantom center) content: a
/// lowpassed, phase-aligned sum of L and R is routed to a real center
/// channel when the layout has one, cutting the comb-filtering a purely
/// phantom center image suffers from off-axis.
#[derive(Debug, Clone)]
struct FrontStabilizer {
    lowpass: BiquadTDF2,
    delay: FixedDelay,
    left_idx: usize,
    right_idx: usize,
    center_idx: Option<usize>,
}

impl FrontStabilizer {
    fn new(sample_rate: f32, layout: &SpeakerLayout) -> Option<Self> {
        let left_idx = layout.speakers.iter().position(|s| s.label == "L")?;
        let right_idx = layout.speakers.iter().position(|s| s.label == "R")?;
        let center_idx = layout.speakers.iter().position(|s| s.label == "C");
        let mut lowpass = BiquadTDF2::new(sample_rate);
        lowpass.set_lowpass(5_000.0, 0.707);
        let delay_samples = ((0.0005 * sample_rate as f64).round() as usize).max(1);
        Some(Self { lowpass, delay: FixedDelay::new(delay_samples), left_idx, right_idx, center_idx })
    }

    fn apply(&mut self, real_out: &mut ChannelBuffer, block: usize) {
        let channels = real_out.channels();
        if self.left_idx >= channels || self.right_idx >= channels {
            return;
        }
        for frame in 0..block {
            let l = real_out.channel(self.left_idx)[frame];
            let r = real_out.channel(self.right_idx)[frame];
            let correlated = self.lowpass.process_sample((l + r) * 0.5);
            let aligned = self.delay.process(correlated);
            match self.center_idx.filter(|&c| c < channels) {
                Some(c) => real_out.channel_mut(c)[frame] += aligned * 0.5,
                None => {
                    real_out.channel_mut(self.left_idx)[frame] += aligned * 0.15;
                    real_out.channel_mut(self.right_idx)[frame] += aligned * 0.15;
                }
            }
        }
    }
}

/// Per-output-channel delay compensating for speakers sitting at different
/// physical distances from the listener, so wavefronts from a layout with
/// uneven speaker placement still arrive together.
#[derive(Debug, Clone)]
struct DistanceComp {
    lines: Vec<FixedDelay>,
}

impl DistanceComp {
    fn new(sample_rate: f32, layout: &SpeakerLayout) -> Self {
        let max_dist = layout.speakers.iter().map(|s| s.position.magnitude()).fold(0.0f32, f32::max);
        let lines = layout
            .speakers
            .iter()
            .map(|s| {
                let lag_meters = (max_dist - s.position.magnitude()).max(0.0);
                let samples = ((lag_meters / DISTANCE_COMP_SPEED_OF_SOUND) * sample_rate).round() as usize;
                FixedDelay::new(samples.max(1))
            })
            .collect();
        Self { lines }
    }

    fn apply(&mut self, real_out: &mut ChannelBuffer, block: usize) {
        for (ch, line) in self.lines.iter_mut().enumerate() {
            if ch >= real_out.channels() {
                break;
            }
            for s in real_out.channel_mut(ch).iter_mut().take(block) {
                *s = line.process(*s);
            }
        }
    }
}

pub struct DeviceConfig {
    pub sample_rate: u32,
    pub speaker_layout: SpeakerLayout,
    pub post_process: PostProcess,
    pub dry_ambi_order: usize,
    pub limiter_enabled: bool,
    pub dither_depth: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            speaker_layout: SpeakerLayout::stereo(),
            post_process: PostProcess::Hrtf,
            dry_ambi_order: 1,
            limiter_enabled: true,
            dither_depth: 0,
        }
    }
}

pub struct Device {
    sample_rate: u32,
    dry_ambi_order: usize,
    dry: ChannelBuffer,
    real_out: ChannelBuffer,
    post_process: PostProcess,
    decoder: Option<AmbisonicDecoder>,
    stereo_decoder: Option<AmbisonicDecoder>,
    binaural: Option<BinauralRenderer>,
    bs2b: Option<Bs2bCrossfeed>,
    stabilizer: Option<FrontStabilizer>,
    distance_comp: Option<DistanceComp>,
    limiter: Option<Limiter>,
    dither_depth: u32,
    dither_state: u32,

    contexts: Vec<Context>,
    connected: AtomicBool,
    mix_lock: AtomicU64,
    samples_done: u64,
    clock_base_sec: f64,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Self {
        let ambi_channels = (config.dry_ambi_order + 1) * (config.dry_ambi_order + 1);
        let order = AmbisonicOrder::from_order(config.dry_ambi_order.max(1)).unwrap_or(AmbisonicOrder::First);

        let decoder = matches!(config.post_process, PostProcess::AmbiDec | PostProcess::Stablizer)
            .then(|| AmbisonicDecoder::new(order, config.speaker_layout.clone()).ok())
            .flatten();
        let stereo_decoder = matches!(config.post_process, PostProcess::Bs2b)
            .then(|| AmbisonicDecoder::new(order, SpeakerLayout::stereo()).ok())
            .flatten();
        let binaural = matches!(config.post_process, PostProcess::Hrtf).then(|| {
            BinauralRenderer::new(BinauralConfig::default(), config.sample_rate)
        });
        let bs2b = matches!(config.post_process, PostProcess::Bs2b)
            .then(|| Bs2bCrossfeed::new(config.sample_rate as f32));
        let stabilizer = matches!(config.post_process, PostProcess::Stablizer)
            .then(|| FrontStabilizer::new(config.sample_rate as f32, &config.speaker_layout))
            .flatten();
        let distance_comp = matches!(config.post_process, PostProcess::AmbiDec | PostProcess::Stablizer)
            .then(|| DistanceComp::new(config.sample_rate as f32, &config.speaker_layout));

        let real_channels = match config.post_process {
            PostProcess::AmbiDec | PostProcess::Stablizer => config.speaker_layout.speakers.len(),
            PostProcess::Hrtf | PostProcess::Bs2b => 2,
            PostProcess::Passthrough => ambi_channels,
        };

        Self {
            sample_rate: config.sample_rate,
            dry_ambi_order: config.dry_ambi_order,
            dry: ChannelBuffer::new(ambi_channels, BUFFER_LINE_SIZE),
            real_out: ChannelBuffer::new(real_channels.max(1), BUFFER_LINE_SIZE),
            post_process: config.post_process,
            decoder,
            stereo_decoder,
            binaural,
            bs2b,
            stabilizer,
            distance_comp,
            limiter: config.limiter_enabled.then(|| Limiter::new(config.sample_rate as f32)),
            dither_depth: config.dither_depth,
            dither_state: 0x2545_f491,
            contexts: Vec::new(),
            connected: AtomicBool::new(true),
            mix_lock: AtomicU64::new(0),
            samples_done: 0,
            clock_base_sec: 0.0,
        }
    }

    pub fn add_context(&mut self, context: Context) -> usize {
        self.contexts.push(context);
        self.contexts.len() - 1
    }

    pub fn context(&mut self, idx: usize) -> &mut Context {
        &mut self.contexts[idx]
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Marks the device disconnected and, for every context that opted
    /// in, resets its voices to Stopped. Further render calls keep
    /// producing silence rather than erroring.
    pub fn do_disconnect(&mut self, message: &str, stop_voices: bool) {
        self.connected.store(false, Ordering::Release);
        for ctx in &mut self.contexts {
            ctx.notify_disconnect(message, stop_voices);
        }
    }

    fn next_xorshift(&mut self) -> f32 {
        next_xorshift(&mut self.dither_state)
    }

    fn apply_dither(&mut self) {
        if self.dither_depth == 0 {
            return;
        }
        let scale = 1.0 / (1u64 << self.dither_depth.min(23)) as f32;
        let channels = self.real_out.channels();
        let frames = self.real_out.frames();
        for ch in 0..channels {
            let buf = self.real_out.channel_mut(ch);
            for s in buf.iter_mut().take(frames) {
                let tpdf = next_xorshift(&mut self.dither_state) + next_xorshift(&mut self.dither_state);
                *s += tpdf * scale;
            }
        }
    }

    /// Runs one block: zero the shared dry mix, process every context,
    /// post-process into `real_out`, limit and dither. Returns the number
    /// of frames actually produced (always `block` unless disconnected).
    pub fn render_block(&mut self, block: usize, device_time: f64) -> usize {
        if !self.is_connected() {
            self.real_out.clear();
            return block;
        }

        self.mix_lock.fetch_add(1, Ordering::AcqRel);

        self.dry.clear();
        for ctx in &mut self.contexts {
            ctx.process(&mut self.dry, block, device_time, self.sample_rate as f32);
        }

        self.post_process(block);

        if let Some(limiter) = &mut self.limiter {
            for ch in 0..self.real_out.channels() {
                let buf = self.real_out.channel_mut(ch);
                for s in buf.iter_mut().take(block) {
                    *s = limiter.process_sample(*s);
                }
            }
        }

        if let Some(comp) = &mut self.distance_comp {
            comp.apply(&mut self.real_out, block);
        }

        self.apply_dither();

        self.mix_lock.fetch_add(1, Ordering::AcqRel);

        self.samples_done += block as u64;
        self.clock_base_sec += (self.samples_done / self.sample_rate as u64) as f64;
        self.samples_done %= self.sample_rate as u64;

        block
    }

    fn post_process(&mut self, block: usize) {
        let ambi: Vec<Vec<f32>> = (0..self.dry.channels()).map(|ch| self.dry.channel(ch)[..block].to_vec()).collect();
        match self.post_process {
            PostProcess::Passthrough => {
                for ch in 0..self.dry.channels().min(self.real_out.channels()) {
                    self.real_out.channel_mut(ch)[..block].copy_from_slice(&ambi[ch][..block]);
                }
            }
            PostProcess::AmbiDec => {
                if let Some(decoder) = &self.decoder {
                    if let Ok(speakers) = decoder.decode(&ambi) {
                        for (ch, samples) in speakers.iter().enumerate() {
                            if let Some(dst) = (ch < self.real_out.channels()).then(|| self.real_out.channel_mut(ch)) {
                                let n = samples.len().min(block);
                                dst[..n].copy_from_slice(&samples[..n]);
                            }
                        }
                    }
                }
            }
            PostProcess::Hrtf => {
                if let Some(binaural) = &mut self.binaural {
                    let mut left = vec![0.0; block];
                    let mut right = vec![0.0; block];
                    if binaural.render_ambisonic(&ambi, &mut left, &mut right).is_ok() {
                        self.real_out.channel_mut(0)[..block].copy_from_slice(&left);
                        if self.real_out.channels() > 1 {
                            self.real_out.channel_mut(1)[..block].copy_from_slice(&right);
                        }
                    }
                }
            }
            PostProcess::Bs2b => {
                if let Some(decoder) = &self.stereo_decoder {
                    if let Ok(speakers) = decoder.decode(&ambi) {
                        let mut left = speakers.first().cloned().unwrap_or_default();
                        let mut right = speakers.get(1).cloned().unwrap_or_default();
                        left.resize(block, 0.0);
                        right.resize(block, 0.0);
                        if let Some(crossfeed) = &mut self.bs2b {
                            for i in 0..block {
                                let (l, r) = crossfeed.process(left[i], right[i]);
                                left[i] = l;
                                right[i] = r;
                            }
                        }
                        self.real_out.channel_mut(0)[..block].copy_from_slice(&left[..block]);
                        if self.real_out.channels() > 1 {
                            self.real_out.channel_mut(1)[..block].copy_from_slice(&right[..block]);
                        }
                    }
                }
            }
            PostProcess::Stablizer => {
                if let Some(decoder) = &self.decoder {
                    if let Ok(speakers) = decoder.decode(&ambi) {
                        for (ch, samples) in speakers.iter().enumerate() {
                            if let Some(dst) = (ch < self.real_out.channels()).then(|| self.real_out.channel_mut(ch)) {
                                let n = samples.len().min(block);
                                dst[..n].copy_from_slice(&samples[..n]);
                            }
                        }
                    }
                }
                if let Some(stabilizer) = &mut self.stabilizer {
                    stabilizer.apply(&mut self.real_out, block);
                }
            }
        }
    }

    /// Converts `real_out`'s first `block` frames into interleaved device
    /// bytes per spec's bit-exact rules; `frame_step` may exceed the real
    /// channel count, in which case the extra interleaved slots are zeroed.
    pub fn interleave(&self, block: usize, frame_step: usize, out: &mut [u8], out_format: ao_core::SampleFormat) {
        let channels = self.real_out.channels();
        let bps = out_format.bytes_per_sample().unwrap_or(4);
        for frame in 0..block {
            for slot in 0..frame_step {
                let sample = if slot < channels { self.real_out.channel(slot)[frame] } else { 0.0 };
                write_sample(out_format, sample, out, (frame * frame_step + slot) * bps);
            }
        }
    }
}

fn next_xorshift(state: &mut u32) -> f32 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    (x as f32 / u32::MAX as f32) - 0.5
}

/// Bit-exact per spec §6: unsigned formats are midpoint-biased, i32 scales
/// by 2147483648 but clamps its positive side to 2147483520 to compensate
/// for f32's 24-bit mantissa, float passes straight through.
#[inline]
fn write_sample(format: ao_core::SampleFormat, sample: f32, out: &mut [u8], offset: usize) {
    use ao_core::{sample_to_i16, sample_to_u8};
    match format {
        ao_core::SampleFormat::U8 => out[offset] = sample_to_u8(sample),
        ao_core::SampleFormat::I16 => {
            let bytes = sample_to_i16(sample).to_le_bytes();
            out[offset..offset + 2].copy_from_slice(&bytes);
        }
        ao_core::SampleFormat::I32 => {
            let clamped = sample.clamp(-1.0, 2_147_483_520.0 / 2_147_483_648.0);
            let bytes = ((clamped * 2_147_483_648.0) as i32).to_le_bytes();
            out[offset..offset + 4].copy_from_slice(&bytes);
        }
        ao_core::SampleFormat::F32 => {
            let bytes = sample.clamp(-1.0, 1.0).to_le_bytes();
            out[offset..offset + 4].copy_from_slice(&bytes);
        }
        ao_core::SampleFormat::F64 => {
            let bytes = (sample.clamp(-1.0, 1.0) as f64).to_le_bytes();
            out[offset..offset + 8].copy_from_slice(&bytes);
        }
        // mu-law/A-law/ADPCM output encoding isn't exercised by any
        // current caller; left unimplemented rather than guessed at.
        ao_core::SampleFormat::MuLaw | ao_core::SampleFormat::ALaw | ao_core::SampleFormat::Ima4Adpcm | ao_core::SampleFormat::MsAdpcm => {
            out[offset] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_device_renders_silence() {
        let mut device = Device::new(DeviceConfig::default());
        device.do_disconnect("device lost", false);
        device.render_block(64, 0.0);
        assert!(device.real_out.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn a_fresh_device_with_no_contexts_renders_silence() {
        let mut device = Device::new(DeviceConfig::default());
        device.render_block(64, 0.0);
        assert!(device.real_out.channel(0)[..64].iter().all(|&s| s.abs() < 1e-6));
    }
}
