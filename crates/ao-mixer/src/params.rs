//! Per-voice parameter calculation: turns listener + source + environment
//! state into resample step, pan gains and filter cutoffs for one mix
//! cycle. Grounded on the twelve-step pipeline: distance model, cone,
//! gain clamp, air absorption, reverb decay, doppler, pitch-to-step,
//! spread, panning, and direct/send filter cutoffs.

use ao_core::{GAIN_MIX_MAX, MAX_NUM_SENDS, MIXER_FRAC_ONE};
use ao_dsp::biquad::BiquadCoeffs;
use ao_spatial::Position3D;

use crate::resampler::ResamplerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceModel {
    Inverse { clamped: bool },
    Linear { clamped: bool },
    Exponent { clamped: bool },
    Disable,
}

#[derive(Debug, Clone, Copy)]
pub struct ListenerParams {
    pub position: Position3D,
    pub velocity: Position3D,
    pub gain: f32,
    pub speed_of_sound: f32,
    pub doppler_factor: f32,
    pub distance_model: DistanceModel,
    pub meters_per_unit: f32,
    pub air_absorption_gain_hf: f32,
}

impl Default for ListenerParams {
    fn default() -> Self {
        Self {
            position: Position3D::origin(),
            velocity: Position3D::origin(),
            gain: 1.0,
            speed_of_sound: 343.3,
            doppler_factor: 1.0,
            distance_model: DistanceModel::Inverse { clamped: true },
            meters_per_unit: 1.0,
            air_absorption_gain_hf: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuxSendParams {
    pub slot_index: Option<usize>,
    pub gain: f32,
    pub gain_hf: f32,
    pub room_rolloff: f32,
    pub gain_auto: bool,
    pub gain_hf_auto: bool,
    /// Reverb `DecayTime` in seconds and the slot's air-absorption-HF gain,
    /// needed for steps 6-7; `None` when the target slot has no reverb decay.
    pub decay: Option<(f32, f32)>,
}

impl Default for AuxSendParams {
    fn default() -> Self {
        Self {
            slot_index: None,
            gain: 1.0,
            gain_hf: 1.0,
            room_rolloff: 0.0,
            gain_auto: true,
            gain_hf_auto: true,
            decay: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SourceParams {
    pub position: Position3D,
    pub velocity: Position3D,
    pub direction: Option<Position3D>,
    pub head_relative: bool,
    pub direct_channels: bool,

    pub gain: f32,
    pub min_gain: f32,
    pub max_gain: f32,
    pub direct_gain: f32,
    pub direct_gain_hf: f32,

    pub reference_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,

    pub inner_angle_deg: f32,
    pub outer_angle_deg: f32,
    pub outer_gain: f32,
    pub outer_gain_hf: f32,
    pub dry_gain_hf_auto: bool,

    pub radius: f32,

    pub air_absorption_factor: f32,

    pub pitch: f32,
    pub source_rate: f32,

    pub direct_hf_reference: f32,
    pub direct_lf_reference: f32,
}

impl Default for SourceParams {
    fn default() -> Self {
        Self {
            position: Position3D::origin(),
            velocity: Position3D::origin(),
            direction: None,
            head_relative: false,
            direct_channels: false,
            gain: 1.0,
            min_gain: 0.0,
            max_gain: 1.0,
            direct_gain: 1.0,
            direct_gain_hf: 1.0,
            reference_distance: 1.0,
            max_distance: f32::MAX,
            rolloff_factor: 1.0,
            inner_angle_deg: 360.0,
            outer_angle_deg: 360.0,
            outer_gain: 0.0,
            outer_gain_hf: 1.0,
            dry_gain_hf_auto: true,
            radius: 0.0,
            air_absorption_factor: 0.0,
            pitch: 1.0,
            source_rate: 48_000.0,
            direct_hf_reference: 13_500.0,
            direct_lf_reference: 400.0,
        }
    }
}

/// Output of `calc_voice_params`: everything the mix routine needs for one
/// cycle that doesn't come straight from buffer data.
#[derive(Debug, Clone)]
pub struct VoiceParams {
    pub step: u32,
    pub resampler: ResamplerKind,
    pub distance: f32,
    pub spread: f32,
    pub dry_gain: f32,
    pub dry_gain_hf: f32,
    pub dry_gain_lf: f32,
    pub ambi_gains: Vec<f32>,
    pub sends: Vec<SendGain>,
    pub direct_filter: (BiquadCoeffs, BiquadCoeffs),
}

#[derive(Debug, Clone, Copy)]
pub struct SendGain {
    pub slot_index: usize,
    pub gain: f32,
    pub gain_hf: f32,
}

const MAX_PITCH: f32 = 10.0;
/// Linear gain a reverb send decays by per `DecayTime`-derived meter of
/// travel, i.e. -60dB: the reverb tail is considered inaudible past one
/// decay distance.
const REVERB_DECAY_GAIN: f32 = 0.001;

fn distance_gain(model: DistanceModel, distance: f32, reference: f32, max: f32, rolloff: f32) -> f32 {
    match model {
        DistanceModel::Disable => 1.0,
        DistanceModel::Inverse { clamped } => {
            let d = if clamped { distance.clamp(reference, max) } else { distance };
            reference / (reference + rolloff * (d - reference)).max(1e-6)
        }
        DistanceModel::Linear { clamped } => {
            let d = if clamped { distance.clamp(reference, max) } else { distance };
            let denom = (max - reference).max(1e-6);
            1.0 - rolloff * (d - reference) / denom
        }
        DistanceModel::Exponent { clamped } => {
            let d = if clamped { distance.clamp(reference, max) } else { distance };
            if reference <= 0.0 { 1.0 } else { (d / reference).powf(-rolloff) }
        }
    }
    .max(0.0)
}

/// Step 11 (ambisonic path): first-order-and-up spherical-harmonic gains
/// for a point at `to_source`, scaled by `spread` coverage so a fully
/// enveloping source (spread = 2π) loses its directional component.
fn ambi_gains(order: usize, to_source: Position3D, spread: f32) -> Vec<f32> {
    use ao_spatial::hoa::{AmbisonicOrder, SphericalHarmonics};

    let ord = AmbisonicOrder::from_order(order).unwrap_or(AmbisonicOrder::from_order(1).expect("order 1 is always valid"));
    let dir = to_source.normalize();
    let spherical = dir.to_spherical();
    let sh = SphericalHarmonics::from_direction(spherical.azimuth, spherical.elevation, ord);

    let coverage = (std::f32::consts::FRAC_PI_2 / std::f32::consts::PI * spread / 2.0).clamp(0.0, 1.0);
    let directional = 1.0 - coverage;

    (0..ord.channel_count())
        .map(|ch| if ch == 0 { sh.get(ch) } else { sh.get(ch) * directional })
        .collect()
}

/// Implements spec.md's twelve-step per-voice parameter pipeline. Panning
/// always goes through the ambisonic encode path (step 11's "ambisonic
/// source buffers" branch): the device's dry mix is itself a set of
/// ambisonic channels, so fixed-speaker and HRTF targets are reached by
/// decoding that common intermediate downstream rather than by a second,
/// speaker-specific gain table here.
pub fn calc_voice_params(
    listener: &ListenerParams,
    source: &SourceParams,
    ctx_gain: f32,
    device_rate: f32,
    dry_ambi_order: usize,
    sends: &[AuxSendParams],
) -> VoiceParams {
    // (2) distance vector
    let to_source = if source.head_relative {
        source.position
    } else {
        Position3D::new(
            source.position.x - listener.position.x,
            source.position.y - listener.position.y,
            source.position.z - listener.position.z,
        )
    };
    let distance = to_source.magnitude();

    // (3) distance model -> base dry attenuation
    let dry_attn_base = distance_gain(
        listener.distance_model,
        distance,
        source.reference_distance,
        source.max_distance,
        source.rolloff_factor,
    );

    // (4) directional cone
    let mut cone_gain = 1.0f32;
    let mut cone_gain_hf = 1.0f32;
    if let Some(dir) = source.direction {
        let dir = dir.normalize();
        let to_listener = Position3D::new(-to_source.x, -to_source.y, -to_source.z).normalize();
        let cos_angle = (dir.x * to_listener.x + dir.y * to_listener.y + dir.z * to_listener.z).clamp(-1.0, 1.0);
        let angle = cos_angle.acos().to_degrees() * 2.0;
        let inner = source.inner_angle_deg.min(360.0);
        let outer = source.outer_angle_deg.max(inner);
        let t = if outer > inner { ((angle - inner) / (outer - inner)).clamp(0.0, 1.0) } else { 0.0 };
        cone_gain = 1.0 + t * (source.outer_gain - 1.0);
        cone_gain_hf = 1.0 + t * (source.outer_gain_hf - 1.0);
    }
    if !source.dry_gain_hf_auto {
        cone_gain_hf = 1.0;
    }

    // (5) gain clamp
    let mut dry_gain = (dry_attn_base * cone_gain * source.gain).clamp(source.min_gain, source.max_gain);
    dry_gain = (dry_gain * source.direct_gain * ctx_gain * listener.gain).min(GAIN_MIX_MAX);
    let mut dry_gain_hf = cone_gain_hf * source.direct_gain_hf;

    // (6) air absorption
    let absorb_exponent = (distance - source.reference_distance).max(0.0)
        * source.rolloff_factor
        * listener.meters_per_unit
        * source.air_absorption_factor;
    dry_gain_hf *= listener.air_absorption_gain_hf.powf(absorb_exponent);
    let dry_gain_lf: f32 = 1.0;

    // sends: distance model per-send rolloff, then (7) reverb decay
    let mut send_gains = Vec::with_capacity(sends.len().min(MAX_NUM_SENDS));
    for (i, send) in sends.iter().enumerate().take(MAX_NUM_SENDS) {
        let Some(slot_index) = send.slot_index else { continue };
        let send_rolloff = source.rolloff_factor + send.room_rolloff;
        let send_attn_base = distance_gain(
            listener.distance_model,
            distance,
            source.reference_distance,
            source.max_distance,
            send_rolloff,
        );
        let mut wet_gain = if send.gain_auto {
            (send_attn_base * cone_gain * source.gain).clamp(source.min_gain, source.max_gain) * send.gain
        } else {
            send.gain
        };
        let mut wet_gain_hf = if send.gain_hf_auto { cone_gain_hf * send.gain_hf } else { send.gain_hf };
        wet_gain_hf *= send.gain_hf.powf(absorb_exponent).max(0.0);

        if let Some((decay_time, decay_hf)) = send.decay {
            let decay_distance = decay_time * listener.speed_of_sound;
            if decay_distance > 0.0 {
                let exponent = listener.meters_per_unit * distance / decay_distance;
                let decay_gain = REVERB_DECAY_GAIN.powf(exponent);
                wet_gain = wet_gain * decay_gain * (1.0 - dry_attn_base) + dry_attn_base;
                wet_gain_hf *= decay_hf.powf(exponent);
            }
        }

        send_gains.push(SendGain { slot_index, gain: wet_gain.min(GAIN_MIX_MAX), gain_hf: wet_gain_hf });
        let _ = i;
    }

    // (8) doppler
    let vss = (source.velocity.x * to_source.x + source.velocity.y * to_source.y + source.velocity.z * to_source.z)
        / distance.max(1e-6)
        * -listener.doppler_factor;
    let vls = (listener.velocity.x * to_source.x + listener.velocity.y * to_source.y + listener.velocity.z * to_source.z)
        / distance.max(1e-6)
        * -listener.doppler_factor;
    let c = listener.speed_of_sound;
    let mut pitch = source.pitch;
    if vls >= c {
        pitch = 0.0;
    } else if vss >= c {
        pitch = f32::INFINITY;
    } else {
        pitch *= (c - vls) / (c - vss);
    }

    // (9) pitch -> fixed-point step. A zero pitch (the vls >= c doppler
    // case above) must be allowed to floor the step below 1 rather than
    // being clamped back up, so the voice's mStep<1 early-stop actually
    // fires instead of mixing a source the doppler math says is silent.
    let step_f = if pitch <= 0.0 { 0.0 } else { (pitch * source.source_rate / device_rate).clamp(1.0 / MAX_PITCH, MAX_PITCH) };
    let step = (step_f * MIXER_FRAC_ONE as f32) as u32;
    let resampler = ResamplerKind::Linear.resolve(step);

    // (10) spread
    let spread = if source.radius > distance {
        std::f32::consts::TAU - distance / source.radius.max(1e-6) * std::f32::consts::PI
    } else if distance > 0.0 {
        2.0 * (source.radius / distance).clamp(-1.0, 1.0).asin()
    } else {
        0.0
    };

    // (11) panning via the ambisonic intermediate
    let gains = ambi_gains(dry_ambi_order, to_source, spread);

    // (12) direct + send filter cutoffs (RBJ high-shelf/low-shelf pair)
    let hf_norm = (source.direct_hf_reference / device_rate).clamp(0.0, 0.5);
    let lf_norm = (source.direct_lf_reference / device_rate).clamp(0.0, 0.5);
    let high_shelf = BiquadCoeffs::high_shelf(device_rate, hf_norm * device_rate, 0.707, 20.0 * dry_gain_hf.max(1e-5).log10());
    let low_shelf = BiquadCoeffs::low_shelf(device_rate, lf_norm * device_rate, 0.707, 20.0 * dry_gain_lf.max(1e-5).log10());

    VoiceParams {
        step,
        resampler,
        distance,
        spread,
        dry_gain,
        dry_gain_hf,
        dry_gain_lf,
        ambi_gains: gains,
        sends: send_gains,
        direct_filter: (low_shelf, high_shelf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closer_source_attenuates_less_under_inverse_model() {
        let near = distance_gain(DistanceModel::Inverse { clamped: true }, 2.0, 1.0, 100.0, 1.0);
        let far = distance_gain(DistanceModel::Inverse { clamped: true }, 50.0, 1.0, 100.0, 1.0);
        assert!(near > far);
    }

    #[test]
    fn disabled_model_ignores_distance() {
        assert_eq!(distance_gain(DistanceModel::Disable, 500.0, 1.0, 100.0, 1.0), 1.0);
    }

    #[test]
    fn voice_params_produce_a_usable_step_and_gain_vector() {
        let listener = ListenerParams::default();
        let mut source = SourceParams::default();
        source.position = Position3D::new(0.0, 5.0, 0.0);
        let params = calc_voice_params(&listener, &source, 1.0, 48_000.0, 1, &[]);
        assert!(params.step >= 1);
        assert_eq!(params.ambi_gains.len(), 4);
        assert!(params.dry_gain > 0.0 && params.dry_gain <= ao_core::GAIN_MIX_MAX);
    }
}
