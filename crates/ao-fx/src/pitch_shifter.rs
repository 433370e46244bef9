//! Pitch shifter: two read pointers into a circular record buffer, each
//! advancing at the target playback rate and crossfaded by a triangular
//! window offset by half a grain so one is always fading in as the other
//! fades out. Classic granular/overlap-add pitch shifting without a
//! phase vocoder.

use ao_core::{ChannelBuffer, Sample};

use crate::{EffectProps, EffectState, TargetGains, pan_stereo_into};

const GRAIN_MS: f32 = 40.0;

#[derive(Debug, Clone)]
pub struct PitchShifterProps {
    /// Shift in semitones, -12 .. +12 in the EFX range.
    pub semitones: f32,
}

impl Default for PitchShifterProps {
    fn default() -> Self {
        Self { semitones: 0.0 }
    }
}

struct Grain {
    read_pos: f32,
}

fn read_interpolated(buffer: &[Sample], pos: f32) -> Sample {
    let len = buffer.len();
    let p0 = pos.floor() as isize;
    let frac = pos - p0 as f32;
    let idx0 = p0.rem_euclid(len as isize) as usize;
    let idx1 = (p0 + 1).rem_euclid(len as isize) as usize;
    buffer[idx0] * (1.0 - frac) + buffer[idx1] * frac
}

pub struct PitchShifterEffect {
    sample_rate: f32,
    buffer: Vec<Sample>,
    write_pos: usize,
    grain_len: f32,
    grains: [Grain; 2],
    grain_phase: f32,
    playback_rate: f32,
    gains: TargetGains,
    scratch_l: Vec<Sample>,
    scratch_r: Vec<Sample>,
}

impl PitchShifterEffect {
    pub fn new(sample_rate: f32) -> Self {
        let grain_len = GRAIN_MS * 0.001 * sample_rate;
        let buffer_len = (grain_len * 4.0).ceil() as usize + 4;
        Self {
            sample_rate,
            buffer: vec![0.0; buffer_len],
            write_pos: 0,
            grain_len,
            grains: [Grain { read_pos: 0.0 }, Grain { read_pos: grain_len / 2.0 }],
            grain_phase: 0.0,
            playback_rate: 1.0,
            gains: TargetGains::silence(2),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }

    fn read_interpolated(&self, pos: f32) -> Sample {
        read_interpolated(&self.buffer, pos)
    }

    fn process_one(&mut self, input: Sample) -> Sample {
        self.buffer[self.write_pos] = input;

        let half_grain = self.grain_len / 2.0;
        let mut out = 0.0;
        for grain in &mut self.grains {
            let distance = (self.write_pos as f32 - grain.read_pos).rem_euclid(self.buffer.len() as f32);
            let window = if distance < self.grain_len {
                0.5 - 0.5 * (std::f32::consts::TAU * distance / self.grain_len).cos()
            } else {
                0.0
            };
            out += read_interpolated(&self.buffer, grain.read_pos) * window;
            grain.read_pos = (grain.read_pos + self.playback_rate).rem_euclid(self.buffer.len() as f32);
        }

        self.grain_phase += 1.0;
        if self.grain_phase >= half_grain {
            self.grain_phase -= half_grain;
            for grain in &mut self.grains {
                let distance = (self.write_pos as f32 - grain.read_pos).rem_euclid(self.buffer.len() as f32);
                if distance >= self.grain_len - 1.0 || distance < 1.0 {
                    grain.read_pos = self.write_pos as f32;
                }
            }
        }

        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        out * 0.5
    }
}

impl EffectState for PitchShifterEffect {
    fn device_update(&mut self, sample_rate: f32, _num_channels: usize) {
        self.sample_rate = sample_rate;
        self.grain_len = GRAIN_MS * 0.001 * sample_rate;
        let buffer_len = (self.grain_len * 4.0).ceil() as usize + 4;
        self.buffer = vec![0.0; buffer_len];
        self.write_pos = 0;
        self.grains = [
            Grain { read_pos: 0.0 },
            Grain { read_pos: self.grain_len / 2.0 },
        ];
    }

    fn update(&mut self, props: &EffectProps, target_gains: &TargetGains) {
        self.gains = target_gains.clone();
        let EffectProps::PitchShifter(p) = props else { return };
        self.playback_rate = 2f32.powf(p.semitones.clamp(-12.0, 12.0) / 12.0);
    }

    fn process(&mut self, input: &[Sample], output: &mut ChannelBuffer) {
        self.scratch_l.resize(input.len(), 0.0);
        self.scratch_r.resize(input.len(), 0.0);
        for (i, &sample) in input.iter().enumerate() {
            let wet = self.process_one(sample);
            self.scratch_l[i] = wet;
            self.scratch_r[i] = wet;
        }
        pan_stereo_into(output, &self.scratch_l, &self.scratch_r, &self.gains);
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.grain_phase = 0.0;
        self.grains = [
            Grain { read_pos: 0.0 },
            Grain { read_pos: self.grain_len / 2.0 },
        ];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_shift_roughly_passes_signal_through() {
        let mut shifter = PitchShifterEffect::new(48000.0);
        shifter.playback_rate = 1.0;
        let mut energy = 0.0;
        for n in 0..4096 {
            let input = (n as f32 * 0.05).sin();
            energy += shifter.process_one(input).abs();
        }
        assert!(energy > 0.0);
    }
}
