//! Ambisonic (B-format) encode/decode up to third order, matching
//! [`ao_core::MAX_AMBI_ORDER`]:
//! - Encoding: point source to Ambisonic
//! - Decoding: Ambisonic to a speaker layout or binaural virtual speakers
//! - Transformation: listener-orientation rotation
//! - Format conversion: SN3D/N3D/FuMa, ACN/FuMa ordering
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ao_spatial::hoa::{AmbisonicEncoder, AmbisonicDecoder, AmbisonicOrder};
//! use ao_spatial::{Position3D, SpeakerLayout};
//!
//! let encoder = AmbisonicEncoder::new(AmbisonicOrder::Third);
//! let position = Position3D::from_spherical(45.0, 30.0, 1.0);
//! let ambisonic = encoder.encode(&mono_audio, &position);
//!
//! let decoder = AmbisonicDecoder::new(AmbisonicOrder::Third, SpeakerLayout::surround_5_1());
//! let speakers = decoder.decode(&ambisonic);
//! ```

mod encoder;
mod decoder;
mod transform;
mod format;

pub use encoder::AmbisonicEncoder;
pub use decoder::AmbisonicDecoder;
pub use transform::AmbisonicTransform;
pub use format::{AmbisonicFormat, Normalization, ChannelOrdering};

use crate::error::{SpatialError, SpatialResult};

/// Ambisonic order, capped at [`ao_core::MAX_AMBI_ORDER`] (third order,
/// 16 channels — the device mixing matrix never spends more than
/// [`ao_core::MAX_AMBI_CHANNELS`] on a B-format bus).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbisonicOrder {
    /// First order (4 channels) - basic 3D
    First = 1,
    /// Second order (9 channels) - good localization
    Second = 2,
    /// Third order (16 channels) - high quality
    Third = 3,
}

impl AmbisonicOrder {
    /// Get channel count for this order
    pub fn channel_count(&self) -> usize {
        let n = *self as usize;
        (n + 1) * (n + 1)
    }

    /// Create from order number
    pub fn from_order(order: usize) -> SpatialResult<Self> {
        match order {
            1 => Ok(AmbisonicOrder::First),
            2 => Ok(AmbisonicOrder::Second),
            3 => Ok(AmbisonicOrder::Third),
            _ => Err(SpatialError::InvalidAmbisonicOrder(order)),
        }
    }

    /// Get order number
    pub fn as_usize(&self) -> usize {
        *self as usize
    }
}

/// Spherical harmonic coefficients
#[derive(Debug, Clone)]
pub struct SphericalHarmonics {
    /// Coefficients per channel
    pub coeffs: Vec<f32>,
    /// Order
    pub order: AmbisonicOrder,
}

impl SphericalHarmonics {
    /// Create from order
    pub fn new(order: AmbisonicOrder) -> Self {
        Self {
            coeffs: vec![0.0; order.channel_count()],
            order,
        }
    }

    /// Compute spherical harmonics for a direction
    pub fn from_direction(azimuth: f32, elevation: f32, order: AmbisonicOrder) -> Self {
        let mut sh = Self::new(order);
        sh.compute_for_direction(azimuth, elevation);
        sh
    }

    /// Compute coefficients for direction
    pub fn compute_for_direction(&mut self, azimuth: f32, elevation: f32) {
        let az = azimuth.to_radians();
        let el = elevation.to_radians();

        let cos_el = el.cos();
        let sin_el = el.sin();

        // ACN ordering, SN3D normalization
        let n = self.order.as_usize();

        // Order 0 (omnidirectional)
        self.coeffs[0] = 1.0;

        if n >= 1 {
            // Order 1 (figure-8 patterns)
            self.coeffs[1] = cos_el * az.sin();  // Y
            self.coeffs[2] = sin_el;              // Z
            self.coeffs[3] = cos_el * az.cos();  // X
        }

        if n >= 2 {
            // Order 2
            let cos2_az = (2.0 * az).cos();
            let sin2_az = (2.0 * az).sin();
            let cos2_el = cos_el * cos_el;

            self.coeffs[4] = 1.732051 * cos2_el * sin2_az;                          // V
            self.coeffs[5] = 1.732051 * sin_el * cos_el * az.sin();                 // T
            self.coeffs[6] = 0.5 * (3.0 * sin_el * sin_el - 1.0);                   // R
            self.coeffs[7] = 1.732051 * sin_el * cos_el * az.cos();                 // S
            self.coeffs[8] = 0.866025 * cos2_el * cos2_az;                          // U
        }

        if n >= 3 {
            // Order 3
            let cos2_az_3 = (2.0 * az).cos();
            let cos3_az = (3.0 * az).cos();
            let sin3_az = (3.0 * az).sin();
            let cos3_el = cos_el * cos_el * cos_el;

            self.coeffs[9] = 0.790569 * cos3_el * sin3_az;
            self.coeffs[10] = 1.936492 * sin_el * cos_el * cos_el * (2.0 * az).sin();
            self.coeffs[11] = 0.612372 * cos_el * (5.0 * sin_el * sin_el - 1.0) * az.sin();
            self.coeffs[12] = 0.5 * sin_el * (5.0 * sin_el * sin_el - 3.0);
            self.coeffs[13] = 0.612372 * cos_el * (5.0 * sin_el * sin_el - 1.0) * az.cos();
            self.coeffs[14] = 0.968246 * sin_el * cos_el * cos_el * cos2_az_3;
            self.coeffs[15] = 0.790569 * cos3_el * cos3_az;
        }

        // Orders 4-7 would follow similar patterns
        // Full implementation would use recursion or lookup tables
    }

    /// Get channel by ACN index
    pub fn get(&self, acn: usize) -> f32 {
        self.coeffs.get(acn).copied().unwrap_or(0.0)
    }

    /// Set channel by ACN index
    pub fn set(&mut self, acn: usize, value: f32) {
        if acn < self.coeffs.len() {
            self.coeffs[acn] = value;
        }
    }

    /// Scale all coefficients
    pub fn scale(&mut self, gain: f32) {
        for c in &mut self.coeffs {
            *c *= gain;
        }
    }

    /// Add another set of harmonics
    pub fn add(&mut self, other: &SphericalHarmonics) {
        for (i, &c) in other.coeffs.iter().enumerate() {
            if i < self.coeffs.len() {
                self.coeffs[i] += c;
            }
        }
    }
}

/// ACN channel index from (order, degree)
pub fn acn_index(order: i32, degree: i32) -> usize {
    (order * order + order + degree) as usize
}

/// Get (order, degree) from ACN index
pub fn acn_to_order_degree(acn: usize) -> (i32, i32) {
    let order = (acn as f64).sqrt().floor() as i32;
    let degree = acn as i32 - order * order - order;
    (order, degree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_count() {
        assert_eq!(AmbisonicOrder::First.channel_count(), 4);
        assert_eq!(AmbisonicOrder::Second.channel_count(), 9);
        assert_eq!(AmbisonicOrder::Third.channel_count(), 16);
    }

    #[test]
    fn test_acn_index() {
        assert_eq!(acn_index(0, 0), 0);  // W
        assert_eq!(acn_index(1, -1), 1); // Y
        assert_eq!(acn_index(1, 0), 2);  // Z
        assert_eq!(acn_index(1, 1), 3);  // X
    }

    #[test]
    fn test_spherical_harmonics_front() {
        let sh = SphericalHarmonics::from_direction(0.0, 0.0, AmbisonicOrder::First);

        // Front center should have positive X, zero Y
        assert!((sh.get(0) - 1.0).abs() < 0.001);  // W
        assert!(sh.get(1).abs() < 0.001);          // Y (no left/right)
        assert!(sh.get(2).abs() < 0.001);          // Z (no up/down)
        assert!((sh.get(3) - 1.0).abs() < 0.001);  // X (front)
    }
}
