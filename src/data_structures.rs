use serde::{Deserialize, Serialize};
use std::fmt;

use crate::comm_config::{CHANNELS, PAYLOAD_LEN};

// live object state as the host reports it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub location: [f64; 3],
    // XYZ euler, radians
    pub rotation: [f64; 3],
}

impl Transform {
    pub fn new(location: [f64; 3], rotation: [f64; 3]) -> Self {
        Self { location, rotation }
    }
}

/// Per-channel multipliers converting host units into the controller's
/// setpoint units: locX, locY, locZ, rotX, rotY, rotZ.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(transparent)]
pub struct ScaleConfig {
    pub factors: [f64; CHANNELS],
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl ScaleConfig {
    pub fn new(factors: [f64; CHANNELS]) -> Self {
        Self { factors }
    }

    pub fn uniform(factor: f64) -> Self {
        Self {
            factors: [factor; CHANNELS],
        }
    }

    /// Returns the 1-based channel and value of the first factor that is
    /// negative or not finite.
    pub fn validate(&self) -> Result<(), (usize, f64)> {
        match self
            .factors
            .iter()
            .enumerate()
            .find(|(_, f)| !f.is_finite() || **f < 0.0)
        {
            Some((i, f)) => Err((i + 1, *f)),
            None => Ok(()),
        }
    }
}

// one tick worth of scaled channels, exactly what goes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformSample {
    pub values: [f32; CHANNELS],
}

impl TransformSample {
    pub fn to_le_bytes(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        for (chunk, v) in out.chunks_exact_mut(4).zip(self.values.iter()) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn from_le_bytes(bytes: &[u8; PAYLOAD_LEN]) -> Self {
        let mut values = [0f32; CHANNELS];
        for (v, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
            *v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self { values }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Running => f.write_str("running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale_is_identity() {
        assert_eq!(ScaleConfig::default().factors, [1.0; 6]);
        assert!(ScaleConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_reports_first_bad_channel() {
        let scale = ScaleConfig::new([1.0, 1.0, -0.5, 1.0, f64::NAN, 1.0]);
        assert_eq!(scale.validate(), Err((3, -0.5)));

        let scale = ScaleConfig::new([1.0, 1.0, 1.0, 1.0, f64::INFINITY, 1.0]);
        assert!(matches!(scale.validate(), Err((5, _))));
    }

    #[test]
    fn zero_factor_is_allowed() {
        assert!(ScaleConfig::uniform(0.0).validate().is_ok());
    }

    #[test]
    fn payload_bytes_are_little_endian() {
        let sample = TransformSample {
            values: [1.0, 2.0, 3.0, 0.0, 0.0, 0.0],
        };
        let bytes = sample.to_le_bytes();
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x40, 0x40]);
        assert_eq!(TransformSample::from_le_bytes(&bytes), sample);
    }

    #[test]
    fn scale_config_serializes_as_plain_array() {
        let json = serde_json::to_string(&ScaleConfig::uniform(2.0)).unwrap();
        assert_eq!(json, "[2.0,2.0,2.0,2.0,2.0,2.0]");
        assert_eq!(SessionState::Running.to_string(), "running");
    }
}
