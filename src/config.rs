use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::clock::DEFAULT_FRAME_RATE;
use crate::comm_config::{LinkSettings, DEFAULT_BAUD, DEFAULT_SETTLE, DEFAULT_WRITE_TIMEOUT};
use crate::data_structures::ScaleConfig;
use crate::error::ConfigError;

/// Everything needed to run a session, as stored on disk:
///
/// ```json
/// { "port": "/dev/ttyACM0", "baud": 9600, "settleMs": 2000,
///   "frameRate": 24.0, "scale": [1, 1, 1, 1, 1, 1] }
/// ```
///
/// Missing fields take their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub port: Option<String>,
    pub baud: u32,
    pub settle_ms: u64,
    pub write_timeout_ms: u64,
    pub frame_rate: f64,
    pub scale: ScaleConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: DEFAULT_BAUD,
            settle_ms: DEFAULT_SETTLE.as_millis() as u64,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
            frame_rate: DEFAULT_FRAME_RATE,
            scale: ScaleConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud == 0 {
            return Err(ConfigError::Invalid("baud must be > 0".into()));
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "frameRate must be > 0, got {}",
                self.frame_rate
            )));
        }
        if let Err((channel, value)) = self.scale.validate() {
            return Err(ConfigError::Invalid(format!(
                "scale factor {channel} must be finite and >= 0, got {value}"
            )));
        }
        Ok(())
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud: self.baud,
            settle: Duration::from_millis(self.settle_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}
