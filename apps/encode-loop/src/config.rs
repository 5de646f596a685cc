//! Demo configuration

use std::path::Path;

use anyhow::Context;
use encode_session::{DispatchConfig, EncoderConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub encoder: EncoderConfig,
    pub dispatch: DispatchConfig,
    /// How long to run; 0 runs until Ctrl-C
    pub duration_secs: u64,
    /// Force a keyframe every N frames (0 disables)
    pub keyframe_interval: u64,
    /// Drive the process-wide exclusive encoder instead of the service
    pub exclusive: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::new(1280, 720, 30),
            dispatch: DispatchConfig::default(),
            duration_secs: 5,
            keyframe_interval: 60,
            exclusive: false,
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn is_keyframe(&self, frame: u64) -> bool {
        frame == 0 || (self.keyframe_interval > 0 && frame % self.keyframe_interval == 0)
    }
}
