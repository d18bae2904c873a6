/// Stream service configuration
///
/// All remote-service settings live here and are injected into the
/// dispatch client explicitly; nothing reads process globals after
/// startup.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default API base for the streaming service.
pub const DEFAULT_API_BASE: &str = "https://api.daydream.live/v1";

/// Default rendering pipeline.
pub const DEFAULT_PIPELINE: &str = "pip_SD-turbo";

/// Default diffusion model applied to the stream.
pub const DEFAULT_MODEL_ID: &str = "stabilityai/sdxl-turbo";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Output dimensions of the generated stream (16:9 by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Configuration for the stream control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// API base URL, no trailing slash.
    pub api_base: String,

    /// Bearer credential for the streaming service.
    pub api_key: String,

    /// Rendering pipeline to instantiate sessions from.
    pub pipeline_id: String,

    /// Diffusion model id sent with every parameter document.
    pub model_id: String,

    /// Output dimensions.
    pub dimensions: Dimensions,

    /// Per-request network timeout in seconds.
    pub timeout_secs: u64,
}

impl StreamConfig {
    /// Create a config with the given credential and service defaults.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            pipeline_id: DEFAULT_PIPELINE.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            dimensions: Dimensions::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read the credential (and optional base URL override) from the
    /// process environment. Intended for binaries only; library code
    /// receives the struct.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("DAYDREAM_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingCredential("DAYDREAM_API_KEY"))?;

        let mut config = Self::new(api_key);
        if let Ok(base) = std::env::var("DAYDREAM_API_BASE") {
            if !base.trim().is_empty() {
                config.api_base = base.trim_end_matches('/').to_string();
            }
        }
        Ok(config)
    }

    /// With API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// With rendering pipeline.
    pub fn with_pipeline(mut self, pipeline_id: impl Into<String>) -> Self {
        self.pipeline_id = pipeline_id.into();
        self
    }

    /// With diffusion model.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// With output dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Dimensions { width, height };
        self
    }

    /// With network timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Network timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the config before handing it to a client.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("DAYDREAM_API_KEY"));
        }
        if self.dimensions.width == 0 || self.dimensions.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "dimensions must be non-zero, got {}x{}",
                self.dimensions.width, self.dimensions.height
            )));
        }
        Ok(())
    }
}
