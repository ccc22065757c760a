use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_WINDOW_LEN: usize = 15_600;
pub const DEFAULT_HOP_LEN: usize = 7_800;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const ENV_SCRIPT_FILE: &str = "SPEAKCHECK_SCRIPT_FILE";
pub const ENV_LOG_LEVEL: &str = "SPEAKCHECK_LOG_LEVEL";

/// Window length and hop length for the segmenter, validated at construction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowParams {
    window_len: usize,
    hop_len: usize,
}

impl WindowParams {
    pub fn new(window_len: usize, hop_len: usize) -> Result<Self, ConfigError> {
        if window_len == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if hop_len == 0 {
            return Err(ConfigError::ZeroHop);
        }
        if hop_len > window_len {
            return Err(ConfigError::HopExceedsWindow {
                hop_len,
                window_len,
            });
        }
        Ok(Self {
            window_len,
            hop_len,
        })
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn hop_len(&self) -> usize {
        self.hop_len
    }
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            window_len: DEFAULT_WINDOW_LEN,
            hop_len: DEFAULT_HOP_LEN,
        }
    }
}

/// Audio-analysis settings shared by every take's pipeline.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub target_sample_rate: u32,
    pub window: WindowParams,
}

impl AnalysisConfig {
    pub fn new(target_sample_rate: u32, window: WindowParams) -> Result<Self, ConfigError> {
        if target_sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        Ok(Self {
            target_sample_rate,
            window,
        })
    }

    pub fn window_duration(&self) -> Duration {
        let micros = (self.window.window_len as u64).saturating_mul(1_000_000)
            / u64::from(self.target_sample_rate);
        Duration::from_micros(micros)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            window: WindowParams::default(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window length must be > 0")]
    ZeroWindow,

    #[error("hop length must be > 0")]
    ZeroHop,

    #[error("hop length {hop_len} must not exceed window length {window_len}")]
    HopExceedsWindow { hop_len: usize, window_len: usize },

    #[error("target sample rate must be > 0 Hz")]
    ZeroSampleRate,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}
