use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DrillError, Result};

const DEFAULT_SENTENCES_PATH: &str = "data/sentences.json";
const DEFAULT_AUDIO_ROOT: &str = "audio";
const DEFAULT_CLIP_PAUSE_MS: u64 = 2500;
const DEFAULT_AUTO_ADVANCE_SECS: u64 = 2;
const DEFAULT_MANIFEST_RETRIES: u32 = 2;

/// Runtime settings, read from the environment after `.env` has been loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub sentences_path: PathBuf,
    pub audio_root: PathBuf,
    /// How long one clip is assumed to take at speed 1.0.
    pub clip_pause: Duration,
    /// Delay before a correct answer moves on without the user pressing "Continue".
    pub auto_advance: Duration,
    pub manifest_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sentences_path: PathBuf::from(DEFAULT_SENTENCES_PATH),
            audio_root: PathBuf::from(DEFAULT_AUDIO_ROOT),
            clip_pause: Duration::from_millis(DEFAULT_CLIP_PAUSE_MS),
            auto_advance: Duration::from_secs(DEFAULT_AUTO_ADVANCE_SECS),
            manifest_retries: DEFAULT_MANIFEST_RETRIES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("SENTENCES_PATH") {
            config.sentences_path = PathBuf::from(path);
        }
        if let Some(root) = lookup("AUDIO_ROOT") {
            config.audio_root = PathBuf::from(root);
        }
        if let Some(value) = lookup("CLIP_PAUSE_MS") {
            config.clip_pause = Duration::from_millis(parse_number("CLIP_PAUSE_MS", value)?);
        }
        if let Some(value) = lookup("AUTO_ADVANCE_SECS") {
            config.auto_advance = Duration::from_secs(parse_number("AUTO_ADVANCE_SECS", value)?);
        }
        if let Some(value) = lookup("MANIFEST_RETRIES") {
            config.manifest_retries = parse_number("MANIFEST_RETRIES", value)?;
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DrillError::InvalidSetting { key, value })
}
