use thiserror::Error;

pub type Result<T> = std::result::Result<T, DrillError>;

#[derive(Debug, Error)]
pub enum DrillError {
    #[error("no words selected")]
    EmptySelection,

    #[error("audio manifest for level {level} batch {batch} could not be loaded: {reason}")]
    ManifestLoadFailure {
        level: String,
        batch: u32,
        reason: String,
    },

    #[error("no sentences found for {group} batch {batch}")]
    EmptyBatch { group: String, batch: u32 },

    #[error("failed to read sentence dataset: {0}")]
    DatasetIo(#[from] std::io::Error),

    #[error("malformed sentence dataset: {0}")]
    DatasetFormat(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidSetting { key: &'static str, value: String },

    #[error("audio playback failed: {0}")]
    Audio(String),
}
