use thiserror::Error;

/// All errors produced by parlando-core.
#[derive(Debug, Error)]
pub enum ParlandoError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("feature extraction error: {0}")]
    FeatureExtraction(String),

    #[error("analyser is already recording")]
    AlreadyRecording,

    #[error("analyser is not recording")]
    NotRecording,

    #[error("no recording captured yet")]
    EmptyRecording,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ParlandoError>;
