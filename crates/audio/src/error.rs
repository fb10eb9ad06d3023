//! Audio backend error types.

use pm_media::SinkError;
use thiserror::Error;

/// Errors from the audio output backend.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio output setup failed: {0:#}")]
    Output(#[from] anyhow::Error),

    #[error("audio stream build failed: {0}")]
    StreamBuild(String),

    #[error("audio stream start failed: {0}")]
    StreamPlay(String),

    #[error("audio frame queue is closed")]
    QueueClosed,
}

impl From<AudioError> for SinkError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::QueueClosed => SinkError::Closed,
            other => SinkError::Backend(other.to_string()),
        }
    }
}
