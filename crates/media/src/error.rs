//! Error types for the media contracts (thiserror-based).

use thiserror::Error;

/// Errors reported by a [`Demuxer`](crate::Demuxer).
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("track {0} out of range")]
    TrackOutOfRange(usize),

    #[error("no decodable audio or video tracks")]
    NoTracks,

    #[error("sample read failed: {0}")]
    SampleRead(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a [`Decoder`](crate::Decoder).
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("no decoder available for {mime:?}")]
    NoDecoder { mime: String },

    #[error("decoder configuration failed: {0}")]
    Configure(String),

    #[error("no input slot available for codec config data")]
    NoConfigSlot,

    #[error("slot index {index} is not valid for this pool")]
    BadSlot { index: usize },

    #[error("decoder failed: {0}")]
    Failed(String),
}

/// Errors reported by an [`AudioSink`](crate::AudioSink).
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("audio sink is closed")]
    Closed,

    #[error("audio sink backend: {0}")]
    Backend(String),
}
