//! Track formats as reported by the demuxer and the decoder.

use serde::{Deserialize, Serialize};

/// Kind of an elementary stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    /// Short label for logging.
    pub fn label(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Kind-specific format parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatParams {
    Audio { sample_rate: u32, channels: u16 },
    Video { width: u32, height: u32 },
}

/// Format of one elementary stream.
///
/// Produced by [`Demuxer::track_format`](crate::Demuxer::track_format) during
/// preparation and by [`Decoder::output_format`](crate::Decoder::output_format)
/// after a format-change notification. The codec-specific data blobs (`csd`)
/// are submitted to the decoder once, flagged as codec config, before any
/// real samples.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFormat {
    /// MIME type, e.g. `video/avc` or `audio/mp4a-latm`.
    pub mime: String,
    /// Codec-specific configuration blobs (SPS/PPS, AudioSpecificConfig, ...).
    pub csd: Vec<Vec<u8>>,
    /// Kind-specific parameters.
    pub params: FormatParams,
}

impl MediaFormat {
    /// Construct an audio format.
    pub fn audio(mime: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            mime: mime.into(),
            csd: Vec::new(),
            params: FormatParams::Audio {
                sample_rate,
                channels,
            },
        }
    }

    /// Construct a video format.
    pub fn video(mime: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            mime: mime.into(),
            csd: Vec::new(),
            params: FormatParams::Video { width, height },
        }
    }

    /// Kind of the stream this format describes.
    pub fn kind(&self) -> TrackKind {
        match self.params {
            FormatParams::Audio { .. } => TrackKind::Audio,
            FormatParams::Video { .. } => TrackKind::Video,
        }
    }

    /// Attach a codec-specific data blob (builder style).
    pub fn with_csd(mut self, blob: Vec<u8>) -> Self {
        self.csd.push(blob);
        self
    }
}
