//! Audio sink trait definition.

use crate::error::SinkError;

/// Trait for audio outputs accepting interleaved PCM.
///
/// The sink has finite internal buffering measured in frames (one frame =
/// one sample per channel). Callers bound their writes using the
/// backpressure arithmetic
/// `capacity − (submitted − consumed)`, where `submitted` is the caller's
/// running count of frames written and `consumed` comes from
/// [`frames_consumed`](Self::frames_consumed); writes beyond that bound may
/// block.
pub trait AudioSink {
    /// Total frames consumed by the output device so far.
    fn frames_consumed(&self) -> u64;

    /// Internal buffer capacity in frames.
    fn frame_capacity(&self) -> u64;

    /// Size of one frame in bytes (sample size × channel count).
    fn frame_size_bytes(&self) -> usize;

    /// Write interleaved PCM bytes; returns the number of bytes accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError>;

    /// Start playback. Idempotent.
    fn start(&mut self) -> Result<(), SinkError>;

    /// Whether the sink is currently stopped (not yet started).
    fn stopped(&self) -> bool;
}

/// Factory creating an audio sink for a decoded stream's sample rate and
/// channel count. Invoked from the playback worker whenever a decoder
/// reports a (new) audio output format.
pub type SinkFactory = Box<dyn FnMut(u32, u16) -> Result<Box<dyn AudioSink>, SinkError> + Send>;
