//! Demuxer trait definition.

use crate::error::DemuxError;
use crate::format::MediaFormat;

/// Trait for container demultiplexers.
///
/// The demuxer owns the read head: it decides which track the next sample
/// belongs to (tracks are interleaved in container order), and the caller
/// reads that sample and calls [`advance`](Self::advance) to move on. Only
/// samples of selected tracks are surfaced.
///
/// [`read_sample_into`](Self::read_sample_into) may block on I/O; the engine
/// accepts that as the one stalling point inside a tick.
pub trait Demuxer: Send {
    /// Number of tracks in the container.
    fn track_count(&self) -> usize;

    /// Format of the given track.
    fn track_format(&self, track: usize) -> Result<MediaFormat, DemuxError>;

    /// Select a track for reading. Unselected tracks never produce samples.
    fn select_track(&mut self, track: usize) -> Result<(), DemuxError>;

    /// Track index owning the sample at the read head, or `None` once the
    /// input is exhausted.
    fn next_sample_track(&mut self) -> Option<usize>;

    /// Size in bytes of the sample at the read head.
    fn sample_size(&self) -> usize;

    /// Read the sample at the read head into `buf` (replacing its contents).
    fn read_sample_into(&mut self, buf: &mut Vec<u8>) -> Result<(), DemuxError>;

    /// Presentation timestamp of the sample at the read head, in microseconds.
    fn sample_timestamp_us(&self) -> i64;

    /// Move the read head to the next sample.
    fn advance(&mut self);
}
