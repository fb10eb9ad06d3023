//! Per-track decoder session state.

use std::collections::VecDeque;

use pm_media::{AudioSink, Decoder, OutputBufferInfo, Sample, TrackKind};

/// Kind-specific output side of a track.
///
/// Exactly one of "audio sink" or "nothing" is valid depending on kind, so
/// this is a tagged variant rather than optional fields on the session.
pub(crate) enum TrackOutput {
    /// Video renders through the decoder into the configured surface.
    Video,
    /// Audio is delivered to a sink created when the decoder reports its
    /// output format; `frames_submitted` is the running backpressure count.
    Audio {
        sink: Option<Box<dyn AudioSink>>,
        frames_submitted: u64,
    },
}

/// State of one selected track: the decoder handle plus the queues the tick
/// pipeline moves data through.
///
/// Slot-index bookkeeping invariant: an input slot index lives in
/// `avail_inputs` from the moment the decoder hands it out until it is
/// queued back; an output slot index lives in exactly one
/// `pending_outputs` descriptor from dequeue until release. Neither set
/// ever holds an index the decoder still owns.
pub(crate) struct CodecSession {
    /// Demuxer track index this session decodes.
    pub track_index: usize,
    pub kind: TrackKind,
    pub decoder: Box<dyn Decoder>,

    /// Input slot pool size, fixed at start.
    pub input_slot_count: usize,
    /// Output slot pool size; re-read when the decoder reallocates the pool.
    pub output_slot_count: usize,

    /// Input slot indices currently free for feeding, oldest first.
    pub avail_inputs: VecDeque<usize>,
    /// Compressed samples read ahead of the decoder, oldest first.
    pub pending_samples: VecDeque<Sample>,
    /// Completed output descriptors awaiting presentation, oldest first.
    pub pending_outputs: VecDeque<OutputBufferInfo>,

    /// Whether this track's end-of-stream input marker has been queued.
    pub eos_marker_sent: bool,

    pub output: TrackOutput,
}

impl CodecSession {
    pub fn new(track_index: usize, kind: TrackKind, decoder: Box<dyn Decoder>) -> Self {
        let output = match kind {
            TrackKind::Video => TrackOutput::Video,
            TrackKind::Audio => TrackOutput::Audio {
                sink: None,
                frames_submitted: 0,
            },
        };
        Self {
            track_index,
            kind,
            decoder,
            input_slot_count: 0,
            output_slot_count: 0,
            avail_inputs: VecDeque::new(),
            pending_samples: VecDeque::new(),
            pending_outputs: VecDeque::new(),
            eos_marker_sent: false,
            output,
        }
    }
}
