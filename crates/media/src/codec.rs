//! Decoder trait definition — slot-based compressed-in / decoded-out surface.

use std::sync::Arc;

use crate::error::CodecError;
use crate::format::MediaFormat;
use crate::sample::{BufferFlags, OutputBufferInfo};

/// Opaque render target for video decoders.
///
/// The engine never draws: a decoder configured with a surface renders into
/// it when an output slot is released with `render = true`.
pub trait VideoSurface: Send + Sync {}

/// Outcome of polling the decoder for a completed output slot.
#[derive(Debug)]
pub enum OutputEvent {
    /// A decoded buffer is ready.
    Frame(OutputBufferInfo),
    /// The output format changed; re-read it via
    /// [`Decoder::output_format`] before consuming further frames.
    FormatChanged,
    /// The output slot pool was reallocated; re-read its size.
    SlotsChanged,
    /// Nothing ready yet.
    WouldBlock,
}

/// Trait for decoders exposing fixed pools of input and output buffer slots.
///
/// Slots are identified by small integer indices. An input slot index handed
/// out by [`try_dequeue_input_slot`](Self::try_dequeue_input_slot) belongs to
/// the caller until it is returned via
/// [`queue_input_slot`](Self::queue_input_slot); an output slot described by
/// an [`OutputEvent::Frame`] belongs to the caller until it is returned via
/// [`release_output_slot`](Self::release_output_slot). A given index is never
/// owned by both sides at once.
pub trait Decoder {
    /// Configure the decoder for a stream format, optionally binding a video
    /// render target. Must be called exactly once, before [`start`](Self::start).
    fn configure(
        &mut self,
        format: &MediaFormat,
        surface: Option<Arc<dyn VideoSurface>>,
    ) -> Result<(), CodecError>;

    /// Start the decoder. Slots become dequeueable afterwards.
    fn start(&mut self) -> Result<(), CodecError>;

    /// Size of the input slot pool.
    fn input_slot_count(&self) -> usize;

    /// Size of the output slot pool. Re-read after [`OutputEvent::SlotsChanged`].
    fn output_slot_count(&self) -> usize;

    /// Claim a free input slot, or `None` if the decoder has none to give.
    fn try_dequeue_input_slot(&mut self) -> Option<usize>;

    /// Submit `data` through input slot `index` with the given timestamp and
    /// flags, returning the slot to the decoder. An empty payload flagged
    /// [`BufferFlags::END_OF_STREAM`] marks the end of the track's input.
    fn queue_input_slot(
        &mut self,
        index: usize,
        data: &[u8],
        pts_us: i64,
        flags: BufferFlags,
    ) -> Result<(), CodecError>;

    /// Poll for a completed output slot.
    fn dequeue_output_slot(&mut self) -> Result<OutputEvent, CodecError>;

    /// Current output format (valid after [`OutputEvent::FormatChanged`]).
    fn output_format(&self) -> Result<MediaFormat, CodecError>;

    /// Decoded bytes held by output slot `index`.
    fn output_slot_data(&self, index: usize) -> &[u8];

    /// Return an output slot to the decoder, rendering its contents to the
    /// configured surface first when `render` is true.
    fn release_output_slot(&mut self, index: usize, render: bool) -> Result<(), CodecError>;

    /// Tear the decoder down. Further calls are undefined.
    fn release(&mut self);
}

/// Factory creating a decoder for a stream format.
///
/// Mirrors create-by-type codec lookup: the factory picks an implementation
/// from the format's MIME type, and the engine configures and owns the
/// result for the lifetime of the track.
pub type DecoderFactory = Box<
    dyn FnMut(&MediaFormat, Option<Arc<dyn VideoSurface>>) -> Result<Box<dyn Decoder>, CodecError>
        + Send,
>;
