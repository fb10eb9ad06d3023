//! `pm-media` — Shared contracts and data-flow types for the Playmill engine.
//!
//! This crate is the foundation the engine and backend crates depend on.
//! It defines the narrow interfaces the playback core talks to:
//!
//! - **Demuxer**: pulls interleaved compressed samples out of a container
//! - **Decoder**: slot-based compressed-in / decoded-out codec surface
//! - **AudioSink**: interleaved PCM output with frame-level accounting
//! - **VideoSurface**: opaque render target handed to the decoder
//!
//! plus the types that flow across them (`MediaFormat`, `Sample`,
//! `OutputBufferInfo`, `BufferFlags`) and the per-domain error enums.
//!
//! The engine never parses containers, implements codecs, or touches pixels;
//! everything behind these traits is someone else's problem.

pub mod codec;
pub mod demux;
pub mod error;
pub mod format;
pub mod sample;
pub mod sink;

// Re-export commonly used items at crate root
pub use codec::{Decoder, DecoderFactory, OutputEvent, VideoSurface};
pub use demux::Demuxer;
pub use error::{CodecError, DemuxError, SinkError};
pub use format::{FormatParams, MediaFormat, TrackKind};
pub use sample::{BufferFlags, OutputBufferInfo, Sample};
pub use sink::{AudioSink, SinkFactory};
