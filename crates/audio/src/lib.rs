//! `pm-audio` — Audio delivery backend for the Playmill playback engine.
//!
//! This crate turns decoded PCM into sound:
//!
//! - **Queue**: a bounded blocking frame queue with an explicit stop
//!   sentinel, decoupling the producer (the playback worker) from the
//!   consumer (the realtime output callback)
//! - **Output**: a CPAL-backed [`AudioSink`](pm_media::AudioSink)
//!   implementation with frame-level consumption accounting
//! - **PCM**: interleaved i16 ⇄ f32 sample conversion helpers
//!
//! # Architecture
//!
//! ```text
//! playback worker          audio thread (CPAL callback)
//! ┌──────────────┐  PcmQueue   ┌──────────────────┐
//! │ sink.write() │ ──frames──► │ drain, count,    │
//! │ (i16 -> f32) │             │ silence underrun │
//! └──────────────┘             └──────────────────┘
//! ```
//!
//! The queue is a bounded channel: the producer blocks when the consumer
//! falls behind, the consumer blocks (or, in callback position, takes
//! silence) when starved, and a stop sentinel ends the stream without
//! racing the backlog.

pub mod error;
pub mod output;
pub mod pcm;
pub mod queue;

pub use error::AudioError;
pub use output::{default_sink_factory, CpalSink};
pub use queue::{PcmConsumer, PcmProducer, PcmQueue};
