//! CPAL-backed audio sink.
//!
//! Implements [`AudioSink`] on top of the default system output device. The
//! playback worker writes interleaved i16 PCM; frames travel through a
//! bounded [`PcmQueue`] to the CPAL output callback, which converts them to
//! f32 sample by sample while copying. The callback never blocks or
//! allocates and fills silence on underrun.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tracing::{debug, error, info};

use pm_media::{AudioSink, SinkError, SinkFactory};

use crate::error::AudioError;
use crate::pcm::{copy_i16le_to_f32, BYTES_PER_SAMPLE_I16};
use crate::queue::{PcmConsumer, PcmProducer, PcmQueue};

/// Number of frame chunks the queue holds before writers block.
const QUEUE_CHUNKS: usize = 64;

/// Default internal buffering reported to the backpressure arithmetic.
pub const DEFAULT_CAPACITY_FRAMES: u64 = 8192;

/// Audio sink backed by the default CPAL output device.
pub struct CpalSink {
    /// The CPAL output stream (holds the audio thread alive).
    stream: Option<Stream>,
    /// Sending half of the frame queue; `None` once shut down.
    producer: Option<PcmProducer>,
    /// Whether the stream has been started.
    playing: Arc<AtomicBool>,
    /// Total samples consumed by the output callback (silence excluded).
    samples_consumed: Arc<AtomicU64>,
    capacity_frames: u64,
    sample_rate: u32,
    channels: u16,
}

impl CpalSink {
    /// Open a sink on the default output device for the given stream shape.
    pub fn open(sample_rate: u32, channels: u16, capacity_frames: u64) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no audio output device available"))?;

        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!(device = name.as_str(), sample_rate, channels, "Opening audio output");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (producer, consumer) = PcmQueue::bounded(QUEUE_CHUNKS);
        let playing = Arc::new(AtomicBool::new(false));
        let samples_consumed = Arc::new(AtomicU64::new(0));

        let stream = build_stream(
            &device,
            &config,
            consumer,
            Arc::clone(&playing),
            Arc::clone(&samples_consumed),
        )?;

        debug!(sample_rate, channels, capacity_frames, "Audio output stream built");

        Ok(Self {
            stream: Some(stream),
            producer: Some(producer),
            playing,
            samples_consumed,
            capacity_frames,
            sample_rate,
            channels,
        })
    }

    /// Output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl AudioSink for CpalSink {
    fn frames_consumed(&self) -> u64 {
        self.samples_consumed.load(Ordering::Relaxed) / u64::from(self.channels)
    }

    fn frame_capacity(&self) -> u64 {
        self.capacity_frames
    }

    fn frame_size_bytes(&self) -> usize {
        usize::from(self.channels) * BYTES_PER_SAMPLE_I16
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        let producer = self.producer.as_ref().ok_or(SinkError::Closed)?;

        // Whole samples only; a trailing odd byte would desync the interleave.
        let usable = bytes.len() - bytes.len() % BYTES_PER_SAMPLE_I16;
        if usable == 0 {
            return Ok(0);
        }

        // Blocks when the callback has fallen behind; callers bound their
        // writes by frame_capacity - (submitted - consumed), so any wait
        // here is short.
        producer
            .send(bytes[..usable].to_vec())
            .map_err(|_| SinkError::Closed)?;

        Ok(usable)
    }

    fn start(&mut self) -> Result<(), SinkError> {
        if let Some(ref stream) = self.stream {
            stream
                .play()
                .map_err(|e| SinkError::from(AudioError::StreamPlay(e.to_string())))?;
            self.playing.store(true, Ordering::Relaxed);
            debug!("Audio output playing");
        }
        Ok(())
    }

    fn stopped(&self) -> bool {
        !self.playing.load(Ordering::Relaxed)
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.stop();
        }
        self.playing.store(false, Ordering::Relaxed);
        self.stream = None;
    }
}

/// Build the CPAL output stream around the consuming half of the queue.
fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: PcmConsumer,
    playing: Arc<AtomicBool>,
    samples_consumed: Arc<AtomicU64>,
) -> Result<Stream, AudioError> {
    // Chunk carried over from the previous callback, with its consumed offset.
    let mut pending: Option<(Vec<u8>, usize)> = None;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                // Runs on the audio thread: never block, never allocate.
                if !playing.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }

                let mut written = 0;
                while written < data.len() {
                    let (chunk, offset) = match pending.take() {
                        Some(p) => p,
                        None => match consumer.try_recv() {
                            Some(chunk) => (chunk, 0),
                            None => break,
                        },
                    };

                    let n = copy_i16le_to_f32(&chunk[offset..], &mut data[written..]);
                    written += n;

                    let consumed = offset + n * BYTES_PER_SAMPLE_I16;
                    if consumed < chunk.len() {
                        pending = Some((chunk, consumed));
                    }
                }

                samples_consumed.fetch_add(written as u64, Ordering::Relaxed);

                if written < data.len() {
                    // Underrun: pad with silence rather than stalling.
                    data[written..].fill(0.0);
                }
            },
            move |err| {
                error!(error = %err, "Audio output stream error");
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()))
}

/// Sink factory wiring [`CpalSink`] into the playback engine: one sink per
/// reported output format, sized with [`DEFAULT_CAPACITY_FRAMES`].
pub fn default_sink_factory() -> SinkFactory {
    Box::new(|sample_rate, channels| {
        CpalSink::open(sample_rate, channels, DEFAULT_CAPACITY_FRAMES)
            .map(|sink| Box::new(sink) as Box<dyn AudioSink>)
            .map_err(SinkError::from)
    })
}
