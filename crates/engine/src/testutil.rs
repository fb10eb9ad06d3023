//! Scripted test doubles for the playback pipeline.
//!
//! The mock decoder enforces the slot-ownership contract with panics, so a
//! pipeline bug that double-queues or double-releases a slot fails the test
//! at the violation site rather than corrupting state silently.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use pm_media::{
    AudioSink, BufferFlags, CodecError, Decoder, DecoderFactory, Demuxer, DemuxError, MediaFormat,
    OutputBufferInfo, OutputEvent, SinkError, SinkFactory, VideoSurface,
};

use crate::session::EventListener;

/// Install a test log subscriber (no-op if one is already installed).
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Demuxer
// ---------------------------------------------------------------------------

/// Demuxer over a scripted, pre-interleaved sample sequence.
pub struct MockDemuxer {
    formats: Vec<MediaFormat>,
    script: VecDeque<(usize, i64, Vec<u8>)>,
}

impl MockDemuxer {
    pub fn new(formats: Vec<MediaFormat>) -> Self {
        Self {
            formats,
            script: VecDeque::new(),
        }
    }

    /// Append one sample for `track` to the read sequence.
    pub fn queue_sample(&mut self, track: usize, pts_us: i64, data: Vec<u8>) {
        self.script.push_back((track, pts_us, data));
    }

    /// Append `count` samples for `track`, timestamps `start_pts + i * step`.
    pub fn queue_samples(&mut self, track: usize, count: usize, start_pts: i64, step: i64) {
        for i in 0..count {
            self.queue_sample(track, start_pts + i as i64 * step, vec![track as u8; 4]);
        }
    }
}

impl Demuxer for MockDemuxer {
    fn track_count(&self) -> usize {
        self.formats.len()
    }

    fn track_format(&self, track: usize) -> Result<MediaFormat, DemuxError> {
        self.formats
            .get(track)
            .cloned()
            .ok_or(DemuxError::TrackOutOfRange(track))
    }

    fn select_track(&mut self, track: usize) -> Result<(), DemuxError> {
        if track >= self.formats.len() {
            return Err(DemuxError::TrackOutOfRange(track));
        }
        Ok(())
    }

    fn next_sample_track(&mut self) -> Option<usize> {
        self.script.front().map(|(track, _, _)| *track)
    }

    fn sample_size(&self) -> usize {
        self.script.front().map_or(0, |(_, _, data)| data.len())
    }

    fn read_sample_into(&mut self, buf: &mut Vec<u8>) -> Result<(), DemuxError> {
        let (_, _, data) = self
            .script
            .front()
            .ok_or_else(|| DemuxError::SampleRead("read past end of script".into()))?;
        buf.clear();
        buf.extend_from_slice(data);
        Ok(())
    }

    fn sample_timestamp_us(&self) -> i64 {
        self.script.front().map_or(0, |(_, pts, _)| *pts)
    }

    fn advance(&mut self) {
        self.script.pop_front();
    }
}

/// One video (track 0) plus one audio (track 1) format set.
pub fn av_formats() -> Vec<MediaFormat> {
    vec![
        MediaFormat::video("video/avc", 320, 240),
        MediaFormat::audio("audio/raw", 48_000, 2),
    ]
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Extra outcomes a test can splice into the output drain.
pub enum ScriptEvent {
    FormatChanged(MediaFormat),
    SlotsChanged(usize),
    Fail(String),
}

/// Everything a test can observe about a mock decoder.
#[derive(Default)]
pub struct DecoderRecords {
    pub configured: bool,
    pub has_surface: bool,
    pub started: bool,
    pub released: bool,
    /// (pts_us, flags, payload length) per queued input, in order.
    pub inputs: Vec<(i64, BufferFlags, usize)>,
    pub eos_inputs: usize,
    pub config_inputs: usize,
    /// (slot index, rendered) per released output, in order.
    pub releases: Vec<(usize, bool)>,
    pub rendered: usize,
}

struct DecoderShared {
    records: DecoderRecords,
    script: VecDeque<ScriptEvent>,
    output_format: Option<MediaFormat>,
}

/// Test-side handle to a decoder that has been moved into the session.
#[derive(Clone)]
pub struct MockDecoderHandle {
    shared: Arc<Mutex<DecoderShared>>,
}

impl MockDecoderHandle {
    pub fn push_event(&self, event: ScriptEvent) {
        self.shared.lock().script.push_back(event);
    }

    pub fn records<R>(&self, f: impl FnOnce(&DecoderRecords) -> R) -> R {
        f(&self.shared.lock().records)
    }
}

struct Undecoded {
    input_slot: usize,
    data: Vec<u8>,
    pts_us: i64,
    flags: BufferFlags,
}

/// Decoder with bounded slot pools: every queued input becomes one output
/// frame (same payload, same timestamp) as soon as an output slot is free.
pub struct MockDecoder {
    shared: Arc<Mutex<DecoderShared>>,
    input_slot_count: usize,
    output_slot_count: usize,
    free_inputs: VecDeque<usize>,
    dequeued_inputs: HashSet<usize>,
    undecoded: VecDeque<Undecoded>,
    free_outputs: VecDeque<usize>,
    in_use_outputs: HashSet<usize>,
    slots: Vec<Vec<u8>>,
}

impl MockDecoder {
    pub fn new(input_slots: usize, output_slots: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(DecoderShared {
                records: DecoderRecords::default(),
                script: VecDeque::new(),
                output_format: None,
            })),
            input_slot_count: input_slots,
            output_slot_count: output_slots,
            free_inputs: VecDeque::new(),
            dequeued_inputs: HashSet::new(),
            undecoded: VecDeque::new(),
            free_outputs: VecDeque::new(),
            in_use_outputs: HashSet::new(),
            slots: Vec::new(),
        }
    }

    pub fn handle(&self) -> MockDecoderHandle {
        MockDecoderHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Decoder for MockDecoder {
    fn configure(
        &mut self,
        _format: &MediaFormat,
        surface: Option<Arc<dyn VideoSurface>>,
    ) -> Result<(), CodecError> {
        let mut sh = self.shared.lock();
        sh.records.configured = true;
        sh.records.has_surface = surface.is_some();
        Ok(())
    }

    fn start(&mut self) -> Result<(), CodecError> {
        self.free_inputs = (0..self.input_slot_count).collect();
        self.free_outputs = (0..self.output_slot_count).collect();
        self.slots = vec![Vec::new(); self.output_slot_count];
        self.shared.lock().records.started = true;
        Ok(())
    }

    fn input_slot_count(&self) -> usize {
        self.input_slot_count
    }

    fn output_slot_count(&self) -> usize {
        self.output_slot_count
    }

    fn try_dequeue_input_slot(&mut self) -> Option<usize> {
        let index = self.free_inputs.pop_front()?;
        self.dequeued_inputs.insert(index);
        Some(index)
    }

    fn queue_input_slot(
        &mut self,
        index: usize,
        data: &[u8],
        pts_us: i64,
        flags: BufferFlags,
    ) -> Result<(), CodecError> {
        assert!(
            self.dequeued_inputs.remove(&index),
            "input slot {index} queued without being dequeued"
        );

        let mut sh = self.shared.lock();
        sh.records.inputs.push((pts_us, flags, data.len()));

        if flags.contains(BufferFlags::CODEC_CONFIG) {
            sh.records.config_inputs += 1;
            // Config data produces no output; the slot frees immediately.
            self.free_inputs.push_back(index);
            return Ok(());
        }
        if flags.contains(BufferFlags::END_OF_STREAM) {
            sh.records.eos_inputs += 1;
        }
        drop(sh);

        self.undecoded.push_back(Undecoded {
            input_slot: index,
            data: data.to_vec(),
            pts_us,
            flags,
        });
        Ok(())
    }

    fn dequeue_output_slot(&mut self) -> Result<OutputEvent, CodecError> {
        let scripted = self.shared.lock().script.pop_front();
        if let Some(event) = scripted {
            return match event {
                ScriptEvent::FormatChanged(format) => {
                    self.shared.lock().output_format = Some(format);
                    Ok(OutputEvent::FormatChanged)
                }
                ScriptEvent::SlotsChanged(count) => {
                    // Grow the pool; indices already in use keep their slots.
                    for index in self.output_slot_count..count {
                        self.free_outputs.push_back(index);
                        self.slots.push(Vec::new());
                    }
                    self.output_slot_count = count;
                    Ok(OutputEvent::SlotsChanged)
                }
                ScriptEvent::Fail(message) => Err(CodecError::Failed(message)),
            };
        }

        if self.undecoded.is_empty() {
            return Ok(OutputEvent::WouldBlock);
        }
        let Some(slot) = self.free_outputs.pop_front() else {
            return Ok(OutputEvent::WouldBlock);
        };

        let u = self.undecoded.pop_front().expect("checked non-empty");
        self.in_use_outputs.insert(slot);
        self.slots[slot] = u.data;
        // The consumed input slot becomes dequeueable again.
        self.free_inputs.push_back(u.input_slot);

        Ok(OutputEvent::Frame(OutputBufferInfo {
            index: slot,
            offset: 0,
            size: self.slots[slot].len(),
            pts_us: u.pts_us,
            flags: if u.flags.contains(BufferFlags::END_OF_STREAM) {
                BufferFlags::END_OF_STREAM
            } else {
                BufferFlags::NONE
            },
        }))
    }

    fn output_format(&self) -> Result<MediaFormat, CodecError> {
        self.shared
            .lock()
            .output_format
            .clone()
            .ok_or_else(|| CodecError::Failed("output format not available".into()))
    }

    fn output_slot_data(&self, index: usize) -> &[u8] {
        &self.slots[index]
    }

    fn release_output_slot(&mut self, index: usize, render: bool) -> Result<(), CodecError> {
        assert!(
            self.in_use_outputs.remove(&index),
            "output slot {index} released without being dequeued"
        );
        let mut sh = self.shared.lock();
        sh.records.releases.push((index, render));
        if render {
            sh.records.rendered += 1;
        }
        self.free_outputs.push_back(index);
        Ok(())
    }

    fn release(&mut self) {
        self.shared.lock().records.released = true;
    }
}

/// Decoder factory recording the format and handle of every decoder it
/// creates, in creation order.
pub fn mock_decoder_factory(
    input_slots: usize,
    output_slots: usize,
) -> (
    DecoderFactory,
    Arc<Mutex<Vec<(MediaFormat, MockDecoderHandle)>>>,
) {
    let created: Arc<Mutex<Vec<(MediaFormat, MockDecoderHandle)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let created_in = Arc::clone(&created);

    let factory: DecoderFactory = Box::new(move |format, _surface| {
        let decoder = MockDecoder::new(input_slots, output_slots);
        created_in.lock().push((format.clone(), decoder.handle()));
        Ok(Box::new(decoder))
    });

    (factory, created)
}

// ---------------------------------------------------------------------------
// Audio sink
// ---------------------------------------------------------------------------

struct SinkShared {
    sample_rate: u32,
    channels: u16,
    capacity: u64,
    consumed: u64,
    started: bool,
    /// Byte length of each accepted write, in order.
    writes: Vec<usize>,
    /// All accepted bytes, concatenated.
    data: Vec<u8>,
    /// When set, the next write accepts at most this many bytes.
    short_next: Option<usize>,
}

/// Sink with a manually advanced consumed-frames counter.
pub struct MockSink {
    shared: Arc<Mutex<SinkShared>>,
}

/// Test-side handle to a sink created by the mock factory.
#[derive(Clone)]
pub struct MockSinkHandle {
    shared: Arc<Mutex<SinkShared>>,
}

impl MockSink {
    pub fn new(sample_rate: u32, channels: u16, capacity: u64) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SinkShared {
                sample_rate,
                channels,
                capacity,
                consumed: 0,
                started: false,
                writes: Vec::new(),
                data: Vec::new(),
                short_next: None,
            })),
        }
    }

    pub fn handle(&self) -> MockSinkHandle {
        MockSinkHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl MockSinkHandle {
    /// Simulate the device consuming `frames` frames.
    pub fn consume_frames(&self, frames: u64) {
        self.shared.lock().consumed += frames;
    }

    /// Make the next write accept at most `bytes` bytes.
    pub fn force_short_write(&self, bytes: usize) {
        self.shared.lock().short_next = Some(bytes);
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.lock().sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.shared.lock().channels
    }

    pub fn started(&self) -> bool {
        self.shared.lock().started
    }

    pub fn writes(&self) -> Vec<usize> {
        self.shared.lock().writes.clone()
    }

    pub fn data(&self) -> Vec<u8> {
        self.shared.lock().data.clone()
    }

    pub fn written_bytes(&self) -> usize {
        self.shared.lock().data.len()
    }
}

impl AudioSink for MockSink {
    fn frames_consumed(&self) -> u64 {
        self.shared.lock().consumed
    }

    fn frame_capacity(&self) -> u64 {
        self.shared.lock().capacity
    }

    fn frame_size_bytes(&self) -> usize {
        usize::from(self.shared.lock().channels) * 2
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        let mut sh = self.shared.lock();
        let accept = match sh.short_next.take() {
            Some(cap) => bytes.len().min(cap),
            None => bytes.len(),
        };
        sh.writes.push(accept);
        sh.data.extend_from_slice(&bytes[..accept]);
        Ok(accept)
    }

    fn start(&mut self) -> Result<(), SinkError> {
        self.shared.lock().started = true;
        Ok(())
    }

    fn stopped(&self) -> bool {
        !self.shared.lock().started
    }
}

/// Sink factory recording every sink it creates, in creation order.
pub fn mock_sink_factory(capacity: u64) -> (SinkFactory, Arc<Mutex<Vec<MockSinkHandle>>>) {
    let created: Arc<Mutex<Vec<MockSinkHandle>>> = Arc::new(Mutex::new(Vec::new()));
    let created_in = Arc::clone(&created);

    let factory: SinkFactory = Box::new(move |sample_rate, channels| {
        let sink = MockSink::new(sample_rate, channels, capacity);
        created_in.lock().push(sink.handle());
        Ok(Box::new(sink))
    });

    (factory, created)
}

// ---------------------------------------------------------------------------
// Surface and listener
// ---------------------------------------------------------------------------

/// Render target that ignores everything.
pub struct NullSurface;

impl VideoSurface for NullSurface {}

/// Listener counting first-frame notifications.
#[derive(Default)]
pub struct CountingListener {
    pub fires: AtomicUsize,
}

impl EventListener for CountingListener {
    fn on_first_frame_available(&self) {
        self.fires.fetch_add(1, Ordering::SeqCst);
    }
}
