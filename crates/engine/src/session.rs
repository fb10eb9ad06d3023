//! Player session: command state machine and the per-tick pipeline.
//!
//! A session moves through `Uninitialized → Unprepared → Stopped → Started`
//! under the command protocol, and while started executes one tick at a
//! time:
//!
//! 1. collect freed decoder input slots per track
//! 2. prefetch compressed samples under the lookahead cap
//! 3. feed available input slots from the prefetch queues
//! 4. drain completed output slots, watching for format and pool changes
//! 5. schedule pending outputs against the presentation clock reference,
//!    rendering, deferring, or dropping each, and pushing audio to the
//!    sink under backpressure
//!
//! The session is single-threaded and deterministic: time comes from the
//! injected [`Clock`], and the caller (normally the [`Player`] worker,
//! a test otherwise) decides when ticks happen. A tick carries the
//! generation it was scheduled under and does nothing if a stop has
//! advanced the session's generation since.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use pm_media::{
    BufferFlags, CodecError, DecoderFactory, Demuxer, DemuxError, FormatParams, OutputBufferInfo,
    OutputEvent, SinkFactory, TrackKind, VideoSurface,
};

use crate::clock::Clock;
use crate::config::PlayerConfig;
use crate::error::{PlayerError, PlayerResult};
use crate::track::{CodecSession, TrackOutput};

/// Lifecycle state of a session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No source set.
    Uninitialized,
    /// Source set, tracks not yet claimed.
    Unprepared,
    /// Tracks claimed and decoders running, playback idle.
    Stopped,
    /// Tick pipeline active.
    Started,
}

/// Result of one pipeline tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// The tick was scheduled under an old generation and did nothing.
    Stale,
    /// Every track reached end of stream; the session has settled as if
    /// stopped and no further tick should be scheduled.
    Finished,
}

/// Session event callbacks, invoked synchronously from the worker.
pub trait EventListener: Send + Sync {
    /// The first video frame of the session was rendered. At most once per
    /// session.
    fn on_first_frame_available(&self);
}

/// Whether an audio delivery finished the descriptor or left a remainder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Delivery {
    Complete,
    Blocked,
}

/// The playback core for one media source.
pub struct PlayerSession {
    config: PlayerConfig,
    clock: Arc<dyn Clock>,
    decoder_factory: DecoderFactory,
    sink_factory: SinkFactory,

    state: SessionState,
    demuxer: Option<Box<dyn Demuxer>>,
    surface: Option<Arc<dyn VideoSurface>>,
    listener: Option<Weak<dyn EventListener>>,

    tracks: Vec<CodecSession>,
    /// One bit per claimed track (by slot position); cleared when that
    /// track's output reports end of stream.
    eos_mask: u32,
    /// Invalidates scheduled ticks; bumped on every start and stop.
    generation: u64,
    /// Wall-clock reference all presentation timestamps are measured
    /// against. Established on the first tick after start, cleared on stop.
    start_time_real_us: Option<i64>,
    /// The demuxer has no more samples for any track.
    input_exhausted: bool,
    first_frame_rendered: bool,
}

impl PlayerSession {
    pub fn new(
        config: PlayerConfig,
        clock: Arc<dyn Clock>,
        decoder_factory: DecoderFactory,
        sink_factory: SinkFactory,
    ) -> Self {
        Self {
            config,
            clock,
            decoder_factory,
            sink_factory,
            state: SessionState::Uninitialized,
            demuxer: None,
            surface: None,
            listener: None,
            tracks: Vec::new(),
            eos_mask: 0,
            generation: 0,
            start_time_real_us: None,
            input_exhausted: false,
            first_frame_rendered: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Generation ticks must currently carry to take effect.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Attach an opened source. Valid only before any source was set.
    pub fn set_source(&mut self, demuxer: Box<dyn Demuxer>) -> PlayerResult<()> {
        if self.state != SessionState::Uninitialized {
            return Err(PlayerError::InvalidOperation(self.state));
        }
        self.demuxer = Some(demuxer);
        self.state = SessionState::Unprepared;
        info!("source set");
        Ok(())
    }

    /// Attach (or clear) the video render target. Valid only between
    /// setting the source and preparing.
    pub fn set_target(&mut self, surface: Option<Arc<dyn VideoSurface>>) -> PlayerResult<()> {
        if self.state != SessionState::Unprepared {
            return Err(PlayerError::InvalidOperation(self.state));
        }
        self.surface = surface;
        Ok(())
    }

    /// Register the event listener. Held weakly; accepted in any state.
    pub fn set_listener(&mut self, listener: Weak<dyn EventListener>) {
        self.listener = Some(listener);
    }

    /// Claim tracks and bring their decoders up.
    pub fn prepare(&mut self) -> PlayerResult<()> {
        if self.state != SessionState::Unprepared {
            return Err(PlayerError::InvalidOperation(self.state));
        }
        match self.prepare_tracks() {
            Ok(()) => {
                self.state = SessionState::Stopped;
                Ok(())
            }
            Err(err) => {
                // Leave the session exactly as it was before the attempt.
                self.teardown_tracks();
                Err(err)
            }
        }
    }

    /// Begin playback, preparing first if necessary. Returns the generation
    /// ticks must be scheduled under.
    pub fn start(&mut self) -> PlayerResult<u64> {
        if self.state == SessionState::Unprepared {
            self.prepare()?;
        }
        if self.state != SessionState::Stopped {
            return Err(PlayerError::InvalidOperation(self.state));
        }
        self.start_time_real_us = None;
        self.generation += 1;
        self.state = SessionState::Started;
        info!(generation = self.generation, "session started");
        Ok(self.generation)
    }

    /// Halt playback. Scheduled ticks become stale rather than being
    /// cancelled.
    pub fn stop(&mut self) -> PlayerResult<()> {
        if self.state != SessionState::Started {
            return Err(PlayerError::InvalidOperation(self.state));
        }
        self.settle();
        info!("session stopped");
        Ok(())
    }

    /// Release everything and return to `Uninitialized`. Accepted in any
    /// state; idempotent.
    pub fn reset(&mut self) -> PlayerResult<()> {
        if self.state == SessionState::Started {
            self.settle();
        }
        self.teardown_tracks();
        self.demuxer = None;
        self.surface = None;
        self.input_exhausted = false;
        self.first_frame_rendered = false;
        self.state = SessionState::Uninitialized;
        info!("session reset");
        Ok(())
    }

    /// Force the session out of `Started` after a tick error.
    pub fn fault_stop(&mut self) {
        if self.state == SessionState::Started {
            self.settle();
        }
    }

    /// Common stop path: invalidate scheduled ticks and clear the
    /// presentation reference.
    fn settle(&mut self) {
        self.generation += 1;
        self.start_time_real_us = None;
        self.state = SessionState::Stopped;
    }

    fn prepare_tracks(&mut self) -> PlayerResult<()> {
        let Some(demuxer) = self.demuxer.as_mut() else {
            return Err(PlayerError::InvalidOperation(self.state));
        };

        let mut have_audio = false;
        let mut have_video = false;
        let mut csd_by_slot: Vec<Vec<Vec<u8>>> = Vec::new();

        for track in 0..demuxer.track_count() {
            let format = demuxer.track_format(track)?;
            let kind = format.kind();
            // First stream of each kind wins; the rest are ignored.
            match kind {
                TrackKind::Audio if !have_audio => have_audio = true,
                TrackKind::Video if !have_video => have_video = true,
                _ => continue,
            }

            demuxer.select_track(track)?;

            let surface = match kind {
                TrackKind::Video => self.surface.clone(),
                TrackKind::Audio => None,
            };
            let mut decoder = (self.decoder_factory)(&format, surface.clone())?;
            decoder.configure(&format, surface)?;

            let slot = self.tracks.len();
            self.eos_mask |= 1 << slot;
            info!(track, kind = kind.label(), mime = format.mime.as_str(), "track claimed");

            csd_by_slot.push(format.csd);
            self.tracks.push(CodecSession::new(track, kind, decoder));
        }

        if self.tracks.is_empty() {
            return Err(DemuxError::NoTracks.into());
        }

        for (cs, csd) in self.tracks.iter_mut().zip(csd_by_slot) {
            cs.decoder.start()?;
            cs.input_slot_count = cs.decoder.input_slot_count();
            cs.output_slot_count = cs.decoder.output_slot_count();

            for blob in csd {
                let index = cs
                    .decoder
                    .try_dequeue_input_slot()
                    .ok_or(CodecError::NoConfigSlot)?;
                cs.decoder
                    .queue_input_slot(index, &blob, 0, BufferFlags::CODEC_CONFIG)?;
            }
        }

        Ok(())
    }

    fn teardown_tracks(&mut self) {
        for cs in &mut self.tracks {
            cs.decoder.release();
        }
        self.tracks.clear();
        self.eos_mask = 0;
    }

    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    /// Run one pipeline pass. `generation` is the value [`start`](Self::start)
    /// returned when this tick was scheduled.
    pub fn tick(&mut self, generation: u64) -> PlayerResult<TickOutcome> {
        if generation != self.generation || self.state != SessionState::Started {
            trace!(generation, current = self.generation, "stale tick ignored");
            return Ok(TickOutcome::Stale);
        }

        self.refresh_input_slots();
        self.prefetch_samples()?;
        self.feed_decoders()?;
        self.drain_outputs()?;

        let now_us = self.clock.now_us();
        if self.start_time_real_us.is_none() {
            let reference = now_us + self.config.start_lead_us;
            debug!(reference_us = reference, "presentation clock reference established");
            self.start_time_real_us = Some(reference);
        }

        if self.present_outputs(now_us)? {
            info!("all tracks reached end of stream, settling");
            self.settle();
            return Ok(TickOutcome::Finished);
        }
        Ok(TickOutcome::Continue)
    }

    /// Collect every input slot the decoders have freed since last tick.
    fn refresh_input_slots(&mut self) {
        for cs in &mut self.tracks {
            while let Some(index) = cs.decoder.try_dequeue_input_slot() {
                debug_assert!(index < cs.input_slot_count);
                debug_assert!(!cs.avail_inputs.contains(&index));
                trace!(track = cs.track_index, index, "input slot available");
                cs.avail_inputs.push_back(index);
            }
        }
    }

    /// Read ahead from the demuxer, at most one sample per claimed track per
    /// tick, while the owning track's queue is below the lookahead cap. The
    /// demuxer decides the interleave; a full queue at the read head pauses
    /// prefetching entirely until feeding drains it.
    fn prefetch_samples(&mut self) -> PlayerResult<()> {
        if self.input_exhausted {
            return Ok(());
        }
        let Some(demuxer) = self.demuxer.as_mut() else {
            return Ok(());
        };
        let cap = self.config.lookahead_cap;

        for _ in 0..self.tracks.len() {
            let Some(track) = demuxer.next_sample_track() else {
                info!("demuxer input exhausted");
                self.input_exhausted = true;
                break;
            };

            let Some(cs) = self.tracks.iter_mut().find(|c| c.track_index == track) else {
                // Contract violation by the demuxer, but not worth a fault.
                warn!(track, "sample for unclaimed track, skipping");
                demuxer.advance();
                continue;
            };

            if cs.pending_samples.len() >= cap {
                break;
            }

            let mut data = Vec::with_capacity(demuxer.sample_size());
            demuxer.read_sample_into(&mut data)?;
            let pts_us = demuxer.sample_timestamp_us();
            cs.pending_samples.push_back(pm_media::Sample { data, pts_us });
            trace!(
                track,
                pts_us,
                queued = cs.pending_samples.len(),
                "sample prefetched"
            );
            demuxer.advance();
        }
        Ok(())
    }

    /// Pair prefetched samples with available input slots, oldest with
    /// oldest. Once the source is exhausted, each track queues a single
    /// end-of-stream marker in place of a sample.
    fn feed_decoders(&mut self) -> PlayerResult<()> {
        let exhausted = self.input_exhausted;
        for cs in &mut self.tracks {
            loop {
                let Some(&slot) = cs.avail_inputs.front() else {
                    trace!(track = cs.track_index, "no input slot, feeding waits");
                    break;
                };

                if let Some(sample) = cs.pending_samples.pop_front() {
                    cs.avail_inputs.pop_front();
                    cs.decoder
                        .queue_input_slot(slot, &sample.data, sample.pts_us, BufferFlags::NONE)?;
                    trace!(track = cs.track_index, pts_us = sample.pts_us, "input queued");
                } else if exhausted && !cs.eos_marker_sent {
                    cs.avail_inputs.pop_front();
                    cs.decoder
                        .queue_input_slot(slot, &[], 0, BufferFlags::END_OF_STREAM)?;
                    cs.eos_marker_sent = true;
                    info!(
                        track = cs.track_index,
                        kind = cs.kind.label(),
                        "end-of-stream marker queued"
                    );
                    break;
                } else {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Move completed output slots into the pending queues, reacting to
    /// format and slot-pool changes along the way.
    fn drain_outputs(&mut self) -> PlayerResult<()> {
        let sink_factory = &mut self.sink_factory;
        for cs in &mut self.tracks {
            loop {
                match cs.decoder.dequeue_output_slot() {
                    Ok(OutputEvent::Frame(info)) => {
                        trace!(
                            track = cs.track_index,
                            index = info.index,
                            pts_us = info.pts_us,
                            size = info.size,
                            "output ready"
                        );
                        cs.pending_outputs.push_back(info);
                    }
                    Ok(OutputEvent::FormatChanged) => {
                        let format = cs.decoder.output_format()?;
                        info!(
                            track = cs.track_index,
                            mime = format.mime.as_str(),
                            "output format changed"
                        );
                        if let FormatParams::Audio {
                            sample_rate,
                            channels,
                        } = format.params
                        {
                            let sink = (sink_factory)(sample_rate, channels)?;
                            cs.output = TrackOutput::Audio {
                                sink: Some(sink),
                                frames_submitted: 0,
                            };
                        }
                    }
                    Ok(OutputEvent::SlotsChanged) => {
                        cs.output_slot_count = cs.decoder.output_slot_count();
                        debug!(
                            track = cs.track_index,
                            slots = cs.output_slot_count,
                            "output slot pool changed"
                        );
                    }
                    Ok(OutputEvent::WouldBlock) => break,
                    Err(err) => {
                        // Treated as nothing-ready, but made visible: the
                        // decoder gets polled again next tick.
                        warn!(track = cs.track_index, error = %err, "output drain failed");
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk each track's pending outputs in order, deciding drop / defer /
    /// render per descriptor. Returns true when the last track's
    /// end-of-stream flag clears.
    fn present_outputs(&mut self, now_us: i64) -> PlayerResult<bool> {
        let Some(start_ref) = self.start_time_real_us else {
            return Ok(false);
        };
        let drop_threshold = self.config.drop_threshold_us;
        let early_threshold = self.config.early_threshold_us;

        for (slot, cs) in self.tracks.iter_mut().enumerate() {
            while let Some(&head) = cs.pending_outputs.front() {
                let mut info = head;

                if info.flags.contains(BufferFlags::END_OF_STREAM) {
                    let bit = 1u32 << slot;
                    if self.eos_mask & bit != 0 {
                        self.eos_mask &= !bit;
                        info!(
                            track = cs.track_index,
                            kind = cs.kind.label(),
                            remaining = self.eos_mask,
                            "track output reached end of stream"
                        );
                        if self.eos_mask == 0 {
                            return Ok(true);
                        }
                    }
                }

                let late_us = now_us - (info.pts_us + start_ref);

                if late_us <= -early_threshold {
                    trace!(
                        track = cs.track_index,
                        early_us = -late_us,
                        "output early, deferring track"
                    );
                    break;
                }

                if late_us > drop_threshold {
                    info!(
                        track = cs.track_index,
                        kind = cs.kind.label(),
                        late_us,
                        "output late, dropping"
                    );
                    cs.decoder.release_output_slot(info.index, false)?;
                    cs.pending_outputs.pop_front();
                    continue;
                }

                // In the render window. Delivery keys off sink presence,
                // not track kind: a track only gets a sink once its output
                // format turned out to be audio.
                let has_sink = matches!(cs.output, TrackOutput::Audio { sink: Some(_), .. });
                if has_sink {
                    match deliver_audio(cs, &mut info)? {
                        Delivery::Complete => {
                            cs.decoder.release_output_slot(info.index, false)?;
                            cs.pending_outputs.pop_front();
                        }
                        Delivery::Blocked => {
                            // Leave the (possibly shrunk) remainder at the
                            // head; the sink needs to drain first.
                            if let Some(front) = cs.pending_outputs.front_mut() {
                                *front = info;
                            }
                            break;
                        }
                    }
                } else if cs.kind == TrackKind::Video {
                    cs.decoder.release_output_slot(info.index, true)?;
                    cs.pending_outputs.pop_front();
                    if !self.first_frame_rendered {
                        self.first_frame_rendered = true;
                        debug!("first video frame rendered");
                        if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
                            listener.on_first_frame_available();
                        }
                    }
                } else {
                    // Audio output before any format notification; nothing
                    // to deliver into yet.
                    cs.decoder.release_output_slot(info.index, false)?;
                    cs.pending_outputs.pop_front();
                }
            }
        }
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Test introspection
    // -----------------------------------------------------------------------

    #[cfg(test)]
    pub(crate) fn track_state(&self, slot: usize) -> &CodecSession {
        &self.tracks[slot]
    }

    #[cfg(test)]
    pub(crate) fn track_count(&self) -> usize {
        self.tracks.len()
    }

    #[cfg(test)]
    pub(crate) fn eos_mask(&self) -> u32 {
        self.eos_mask
    }

    #[cfg(test)]
    pub(crate) fn input_exhausted(&self) -> bool {
        self.input_exhausted
    }

    #[cfg(test)]
    pub(crate) fn clock_reference_us(&self) -> Option<i64> {
        self.start_time_real_us
    }
}

/// Push one descriptor's bytes into the track's sink, as far as the sink's
/// free capacity allows. Mutates `info` to account for what was written.
fn deliver_audio(cs: &mut CodecSession, info: &mut OutputBufferInfo) -> PlayerResult<Delivery> {
    let TrackOutput::Audio {
        sink,
        frames_submitted,
    } = &mut cs.output
    else {
        return Ok(Delivery::Complete);
    };
    let Some(sink) = sink.as_mut() else {
        return Ok(Delivery::Complete);
    };

    if sink.stopped() {
        sink.start()?;
    }

    let frame_size = sink.frame_size_bytes() as u64;
    let consumed = sink.frames_consumed();
    let in_flight = frames_submitted.saturating_sub(consumed);
    let avail_frames = sink.frame_capacity().saturating_sub(in_flight);
    let avail_bytes = (avail_frames * frame_size) as usize;

    let len = info.size.min(avail_bytes);
    if len == 0 {
        trace!(track = cs.track_index, "sink full, delivery waits");
        return Ok(Delivery::Blocked);
    }

    let data = cs.decoder.output_slot_data(info.index);
    let write_started = Instant::now();
    let written = sink.write(&data[info.offset..info.offset + len])?;
    if written != len {
        return Err(PlayerError::ShortWrite {
            requested: len,
            written,
        });
    }
    let elapsed = write_started.elapsed();
    if elapsed > Duration::from_millis(2) {
        warn!(
            elapsed_us = elapsed.as_micros() as u64,
            written, "slow audio sink write"
        );
    }

    info.offset += written;
    info.size -= written;
    *frames_submitted += written as u64 / frame_size;
    trace!(
        track = cs.track_index,
        written,
        remaining = info.size,
        submitted = *frames_submitted,
        "audio delivered"
    );

    Ok(if info.size == 0 {
        Delivery::Complete
    } else {
        Delivery::Blocked
    })
}
