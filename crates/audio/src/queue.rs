//! Bounded blocking PCM frame queue with an explicit stop sentinel.
//!
//! Producer/consumer handoff between the playback worker and the audio
//! output thread. The queue is a bounded channel of byte frames: the
//! producer blocks when the consumer falls behind (backpressure instead of
//! unbounded memory), and the consumer blocks when starved instead of
//! busy-waiting. Shutdown is an in-band `Stop` sentinel, so every frame
//! queued before the stop is still delivered, and there is no wait/notify
//! pair to lose a wakeup on.

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

enum Item {
    Frame(Vec<u8>),
    Stop,
}

/// Constructor namespace for the queue halves.
pub struct PcmQueue;

impl PcmQueue {
    /// Create a queue holding at most `capacity` frames in flight.
    pub fn bounded(capacity: usize) -> (PcmProducer, PcmConsumer) {
        let (tx, rx) = bounded(capacity);
        (
            PcmProducer { tx },
            PcmConsumer { rx, stopped: false },
        )
    }
}

/// Sending half: owned by the frame producer.
pub struct PcmProducer {
    tx: Sender<Item>,
}

impl PcmProducer {
    /// Enqueue a frame, blocking while the queue is full.
    ///
    /// Returns the frame back if the consumer is gone.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), Vec<u8>> {
        self.tx.send(Item::Frame(frame)).map_err(|e| match e.0 {
            Item::Frame(f) => f,
            Item::Stop => unreachable!("only frames are sent through send()"),
        })
    }

    /// Enqueue a frame without blocking; returns it back when the queue is
    /// full or the consumer is gone.
    pub fn try_send(&self, frame: Vec<u8>) -> Result<(), Vec<u8>> {
        self.tx
            .try_send(Item::Frame(frame))
            .map_err(|e| match e {
                TrySendError::Full(Item::Frame(f)) => f,
                TrySendError::Disconnected(Item::Frame(f)) => f,
                _ => unreachable!("only frames are sent through try_send()"),
            })
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// End the stream. Frames already queued are still delivered; after the
    /// consumer drains them it observes the stop and reads `None` forever.
    ///
    /// Best-effort when the queue is full: dropping the producer disconnects
    /// the channel, which the consumer treats the same way.
    pub fn stop(self) {
        let _ = self.tx.try_send(Item::Stop);
        // tx drops here; a full queue falls back to disconnection
    }
}

/// Receiving half: owned by the frame consumer.
pub struct PcmConsumer {
    rx: Receiver<Item>,
    stopped: bool,
}

impl PcmConsumer {
    /// Dequeue the next frame, blocking while the queue is empty.
    ///
    /// Returns `None` once the stream has stopped and the backlog is drained.
    pub fn recv(&mut self) -> Option<Vec<u8>> {
        if self.stopped {
            return None;
        }
        match self.rx.recv() {
            Ok(Item::Frame(frame)) => Some(frame),
            Ok(Item::Stop) | Err(_) => {
                self.stopped = true;
                None
            }
        }
    }

    /// Dequeue the next frame without blocking.
    ///
    /// Returns `None` when the queue is momentarily empty as well as after a
    /// stop; use [`is_stopped`](Self::is_stopped) to tell the two apart.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        if self.stopped {
            return None;
        }
        match self.rx.try_recv() {
            Ok(Item::Frame(frame)) => Some(frame),
            Ok(Item::Stop) | Err(TryRecvError::Disconnected) => {
                self.stopped = true;
                None
            }
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Whether the stream has ended (stop sentinel seen or producer gone).
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}
