//! Player handle and worker thread.
//!
//! [`Player`] is the thread-safe front of one [`PlayerSession`]. Commands
//! are posted into a mailbox and processed strictly in submission order by
//! a dedicated worker thread; every call blocks on a one-shot reply channel
//! until the worker has committed the outcome, so callers observe
//! synchronous semantics over an asynchronous worker.
//!
//! While the session is started, the worker keeps a one-shot tick timer
//! armed. The timer message carries the generation it was armed under;
//! stopping bumps the session generation instead of cancelling the timer,
//! so a stale timer firing later is a no-op.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{after, bounded, never, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use pm_media::{DecoderFactory, Demuxer, SinkFactory, VideoSurface};

use crate::clock::{Clock, SystemClock};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, PlayerResult};
use crate::session::{EventListener, PlayerSession, SessionState, TickOutcome};

enum Command {
    SetSource(Box<dyn Demuxer>),
    SetTarget(Option<Arc<dyn VideoSurface>>),
    SetListener(Weak<dyn EventListener>),
    Prepare,
    Start,
    Stop,
    Reset,
}

enum Request {
    Command(Command, Sender<PlayerResult<()>>),
    Shutdown,
}

/// Status mirror the worker publishes after every command and tick, so
/// callers can observe state without a mailbox round-trip.
struct SharedStatus {
    state: Mutex<SessionState>,
    fault: Mutex<Option<String>>,
}

impl SharedStatus {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Uninitialized),
            fault: Mutex::new(None),
        }
    }
}

/// Handle to a playback session running on its own worker thread.
pub struct Player {
    tx: Sender<Request>,
    shared: Arc<SharedStatus>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Player {
    /// Spawn a player on the real clock.
    pub fn new(
        config: PlayerConfig,
        decoder_factory: DecoderFactory,
        sink_factory: SinkFactory,
    ) -> PlayerResult<Self> {
        Self::with_clock(
            config,
            decoder_factory,
            sink_factory,
            Arc::new(SystemClock::new()),
        )
    }

    /// Spawn a player reading time from the given clock.
    pub fn with_clock(
        config: PlayerConfig,
        decoder_factory: DecoderFactory,
        sink_factory: SinkFactory,
        clock: Arc<dyn Clock>,
    ) -> PlayerResult<Self> {
        let (tx, rx) = unbounded();
        let shared = Arc::new(SharedStatus::new());
        let shared_worker = Arc::clone(&shared);
        let tick_interval = config.tick_interval();

        let worker = thread::Builder::new()
            .name("player-worker".to_string())
            .spawn(move || {
                let session = PlayerSession::new(config, clock, decoder_factory, sink_factory);
                Worker {
                    session,
                    rx,
                    shared: shared_worker,
                    tick_interval,
                    tick_timer: None,
                }
                .run();
            })?;

        Ok(Self {
            tx,
            shared,
            worker: Some(worker),
        })
    }

    // -----------------------------------------------------------------------
    // Command surface
    // -----------------------------------------------------------------------

    /// Attach an opened source.
    pub fn set_source(&self, demuxer: Box<dyn Demuxer>) -> PlayerResult<()> {
        self.command(Command::SetSource(demuxer))
    }

    /// Attach (or clear) the video render target.
    pub fn set_target(&self, surface: Option<Arc<dyn VideoSurface>>) -> PlayerResult<()> {
        self.command(Command::SetTarget(surface))
    }

    /// Register the event listener. Held weakly: dropping the listener Arc
    /// silences callbacks without unregistering.
    pub fn register_listener(&self, listener: &Arc<dyn EventListener>) -> PlayerResult<()> {
        self.command(Command::SetListener(Arc::downgrade(listener)))
    }

    /// Claim tracks and bring decoders up.
    pub fn prepare(&self) -> PlayerResult<()> {
        self.command(Command::Prepare)
    }

    /// Begin playback (preparing first if needed).
    pub fn start(&self) -> PlayerResult<()> {
        self.command(Command::Start)
    }

    /// Halt playback.
    pub fn stop(&self) -> PlayerResult<()> {
        self.command(Command::Stop)
    }

    /// Release everything and return to the uninitialized state.
    pub fn reset(&self) -> PlayerResult<()> {
        self.command(Command::Reset)
    }

    /// Last committed session state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Description of the fault that forced the session out of playback,
    /// if any.
    pub fn last_fault(&self) -> Option<String> {
        self.shared.fault.lock().clone()
    }

    fn command(&self, command: Command) -> PlayerResult<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(Request::Command(command, reply_tx))
            .map_err(|_| PlayerError::WorkerGone)?;
        reply_rx.recv().map_err(|_| PlayerError::WorkerGone)?
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.tx.send(Request::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    session: PlayerSession,
    rx: Receiver<Request>,
    shared: Arc<SharedStatus>,
    tick_interval: Duration,
    /// Armed one-shot timer plus the generation it fires under.
    tick_timer: Option<(Receiver<Instant>, u64)>,
}

impl Worker {
    fn run(mut self) {
        let rx = self.rx.clone();
        loop {
            let timer = match self.tick_timer {
                Some((ref t, _)) => t.clone(),
                None => never(),
            };

            crossbeam::select! {
                recv(rx) -> request => match request {
                    Ok(Request::Command(command, reply)) => {
                        let result = self.handle(command);
                        self.publish();
                        // Caller may have given up; nothing to do if so.
                        let _ = reply.send(result);
                    }
                    Ok(Request::Shutdown) | Err(_) => {
                        let _ = self.session.reset();
                        self.publish();
                        debug!("player worker shutting down");
                        break;
                    }
                },
                recv(timer) -> _ => {
                    self.fire_tick();
                    self.publish();
                }
            }
        }
    }

    fn handle(&mut self, command: Command) -> PlayerResult<()> {
        match command {
            Command::SetSource(demuxer) => self.session.set_source(demuxer),
            Command::SetTarget(surface) => self.session.set_target(surface),
            Command::SetListener(listener) => {
                self.session.set_listener(listener);
                Ok(())
            }
            Command::Prepare => self.session.prepare(),
            Command::Start => {
                let generation = self.session.start()?;
                // First tick runs as soon as the mailbox is drained.
                self.tick_timer = Some((after(Duration::ZERO), generation));
                Ok(())
            }
            Command::Stop => self.session.stop(),
            Command::Reset => self.session.reset(),
        }
    }

    fn fire_tick(&mut self) {
        let Some((_, generation)) = self.tick_timer.take() else {
            return;
        };
        match self.session.tick(generation) {
            Ok(TickOutcome::Continue) => {
                self.tick_timer = Some((after(self.tick_interval), generation));
            }
            Ok(TickOutcome::Stale) => {}
            Ok(TickOutcome::Finished) => {
                info!("playback finished");
            }
            Err(err) => {
                error!(error = %err, "tick failed, stopping session");
                self.session.fault_stop();
                *self.shared.fault.lock() = Some(err.to_string());
            }
        }
    }

    fn publish(&self) {
        *self.shared.state.lock() = self.session.state();
    }
}
