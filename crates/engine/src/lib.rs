//! `pm-engine` — The demux–decode–present synchronization core of Playmill.
//!
//! A [`Player`] owns one worker thread running a [`PlayerSession`]: a
//! multi-track state machine that prefetches compressed samples under a
//! bounded lookahead, keeps decoder buffer pools fed and drained, and
//! schedules every decoded frame against a wall-clock reference — rendering
//! it, deferring it, or dropping it depending on how late it is. Audio
//! frames flow to the sink under explicit backpressure; end-of-stream is
//! tracked per track and for the whole session.
//!
//! # Architecture
//!
//! ```text
//! caller threads              worker thread ("player-worker")
//! ┌───────────────┐  mailbox  ┌──────────────────────────────┐
//! │ set_source()  │ ──cmds──► │ PlayerSession                │
//! │ prepare()     │ ◄─reply── │   tick: prefetch -> feed ->  │
//! │ start()/stop()│           │   drain -> schedule -> audio │
//! └───────────────┘   timer──►│   (generation-guarded)       │
//!                             └──────────────────────────────┘
//! ```
//!
//! Commands are processed strictly in submission order; callers block until
//! their command's outcome is committed. While the session is started, a
//! one-shot timer re-arms after every tick. Stopping bumps a generation
//! counter instead of cancelling the timer: a tick that fires under an old
//! generation is a no-op.
//!
//! The session core is deterministic — time comes from an injected
//! [`Clock`], so tests drive ticks by hand on a manual clock.

pub mod clock;
pub mod config;
pub mod error;
pub mod player;
pub mod session;

mod track;

#[cfg(test)]
pub(crate) mod testutil;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PlayerConfig;
pub use error::{PlayerError, PlayerResult};
pub use player::Player;
pub use session::{EventListener, PlayerSession, SessionState, TickOutcome};
