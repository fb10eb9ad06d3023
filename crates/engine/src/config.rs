//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pacing and scheduling parameters for a player session.
///
/// The defaults are the engine's reference behavior; embedders normally only
/// touch these in tests or on unusually slow targets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Maximum compressed samples buffered ahead of the decoder, per track.
    pub lookahead_cap: usize,
    /// Interval between pipeline ticks, in microseconds.
    pub tick_interval_us: u64,
    /// Frames later than this are dropped instead of rendered, microseconds.
    pub drop_threshold_us: i64,
    /// Frames earlier than this wait for a later tick, microseconds.
    pub early_threshold_us: i64,
    /// Lead added to the wall clock when the presentation reference is
    /// established, giving the pipeline a head start, microseconds.
    pub start_lead_us: i64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            lookahead_cap: 10,
            tick_interval_us: 5_000,
            drop_threshold_us: 50_000,
            early_threshold_us: 10_000,
            start_lead_us: 100_000,
        }
    }
}

impl PlayerConfig {
    /// Tick interval as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(self.tick_interval_us)
    }
}
