use serde::{Deserialize, Serialize};

/// Countdown for the active phase.
///
/// Every phase change re-arms the clock under a new epoch. A deadline callback
/// scheduled for an older epoch no longer matches and must be dropped, so a
/// stale timer can never expire a phase it was not armed for.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseClock {
    pub epoch: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

impl PhaseClock {
    pub fn arm(&mut self, seconds: Option<u32>) {
        self.epoch = self.epoch.wrapping_add(1);
        self.remaining = seconds;
    }

    pub fn is_current(&self, epoch: u32) -> bool {
        self.epoch == epoch
    }

    /// Counts down; returns true exactly once, when the deadline is reached.
    pub fn tick(&mut self, seconds: u32) -> bool {
        match self.remaining {
            Some(0) | None => false,
            Some(left) => {
                let left = left.saturating_sub(seconds);
                self.remaining = Some(left);
                left == 0
            }
        }
    }
}
