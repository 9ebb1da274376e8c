//! Adaptive request pacing.
//!
//! Every round trip feeds an exponentially weighted moving average of the
//! observed latency. When the smoothed latency overshoots the target pull
//! interval by more than [`THRESHOLD_MS`], the controller reports the session
//! as degraded and, if corrective action is enabled, issues one correction
//! and clears the average so it does not fire again on the next sample.
//!
//! This is a single-step corrective loop, not an integrator: nothing ensures
//! convergence if the overshoot persists after a correction.

use serde::{Deserialize, Serialize};

/// Weight kept by the previous smoothed value on every observation.
pub const DECAY: f64 = 0.95;
/// Tolerated overshoot above the target interval, in milliseconds.
pub const THRESHOLD_MS: f64 = 10.0;

/// How a corrective action trades off against the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionPolicy {
    /// Slow the pull cadence to `round(target + overshoot)`.
    IncreaseInterval,
    /// Keep the total window time and retain fewer lines instead.
    ReduceLines,
}

/// Mutation requested by the controller. The session applies it through its
/// recomputation pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    SetInterval(f64),
    SetNumLines(usize),
}

/// Result of a single observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub overshoot: f64,
    pub degraded: bool,
    /// Whether the degraded flag flipped on this observation.
    pub changed: bool,
    pub correction: Option<Correction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacingController {
    target_interval: f64,
    smoothed_delta: f64,
    degraded: bool,
    enabled: bool,
    policy: CorrectionPolicy,
}

impl PacingController {
    /// Creates a controller whose average starts at the target interval, so a
    /// backend keeping pace never registers an overshoot while warming up.
    pub fn new(target_interval: f64, policy: CorrectionPolicy) -> Self {
        Self {
            target_interval,
            smoothed_delta: target_interval,
            degraded: false,
            enabled: true,
            policy,
        }
    }

    pub fn target_interval(&self) -> f64 {
        self.target_interval
    }

    pub fn set_target_interval(&mut self, interval: f64) {
        self.target_interval = interval;
    }

    pub fn smoothed_delta(&self) -> f64 {
        self.smoothed_delta
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> CorrectionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: CorrectionPolicy) {
        self.policy = policy;
    }

    /// Turns corrective action on or off. Either way the average restarts
    /// from zero.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.smoothed_delta = 0.0;
    }

    /// Feeds one round-trip time in milliseconds. `duration` is the total
    /// window time used by [`CorrectionPolicy::ReduceLines`].
    pub fn observe(&mut self, delta: f64, duration: f64) -> Verdict {
        self.smoothed_delta = self.smoothed_delta * DECAY + delta * (1.0 - DECAY);
        let overshoot = self.smoothed_delta - self.target_interval;
        let was_degraded = self.degraded;

        let mut correction = None;
        if overshoot > THRESHOLD_MS {
            self.degraded = true;
            if self.enabled {
                correction = Some(self.correct(overshoot, duration));
                self.smoothed_delta = 0.0;
            }
        } else {
            self.degraded = false;
        }

        Verdict {
            overshoot,
            degraded: self.degraded,
            changed: was_degraded != self.degraded,
            correction,
        }
    }

    fn correct(&self, overshoot: f64, duration: f64) -> Correction {
        match self.policy {
            CorrectionPolicy::IncreaseInterval => {
                Correction::SetInterval((self.target_interval + overshoot).round())
            }
            CorrectionPolicy::ReduceLines => {
                let lines = (duration / (self.target_interval + overshoot)).round();
                Correction::SetNumLines(if lines.is_finite() && lines >= 1.0 {
                    lines as usize
                } else {
                    1
                })
            }
        }
    }
}
