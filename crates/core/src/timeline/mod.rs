use std::{future, time::Duration};

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Converts a period in milliseconds into a timer duration. Non-finite or
/// sub-millisecond periods are clamped to one millisecond.
pub fn period_from_ms(interval_ms: f64) -> Duration {
    if interval_ms.is_finite() && interval_ms >= 1.0 {
        Duration::from_secs_f64(interval_ms / 1000.0)
    } else {
        Duration::from_millis(1)
    }
}

/// The single scheduled pull loop. At most one interval is ever installed;
/// starting again replaces it.
#[derive(Debug, Default)]
pub struct PullTimer {
    interval: Option<Interval>,
    installs: u64,
    cancellations: u64,
}

impl PullTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.interval.as_ref().map(Interval::period)
    }

    /// Number of intervals installed so far.
    pub fn installs(&self) -> u64 {
        self.installs
    }

    /// Number of pending intervals cancelled so far.
    pub fn cancellations(&self) -> u64 {
        self.cancellations
    }

    /// Cancels the pending interval, if any, then installs a new one whose
    /// first tick fires one period from now.
    pub fn start(&mut self, period: Duration) {
        self.stop();
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.installs += 1;
    }

    /// Cancels the pending interval. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            self.cancellations += 1;
        }
    }

    /// Waits for the next tick; never resolves while stopped.
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_unusable_periods() {
        assert_eq!(period_from_ms(50.0), Duration::from_millis(50));
        assert_eq!(period_from_ms(f64::NAN), Duration::from_millis(1));
        assert_eq!(period_from_ms(f64::INFINITY), Duration::from_millis(1));
        assert_eq!(period_from_ms(0.2), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_the_pending_interval() {
        let mut timer = PullTimer::new();
        timer.stop();
        assert_eq!(timer.cancellations(), 0);

        timer.start(Duration::from_millis(50));
        timer.start(Duration::from_millis(100));
        assert_eq!(timer.installs(), 2);
        assert_eq!(timer.cancellations(), 1);
        assert_eq!(timer.period(), Some(Duration::from_millis(100)));

        let begin = Instant::now();
        timer.tick().await;
        assert_eq!(begin.elapsed(), Duration::from_millis(100));

        timer.stop();
        timer.stop();
        assert!(!timer.is_active());
        assert_eq!(timer.cancellations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_ticks() {
        let mut timer = PullTimer::new();
        let outcome = time::timeout(Duration::from_secs(5), timer.tick()).await;
        assert!(outcome.is_err());
    }
}
