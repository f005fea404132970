use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct CountdownTimer {
    total: Duration,
    remaining: Duration,
    running: bool,
    finished: bool,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Only takes effect while nothing is counting down.
    pub fn set(&mut self, hours: u64, minutes: u64, seconds: u64) -> bool {
        if self.running || !self.remaining.is_zero() || self.finished {
            return false;
        }
        let secs = hours
            .saturating_mul(3_600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(seconds);
        self.total = Duration::from_secs(secs);
        true
    }

    /// Starts a fresh countdown from the configured total, or resumes a
    /// paused one. Returns whether the timer is now running.
    pub fn start(&mut self) -> bool {
        if self.remaining.is_zero() && !self.finished {
            if self.total.is_zero() {
                return false;
            }
            self.remaining = self.total;
            self.running = true;
        } else if !self.remaining.is_zero() {
            self.running = true;
        }
        self.running
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns true exactly once, on the call that reaches zero.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        if !self.running {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.running = false;
            self.finished = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_to_finish_once() {
        let mut timer = CountdownTimer::new();
        assert!(timer.set(0, 0, 3));
        assert!(timer.start());

        assert!(!timer.advance(Duration::from_secs(1)));
        assert_eq!(timer.remaining(), Duration::from_secs(2));
        assert!(!timer.advance(Duration::from_secs(1)));
        assert!(timer.advance(Duration::from_secs(1)));
        assert!(timer.is_finished());
        assert!(!timer.is_running());
        assert!(!timer.advance(Duration::from_secs(1)));
    }

    #[test]
    fn zero_total_does_not_start() {
        let mut timer = CountdownTimer::new();
        assert!(!timer.start());
        assert!(!timer.is_running());
    }

    #[test]
    fn pause_and_resume_keep_remaining() {
        let mut timer = CountdownTimer::new();
        timer.set(0, 1, 0);
        timer.start();
        timer.advance(Duration::from_secs(15));
        timer.pause();
        assert!(!timer.advance(Duration::from_secs(30)));
        assert_eq!(timer.remaining(), Duration::from_secs(45));

        assert!(!timer.set(0, 0, 5), "cannot reconfigure a paused countdown");
        assert!(timer.start());
        assert_eq!(timer.remaining(), Duration::from_secs(45));
    }

    #[test]
    fn finished_timer_needs_reset() {
        let mut timer = CountdownTimer::new();
        timer.set(0, 0, 1);
        timer.start();
        timer.advance(Duration::from_secs(2));
        assert!(!timer.start());

        timer.reset();
        assert_eq!(timer.total(), Duration::ZERO);
        assert!(!timer.is_finished());
        assert!(timer.set(1, 0, 0));
        assert!(timer.start());
        assert_eq!(timer.remaining(), Duration::from_secs(3_600));
    }
}
