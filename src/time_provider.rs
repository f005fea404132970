use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

pub trait TimeProvider {
    fn now(&self) -> DateTime<Local>;
    fn label(&self) -> &'static str;
}

pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn label(&self) -> &'static str {
        "SYSTEM_LOCAL"
    }
}

/// Fixed-period deadline. A poll fires at most once and always reschedules
/// into the future, so periods missed while suspended are dropped rather
/// than replayed.
#[derive(Debug, Clone)]
pub struct Periodic {
    period: Duration,
    next_due: Instant,
}

impl Periodic {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            next_due: start,
        }
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        while self.next_due <= now {
            self.next_due += self.period;
        }
        true
    }
}

pub fn until_next(timers: &[&Periodic], now: Instant) -> Duration {
    timers
        .iter()
        .map(|timer| timer.next_due().saturating_duration_since(now))
        .min()
        .unwrap_or(Duration::ZERO)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_provider_moves_forward() {
        let provider = SystemTimeProvider;
        let first = provider.now();
        std::thread::sleep(Duration::from_millis(2));
        let second = provider.now();
        assert!(second >= first);
        assert_eq!(provider.label(), "SYSTEM_LOCAL");
    }

    #[test]
    fn periodic_fires_once_per_period() {
        let start = Instant::now();
        let mut timer = Periodic::new(Duration::from_secs(1), start);
        assert!(timer.poll(start));
        assert!(!timer.poll(start + Duration::from_millis(500)));
        assert!(timer.poll(start + Duration::from_millis(1_000)));
        assert_eq!(timer.next_due(), start + Duration::from_secs(2));
    }

    #[test]
    fn periodic_skips_missed_periods() {
        let start = Instant::now();
        let mut timer = Periodic::new(Duration::from_secs(1), start);
        assert!(timer.poll(start));

        let resumed = start + Duration::from_millis(120_500);
        assert!(timer.poll(resumed));
        assert!(!timer.poll(resumed));
        assert_eq!(timer.next_due(), start + Duration::from_secs(121));
    }

    #[test]
    fn until_next_picks_earliest_deadline() {
        let start = Instant::now();
        let clock = Periodic::new(Duration::from_secs(1), start + Duration::from_millis(300));
        let ticker = Periodic::new(Duration::from_secs(1), start + Duration::from_millis(700));
        assert_eq!(until_next(&[&clock, &ticker], start), Duration::from_millis(300));
        assert_eq!(until_next(&[], start), Duration::ZERO);
    }
}
