use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    accumulated: Duration,
    running_since: Option<Instant>,
    laps: Vec<Duration>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let running = self
            .running_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        self.accumulated + running
    }

    pub fn laps(&self) -> &[Duration] {
        &self.laps
    }

    /// Start when paused, pause when running.
    pub fn toggle(&mut self, now: Instant) {
        if self.is_running() {
            self.pause(now);
        } else {
            self.start(now);
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += now.saturating_duration_since(since);
        }
    }

    /// Records the current elapsed time; ignored while paused.
    pub fn lap(&mut self, now: Instant) -> Option<Duration> {
        if !self.is_running() {
            return None;
        }
        let elapsed = self.elapsed(now);
        self.laps.push(elapsed);
        Some(elapsed)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_pauses() {
        let t0 = Instant::now();
        let mut watch = Stopwatch::new();
        watch.start(t0);
        watch.pause(t0 + Duration::from_secs(2));
        assert_eq!(watch.elapsed(t0 + Duration::from_secs(10)), Duration::from_secs(2));

        watch.toggle(t0 + Duration::from_secs(10));
        assert!(watch.is_running());
        assert_eq!(
            watch.elapsed(t0 + Duration::from_millis(11_500)),
            Duration::from_millis(3_500)
        );
    }

    #[test]
    fn laps_only_while_running() {
        let t0 = Instant::now();
        let mut watch = Stopwatch::new();
        assert_eq!(watch.lap(t0), None);

        watch.start(t0);
        assert_eq!(watch.lap(t0 + Duration::from_secs(1)), Some(Duration::from_secs(1)));
        assert_eq!(watch.lap(t0 + Duration::from_secs(3)), Some(Duration::from_secs(3)));
        watch.pause(t0 + Duration::from_secs(4));
        assert_eq!(watch.lap(t0 + Duration::from_secs(5)), None);
        assert_eq!(watch.laps(), &[Duration::from_secs(1), Duration::from_secs(3)]);
    }

    #[test]
    fn reset_clears_everything() {
        let t0 = Instant::now();
        let mut watch = Stopwatch::new();
        watch.start(t0);
        watch.lap(t0 + Duration::from_secs(1));
        watch.reset();
        assert!(!watch.is_running());
        assert!(watch.laps().is_empty());
        assert_eq!(watch.elapsed(t0 + Duration::from_secs(9)), Duration::ZERO);
    }
}
