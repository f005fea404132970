use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

pub const TONE_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output is not available: {0}")]
    Unavailable(String),
    #[error("audio device error: {0}")]
    Device(String),
}

/// Shape of the alarm tone: a short upward frequency sweep for the ring
/// attack, then a long linear volume ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneEnvelope {
    pub start_frequency_hz: f32,
    pub peak_frequency_hz: f32,
    pub sweep: Duration,
    pub start_gain: f32,
    pub peak_gain: f32,
    pub ramp: Duration,
}

impl Default for ToneEnvelope {
    fn default() -> Self {
        Self {
            start_frequency_hz: 440.0,
            peak_frequency_hz: 880.0,
            sweep: Duration::from_millis(100),
            start_gain: 0.01,
            peak_gain: 1.0,
            ramp: Duration::from_secs(100),
        }
    }
}

impl ToneEnvelope {
    pub fn frequency_at(&self, elapsed: Duration) -> f32 {
        let progress = progress(elapsed, self.sweep);
        let ratio = self.peak_frequency_hz / self.start_frequency_hz;
        self.start_frequency_hz * ratio.powf(progress)
    }

    pub fn gain_at(&self, elapsed: Duration) -> f32 {
        let progress = progress(elapsed, self.ramp);
        self.start_gain + (self.peak_gain - self.start_gain) * progress
    }
}

fn progress(elapsed: Duration, window: Duration) -> f32 {
    if window.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / window.as_secs_f32()).clamp(0.0, 1.0)
}

/// Endless square-wave samples following a [`ToneEnvelope`].
#[derive(Debug, Clone)]
pub struct ToneSamples {
    envelope: ToneEnvelope,
    sample_rate: u32,
    emitted: u64,
    phase: f32,
}

impl ToneSamples {
    pub fn new(envelope: ToneEnvelope, sample_rate: u32) -> Self {
        Self {
            envelope,
            sample_rate: sample_rate.max(1),
            emitted: 0,
            phase: 0.0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.emitted as f64 / f64::from(self.sample_rate))
    }
}

impl Iterator for ToneSamples {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let elapsed = self.elapsed();
        let frequency = self.envelope.frequency_at(elapsed);
        let gain = self.envelope.gain_at(elapsed);
        let level = if self.phase < 0.5 { 1.0 } else { -1.0 };

        self.phase = (self.phase + frequency / self.sample_rate as f32).fract();
        self.emitted = self.emitted.saturating_add(1);
        Some(level * gain)
    }
}

pub trait ToneHandle {
    fn stop(self: Box<Self>);
}

pub trait ToneBackend {
    fn label(&self) -> &'static str;
    fn is_available(&self) -> bool;
    fn play(&mut self, envelope: &ToneEnvelope) -> Result<Box<dyn ToneHandle>, AudioError>;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PlayerState {
    Idle,
    Playing,
}

/// Owns at most one sounding tone.
pub struct AlarmSoundPlayer {
    backend: Box<dyn ToneBackend>,
    envelope: ToneEnvelope,
    current: Option<Box<dyn ToneHandle>>,
}

impl AlarmSoundPlayer {
    pub fn new(backend: Box<dyn ToneBackend>) -> Self {
        Self::with_envelope(backend, ToneEnvelope::default())
    }

    pub fn with_envelope(backend: Box<dyn ToneBackend>, envelope: ToneEnvelope) -> Self {
        Self {
            backend,
            envelope,
            current: None,
        }
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    pub fn backend_available(&self) -> bool {
        self.backend.is_available()
    }

    pub fn state(&self) -> PlayerState {
        if self.current.is_some() {
            PlayerState::Playing
        } else {
            PlayerState::Idle
        }
    }

    /// Restarts the tone. Audio failures are logged and leave the player idle.
    pub fn start(&mut self) {
        self.stop();
        match self.backend.play(&self.envelope) {
            Ok(handle) => {
                debug!(backend = self.backend.label(), "alarm tone started");
                self.current = Some(handle);
            }
            Err(err) => warn!(backend = self.backend.label(), "alarm tone unavailable: {err}"),
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.stop();
            debug!("alarm tone stopped");
        }
    }
}

impl Drop for AlarmSoundPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct NullToneBackend {
    reason: &'static str,
}

impl NullToneBackend {
    pub fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

impl ToneBackend for NullToneBackend {
    fn label(&self) -> &'static str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn play(&mut self, _envelope: &ToneEnvelope) -> Result<Box<dyn ToneHandle>, AudioError> {
        Err(AudioError::Unavailable(self.reason.to_string()))
    }
}

pub fn default_backend(sound_enabled: bool) -> Box<dyn ToneBackend> {
    if !sound_enabled {
        return Box::new(NullToneBackend::new("sound disabled by configuration"));
    }
    platform_backend()
}

#[cfg(feature = "audio")]
fn platform_backend() -> Box<dyn ToneBackend> {
    Box::new(rodio_backend::RodioToneBackend::new())
}

#[cfg(not(feature = "audio"))]
fn platform_backend() -> Box<dyn ToneBackend> {
    Box::new(NullToneBackend::new("built without the `audio` feature"))
}

#[cfg(feature = "audio")]
mod rodio_backend {
    use std::time::Duration;

    use rodio::{ChannelCount, OutputStream, OutputStreamBuilder, SampleRate, Sink, Source};

    use super::{AudioError, TONE_SAMPLE_RATE, ToneBackend, ToneEnvelope, ToneHandle, ToneSamples};

    /// The output stream is opened on first use and kept for the rest of the
    /// process.
    pub struct RodioToneBackend {
        stream: Option<OutputStream>,
    }

    impl RodioToneBackend {
        pub fn new() -> Self {
            Self { stream: None }
        }

        fn stream(&mut self) -> Result<&OutputStream, AudioError> {
            if self.stream.is_none() {
                let mut stream = OutputStreamBuilder::open_default_stream()
                    .map_err(|err| AudioError::Device(err.to_string()))?;
                stream.log_on_drop(false);
                self.stream = Some(stream);
            }
            self.stream
                .as_ref()
                .ok_or_else(|| AudioError::Unavailable("output stream missing".to_string()))
        }
    }

    impl ToneBackend for RodioToneBackend {
        fn label(&self) -> &'static str {
            "rodio"
        }

        /// True once a stream is open, or when a default output device is
        /// present to open on first use.
        fn is_available(&self) -> bool {
            self.stream.is_some() || OutputStreamBuilder::from_default_device().is_ok()
        }

        fn play(&mut self, envelope: &ToneEnvelope) -> Result<Box<dyn ToneHandle>, AudioError> {
            let stream = self.stream()?;
            let sink = Sink::connect_new(stream.mixer());
            sink.append(AlarmTone(ToneSamples::new(
                envelope.clone(),
                TONE_SAMPLE_RATE,
            )));
            sink.play();
            Ok(Box::new(RodioTone { sink }))
        }
    }

    struct RodioTone {
        sink: Sink,
    }

    impl ToneHandle for RodioTone {
        fn stop(self: Box<Self>) {
            self.sink.stop();
        }
    }

    struct AlarmTone(ToneSamples);

    impl Iterator for AlarmTone {
        type Item = f32;

        fn next(&mut self) -> Option<f32> {
            self.0.next()
        }
    }

    impl Source for AlarmTone {
        fn current_span_len(&self) -> Option<usize> {
            None
        }

        fn channels(&self) -> ChannelCount {
            1
        }

        fn sample_rate(&self) -> SampleRate {
            self.0.sample_rate()
        }

        fn total_duration(&self) -> Option<Duration> {
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::testing::RecordingToneBackend;
    use super::*;

    #[test]
    fn stop_twice_stays_idle() {
        let (backend, log) = RecordingToneBackend::new(true);
        let mut player = AlarmSoundPlayer::new(Box::new(backend));
        player.start();
        assert_eq!(player.state(), PlayerState::Playing);

        player.stop();
        player.stop();
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(log.borrow().stopped, 1);
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let (backend, log) = RecordingToneBackend::new(true);
        let mut player = AlarmSoundPlayer::new(Box::new(backend));
        player.stop();
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(log.borrow().stopped, 0);
    }

    #[test]
    fn restart_stops_previous_tone_first() {
        let (backend, log) = RecordingToneBackend::new(true);
        let mut player = AlarmSoundPlayer::new(Box::new(backend));
        player.start();
        player.start();
        assert_eq!(log.borrow().started, 2);
        assert_eq!(log.borrow().stopped, 1);
        assert_eq!(player.state(), PlayerState::Playing);
    }

    #[test]
    #[traced_test]
    fn unavailable_backend_fails_silently() {
        let (backend, log) = RecordingToneBackend::new(false);
        let mut player = AlarmSoundPlayer::new(Box::new(backend));
        player.start();
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(log.borrow().started, 0);
        assert!(logs_contain("alarm tone unavailable"));
    }

    #[test]
    fn null_backend_never_plays() {
        let mut player = AlarmSoundPlayer::new(default_backend(false));
        assert!(!player.backend_available());
        player.start();
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn envelope_sweeps_then_holds_frequency() {
        let envelope = ToneEnvelope::default();
        assert!((envelope.frequency_at(Duration::ZERO) - 440.0).abs() < 0.01);
        let mid = envelope.frequency_at(Duration::from_millis(50));
        assert!((mid - 622.25).abs() < 0.5, "geometric midpoint, got {mid}");
        assert!((envelope.frequency_at(Duration::from_millis(100)) - 880.0).abs() < 0.01);
        assert!((envelope.frequency_at(Duration::from_secs(30)) - 880.0).abs() < 0.01);
    }

    #[test]
    fn envelope_ramps_volume_over_long_window() {
        let envelope = ToneEnvelope::default();
        assert!((envelope.gain_at(Duration::ZERO) - 0.01).abs() < 1e-6);
        assert!((envelope.gain_at(Duration::from_secs(50)) - 0.505).abs() < 1e-3);
        assert!((envelope.gain_at(Duration::from_secs(100)) - 1.0).abs() < 1e-6);
        assert!((envelope.gain_at(Duration::from_secs(600)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn samples_start_quiet_and_alternate() {
        let mut samples = ToneSamples::new(ToneEnvelope::default(), 8_000);
        let first = samples.next().expect("endless");
        assert!((first - 0.01).abs() < 1e-4);

        let window: Vec<f32> = samples.take(40).collect();
        assert!(window.iter().any(|sample| *sample > 0.0));
        assert!(window.iter().any(|sample| *sample < 0.0));
        assert!(window.iter().all(|sample| sample.abs() <= 0.02));
    }
}
