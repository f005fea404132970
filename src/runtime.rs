use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::alarm::model::AlarmEntry;
use crate::alarm::scheduler::AlarmTicker;
use crate::alarm::store::{AlarmStore, StoreError};
use crate::command::{Command, HELP_TEXT, parse_command};
use crate::countdown::CountdownTimer;
use crate::format::{
    TimeDisplayMode, format_alarm_time, format_clock, format_countdown, format_stopwatch,
};
use crate::notify::{DesktopNotificationBackend, FixedFocus, NotificationNotifier};
use crate::sound::{AlarmSoundPlayer, default_backend};
use crate::stopwatch::Stopwatch;
use crate::storage::{FileKeyValueStore, KeyValueStore};
use crate::time_provider::{Periodic, TimeProvider, until_next};

const TICK_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_RING_LIMIT_SECS: u64 = 600;
const STOPWATCH_REFRESH: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub display_mode: TimeDisplayMode,
    pub sound: bool,
    pub notifications: bool,
    pub detached: bool,
    /// Send desktop notifications even while the interactive prompt is open.
    pub always_notify: bool,
    /// Ringing alarms are dismissed automatically after this long.
    pub ring_limit: Option<Duration>,
}

impl RuntimeConfig {
    pub fn open_store(&self) -> AlarmStore<FileKeyValueStore> {
        AlarmStore::load(FileKeyValueStore::new(&self.data_dir))
    }

    pub fn build_ticker(&self) -> AlarmTicker {
        let sound = AlarmSoundPlayer::new(default_backend(self.sound));
        let mut notifier = NotificationNotifier::new(
            Box::new(DesktopNotificationBackend::new(self.notifications)),
            Box::new(FixedFocus(self.treats_as_focused())),
        );
        notifier.request_permission();
        AlarmTicker::new(sound, notifier)
    }

    pub fn treats_as_focused(&self) -> bool {
        !self.detached && !self.always_notify
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The alarm list and the ticker sharing one timeline: commands and ticks are
/// applied in arrival order by the owner of this value.
pub struct AlarmRuntime<K: KeyValueStore> {
    store: AlarmStore<K>,
    ticker: AlarmTicker,
    mode: TimeDisplayMode,
    ring_limit: Option<Duration>,
    ringing_since: Option<DateTime<Local>>,
}

impl<K: KeyValueStore> AlarmRuntime<K> {
    pub fn new(
        store: AlarmStore<K>,
        ticker: AlarmTicker,
        mode: TimeDisplayMode,
        ring_limit: Option<Duration>,
    ) -> Self {
        Self {
            store,
            ticker,
            mode,
            ring_limit,
            ringing_since: None,
        }
    }

    pub fn store(&self) -> &AlarmStore<K> {
        &self.store
    }

    pub fn ticker(&self) -> &AlarmTicker {
        &self.ticker
    }

    /// State transitions happen before any output, so a failed write never
    /// skips a tick.
    pub fn on_tick(&mut self, now: DateTime<Local>, out: &mut dyn Write) -> Result<()> {
        let mut expired = None;
        if let (Some(limit), Some(since)) = (self.ring_limit, self.ringing_since)
            && (now - since).to_std().unwrap_or_default() >= limit
        {
            expired = self.ticker.dismiss();
            self.ringing_since = None;
        }

        let outcome = self.ticker.tick(&mut self.store, now);
        if outcome.foreground.is_some() {
            self.ringing_since = Some(now);
        }

        if let Some(alarm) = expired {
            info!(alarm_id = %alarm.id, "ring limit reached");
            writeln!(out, "Alarm '{}' stopped after ringing limit.", alarm.name)?;
        }
        if let Some(alarm) = outcome.foreground {
            debug!(notified = outcome.notified, "foreground alarm ringing");
            writeln!(
                out,
                "*** ALARM {} - {} *** (press Enter or type `dismiss`)",
                format_alarm_time(&alarm.time, self.mode),
                alarm.name
            )?;
            if outcome.fired > 1 {
                writeln!(out, "({} other alarm(s) fired at the same time)", outcome.fired - 1)?;
            }
        }
        Ok(())
    }

    /// Parse errors are reported to `out`; they never stop the runtime.
    pub fn handle_line(
        &mut self,
        line: &str,
        now: DateTime<Local>,
        out: &mut dyn Write,
    ) -> Result<Flow> {
        let ringing = self.ticker.triggered().is_some();
        match parse_command(line, ringing) {
            Ok(Some(command)) => self.execute(command, now, out),
            Ok(None) => Ok(Flow::Continue),
            Err(err) => {
                writeln!(out, "error: {err:#}")?;
                Ok(Flow::Continue)
            }
        }
    }

    /// A command whose change cannot be saved is reported to `out` and the
    /// runtime keeps going; only output failures are returned.
    pub fn execute(
        &mut self,
        command: Command,
        now: DateTime<Local>,
        out: &mut dyn Write,
    ) -> Result<Flow> {
        match self.apply(command, now, out) {
            Err(err) if err.downcast_ref::<StoreError>().is_some() => {
                warn!("failed to save alarms: {err:#}");
                writeln!(out, "error: failed to save alarms: {err:#}")?;
                Ok(Flow::Continue)
            }
            result => result,
        }
    }

    fn apply(
        &mut self,
        command: Command,
        now: DateTime<Local>,
        out: &mut dyn Write,
    ) -> Result<Flow> {
        match command {
            Command::Add { time, name } => {
                if let Some(id) = self.store.add(&time, &name, now)? {
                    writeln!(out, "Added alarm {id} at {}.", format_alarm_time(&time, self.mode))?;
                }
            }
            Command::Toggle(id) => {
                if self.store.toggle(id)? {
                    let state = self
                        .store
                        .get(id)
                        .map(|alarm| if alarm.active { "on" } else { "off" })
                        .unwrap_or("off");
                    writeln!(out, "Alarm {id} is now {state}.")?;
                } else {
                    writeln!(out, "No alarm with id {id}.")?;
                }
            }
            Command::Delete(id) => {
                if self.store.delete(id)? {
                    writeln!(out, "Deleted alarm {id}.")?;
                } else {
                    writeln!(out, "No alarm with id {id}.")?;
                }
            }
            Command::Edit { id, time, name } => {
                let name = match (name.is_empty(), self.store.get(id)) {
                    (true, Some(existing)) => existing.name.clone(),
                    _ => name,
                };
                if self.store.edit(id, &name, &time)? {
                    writeln!(out, "Updated alarm {id}.")?;
                } else {
                    writeln!(out, "No alarm with id {id}.")?;
                }
            }
            Command::Dismiss => {
                self.ringing_since = None;
                match self.ticker.dismiss() {
                    Some(alarm) => writeln!(out, "Dismissed '{}'.", alarm.name)?,
                    None => writeln!(out, "Nothing is ringing.")?,
                }
            }
            Command::List => write_alarm_table(out, self.store.alarms(), self.mode)?,
            Command::Help => writeln!(out, "{HELP_TEXT}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    pub fn status_line(&self, now: DateTime<Local>) -> String {
        let clock = format_clock(&now, self.mode);
        match self.ticker.triggered() {
            Some(alarm) => format!("{clock} - ringing: {}", alarm.name),
            None => format!("{clock} - {} active alarm(s)", self.store.active_count()),
        }
    }

    pub fn shutdown(&mut self) {
        self.ticker.sound_mut().stop();
        self.ringing_since = None;
    }
}

pub fn write_alarm_table(
    out: &mut dyn Write,
    alarms: &[AlarmEntry],
    mode: TimeDisplayMode,
) -> io::Result<()> {
    if alarms.is_empty() {
        return writeln!(out, "No alarms set");
    }
    writeln!(out, "{:<15} {:<9} {:<6} {:<9} NAME", "ID", "TIME", "STATE", "FIRED")?;
    for alarm in alarms {
        writeln!(
            out,
            "{:<15} {:<9} {:<6} {:<9} {}",
            alarm.id,
            format_alarm_time(&alarm.time, mode),
            if alarm.active { "on" } else { "off" },
            if alarm.triggered { "yes" } else { "no" },
            alarm.name
        )?;
    }
    Ok(())
}

/// Lines typed on stdin, delivered over a channel so the owning loop can
/// wait on input and timers together. After EOF, waits simply sleep.
struct InputPump {
    rx: Option<Receiver<String>>,
}

impl InputPump {
    fn stdin() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { rx: Some(rx) }
    }

    fn none() -> Self {
        Self { rx: None }
    }

    fn is_closed(&self) -> bool {
        self.rx.is_none()
    }

    fn wait(&mut self, timeout: Duration) -> Option<String> {
        let Some(rx) = &self.rx else {
            thread::sleep(timeout);
            return None;
        };
        match rx.recv_timeout(timeout) {
            Ok(line) => Some(line),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("command input closed");
                self.rx = None;
                None
            }
        }
    }
}

fn set_terminal_title(out: &mut dyn Write, title: &str) -> io::Result<()> {
    write!(out, "\x1b]0;{title}\x07")?;
    out.flush()
}

pub fn run_alarms(config: &RuntimeConfig, provider: &dyn TimeProvider) -> Result<()> {
    let store = config.open_store();
    let ticker = config.build_ticker();
    let mut runtime = AlarmRuntime::new(store, ticker, config.display_mode, config.ring_limit);
    let stdout = io::stdout();
    let show_clock = !config.detached && stdout.is_terminal();

    {
        let mut out = stdout.lock();
        write_alarm_table(&mut out, runtime.store().alarms(), config.display_mode)?;
        if !config.detached {
            writeln!(out, "Type `help` for commands.")?;
        }
    }

    let mut input = if config.detached {
        InputPump::none()
    } else {
        InputPump::stdin()
    };
    let start = Instant::now();
    let mut display = Periodic::new(TICK_PERIOD, start);
    let mut ticks = Periodic::new(TICK_PERIOD, start);

    loop {
        let wait = until_next(&[&display, &ticks], Instant::now());
        if let Some(line) = input.wait(wait) {
            match runtime.handle_line(&line, provider.now(), &mut stdout.lock()) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => warn!("failed to write command output: {err:#}"),
            }
        } else if input.is_closed() && !config.detached {
            break;
        }

        let now = Instant::now();
        if ticks.poll(now)
            && let Err(err) = runtime.on_tick(provider.now(), &mut stdout.lock())
        {
            warn!("failed to write alarm output: {err:#}");
        }
        if display.poll(now)
            && show_clock
            && let Err(err) =
                set_terminal_title(&mut stdout.lock(), &runtime.status_line(provider.now()))
        {
            debug!("failed to update terminal title: {err}");
        }
    }

    runtime.shutdown();
    Ok(())
}

pub fn run_countdown(
    hours: u64,
    minutes: u64,
    seconds: u64,
    config: &RuntimeConfig,
) -> Result<()> {
    let mut timer = CountdownTimer::new();
    timer.set(hours, minutes, seconds);
    if !timer.start() {
        bail!("timer duration must be greater than zero");
    }

    let mut player = AlarmSoundPlayer::new(default_backend(config.sound));
    let stdout = io::stdout();
    let live = stdout.is_terminal();
    let mut input = InputPump::stdin();
    let mut display = Periodic::new(TICK_PERIOD, Instant::now());
    let mut last = Instant::now();

    writeln!(
        stdout.lock(),
        "Timer set for {} (Enter: pause/resume, `q`: cancel)",
        format_countdown(timer.total())
    )?;

    loop {
        let wait = until_next(&[&display], Instant::now());
        if let Some(line) = input.wait(wait) {
            match line.trim() {
                "q" | "quit" | "reset" => {
                    timer.reset();
                    break;
                }
                _ if timer.is_finished() => break,
                _ if timer.is_running() => timer.pause(),
                _ => {
                    timer.start();
                }
            }
        }

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(last);
        last = now;
        if timer.advance(elapsed) {
            player.start();
            let mut out = stdout.lock();
            writeln!(out)?;
            writeln!(out, "Time's Up!")?;
            if input.is_closed() {
                break;
            }
            writeln!(out, "Press Enter to dismiss.")?;
        }
        if display.poll(now) && live && !timer.is_finished() {
            let mut out = stdout.lock();
            write!(out, "\r{}", format_countdown(timer.remaining()))?;
            out.flush()?;
        }
    }

    player.stop();
    Ok(())
}

pub fn run_stopwatch() -> Result<()> {
    let stdout = io::stdout();
    let live = stdout.is_terminal();
    let mut watch = Stopwatch::new();
    let mut input = InputPump::stdin();
    let mut display = Periodic::new(STOPWATCH_REFRESH, Instant::now());

    watch.start(Instant::now());
    writeln!(
        stdout.lock(),
        "Stopwatch running (Enter: lap, `p`: pause/resume, `r`: reset, `q`: stop)"
    )?;

    loop {
        let wait = until_next(&[&display], Instant::now());
        if let Some(line) = input.wait(wait) {
            let now = Instant::now();
            let mut out = stdout.lock();
            match line.trim() {
                "q" | "quit" => break,
                "p" | "pause" => watch.toggle(now),
                "r" | "reset" => watch.reset(),
                _ => {
                    if let Some(lap) = watch.lap(now) {
                        writeln!(out, "\rLap {:>2}: {}", watch.laps().len(), format_stopwatch(lap))?;
                    }
                }
            }
        } else if input.is_closed() {
            break;
        }

        let now = Instant::now();
        if display.poll(now) && live {
            let mut out = stdout.lock();
            write!(out, "\r{}", format_stopwatch(watch.elapsed(now)))?;
            out.flush()?;
        }
    }

    let total = watch.elapsed(Instant::now());
    let mut out = stdout.lock();
    writeln!(out, "\rTotal: {}", format_stopwatch(total))?;
    for (index, lap) in watch.laps().iter().enumerate() {
        writeln!(out, "  Lap {:>2}: {}", index + 1, format_stopwatch(*lap))?;
    }
    Ok(())
}

pub fn reset_alarms(config: &RuntimeConfig) -> Result<()> {
    let mut store = config.open_store();
    store
        .clear()
        .with_context(|| format!("failed to clear alarms in {}", config.data_dir.display()))?;
    Ok(())
}
