mod alarm;
mod command;
mod countdown;
mod diagnostics;
mod format;
mod logging;
mod notify;
mod runtime;
mod sound;
mod stopwatch;
mod storage;
mod time_provider;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::alarm::model::{AlarmId, normalize_alarm_time};
use crate::format::{TimeDisplayMode, format_alarm_time};
use crate::runtime::{DEFAULT_RING_LIMIT_SECS, RuntimeConfig};
use crate::time_provider::SystemTimeProvider;

#[derive(Parser, Debug)]
#[command(
    name = "neonclock",
    version,
    about = "Terminal alarm clock with timer and stopwatch"
)]
struct Cli {
    /// Directory holding the persisted alarm list.
    #[arg(long, global = true, env = "NEONCLOCK_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Show times as `h:MM AM|PM`.
    #[arg(long, global = true)]
    hour12: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show stored alarms.
    List,
    /// Add a daily alarm.
    Add {
        #[arg(value_parser = parse_time_arg)]
        time: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Switch an alarm on or off.
    Toggle { id: AlarmId },
    Delete { id: AlarmId },
    /// Change an alarm's time and, optionally, its name.
    Edit {
        id: AlarmId,
        #[arg(value_parser = parse_time_arg)]
        time: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Discard every stored alarm.
    Reset,
    /// Watch the clock and ring alarms (default).
    Run {
        #[arg(long)]
        no_sound: bool,
        #[arg(long)]
        no_notify: bool,
        /// Read no commands from stdin; always treated as unfocused.
        #[arg(long)]
        detached: bool,
        /// Notify on the desktop even while the prompt is open.
        #[arg(long)]
        always_notify: bool,
        /// Seconds an alarm rings before it is dismissed; 0 rings until dismissed.
        #[arg(long, default_value_t = DEFAULT_RING_LIMIT_SECS)]
        ring_limit: u64,
    },
    Diagnostics,
    /// Count down and ring when done.
    Timer {
        #[arg(long, default_value_t = 0)]
        hours: u64,
        #[arg(long, default_value_t = 0)]
        minutes: u64,
        #[arg(long, default_value_t = 0)]
        seconds: u64,
        #[arg(long)]
        no_sound: bool,
    },
    Stopwatch,
}

fn parse_time_arg(value: &str) -> Result<String> {
    normalize_alarm_time(value)
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level)?;

    let mut config = RuntimeConfig {
        data_dir: cli.data_dir,
        display_mode: if cli.hour12 {
            TimeDisplayMode::Hour12
        } else {
            TimeDisplayMode::Hour24
        },
        sound: true,
        notifications: true,
        detached: false,
        always_notify: false,
        ring_limit: None,
    };
    debug!(data_dir = %config.data_dir.display(), "starting");

    match cli.command.unwrap_or(Commands::Run {
        no_sound: false,
        no_notify: false,
        detached: false,
        always_notify: false,
        ring_limit: DEFAULT_RING_LIMIT_SECS,
    }) {
        Commands::List => {
            let store = config.open_store();
            runtime::write_alarm_table(
                &mut io::stdout().lock(),
                store.alarms(),
                config.display_mode,
            )?;
        }
        Commands::Add { time, name } => {
            let mut store = config.open_store();
            let Some(id) = store.add(&time, &name, Local::now())? else {
                bail!("alarm time must not be empty");
            };
            println!(
                "Added alarm {id} at {}.",
                format_alarm_time(&time, config.display_mode)
            );
        }
        Commands::Toggle { id } => {
            let mut store = config.open_store();
            if !store.toggle(id)? {
                bail!("no alarm with id {id}");
            }
            let active = store.get(id).is_some_and(|alarm| alarm.active);
            println!("Alarm {id} is now {}.", if active { "on" } else { "off" });
        }
        Commands::Delete { id } => {
            let mut store = config.open_store();
            if !store.delete(id)? {
                bail!("no alarm with id {id}");
            }
            println!("Deleted alarm {id}.");
        }
        Commands::Edit { id, time, name } => {
            let mut store = config.open_store();
            let Some(existing) = store.get(id) else {
                bail!("no alarm with id {id}");
            };
            let name = name.unwrap_or_else(|| existing.name.clone());
            store.edit(id, &name, &time)?;
            println!("Updated alarm {id}.");
        }
        Commands::Reset => {
            runtime::reset_alarms(&config)?;
            println!("All alarms cleared.");
        }
        Commands::Run {
            no_sound,
            no_notify,
            detached,
            always_notify,
            ring_limit,
        } => {
            config.sound = !no_sound;
            config.notifications = !no_notify;
            config.detached = detached;
            config.always_notify = always_notify;
            config.ring_limit = (ring_limit > 0).then(|| Duration::from_secs(ring_limit));
            runtime::run_alarms(&config, &SystemTimeProvider)
                .context("alarm runtime stopped")?;
        }
        Commands::Diagnostics => diagnostics::run_diagnostics(&config, &SystemTimeProvider)?,
        Commands::Timer {
            hours,
            minutes,
            seconds,
            no_sound,
        } => {
            config.sound = !no_sound;
            runtime::run_countdown(hours, minutes, seconds, &config)?;
        }
        Commands::Stopwatch => runtime::run_stopwatch()?,
    }
    Ok(())
}
