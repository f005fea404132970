use anyhow::Result;

use crate::alarm::store::ALARMS_KEY;
use crate::format::format_clock;
use crate::runtime::RuntimeConfig;
use crate::storage::FileKeyValueStore;
use crate::time_provider::TimeProvider;

pub fn run_diagnostics(config: &RuntimeConfig, provider: &dyn TimeProvider) -> Result<()> {
    let store = config.open_store();
    let ticker = config.build_ticker();
    let slot = FileKeyValueStore::new(&config.data_dir).slot_path(ALARMS_KEY)?;

    println!("neonclock diagnostics");
    println!("Data file: {}", slot.display());
    println!("Data file present: {}", slot.is_file());
    println!("Stored alarms: {}", store.len());
    println!("Active alarms: {}", store.active_count());
    println!("Time source: {}", provider.label());
    println!(
        "Local time: {}",
        format_clock(&provider.now(), config.display_mode)
    );
    println!(
        "Audio backend: {} (available: {})",
        ticker.sound().backend_label(),
        ticker.sound().backend_available()
    );
    println!(
        "Notifications: supported={}, permission={}",
        ticker.notifier().is_supported(),
        ticker.notifier().permission().as_str()
    );
    Ok(())
}
