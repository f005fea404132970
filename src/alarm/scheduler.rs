use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::alarm::model::{AlarmEntry, minute_key};
use crate::alarm::store::AlarmStore;
use crate::notify::{ALARM_NOTIFICATION_TITLE, NotificationNotifier, alarm_notification_body};
use crate::sound::{AlarmSoundPlayer, PlayerState};
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Alarms moved to triggered/inactive on this tick.
    pub fired: usize,
    /// The alarm that took the dismissal prompt, if any fired.
    pub foreground: Option<AlarmEntry>,
    pub notified: bool,
}

/// Once-per-second trigger evaluation plus the side effects of a trigger.
/// Matching is on the `HH:MM` minute; `triggered` prevents a second fire in
/// the same minute and nothing is replayed for minutes the ticker missed.
pub struct AlarmTicker {
    sound: AlarmSoundPlayer,
    notifier: NotificationNotifier,
    triggered: Option<AlarmEntry>,
}

impl AlarmTicker {
    pub fn new(sound: AlarmSoundPlayer, notifier: NotificationNotifier) -> Self {
        Self {
            sound,
            notifier,
            triggered: None,
        }
    }

    pub fn tick<K: KeyValueStore>(
        &mut self,
        store: &mut AlarmStore<K>,
        now: DateTime<Local>,
    ) -> TickOutcome {
        let current = minute_key(&now);
        let mut fired = 0;
        let mut foreground: Option<AlarmEntry> = None;

        let update = store.update_each(|alarm| {
            if !alarm.is_due(&current) {
                return false;
            }
            alarm.triggered = true;
            alarm.active = false;
            fired += 1;
            if foreground.is_none() {
                foreground = Some(alarm.clone());
            } else {
                info!(alarm_id = %alarm.id, name = %alarm.name, "alarm fired without prompt");
            }
            true
        });
        if let Err(err) = update {
            // In-memory state is already updated; the next successful write carries it.
            warn!("unable to persist fired alarms: {err}");
        }

        let Some(alarm) = foreground else {
            return TickOutcome::default();
        };

        info!(alarm_id = %alarm.id, name = %alarm.name, time = %alarm.time, "alarm triggered");
        self.sound.start();
        let notified = self
            .notifier
            .notify(ALARM_NOTIFICATION_TITLE, &alarm_notification_body(&alarm.name));
        self.triggered = Some(alarm.clone());

        TickOutcome {
            fired,
            foreground: Some(alarm),
            notified,
        }
    }

    /// Stops the tone and clears the prompt. Returns the dismissed alarm.
    pub fn dismiss(&mut self) -> Option<AlarmEntry> {
        self.sound.stop();
        let dismissed = self.triggered.take();
        if let Some(alarm) = &dismissed {
            info!(alarm_id = %alarm.id, "alarm dismissed");
        }
        dismissed
    }

    pub fn triggered(&self) -> Option<&AlarmEntry> {
        self.triggered.as_ref()
    }

    pub fn sound_state(&self) -> PlayerState {
        self.sound.state()
    }

    pub fn sound(&self) -> &AlarmSoundPlayer {
        &self.sound
    }

    pub fn sound_mut(&mut self) -> &mut AlarmSoundPlayer {
        &mut self.sound
    }

    pub fn notifier(&self) -> &NotificationNotifier {
        &self.notifier
    }
}
