use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, warn};

use crate::alarm::model::{AlarmEntry, AlarmId, decode_alarm_list, encode_alarm_list};
use crate::storage::{KeyValueStore, StorageError};

pub const ALARMS_KEY: &str = "alarms";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("unable to serialize alarms: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The alarm list plus the slot it is persisted to. Every mutation rewrites
/// the whole list before returning.
pub struct AlarmStore<K: KeyValueStore> {
    kv: K,
    alarms: Vec<AlarmEntry>,
}

impl<K: KeyValueStore> AlarmStore<K> {
    pub fn load(kv: K) -> Self {
        let alarms = match kv.get(ALARMS_KEY) {
            Ok(Some(payload)) => decode_alarm_list(&payload),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("unable to read stored alarms, starting empty: {err}");
                Vec::new()
            }
        };
        debug!(count = alarms.len(), "loaded alarms");
        Self { kv, alarms }
    }

    pub fn alarms(&self) -> &[AlarmEntry] {
        &self.alarms
    }

    pub fn get(&self, id: AlarmId) -> Option<&AlarmEntry> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.alarms.iter().filter(|alarm| alarm.active).count()
    }

    /// Returns `None` without touching the list when `time` is empty.
    pub fn add(
        &mut self,
        time: &str,
        name: &str,
        now: DateTime<Local>,
    ) -> Result<Option<AlarmId>, StoreError> {
        if time.trim().is_empty() {
            return Ok(None);
        }
        let id = self.next_id(now);
        self.alarms.push(AlarmEntry::new(id, time, name));
        self.persist()?;
        Ok(Some(id))
    }

    /// Flips `active` and re-arms the alarm. Returns false if `id` is unknown.
    pub fn toggle(&mut self, id: AlarmId) -> Result<bool, StoreError> {
        let Some(alarm) = self.alarms.iter_mut().find(|alarm| alarm.id == id) else {
            return Ok(false);
        };
        alarm.active = !alarm.active;
        alarm.triggered = false;
        self.persist()?;
        Ok(true)
    }

    pub fn delete(&mut self, id: AlarmId) -> Result<bool, StoreError> {
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.id != id);
        if self.alarms.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn edit(&mut self, id: AlarmId, name: &str, time: &str) -> Result<bool, StoreError> {
        let Some(alarm) = self.alarms.iter_mut().find(|alarm| alarm.id == id) else {
            return Ok(false);
        };
        alarm.name = name.to_string();
        alarm.time = time.to_string();
        self.persist()?;
        Ok(true)
    }

    /// Applies `update` to every entry; the list is rewritten only when at
    /// least one call reports a change. Returns the number of changed entries.
    pub fn update_each<F>(&mut self, mut update: F) -> Result<usize, StoreError>
    where
        F: FnMut(&mut AlarmEntry) -> bool,
    {
        let mut changed = 0;
        for alarm in &mut self.alarms {
            if update(alarm) {
                changed += 1;
            }
        }
        if changed > 0 {
            self.persist()?;
        }
        Ok(changed)
    }

    /// Drops every alarm and the persisted slot.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.alarms.clear();
        self.kv.remove(ALARMS_KEY)?;
        Ok(())
    }

    pub fn persist(&mut self) -> Result<(), StoreError> {
        let payload = encode_alarm_list(&self.alarms)?;
        self.kv.set(ALARMS_KEY, &payload)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn kv(&self) -> &K {
        &self.kv
    }

    // Creation timestamps in ms, bumped past any existing id so two alarms
    // added within the same millisecond stay distinct.
    fn next_id(&self, now: DateTime<Local>) -> AlarmId {
        let candidate = now.timestamp_millis();
        let floor = self
            .alarms
            .iter()
            .map(|alarm| alarm.id.0.saturating_add(1))
            .max()
            .unwrap_or(i64::MIN);
        AlarmId(candidate.max(floor))
    }
}
