//! File-backed and in-memory stores behind the exchange collaborator traits.
use std::{fs, io::Write, path::Path, path::PathBuf};

use exchange_traits::{AlarmStore, BoxError, DayAlarm, NightSchedule, Route, VolumeStore};
use serde::{Deserialize, Serialize};

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AlarmRow {
    weekday: u8,
    hour: u8,
    minute: u8,
    #[serde(default)]
    active: bool,
    #[serde(default = "default_true")]
    ramp: bool,
    #[serde(default)]
    random_message: bool,
    #[serde(default)]
    ringtone: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct AlarmFile {
    #[serde(default)]
    day: Vec<AlarmRow>,
}

/// Weekly alarm table (index 0 = Sunday). Writes go to disk when a path is set.
#[derive(Debug, Clone, Default)]
pub struct FileAlarmStore {
    days: [DayAlarm; 7],
    path: Option<PathBuf>,
}

impl FileAlarmStore {
    /// In-memory table, nothing persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the table from `path`. A missing file yields an empty (all inactive) table
    /// that is created on the first write.
    pub fn open(path: &Path) -> eyre::Result<Self> {
        let mut store = Self {
            days: Default::default(),
            path: Some(path.to_path_buf()),
        };
        if !path.exists() {
            tracing::info!(path = %path.display(), "alarm table not found, starting empty");
            return Ok(store);
        }
        let text = fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("read alarm table {:?}: {}", path, e))?;
        store.load_str(&text)?;
        Ok(store)
    }

    /// Replace the table from TOML text.
    pub fn load_str(&mut self, text: &str) -> eyre::Result<()> {
        let file: AlarmFile =
            toml::from_str(text).map_err(|e| eyre::eyre!("parse alarm table: {e}"))?;
        let mut days: [DayAlarm; 7] = Default::default();
        for row in file.day {
            if row.weekday > 6 {
                eyre::bail!("alarm weekday must be in [0, 6], got {}", row.weekday);
            }
            if row.hour > 23 || row.minute > 59 {
                eyre::bail!(
                    "alarm time {:02}:{:02} for weekday {} is invalid",
                    row.hour,
                    row.minute,
                    row.weekday
                );
            }
            days[usize::from(row.weekday)] = DayAlarm {
                hour: row.hour,
                minute: row.minute,
                active: row.active,
                ramp_enabled: row.ramp,
                use_random_message: row.random_message,
                ringtone: row.ringtone,
            };
        }
        self.days = days;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let file = AlarmFile {
            day: self
                .days
                .iter()
                .enumerate()
                .map(|(i, d)| AlarmRow {
                    weekday: i as u8,
                    hour: d.hour,
                    minute: d.minute,
                    active: d.active,
                    ramp: d.ramp_enabled,
                    random_message: d.use_random_message,
                    ringtone: d.ringtone.clone(),
                })
                .collect(),
        };
        toml::to_string(&file)
    }

    fn persist(&self) -> Result<(), BoxError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let text = self.to_toml()?;
        write_atomic(path, text.as_bytes())?;
        Ok(())
    }
}

impl AlarmStore for FileAlarmStore {
    fn get(&self, weekday: u8) -> Result<DayAlarm, BoxError> {
        self.days
            .get(usize::from(weekday))
            .cloned()
            .ok_or_else(|| format!("weekday {weekday} out of range").into())
    }

    fn set(&mut self, weekday: u8, alarm: DayAlarm) -> Result<(), BoxError> {
        let slot = self
            .days
            .get_mut(usize::from(weekday))
            .ok_or_else(|| BoxError::from(format!("weekday {weekday} out of range")))?;
        *slot = alarm;
        self.persist()
    }
}

/// Per-route volumes held in memory, clamped to 100.
#[derive(Debug, Clone, Copy)]
pub struct MemoryVolumeStore {
    handset: u8,
    speaker: u8,
}

impl MemoryVolumeStore {
    pub fn new(handset: u8, speaker: u8) -> Self {
        Self {
            handset: handset.min(100),
            speaker: speaker.min(100),
        }
    }
}

impl VolumeStore for MemoryVolumeStore {
    fn get(&self, route: Route) -> u8 {
        match route {
            Route::Handset => self.handset,
            Route::Speaker => self.speaker,
        }
    }

    fn set(&mut self, route: Route, volume: u8) {
        let v = volume.min(100);
        match route {
            Route::Handset => self.handset = v,
            Route::Speaker => self.speaker = v,
        }
    }
}

/// Night window `[start_hour, end_hour)`, wrapping past midnight when start > end.
#[derive(Debug, Clone, Copy)]
pub struct HourRangeNightSchedule {
    pub enabled: bool,
    pub start_hour: u8,
    pub end_hour: u8,
}

impl NightSchedule for HourRangeNightSchedule {
    fn is_night_hour(&self, hour: u8) -> bool {
        if !self.enabled || self.start_hour == self.end_hour {
            return false;
        }
        if self.start_hour < self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}
