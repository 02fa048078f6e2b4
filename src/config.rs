//! Environment configuration, read once at startup.

use std::path::PathBuf;

use crate::calendar::BusinessCalendar;
use crate::engine::EngineError;

pub const WAL_FILE_NAME: &str = "slotwise.wal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Resolves `today` and instants to business-local dates.
    pub calendar: BusinessCalendar,
    pub seed_file: Option<PathBuf>,
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            calendar: BusinessCalendar::default(),
            seed_file: None,
            compact_threshold: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys and unparsable numbers fall
    /// back to defaults; an unknown time zone is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let defaults = Self::default();

        let data_dir = lookup("SLOTWISE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let calendar = match lookup("SLOTWISE_TIMEZONE") {
            Some(name) if !name.trim().is_empty() => BusinessCalendar::from_name(&name)?,
            _ => defaults.calendar,
        };
        let seed_file = lookup("SLOTWISE_SEED")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let compact_threshold = lookup("SLOTWISE_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.compact_threshold);

        Ok(Self {
            data_dir,
            calendar,
            seed_file,
            compact_threshold,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILE_NAME)
    }
}
