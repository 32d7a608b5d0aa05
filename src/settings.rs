use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::models::PayloadValue;

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl From<PrefValue> for PayloadValue {
    fn from(value: PrefValue) -> Self {
        match value {
            PrefValue::Bool(value) => PayloadValue::Bool(value),
            PrefValue::Int(value) => PayloadValue::Int(value),
            PrefValue::String(value) => PayloadValue::Text(value),
        }
    }
}

/// Read access to host preferences. Values are read fresh on every call.
pub trait PreferenceSource: Send + Sync {
    fn pref(&self, name: &str) -> Option<PrefValue>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StudySettings {
    /// Current preference values.
    prefs: BTreeMap<String, PrefValue>,
    /// Study branches: variation name → prefs it sets.
    variations: BTreeMap<String, BTreeMap<String, PrefValue>>,
    active_variation: Option<String>,
    /// Prefs set by the active variation, removed again on cleanup.
    registered_prefs: BTreeSet<String>,
}

/// Preference and study configuration persisted as JSON.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StudySettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            StudySettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn set_pref(&self, name: &str, value: PrefValue) -> Result<()> {
        let mut guard = self.write();
        guard.prefs.insert(name.to_string(), value);
        self.persist(&guard)
    }

    pub fn active_variation(&self) -> Option<String> {
        self.read().active_variation.clone()
    }

    pub fn define_variation(&self, name: &str, prefs: BTreeMap<String, PrefValue>) -> Result<()> {
        let mut guard = self.write();
        guard.variations.insert(name.to_string(), prefs);
        self.persist(&guard)
    }

    /// Applies the prefs of a named variation and registers them for cleanup.
    pub fn configure_variation(&self, name: &str) -> Result<()> {
        let mut guard = self.write();
        let prefs = guard
            .variations
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("unknown study variation '{name}'"))?;

        for (pref, value) in prefs {
            guard.registered_prefs.insert(pref.clone());
            guard.prefs.insert(pref, value);
        }
        guard.active_variation = Some(name.to_string());
        self.persist(&guard)?;

        log_info!("Configured study variation '{name}'");
        Ok(())
    }

    /// Removes every pref the active variation set.
    pub fn cleanup(&self) -> Result<()> {
        let mut guard = self.write();
        let registered = std::mem::take(&mut guard.registered_prefs);
        for pref in &registered {
            guard.prefs.remove(pref);
        }
        guard.active_variation = None;
        self.persist(&guard)?;

        log_info!("Cleaned up {} study prefs", registered.len());
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, StudySettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StudySettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, data: &StudySettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl PreferenceSource for SettingsStore {
    fn pref(&self, name: &str) -> Option<PrefValue> {
        self.read().prefs.get(name).cloned()
    }
}
