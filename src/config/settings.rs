// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashMap;
use std::path::Path;

use config::{Config, File};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, warn};

use super::error::ConfigError;

/// A settings section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    /// MIDI input (`index_port`).
    Midi,
    /// Audio engine (`gain`).
    SoundEngine,
}

impl Section {
    /// Returns the name of the section as written in settings files.
    pub fn name(&self) -> &'static str {
        match self {
            Section::Midi => "midi",
            Section::SoundEngine => "sound_engine",
        }
    }

    fn from_name(name: &str) -> Option<Section> {
        match name {
            "midi" => Some(Section::Midi),
            "sound_engine" => Some(Section::SoundEngine),
            _ => None,
        }
    }
}

/// A scalar setting.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

/// Scalar settings addressed by section and key, shared between threads.
#[derive(Default)]
pub struct Settings {
    values: RwLock<HashMap<(Section, String), SettingValue>>,
}

impl Settings {
    /// Creates empty settings. Every getter returns its default.
    pub fn new() -> Settings {
        Settings::default()
    }

    /// Loads settings from a file. The format is derived from the file extension.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let tables = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<HashMap<String, HashMap<String, SettingValue>>>()?;

        let settings = Settings::new();
        {
            let mut values = settings.values.write();
            for (section_name, entries) in tables {
                let Some(section) = Section::from_name(&section_name) else {
                    warn!(section = section_name, "Unknown settings section, ignoring.");
                    continue;
                };
                for (key, value) in entries {
                    values.insert((section, key), value);
                }
            }
            debug!(path = %path.display(), count = values.len(), "Loaded settings.");
        }
        Ok(settings)
    }

    /// Sets a value.
    pub fn set<V: Into<SettingValue>>(&self, section: Section, key: &str, value: V) {
        self.values
            .write()
            .insert((section, key.to_string()), value.into());
    }

    /// Returns a raw value, if set.
    pub fn get(&self, section: Section, key: &str) -> Option<SettingValue> {
        self.values.read().get(&(section, key.to_string())).cloned()
    }

    /// Returns an integer value, or the default if unset or not an integer.
    pub fn get_i64(&self, section: Section, key: &str, default: i64) -> i64 {
        match self.get(section, key) {
            Some(SettingValue::Integer(value)) => value,
            Some(other) => Self::mismatch(section, key, other, default),
            None => default,
        }
    }

    /// Returns a float value, or the default if unset or not a number.
    pub fn get_f64(&self, section: Section, key: &str, default: f64) -> f64 {
        match self.get(section, key) {
            Some(SettingValue::Float(value)) => value,
            Some(SettingValue::Integer(value)) => value as f64,
            Some(other) => Self::mismatch(section, key, other, default),
            None => default,
        }
    }

    /// Returns a boolean value, or the default if unset or not a boolean.
    pub fn get_bool(&self, section: Section, key: &str, default: bool) -> bool {
        match self.get(section, key) {
            Some(SettingValue::Bool(value)) => value,
            Some(other) => Self::mismatch(section, key, other, default),
            None => default,
        }
    }

    /// Returns a text value, or the default if unset or not text.
    pub fn get_string(&self, section: Section, key: &str, default: &str) -> String {
        match self.get(section, key) {
            Some(SettingValue::Text(value)) => value,
            Some(other) => Self::mismatch(section, key, other, default.to_string()),
            None => default.to_string(),
        }
    }

    fn mismatch<T>(section: Section, key: &str, value: SettingValue, default: T) -> T {
        warn!(
            section = section.name(),
            key,
            value = ?value,
            "Setting has an unexpected type, using the default."
        );
        default
    }
}
