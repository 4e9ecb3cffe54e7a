//! Raw settings sources.
//!
//! A [`SettingsSource`] hands out the string value of each [`SettingKey`] at
//! the moment it is asked. [`crate::RelayConfig::load`] reads every key on
//! each call, so a source that changes between calls is observed immediately.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::RelayResult;

/// Recognized setting names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Path of the actor's PEM private key.
    ActorPem,
    /// Broker connection string.
    RedisUrl,
    /// Listener address (`host:port`).
    RelayBind,
    /// Public domain of the relay actor.
    RelayDomain,
    /// Display name.
    RelayServiceName,
    /// Display summary.
    RelaySummary,
    /// Icon URL.
    RelayIcon,
    /// Header image URL.
    RelayImage,
    /// Number of jobs a worker runs at once.
    JobConcurrency,
}

impl SettingKey {
    /// Every key, in validation order.
    pub const ALL: [Self; 9] = [
        Self::ActorPem,
        Self::RedisUrl,
        Self::RelayIcon,
        Self::RelayImage,
        Self::RelayDomain,
        Self::RelayBind,
        Self::RelayServiceName,
        Self::RelaySummary,
        Self::JobConcurrency,
    ];

    /// Name of the key in files and the environment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActorPem => "ACTOR_PEM",
            Self::RedisUrl => "REDIS_URL",
            Self::RelayBind => "RELAY_BIND",
            Self::RelayDomain => "RELAY_DOMAIN",
            Self::RelayServiceName => "RELAY_SERVICENAME",
            Self::RelaySummary => "RELAY_SUMMARY",
            Self::RelayIcon => "RELAY_ICON",
            Self::RelayImage => "RELAY_IMAGE",
            Self::JobConcurrency => "JOB_CONCURRENCY",
        }
    }

    /// Look a key up by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of raw setting values.
pub trait SettingsSource {
    /// Current value of `key`, or `None` when unset.
    fn get(&self, key: SettingKey) -> Option<String>;
}

impl<S: SettingsSource + ?Sized> SettingsSource for &S {
    fn get(&self, key: SettingKey) -> Option<String> {
        (**self).get(key)
    }
}

/// In-memory settings.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<SettingKey, String>,
}

impl MemorySettings {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every known key currently set in `source`.
    #[must_use]
    pub fn snapshot<S: SettingsSource + ?Sized>(source: &S) -> Self {
        let values = SettingKey::ALL
            .into_iter()
            .filter_map(|key| source.get(key).map(|value| (key, value)))
            .collect();

        Self { values }
    }

    /// Builder-style [`MemorySettings::set`].
    #[must_use]
    pub fn with(mut self, key: SettingKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key`, returning the previous value.
    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) -> Option<String> {
        self.values.insert(key, value.into())
    }

    /// Unset `key`, returning the previous value.
    pub fn remove(&mut self, key: SettingKey) -> Option<String> {
        self.values.remove(&key)
    }
}

impl SettingsSource for MemorySettings {
    fn get(&self, key: SettingKey) -> Option<String> {
        self.values.get(&key).cloned()
    }
}

/// File-backed settings with environment overrides.
///
/// The file format is picked from the extension (`.yml`, `.yaml`, `.toml`,
/// `.json`, ...). Environment variables named after a [`SettingKey`] take
/// precedence over the file, so `REDIS_URL=redis://cache:6379` overrides the
/// file's `REDIS_URL`. Values are snapshotted on load; call
/// [`FileSettings::reload`] to pick up changes.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
    values: HashMap<SettingKey, String>,
}

impl FileSettings {
    /// Load settings from `path` and the process environment.
    pub fn from_file<P: AsRef<Path>>(path: P) -> RelayResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = Self::read(&path, environment())?;

        Ok(Self { path, values })
    }

    /// Path the settings were loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and environment.
    pub fn reload(&mut self) -> RelayResult<()> {
        self.values = Self::read(&self.path, environment())?;
        Ok(())
    }

    fn read(path: &Path, env: config::Environment) -> RelayResult<HashMap<SettingKey, String>> {
        let raw: HashMap<String, config::Value> = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(env)
            .build()?
            .try_deserialize()?;

        let mut values = HashMap::new();
        for (name, value) in raw {
            let Some(key) = SettingKey::from_name(&name) else {
                continue;
            };
            let Ok(value) = value.into_string() else {
                continue;
            };
            // Canonical names carry the environment override.
            if name == key.as_str() || !values.contains_key(&key) {
                values.insert(key, value);
            }
        }

        debug!(path = %path.display(), keys = values.len(), "Loaded settings file");
        Ok(values)
    }
}

/// Environment source whose keys line up with the canonical `SettingKey` names.
fn environment() -> config::Environment {
    config::Environment::default().convert_case(config::Case::UpperSnake)
}

impl SettingsSource for FileSettings {
    fn get(&self, key: SettingKey) -> Option<String> {
        self.values.get(&key).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_key_names_round_trip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::from_name(key.as_str()), Some(key));
            assert_eq!(
                SettingKey::from_name(&key.as_str().to_lowercase()),
                Some(key)
            );
        }
        assert_eq!(SettingKey::from_name("PATH"), None);
    }

    #[test]
    fn test_memory_settings_set_and_restore() {
        let mut settings = MemorySettings::new().with(SettingKey::RelayIcon, "https://a/icon.png");
        assert_eq!(
            settings.get(SettingKey::RelayIcon).as_deref(),
            Some("https://a/icon.png")
        );

        let previous = settings.set(SettingKey::RelayIcon, "").unwrap();
        assert_eq!(settings.get(SettingKey::RelayIcon).as_deref(), Some(""));

        settings.set(SettingKey::RelayIcon, previous);
        assert_eq!(
            settings.get(SettingKey::RelayIcon).as_deref(),
            Some("https://a/icon.png")
        );

        settings.remove(SettingKey::RelayIcon);
        assert_eq!(settings.get(SettingKey::RelayIcon), None);
    }

    #[test]
    fn test_file_settings_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "RELAY_SERVICENAME: Example Relay").unwrap();
        writeln!(file, "RELAY_BIND: 0.0.0.0:8080").unwrap();
        writeln!(file, "JOB_CONCURRENCY: 25").unwrap();
        writeln!(file, "UNRELATED_KEY: ignored").unwrap();
        file.flush().unwrap();

        let settings = FileSettings::from_file(file.path()).unwrap();
        assert_eq!(
            settings.get(SettingKey::RelayServiceName).as_deref(),
            Some("Example Relay")
        );
        assert_eq!(
            settings.get(SettingKey::RelayBind).as_deref(),
            Some("0.0.0.0:8080")
        );
        assert_eq!(settings.get(SettingKey::JobConcurrency).as_deref(), Some("25"));
    }

    #[test]
    fn test_file_settings_reload() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "RELAY_SUMMARY: first").unwrap();
        file.flush().unwrap();

        let mut settings = FileSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.get(SettingKey::RelaySummary).as_deref(), Some("first"));

        std::fs::write(file.path(), "RELAY_SUMMARY: second\n").unwrap();
        assert_eq!(settings.get(SettingKey::RelaySummary).as_deref(), Some("first"));

        settings.reload().unwrap();
        assert_eq!(settings.get(SettingKey::RelaySummary).as_deref(), Some("second"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "RELAY_SUMMARY: from file").unwrap();
        writeln!(file, "RELAY_SERVICENAME: Example Relay").unwrap();
        file.flush().unwrap();

        let env = config::Map::from([
            ("RELAY_SUMMARY".to_string(), "from environment".to_string()),
            ("RELAY_CONFIG".to_string(), "config.yml".to_string()),
        ]);
        let values = FileSettings::read(file.path(), environment().source(Some(env))).unwrap();

        assert_eq!(
            values.get(&SettingKey::RelaySummary).map(String::as_str),
            Some("from environment")
        );
        assert_eq!(
            values.get(&SettingKey::RelayServiceName).map(String::as_str),
            Some("Example Relay")
        );
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_file_settings_missing_file() {
        let err = FileSettings::from_file("/nonexistent/relay.yml").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
