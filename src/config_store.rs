use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Connection settings for the external stock database. Persisted as the sole
/// record of the JSON config file and overwritten wholesale on each save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConnectionConfig {
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Kept for compatibility with the legacy import tooling's config format.
    #[serde(default = "default_driver")]
    pub driver: String,
}

fn default_driver() -> String {
    "postgres".to_string()
}

impl DbConnectionConfig {
    pub fn is_complete(&self) -> bool {
        !self.server.trim().is_empty()
            && !self.database.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.password.trim().is_empty()
            && !self.driver.trim().is_empty()
    }
}

/// File-backed store for the external database credentials. All reads and
/// writes are serialized by a single lock; this is the only cross-request
/// synchronization in the service.
pub struct ConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the persisted config, or `None` when the file is absent or
    /// malformed. Corruption degrades to "unconfigured" rather than failing.
    pub fn load(&self) -> Option<DbConnectionConfig> {
        let _guard = self.lock.lock().unwrap();

        if !self.path.exists() {
            return None;
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to read config file {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(
                    "Config file {:?} is corrupted, treating as unconfigured: {}",
                    self.path,
                    e
                );
                None
            }
        }
    }

    pub fn save(&self, config: &DbConnectionConfig) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap();

        let raw = serde_json::to_string_pretty(config)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> DbConnectionConfig {
        DbConnectionConfig {
            server: "10.0.0.5:5432".to_string(),
            database: "estoque".to_string(),
            username: "coleta".to_string(),
            password: "segredo".to_string(),
            driver: "postgres".to_string(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("db_config.json"));

        assert!(store.load().is_none());

        let config = sample_config();
        store.save(&config).unwrap();
        assert_eq!(store.load(), Some(config));
    }

    #[test]
    fn corrupt_file_loads_as_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db_config.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::new(path);
        assert!(store.load().is_none());
    }

    #[test]
    fn save_overwrites_previous_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("db_config.json"));

        store.save(&sample_config()).unwrap();

        let mut updated = sample_config();
        updated.server = "192.168.1.10".to_string();
        store.save(&updated).unwrap();

        assert_eq!(store.load(), Some(updated));
    }

    #[test]
    fn missing_driver_defaults_to_postgres() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db_config.json");
        fs::write(
            &path,
            r#"{"server":"s","database":"d","username":"u","password":"p"}"#,
        )
        .unwrap();

        let store = ConfigStore::new(path);
        assert_eq!(store.load().unwrap().driver, "postgres");
    }

    #[test]
    fn incomplete_config_is_detected() {
        let mut config = sample_config();
        config.password = "  ".to_string();
        assert!(!config.is_complete());
        assert!(sample_config().is_complete());
    }
}
