use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backup::DEFAULT_MAX_BACKUPS;
use crate::error::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "jx3_sync_config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub game_path: String,
    pub userdata_path: String,
    pub auto_backup: bool,
    pub confirm_before_copy: bool,
    pub max_backups: usize,
    pub backup_dir: Option<PathBuf>,
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_path: String::new(),
            userdata_path: String::new(),
            auto_backup: true,
            confirm_before_copy: true,
            max_backups: DEFAULT_MAX_BACKUPS,
            backup_dir: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl AppConfig {
    /// The remembered save-data root, if one was stored and still exists.
    pub fn userdata(&self) -> Option<PathBuf> {
        let p = PathBuf::from(&self.userdata_path);
        (!self.userdata_path.is_empty() && p.is_dir()).then_some(p)
    }
}

/// `<config dir>/jx3-role-sync/config.json`, or a file in the working directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("jx3-role-sync").join("config.json"))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: AppConfig,
}

impl ConfigStore {
    /// Load `path` over the defaults. A missing file is not an error; an
    /// unreadable or malformed one is logged and ignored.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "malformed config, using defaults");
                AppConfig::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read config, using defaults");
                AppConfig::default()
            }
        };
        Self { path, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let s = serde_json::to_string_pretty(&self.config)?;
        fs::write(&self.path, s)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.config = AppConfig::default();
    }

    /// Set one field from its JSON text, e.g. `("max_backups", "3")`.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let mut doc = serde_json::to_value(&self.config)?;
        let slot = doc
            .get_mut(key)
            .ok_or_else(|| Error::UnknownConfigKey(key.to_string()))?;
        *slot = value;
        self.config = serde_json::from_value(doc)?;
        Ok(())
    }

    /// Remember where the root was found and which path the user gave.
    pub fn remember_root(&mut self, game_path: &Path, userdata: &Path) {
        self.config.game_path = game_path.to_string_lossy().into_owned();
        self.config.userdata_path = userdata.to_string_lossy().into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let d = tempdir().unwrap();
        let store = ConfigStore::open(d.path().join("cfg.json"));
        assert_eq!(store.config(), &AppConfig::default());
        assert!(store.config().auto_backup);
        assert_eq!(store.config().max_backups, 5);
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let d = tempdir().unwrap();
        let p = d.path().join("cfg.json");
        fs::write(&p, r#"{"max_backups": 9, "unknown_field": 1}"#).unwrap();
        let store = ConfigStore::open(&p);
        assert_eq!(store.config().max_backups, 9);
        assert!(store.config().confirm_before_copy);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let d = tempdir().unwrap();
        let p = d.path().join("cfg.json");
        fs::write(&p, "{ not json").unwrap();
        assert_eq!(ConfigStore::open(&p).config(), &AppConfig::default());
    }

    #[test]
    fn save_and_reload() {
        let d = tempdir().unwrap();
        let p = d.path().join("nested").join("cfg.json");
        let mut store = ConfigStore::open(&p);
        store.remember_root(Path::new("/games/jx3"), Path::new("/games/jx3/bin/zhcn/userdata"));
        store.set("auto_backup", "false").unwrap();
        store.save().unwrap();
        let again = ConfigStore::open(&p);
        assert_eq!(again.config().game_path, "/games/jx3");
        assert!(!again.config().auto_backup);
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_types() {
        let mut store = ConfigStore::open("unused.json");
        assert!(matches!(store.set("nope", "1"), Err(Error::UnknownConfigKey(_))));
        assert!(matches!(store.set("max_backups", "\"many\""), Err(Error::Json(_))));
        assert_eq!(store.config().max_backups, 5);
        store.set("backup_dir", "\"/tmp/bk\"").unwrap();
        assert_eq!(store.config().backup_dir, Some(PathBuf::from("/tmp/bk")));
        store.reset();
        assert_eq!(store.config(), &AppConfig::default());
    }

    #[test]
    fn userdata_requires_existing_dir() {
        let d = tempdir().unwrap();
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.userdata(), None);
        cfg.userdata_path = d.path().to_string_lossy().into_owned();
        assert_eq!(cfg.userdata(), Some(d.path().to_path_buf()));
    }
}
