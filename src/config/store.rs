// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File-backed configuration store.
//!
//! The schema is validated once at load; a corrupt file is renamed to a
//! timestamped backup and replaced with defaults instead of failing the
//! process. Saves rotate the previous file to `.bak` before writing.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde_json::Value;

use crate::config::credentials::CredentialStore;
use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::fsio;

pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Load configuration from `path`, falling back to defaults.
    ///
    /// A file that does not decode into the schema is moved aside to a
    /// timestamped `.bak` and replaced with the written defaults. Read
    /// failures other than decoding fall back to defaults in memory without
    /// touching the file.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self {
                path: path.to_path_buf(),
                config: Config::default(),
            };
        }

        let config = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Config>(&raw) {
                Ok(config) => {
                    info!("configuration loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    error!("corrupt config file {}: {e}", path.display());
                    Self::backup_and_reset(path)
                }
            },
            Err(e) => {
                error!("failed to read config file {}: {e}", path.display());
                warn!("continuing with default configuration");
                Config::default()
            }
        };

        Self {
            path: path.to_path_buf(),
            config,
        }
    }

    fn backup_and_reset(path: &Path) -> Config {
        let backup = fsio::timestamped_backup_path(path);
        match std::fs::rename(path, &backup) {
            Ok(()) => warn!("corrupt config saved as {}", backup.display()),
            Err(e) => error!("failed to back up corrupt config: {e}"),
        }

        let config = Config::default();
        let mut store = Self {
            path: path.to_path_buf(),
            config: config.clone(),
        };
        if let Err(e) = store.save() {
            error!("failed to restore default config file: {e}");
        }
        config
    }

    /// Save the configuration, rotating the previous file to `.bak` first so
    /// a failed write never loses the prior contents.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        fsio::rotate_backup(&self.path).map_err(|e| ConfigError::BackupFailed {
            path: self.path.clone(),
            source: e,
        })?;

        let json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, json).map_err(|e| ConfigError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;

        info!("configuration saved to {}", self.path.display());
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value at a dotted key path through the serialized tree.
    ///
    /// Returns `None` on any non-mapping traversal; callers supply their own
    /// default.
    pub fn get_path(&self, keys: &[&str]) -> Option<Value> {
        let tree = serde_json::to_value(&self.config).ok()?;
        let mut node = &tree;
        for key in keys {
            node = node.as_object()?.get(*key)?;
        }
        Some(node.clone())
    }

    /// Write a value at a key path, creating intermediate mappings as needed.
    ///
    /// A non-mapping intermediate node is overwritten (logged as a warning).
    /// A write whose result no longer matches the schema is rejected with no
    /// mutation.
    pub fn set_path(&mut self, keys: &[&str], value: Value) -> Result<(), ConfigError> {
        let (last, parents) = keys.split_last().ok_or(ConfigError::EmptyPath)?;

        let mut tree = serde_json::to_value(&self.config)?;
        let mut node = &mut tree;
        for key in parents {
            let map = match node {
                Value::Object(map) => map,
                _ => unreachable!("walk only descends into objects"),
            };
            let entry = map.entry(key.to_string()).or_insert_with(|| Value::Object(Default::default()));
            if !entry.is_object() {
                warn!("overwriting non-mapping value at '{key}' in config");
                *entry = Value::Object(Default::default());
            }
            node = entry;
        }

        match node {
            Value::Object(map) => {
                map.insert(last.to_string(), value);
            }
            _ => unreachable!("walk only descends into objects"),
        }

        self.config =
            serde_json::from_value(tree).map_err(|e| ConfigError::SchemaViolation {
                path: keys.join("."),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Collect every configuration problem; never short-circuits, so the
    /// caller can display all of them at once.
    pub fn validate(&self, credentials: &CredentialStore) -> Vec<String> {
        let mut problems = Vec::new();
        let config = &self.config;

        if config.email.is_empty() {
            problems.push("Email is not configured".to_string());
            problems.push("Password is not configured".to_string());
        } else {
            if !config.email.contains('@') {
                problems.push(format!("Email '{}' is not valid", config.email));
            }
            match credentials.get(&config.email) {
                Ok(Some(_)) => {}
                Ok(None) => problems.push("Password is not configured".to_string()),
                Err(crate::error::CredentialError::Unreadable) => problems.push(
                    "Stored password cannot be decrypted; store it again".to_string(),
                ),
                Err(e) => problems.push(format!("Password could not be retrieved: {e}")),
            }
        }

        check_parent_exists(
            &config.pdf_config.download_dir,
            "PDF download directory",
            &mut problems,
        );
        check_parent_exists(
            &config.video_config.download_dir,
            "video download directory",
            &mut problems,
        );

        problems
    }
}

fn check_parent_exists(dir: &Path, label: &str, problems: &mut Vec<String>) {
    if dir.as_os_str().is_empty() {
        return;
    }
    if let Some(parent) = dir.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            problems.push(format!(
                "Parent of {label} does not exist: {}",
                parent.display()
            ));
        }
    }
}
