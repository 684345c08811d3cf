use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::warn;

use crate::timestamp::NaiveTz;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Directory searched for bill CSVs when no paths are given.
    pub bill_dir: Option<PathBuf>,
    pub naive_timezone: Option<NaiveTz>,
    pub retain_lineitems: Option<bool>,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AccountConfig {
    pub name: Option<String>,
}

impl Config {
    /// Display names for configured accounts, keyed by linked account id.
    pub fn account_names(&self) -> BTreeMap<String, String> {
        self.accounts
            .iter()
            .filter_map(|(id, acct)| acct.name.clone().map(|name| (id.clone(), name)))
            .collect()
    }
}

pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "costslice").map(|d| d.config_dir().join("config.toml"))
}

pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    load_config_from(&path)
}

/// Missing file means defaults; an unreadable one is reported and ignored.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(data) = fs::read_to_string(path) else {
        return Config::default();
    };

    match toml::from_str(&data) {
        Ok(config) => config,
        Err(e) => {
            warn!("invalid config at {}: {}", path.display(), e);
            Config::default()
        }
    }
}
