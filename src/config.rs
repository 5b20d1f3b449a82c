// Runtime configuration
//
// Precedence, lowest to highest: constants.rs defaults, JSON config file,
// CAMWATCH_* environment variables, CLI flags (applied by the binary).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{CamwatchError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub db_path: PathBuf,
    pub interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub index_probe_limit: u32,
    pub log_level: String,
    /// Explicit v4l2-ctl location; falls back to tools::v4l2_ctl_path()
    pub v4l2_ctl_path: Option<PathBuf>,
}

/// Config file shape: every key optional so partial files are valid.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    db_path: Option<PathBuf>,
    interval_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
    index_probe_limit: Option<u32>,
    log_level: Option<String>,
    v4l2_ctl_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            index_probe_limit: DEFAULT_INDEX_PROBE_LIMIT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            v4l2_ctl_path: None,
        }
    }
}

/// Effective config plus anything the caller should log once logging is up.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// Problems that were tolerated, e.g. an unreadable default config file
    pub warnings: Vec<String>,
}

impl Config {
    /// Build the effective config from defaults, an optional file, and the environment.
    /// With no explicit path, ~/.camwatch/config.json is read if it exists.
    pub fn load(config_path: Option<&Path>) -> Result<LoadedConfig> {
        load_with(config_path, default_config_path(), |key| std::env::var(key).ok())
    }

    fn merge_file(&mut self, file: &ConfigFile) {
        if let Some(ref p) = file.db_path {
            self.db_path = p.clone();
        }
        if let Some(v) = file.interval_secs {
            self.interval_secs = v;
        }
        if let Some(v) = file.probe_timeout_secs {
            self.probe_timeout_secs = v;
        }
        if let Some(v) = file.index_probe_limit {
            self.index_probe_limit = v;
        }
        if let Some(ref v) = file.log_level {
            self.log_level = v.clone();
        }
        if let Some(ref p) = file.v4l2_ctl_path {
            self.v4l2_ctl_path = Some(p.clone());
        }
    }

    /// Apply CAMWATCH_* overrides. The lookup is injected so tests stay off the process env.
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DB_PATH) {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_INTERVAL_SECS) {
            self.interval_secs = parse_env(ENV_INTERVAL_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_PROBE_TIMEOUT_SECS) {
            self.probe_timeout_secs = parse_env(ENV_PROBE_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_INDEX_PROBE_LIMIT) {
            self.index_probe_limit = parse_env(ENV_INDEX_PROBE_LIMIT, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG_LEVEL) {
            self.log_level = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(CamwatchError::Config("interval must be at least 1 second".to_string()));
        }
        if self.probe_timeout_secs == 0 {
            return Err(CamwatchError::Config("probe timeout must be at least 1 second".to_string()));
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(CamwatchError::Config(format!("unknown log level '{}'", self.log_level)));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// Resolved v4l2-ctl binary
    pub fn v4l2_ctl(&self) -> PathBuf {
        self.v4l2_ctl_path
            .clone()
            .unwrap_or_else(crate::tools::v4l2_ctl_path)
    }
}

fn load_with<F>(config_path: Option<&Path>, default_path: Option<PathBuf>, lookup: F) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();
    let mut warnings = Vec::new();

    match config_path {
        Some(path) => config.merge_file(&read_config_file(path)?),
        None => {
            if let Some(path) = default_path.filter(|p| p.exists()) {
                // Best-effort: a broken default file should not stop the daemon
                match read_config_file(&path) {
                    Ok(file) => config.merge_file(&file),
                    Err(e) => warnings.push(format!("Ignoring {}: {}", path.display(), e)),
                }
            }
        }
    }

    config.apply_env(lookup)?;
    config.validate()?;
    Ok(LoadedConfig { config, warnings })
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CamwatchError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CamwatchError::Config(format!("{} has invalid value '{}'", key, value)))
}

fn app_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(APP_DIR))
}

/// ~/.camwatch/camwatch.db, or ./camwatch.db when no home directory is known
pub fn default_db_path() -> PathBuf {
    app_dir()
        .map(|d| d.join(DB_FILENAME))
        .unwrap_or_else(|| PathBuf::from(DB_FILENAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    app_dir().map(|d| d.join(CONFIG_FILENAME))
}
