use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::quote::DEFAULT_ENDPOINT;
use crate::runtime::TICK_RATE_MS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub min_length: usize,
    pub max_length: usize,
    pub endpoint: String,
    pub tick_rate_ms: u64,
    pub offline: bool,
    pub story_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_length: 100,
            max_length: 500,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            tick_rate_ms: TICK_RATE_MS,
            offline: false,
            story_mode: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.min_length == 0 {
            return Err(Error::Config("minLength must be at least 1".into()));
        }
        if self.min_length > self.max_length {
            return Err(Error::Config(format!(
                "minLength ({}) is greater than maxLength ({})",
                self.min_length, self.max_length
            )));
        }
        if self.tick_rate_ms == 0 {
            return Err(Error::Config("tickRateMs must be at least 1".into()));
        }
        if !self.offline && self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint is empty".into()));
        }
        Ok(())
    }

    /// Layer command line overrides on top of the stored config.
    pub fn merged(mut self, overrides: &RuntimeSettings) -> Self {
        if let Some(min) = overrides.min_length {
            self.min_length = min;
        }
        if let Some(max) = overrides.max_length {
            self.max_length = max;
        }
        if let Some(endpoint) = &overrides.endpoint {
            self.endpoint = endpoint.clone();
        }
        if overrides.offline {
            self.offline = true;
        }
        if overrides.no_story {
            self.story_mode = false;
        }
        self
    }
}

/// Values given on the command line; `None`/`false` leaves the config alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeSettings {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub endpoint: Option<String>,
    pub offline: bool,
    pub no_story: bool,
}

pub trait ConfigStore {
    fn load(&self) -> Config;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: crate::app_dirs::AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!(path = %self.path.display(), "ignoring config: {e}"),
            }
        }
        Config::default()
    }
}
