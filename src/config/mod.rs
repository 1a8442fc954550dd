use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::plugins::manifest::{resolve_manifest_path, DEFAULT_MANIFEST};
use crate::plugins::DEFAULT_ENTRY_SYMBOL;

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "HEARTH_CONFIG";

const CONFIG_DIR: &str = ".hearth";
const CONFIG_FILE: &str = "config.yaml";

/// Host configuration, read from `~/.hearth/config.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// Name the host reports to plugins
    #[serde(default = "default_host_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginsConfig {
    /// Directory searched for relative plugin paths and bare plugin names
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Manifest loaded at startup; relative paths are taken from `directory`
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Symbol every plugin exports as its entry point
    #[serde(default = "default_entry_symbol")]
    pub entry_symbol: String,

    /// Plugins loaded one by one after the manifest
    #[serde(default)]
    pub preload: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoggingConfig {
    /// Log at DEBUG level
    #[serde(default)]
    pub debug: bool,
}

// Default value functions
fn default_host_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_manifest() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST)
}

fn default_entry_symbol() -> String {
    DEFAULT_ENTRY_SYMBOL.to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: default_host_name(),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            manifest: default_manifest(),
            entry_symbol: default_entry_symbol(),
            preload: Vec::new(),
        }
    }
}

impl PluginsConfig {
    /// Manifest path with `directory` applied
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        resolve_manifest_path(self.directory.as_deref(), &self.manifest)
    }
}

impl Config {
    /// Load the config at [`Config::default_config_path`]; no file means defaults
    pub fn load_default() -> Result<Self> {
        let path = Self::default_config_path()?;
        match fs::read_to_string(&path) {
            Ok(contents) => Self::from_yaml(&contents, &path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read config file {}", path.display()))
            }
        }
    }

    /// Load the config at `path`, which must exist
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&contents, path)
    }

    fn from_yaml(contents: &str, origin: &Path) -> Result<Self> {
        serde_yaml::from_str(contents)
            .with_context(|| format!("Failed to parse config file {}", origin.display()))
    }

    /// Write the config as YAML, creating missing parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// `$HEARTH_CONFIG` when set, else `~/.hearth/config.yaml`
    pub fn default_config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|path| !path.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().context("Cannot locate the home directory")?;
        Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }
}
