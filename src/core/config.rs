//! Configuration loading.
//!
//! Settings live in a TOML file, one table per concern. Each typed section
//! implements [`Configurable`] and is read with [`ConfigStore::section`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to deserialize config section '{section}': {source}")]
    Section {
        section: &'static str,
        #[source]
        source: toml::de::Error,
    },
}

/// A typed configuration section
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Deserialize, Default)]
/// pub struct CacheConfig {
///     pub ttl_secs: u64,
/// }
///
/// impl Configurable for CacheConfig {
///     const SECTION: &'static str = "cache";
/// }
/// ```
pub trait Configurable: DeserializeOwned + Default {
    /// TOML table the section is read from
    const SECTION: &'static str;
}

pub struct ConfigStore {
    data: toml::Value,
    path: Option<PathBuf>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl ConfigStore {
    pub fn empty() -> Self {
        Self {
            data: toml::Value::Table(Default::default()),
            path: None,
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let data = toml::from_str(content)?;
        Ok(Self { data, path: None })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            data: toml::from_str(&content)?,
            path: Some(path.to_path_buf()),
        })
    }

    /// Read a typed section, falling back to its defaults when absent.
    pub fn section<C: Configurable>(&self) -> Result<C, ConfigError> {
        debug!("Loading config section: {}", C::SECTION);

        let Some(section) = self.data.get(C::SECTION).cloned() else {
            return Ok(C::default());
        };

        section.try_into().map_err(|source| ConfigError::Section {
            section: C::SECTION,
            source,
        })
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.data.get(section).is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Build a store from `defaults`, then overlay each file in `files`
    /// that exists, in order. Later files win.
    pub fn layered(defaults: &str, files: &[&Path]) -> Result<Self, ConfigError> {
        let mut store = Self::parse(defaults)?;
        for file in files {
            if file.exists() {
                store.merge(&Self::from_file(file)?);
            } else {
                debug!("Skipping missing config file: {}", file.display());
            }
        }
        Ok(store)
    }

    /// Overlay `other` on top of this store. Tables merge key by key; any
    /// other value in `other` replaces ours. The path of `other`, if any,
    /// becomes this store's path.
    pub fn merge(&mut self, other: &ConfigStore) {
        overlay(&mut self.data, &other.data);
        if other.path.is_some() {
            self.path.clone_from(&other.path);
        }
    }
}

fn overlay(base: &mut toml::Value, top: &toml::Value) {
    if let (toml::Value::Table(lower), toml::Value::Table(upper)) = (&mut *base, top) {
        for (key, value) in upper {
            match lower.get_mut(key) {
                Some(slot) => overlay(slot, value),
                None => {
                    lower.insert(key.clone(), value.clone());
                }
            }
        }
        return;
    }
    *base = top.clone();
}

/// Connection settings for the shared store, read from `[redis]`.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

impl StoreConfig {
    /// Prefer `REDIS_URL` from the environment when it is set and non-empty.
    pub fn with_env_override(self) -> Self {
        match std::env::var("REDIS_URL") {
            Ok(url) if !url.is_empty() => Self { url },
            _ => self,
        }
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Configurable for StoreConfig {
    const SECTION: &'static str = "redis";
}
