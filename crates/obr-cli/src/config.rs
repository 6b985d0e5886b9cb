//! `obr.toml` configuration.
//!
//! ```toml
//! repositories = ["repos/", "/srv/obr/repository.json"]
//! deploy-dir = "bundles"
//!
//! [resolve]
//! no-optional = false
//! do-not-prefer-local = false
//! ```
//!
//! Relative paths are taken relative to the directory holding the file.

use anyhow::{Context, Result};
use obr_core::ResolveOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up under the user config directory.
pub const CONFIG_FILE: &str = "obr.toml";

/// Parsed configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Repository files or directories, searched in this order.
    pub repositories: Vec<PathBuf>,
    /// Where `obr deploy` installs bundles when `--dir` is not given.
    pub deploy_dir: Option<PathBuf>,
    /// Default resolve options.
    pub resolve: ResolveOptions,
}

impl Config {
    /// `<config dir>/obr/obr.toml`, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("obr").join(CONFIG_FILE))
    }

    /// Load from `explicit`, or from the default path when it exists.
    ///
    /// # Errors
    ///
    /// Fails if an explicit file is missing or any file cannot be parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.relative_to(base))
    }

    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or unknown value types.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn relative_to(mut self, base: &Path) -> Self {
        for path in &mut self.repositories {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(dir) = self.deploy_dir.as_mut().filter(|dir| dir.is_relative()) {
            *dir = base.join(&*dir);
        }
        self
    }
}
