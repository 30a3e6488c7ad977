//! Configuration management
//!
//! Configuration is read from `~/.local/mus/config.toml` and then from every
//! `.mus.toml` between the filesystem root and the current directory. Later
//! (nearer) files override earlier ones; `tags` accumulate instead, and a
//! tag written `-name` removes `name` inherited from an outer file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::paths;

/// One configuration file as written on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLayer {
    /// Default number of concurrent jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// Tags added to (or, with a `-` prefix, removed from) every record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Host name override for audit records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// User name override for audit records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Write `mus.log` for executed batches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_log: Option<bool>,
    /// Audit trail location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<PathBuf>,
    /// Saved template directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macro_dir: Option<PathBuf>,
}

impl ConfigLayer {
    /// Read a layer from disk
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid configuration in {}", path.display()))
    }
}

/// Effective configuration after layering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Default number of concurrent jobs, if configured
    pub threads: Option<usize>,
    /// Host name override
    pub host: Option<String>,
    /// User name override
    pub user: Option<String>,
    /// Write `mus.log` for executed batches
    pub script_log: bool,
    /// Audit trail location
    pub history: PathBuf,
    /// Saved template directory
    pub macro_dir: PathBuf,
    /// Files that contributed, outermost first
    pub sources: Vec<PathBuf>,
    tags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: None,
            host: None,
            user: None,
            script_log: true,
            history: paths::history_file(),
            macro_dir: paths::macro_dir(),
            sources: Vec::new(),
            tags: Vec::new(),
        }
    }
}

impl Config {
    /// Load the global file and every local file up to the current directory
    pub fn load() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::load_from(Some(&paths::global_config()), &cwd)
    }

    /// Load `global` (if given) and every `.mus.toml` from the root down to `cwd`
    pub fn load_from(global: Option<&Path>, cwd: &Path) -> anyhow::Result<Self> {
        let mut files: Vec<PathBuf> = global.map(Path::to_path_buf).into_iter().collect();
        let mut locals: Vec<PathBuf> = cwd.ancestors().map(|dir| dir.join(paths::LOCAL_CONFIG)).collect();
        locals.reverse();
        files.extend(locals);

        let mut config = Self::default();
        for file in files.into_iter().filter(|f| f.is_file()) {
            let layer = ConfigLayer::read(&file)?;
            log::debug!("config layer {}", file.display());
            config.apply(layer);
            config.sources.push(file);
        }
        Ok(config)
    }

    /// Apply one layer over this configuration
    pub fn apply(&mut self, layer: ConfigLayer) {
        if layer.threads.is_some() {
            self.threads = layer.threads;
        }
        if layer.host.is_some() {
            self.host = layer.host;
        }
        if layer.user.is_some() {
            self.user = layer.user;
        }
        if let Some(script_log) = layer.script_log {
            self.script_log = script_log;
        }
        if let Some(history) = layer.history {
            self.history = history;
        }
        if let Some(macro_dir) = layer.macro_dir {
            self.macro_dir = macro_dir;
        }
        for tag in layer.tags {
            if let Some(removed) = tag.strip_prefix('-') {
                self.tags.retain(|t| t != removed);
            } else if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    /// Effective tags in the order they were first added
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    /// Concurrency to use when none is given on the command line
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
            .filter(|&t| t > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(std::num::NonZeroUsize::get))
            .unwrap_or(1)
    }
}
