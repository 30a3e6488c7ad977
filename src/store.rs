//! Saved templates
//!
//! Templates can be saved under a name and loaded back later. Each one is a
//! plain UTF-8 file `<name>.mmc` in the store directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::paths;

/// Number of characters shown by [`TemplateStore::list`]
pub const PEEK_LEN: usize = 100;

/// Directory of saved templates
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Store rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the store reads and writes
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.{}", paths::MACRO_EXTENSION)))
    }

    /// Save `raw` under `name`, replacing any previous template
    pub fn save(&self, name: &str, raw: &str) -> Result<(), StoreError> {
        let file = self.file(name)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(&file, raw)?;
        log::info!("Save macro {name}: {}", peek(raw, 50));
        Ok(())
    }

    /// Load the template saved under `name`
    pub fn load(&self, name: &str) -> Result<String, StoreError> {
        let file = self.file(name)?;
        if !file.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let raw = fs::read_to_string(&file)?;
        log::debug!("load macro {name} from {}", file.display());
        Ok(raw)
    }

    /// Delete a saved template; `false` when there was none
    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let file = self.file(name)?;
        if !file.exists() {
            return Ok(false);
        }
        fs::remove_file(file)?;
        Ok(true)
    }

    /// Every saved template with the start of its whitespace-collapsed text
    pub fn list(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let mut saved = BTreeMap::new();
        if !self.dir.exists() {
            return Ok(saved);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(paths::MACRO_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let raw = fs::read_to_string(&path)?;
            saved.insert(name.to_string(), peek(&raw, PEEK_LEN));
        }
        Ok(saved)
    }
}

/// Whitespace-collapsed prefix of at most `len` characters
#[must_use]
pub fn peek(raw: &str, len: usize) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(len)
        .collect()
}
