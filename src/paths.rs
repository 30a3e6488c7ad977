//! Centralized path definitions for mus
//!
//! This module is the single source of truth for the filesystem locations
//! mus reads and writes.
//!
//! ## Storage Layout
//!
//! ### Global (User-Level)
//!
//! ```text
//! ~/.local/mus/
//! ├── config.toml               # User configuration
//! ├── history.jsonl             # Audit trail, one record per line
//! └── macro/                    # Saved templates
//!     ├── fastqc.mmc
//!     └── sort.mmc
//! ```
//!
//! ### Per-Directory
//!
//! ```text
//! project/
//! ├── .mus.toml                 # Local configuration, layered over the global file
//! └── mus.log                   # Replayable script log of executed batches
//! ```

use std::path::PathBuf;

/// Local configuration filename
pub const LOCAL_CONFIG: &str = ".mus.toml";

/// Script log filename, written to the current directory
pub const SCRIPT_LOG: &str = "mus.log";

/// Extension of saved template files
pub const MACRO_EXTENSION: &str = "mmc";

/// Global directory, relative to the home directory
const GLOBAL_DIR: &str = ".local/mus";

/// Global config filename
const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Audit trail filename
const HISTORY_FILE: &str = "history.jsonl";

/// Saved templates subdirectory
const MACRO_DIR: &str = "macro";

/// Get the global mus directory.
///
/// Returns `~/.local/mus/`.
#[must_use]
pub fn mus_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("~")).join(GLOBAL_DIR)
}

/// Get the global config file path.
///
/// Returns `~/.local/mus/config.toml`.
#[must_use]
pub fn global_config() -> PathBuf {
    mus_dir().join(GLOBAL_CONFIG_FILE)
}

/// Get the default audit trail path.
///
/// Returns `~/.local/mus/history.jsonl`.
#[must_use]
pub fn history_file() -> PathBuf {
    mus_dir().join(HISTORY_FILE)
}

/// Get the default saved template directory.
///
/// Returns `~/.local/mus/macro/`.
#[must_use]
pub fn macro_dir() -> PathBuf {
    mus_dir().join(MACRO_DIR)
}

/// Get the script log path in the current directory.
#[must_use]
pub fn script_log() -> PathBuf {
    PathBuf::from(".").join(SCRIPT_LOG)
}
