//! mus - expand command templates over files and ranges, skip jobs whose
//! outputs are up to date, and run the rest in parallel
//!
//! A template such as `gzip -c :*.txt: > :>*.txt.gz:` expands into one job
//! per matching file. Jobs whose outputs are newer than their inputs are
//! skipped; the rest run as shell commands under a concurrency cap, and
//! every template and job leaves a record in the audit trail.

// Deny all clippy warnings in this crate
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces
)]
// Allow some pedantic lints that are too noisy or not applicable
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cargo_common_metadata,
    clippy::missing_panics_doc,
    clippy::future_not_send
)]

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod advisory;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod job;
pub mod output;
pub mod paths;
pub mod script_log;
pub mod store;
pub mod template;
pub mod tsp;
pub mod util;
