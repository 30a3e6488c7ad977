//! mus - expand command templates over files and ranges, skip jobs whose
//! outputs are up to date, and run the rest in parallel

// Deny all clippy warnings in this crate
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
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
    clippy::future_not_send
)]

mod cli;
mod commands;

/// Main entry point for the mus CLI
fn main() -> anyhow::Result<()> {
    cli::run()
}
