//! Command implementations

mod run;
mod saved;

pub use run::run;
pub use saved::{delete, list, show};
