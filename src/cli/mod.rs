//! Command-line interface for backstopper.

mod commands;

pub use commands::{is_verbose, run};
