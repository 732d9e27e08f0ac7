//! Command-line interface.

mod commands;
mod helpers;
mod progress;

pub use commands::{run, Cli};
