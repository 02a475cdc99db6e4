//! Command-line interface for azpat.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
