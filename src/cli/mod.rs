//! CLI module
//!
//! Command-line interface for running replications.
//!
//! # Commands
//!
//! - `run` - Replicate every node into the warehouse table
//! - `check` - Verify source and warehouse connectivity

mod commands;
mod runner;

pub use commands::{Cli, Commands, SettingsOverrides};
pub use runner::{replicate, Runner};
