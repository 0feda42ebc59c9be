//! Sonda CLI library
//!
//! Command-line front end for the sonda harness: offline scenario checks,
//! scenario runs against Chromium, and the effective harness config.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    CheckArgs, CheckFormat, Cli, ColorArg, Commands, ConfigArgs, HarnessArgs, LogFormatArg,
    RunArgs,
};
pub use config::{resolve_harness, CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{format_summary, Reporter, Status};
