//! Command handlers
//!
//! Each module holds the execution logic for one subcommand plus the pure
//! helpers it is built from, tested in place.

pub mod check;
pub mod config;
pub mod run;

pub use check::{check_file, check_files, execute_check, CheckReport, CheckedScenario};
pub use config::{execute_config, render_config};
pub use run::{app_overrides, execute_run, load_scenarios};
