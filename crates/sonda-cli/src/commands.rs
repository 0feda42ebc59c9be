//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sonda: check and run SPA end-to-end scenarios
#[derive(Parser, Debug)]
#[command(name = "sonda")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse scenarios and their locators without opening a browser
    Check(CheckArgs),

    /// Run scenarios against the app in Chromium
    Run(RunArgs),

    /// Print the effective harness configuration as YAML
    Config(ConfigArgs),
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Scenario files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: CheckFormat,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario files, run in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Harness settings
    #[command(flatten)]
    pub harness: HarnessArgs,

    /// App config override applied at launch (repeatable)
    #[arg(long = "app-config", value_name = "KEY=JSON", value_parser = parse_key_json)]
    pub app_config: Vec<(String, String)>,

    /// Stop after the first failing scenario
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Harness settings
    #[command(flatten)]
    pub harness: HarnessArgs,
}

/// Flags layered over the harness config file
#[derive(Args, Debug, Clone, Default)]
pub struct HarnessArgs {
    /// Harness config file (YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// App URL
    #[arg(long, env = "SONDA_APP_URL")]
    pub url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Headless mode (ignored with --headed)
    #[arg(long, env = "SONDA_HEADLESS", value_name = "BOOL")]
    pub headless: Option<bool>,

    /// Path to the chromium binary
    #[arg(long, env = "SONDA_CHROMIUM_PATH", value_name = "PATH")]
    pub chromium_path: Option<String>,

    /// Disable the chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Name of the app's global test hook
    #[arg(long, value_name = "NAME")]
    pub hook: Option<String>,
}

/// Split `KEY=JSON`, keeping the JSON text for later parsing
fn parse_key_json(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=JSON, got {s:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("config key must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

/// Check output format
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckFormat {
    /// One line per scenario
    #[default]
    Text,
    /// JSON report
    Json,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}
