//! CLI configuration

use serde::{Deserialize, Serialize};

use crate::commands::HarnessArgs;
use crate::error::{CliError, CliResult};
use sonda::HarnessConfig;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - per-step progress
    Verbose,
    /// Debug - every retry and bridge round trip
    Debug,
}

impl Verbosity {
    /// Build from the `-v` count and `-q` flag
    #[must_use]
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Log filter used when `RUST_LOG` is not set
    #[must_use]
    pub const fn default_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "warn,sonda=info",
            Self::Debug => "info,sonda=debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should stdout use colors
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
        }
    }

    /// Should log lines on stderr use colors
    #[must_use]
    pub fn should_color_stderr(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Log line format
    pub log_format: LogFormat,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set log format
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}

/// Effective harness configuration: file (or defaults), then flags and env
pub fn resolve_harness(args: &HarnessArgs) -> CliResult<HarnessConfig> {
    let mut harness = match args.config {
        Some(ref path) => HarnessConfig::from_path(path).map_err(|e| {
            CliError::config(format!("cannot load {}: {e}", path.display()))
        })?,
        None => HarnessConfig::new(),
    };

    if let Some(ref url) = args.url {
        harness.launch.url = Some(url.clone());
    }
    if args.headed {
        harness.launch.headless = false;
    } else if let Some(headless) = args.headless {
        harness.launch.headless = headless;
    }
    if let Some(ref path) = args.chromium_path {
        harness.launch.chromium_path = Some(path.clone());
    }
    if args.no_sandbox {
        harness.launch.sandbox = false;
    }
    if let Some(ref hook) = args.hook {
        harness.hook_object.clone_from(hook);
    }

    harness.validate()?;
    Ok(harness)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(3, false), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(2, true), Verbosity::Quiet);
        }

        #[test]
        fn test_default_filter_widens_with_verbosity() {
            assert_eq!(Verbosity::Quiet.default_filter(), "error");
            assert_eq!(Verbosity::Normal.default_filter(), "warn");
            assert!(Verbosity::Verbose.default_filter().contains("sonda=info"));
            assert!(Verbosity::Debug.default_filter().contains("sonda=debug"));
        }

        #[test]
        fn test_predicates() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
        }
    }

    mod color_tests {
        use super::*;

        #[test]
        fn test_forced_choices() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
            assert!(!ColorChoice::Never.should_color_stderr());
        }
    }

    mod cli_config_tests {
        use super::*;

        #[test]
        fn test_builders() {
            let config = CliConfig::new()
                .with_verbosity(Verbosity::Debug)
                .with_color(ColorChoice::Never)
                .with_log_format(LogFormat::Json);
            assert_eq!(config.verbosity, Verbosity::Debug);
            assert_eq!(config.color, ColorChoice::Never);
            assert_eq!(config.log_format, LogFormat::Json);
        }
    }

    mod harness_tests {
        use super::*;

        #[test]
        fn test_defaults_without_file() {
            let harness = resolve_harness(&HarnessArgs::default()).unwrap();
            assert_eq!(harness, HarnessConfig::new());
        }

        #[test]
        fn test_flags_override_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(
                file,
                "hook_object: behat\nlaunch:\n  url: http://from-file\n  headless: true\n"
            )
            .unwrap();

            let args = HarnessArgs {
                config: Some(file.path().to_path_buf()),
                url: Some("http://localhost:8100".to_string()),
                headed: true,
                no_sandbox: true,
                ..HarnessArgs::default()
            };
            let harness = resolve_harness(&args).unwrap();

            assert_eq!(harness.launch.url.as_deref(), Some("http://localhost:8100"));
            assert!(!harness.launch.headless);
            assert!(!harness.launch.sandbox);
        }

        #[test]
        fn test_headed_wins_over_headless_env() {
            let args = HarnessArgs {
                headed: true,
                headless: Some(true),
                ..HarnessArgs::default()
            };
            assert!(!resolve_harness(&args).unwrap().launch.headless);

            let args = HarnessArgs {
                headless: Some(false),
                ..HarnessArgs::default()
            };
            assert!(!resolve_harness(&args).unwrap().launch.headless);
        }

        #[test]
        fn test_missing_file_is_config_error() {
            let args = HarnessArgs {
                config: Some("/nonexistent/harness.yaml".into()),
                ..HarnessArgs::default()
            };
            let err = resolve_harness(&args).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }

        #[test]
        fn test_blank_hook_is_rejected() {
            let args = HarnessArgs {
                hook: Some("  ".to_string()),
                ..HarnessArgs::default()
            };
            assert!(resolve_harness(&args).is_err());
        }
    }
}
