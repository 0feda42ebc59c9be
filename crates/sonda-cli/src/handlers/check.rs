//! Check command handler: offline scenario validation

use std::path::{Path, PathBuf};

use serde::Serialize;
use sonda::Scenario;

use crate::commands::{CheckArgs, CheckFormat};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{Reporter, Status};

/// A scenario file that parsed and validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckedScenario {
    /// Scenario name
    pub name: String,
    /// Number of steps
    pub steps: usize,
    /// Number of steps that talk to the app
    pub app_steps: usize,
}

/// Result of checking one file
#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    /// Scenario file
    pub file: PathBuf,
    /// The scenario, when the file is valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<CheckedScenario>,
    /// Why the file is invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Results for every checked file
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    /// One entry per file, in argument order
    pub files: Vec<FileCheck>,
}

impl CheckReport {
    /// Number of invalid files
    #[must_use]
    pub fn invalid(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }
}

/// Parse and validate one scenario file
pub fn check_file(path: &Path) -> CliResult<CheckedScenario> {
    let scenario = Scenario::from_path(path)?;
    Ok(CheckedScenario {
        name: scenario.name.clone(),
        steps: scenario.steps.len(),
        app_steps: scenario.steps.iter().filter(|s| s.needs_app()).count(),
    })
}

/// Check every file, collecting failures instead of stopping
#[must_use]
pub fn check_files(files: &[PathBuf]) -> CheckReport {
    let files = files
        .iter()
        .map(|file| match check_file(file) {
            Ok(scenario) => FileCheck {
                file: file.clone(),
                scenario: Some(scenario),
                error: None,
            },
            Err(e) => FileCheck {
                file: file.clone(),
                scenario: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    CheckReport { files }
}

/// Execute the check command
pub fn execute_check(config: &CliConfig, args: &CheckArgs) -> CliResult<()> {
    let report = check_files(&args.files);

    match args.format {
        CheckFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        CheckFormat::Text => {
            let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
            for entry in &report.files {
                let file = entry.file.display();
                match (&entry.scenario, &entry.error) {
                    (Some(s), _) => reporter.line(
                        Status::Pass,
                        &format!("{file}: {} ({} steps)", s.name, s.steps),
                    ),
                    (None, Some(e)) => reporter.line(Status::Fail, &format!("{file}: {e}")),
                    (None, None) => {}
                }
            }
        }
    }

    match report.invalid() {
        0 => Ok(()),
        n => Err(CliError::invalid_argument(format!(
            "{n} of {} scenario file(s) are invalid",
            report.files.len()
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn scenario_file(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    const LOGIN: &str = r#"
name: Login
steps:
  - config:
      siteurl: "http://moodle.test"
  - launch
  - login: student1
  - header_should_be: Dashboard
"#;

    #[test]
    fn test_check_valid_file() {
        let file = scenario_file(LOGIN);
        let checked = check_file(file.path()).unwrap();
        assert_eq!(
            checked,
            CheckedScenario {
                name: "Login".to_string(),
                steps: 4,
                app_steps: 2,
            }
        );
    }

    #[test]
    fn test_check_rejects_step_before_launch() {
        let file = scenario_file("name: Early\nsteps:\n  - press: Submit\n  - launch\n");
        let err = check_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("runs before launch"));
    }

    #[test]
    fn test_check_rejects_bad_locator() {
        let file = scenario_file("name: Bad\nsteps:\n  - launch\n  - press: '\"Log in\" nearby'\n");
        assert!(check_file(file.path()).is_err());
    }

    #[test]
    fn test_check_files_collects_every_result() {
        let good = scenario_file(LOGIN);
        let bad = scenario_file("name: ''\nsteps: []\n");
        let missing = PathBuf::from("/nonexistent/scenario.yaml");

        let report = check_files(&[good.path().to_path_buf(), bad.path().to_path_buf(), missing]);
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.invalid(), 2);
        assert!(report.files[0].scenario.is_some());
        assert!(report.files[2].error.as_deref().unwrap().contains("I/O"));
    }

    #[test]
    fn test_report_json_omits_empty_fields() {
        let good = scenario_file(LOGIN);
        let report = check_files(&[good.path().to_path_buf()]);
        let json = serde_json::to_value(&report).unwrap();
        let entry = &json["files"][0];
        assert_eq!(entry["scenario"]["steps"], 4);
        assert!(entry.get("error").is_none());
    }
}
