//! Status lines on stdout

use console::{style, Term};
use std::time::Duration;

/// Kind of status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Scenario or file passed
    Pass,
    /// Scenario or file failed
    Fail,
    /// Progress note
    Info,
}

/// Prints status lines for scenarios and files
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Reporter {
    /// Create a reporter on stdout
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    /// Render one status line
    #[must_use]
    pub fn format_line(&self, status: Status, message: &str) -> String {
        let prefix = match (status, self.use_color) {
            (Status::Pass, true) => style("✓").green().bold().to_string(),
            (Status::Fail, true) => style("✗").red().bold().to_string(),
            (Status::Info, true) => style("·").dim().to_string(),
            (Status::Pass, false) => "PASS".to_string(),
            (Status::Fail, false) => "FAIL".to_string(),
            (Status::Info, false) => "INFO".to_string(),
        };
        format!("{prefix} {message}")
    }

    /// Print a status line; failures print even in quiet mode
    pub fn line(&self, status: Status, message: &str) {
        if self.quiet && status != Status::Fail {
            return;
        }
        let _ = self.term.write_line(&self.format_line(status, message));
    }

    /// Print the closing tally
    pub fn summary(&self, passed: usize, failed: usize, elapsed: Duration) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&format_summary(passed, failed, elapsed));
    }
}

/// `N passed, M failed in X.XXs`
#[must_use]
pub fn format_summary(passed: usize, failed: usize, elapsed: Duration) -> String {
    format!(
        "{passed} passed, {failed} failed in {:.2}s",
        elapsed.as_secs_f64()
    )
}
