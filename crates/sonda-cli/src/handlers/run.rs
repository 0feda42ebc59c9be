//! Run command handler: scenarios against Chromium

use std::path::{Path, PathBuf};
use std::time::Instant;

use sonda::{AppConfigOverrides, Scenario};
#[cfg(feature = "browser")]
use tracing::{debug, info};

use crate::commands::RunArgs;
use crate::config::{resolve_harness, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::{Reporter, Status};

/// Load and validate every scenario before anything is launched
pub fn load_scenarios(files: &[PathBuf]) -> CliResult<Vec<(PathBuf, Scenario)>> {
    files
        .iter()
        .map(|file| {
            Scenario::from_path(file)
                .map(|scenario| (file.clone(), scenario))
                .map_err(|e| CliError::invalid_argument(format!("{}: {e}", file.display())))
        })
        .collect()
}

/// Overrides from `--app-config KEY=JSON` pairs
pub fn app_overrides(pairs: &[(String, String)]) -> CliResult<AppConfigOverrides> {
    let mut overrides = AppConfigOverrides::new();
    for (key, raw) in pairs {
        overrides.set_json(key.as_str(), raw)?;
    }
    Ok(overrides)
}

/// Execute the run command
pub async fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let harness = resolve_harness(&args.harness)?;
    if harness.launch.url.is_none() {
        return Err(CliError::invalid_argument(
            "no app URL: pass --url or set SONDA_APP_URL",
        ));
    }
    let base = app_overrides(&args.app_config)?;
    let scenarios = load_scenarios(&args.files)?;

    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let start = Instant::now();
    let mut passed = 0;
    let mut failed = 0;

    for (file, scenario) in &scenarios {
        if config.verbosity.is_verbose() {
            reporter.line(Status::Info, &format!("{}: {}", file.display(), scenario.name));
        }
        match run_scenario(&harness, scenario, base.clone()).await {
            Ok(steps) => {
                passed += 1;
                reporter.line(
                    Status::Pass,
                    &format!("{} ({steps} steps)", scenario.name),
                );
            }
            Err(e) => {
                failed += 1;
                reporter.line(Status::Fail, &failure_line(file, &e));
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    reporter.summary(passed, failed, start.elapsed());

    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::scenario_failed(format!(
            "{failed} of {} scenario(s) failed",
            scenarios.len()
        )))
    }
}

fn failure_line(file: &Path, err: &CliError) -> String {
    match err {
        CliError::ScenarioFailed { message } => format!("{}: {message}", file.display()),
        CliError::Sonda(e) => format!("{}: {e}", file.display()),
        other => format!("{}: {other}", file.display()),
    }
}

/// One scenario in a fresh browser; returns the number of steps run
#[cfg(feature = "browser")]
async fn run_scenario(
    harness: &sonda::HarnessConfig,
    scenario: &Scenario,
    base: AppConfigOverrides,
) -> CliResult<usize> {
    use sonda::{AppSession, CdpDriver};

    let driver = CdpDriver::launch(&harness.launch).await?;
    let session = AppSession::new(driver, harness.clone());
    let result = scenario.run_with(&session, base).await;

    if let Err(e) = session.into_driver().close().await {
        debug!(error = %e, "browser close failed");
    }

    let summary = result.map_err(|failure| CliError::scenario_failed(failure.to_string()))?;
    info!(
        scenario = %scenario.name,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "scenario finished"
    );
    Ok(summary.steps)
}

#[cfg(not(feature = "browser"))]
async fn run_scenario(
    _harness: &sonda::HarnessConfig,
    _scenario: &Scenario,
    _base: AppConfigOverrides,
) -> CliResult<usize> {
    Err(CliError::config(
        "sonda was built without browser support; rebuild with --features browser",
    ))
}
