//! Scenario files - YAML lists of structured steps.
//!
//! Each step is keyed by its normalized phrase:
//!
//! ```yaml
//! name: Student sees the course header
//! steps:
//!   - config:
//!       disableUserTours: false
//!   - launch
//!   - login: student1
//!   - enter_course: Course 1
//!   - header_should_be: Course 1
//!   - press: '"Participants" "ion-item"'
//!   - should_find_inside:
//!       locator: '"Grades"'
//!       inside: main menu
//! ```
//!
//! Locators use the surface syntax (`"text"`, `"text" "selector"`,
//! `"text" near "other"`); a value without a leading quote is taken as plain
//! text. Locators and button names are checked when the file is parsed, so a
//! scenario that loads has no input errors left.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use crate::command::StandardButton;
use crate::config::AppConfigOverrides;
use crate::driver::ScriptDriver;
use crate::locator::ElementLocator;
use crate::result::{SondaError, SondaResult};
use crate::session::{AppSession, SwipeDirection};

fn locator<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ElementLocator, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.starts_with('"') {
        trimmed.parse().map_err(serde::de::Error::custom)
    } else if trimmed.is_empty() {
        Err(serde::de::Error::custom("locator text is empty"))
    } else {
        Ok(ElementLocator::text(trimmed))
    }
}

fn standard_button<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StandardButton, D::Error> {
    String::deserialize(deserializer)?
        .parse()
        .map_err(serde::de::Error::custom)
}

/// One scenario step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Add app config overrides (before `launch`)
    Config(BTreeMap<String, Value>),
    /// Open the app
    Launch,
    /// Connect to a site from the site form, if it is showing
    EnterSite(String),
    /// Log in as a user (password = username)
    Login(String),
    /// Enter a course by name
    EnterCourse(String),
    /// Press an element
    Press(#[serde(deserialize_with = "locator")] ElementLocator),
    /// Press a standard navigation button
    PressStandard(#[serde(deserialize_with = "standard_button")] StandardButton),
    /// Element is present
    ShouldFind(#[serde(deserialize_with = "locator")] ElementLocator),
    /// Element is absent
    ShouldNotFind(#[serde(deserialize_with = "locator")] ElementLocator),
    /// Element is present inside a named container
    ShouldFindInside {
        /// Target
        #[serde(deserialize_with = "locator")]
        locator: ElementLocator,
        /// Container name
        inside: String,
    },
    /// Element is absent from a named container
    ShouldNotFindInside {
        /// Target
        #[serde(deserialize_with = "locator")]
        locator: ElementLocator,
        /// Container name
        inside: String,
    },
    /// Scroll to an element
    ScrollTo(#[serde(deserialize_with = "locator")] ElementLocator),
    /// Load more items in the current list
    LoadMoreItems,
    /// Everything in the current list is already loaded
    ShouldNotBeAbleToLoadMoreItems,
    /// Swipe the current page
    Swipe(SwipeDirection),
    /// Make sure an element is selected
    Select(#[serde(deserialize_with = "locator")] ElementLocator),
    /// Make sure an element is not selected
    Unselect(#[serde(deserialize_with = "locator")] ElementLocator),
    /// Element is selected
    ShouldBeSelected(#[serde(deserialize_with = "locator")] ElementLocator),
    /// Element is not selected
    ShouldNotBeSelected(#[serde(deserialize_with = "locator")] ElementLocator),
    /// Set an input field
    SetField {
        /// Label or placeholder
        field: String,
        /// New value
        value: String,
    },
    /// Page header text
    HeaderShouldBe(String),
    /// Close the popup on top
    ClosePopup,
    /// Run background tasks now
    RunCronTasks,
    /// Wait for loading indicators to go away
    WaitLoadingToFinish,
    /// Force offline mode on or off
    SwitchOfflineMode(bool),
    /// Wait for the app to reload itself
    WaitAppRestart,
}

impl Step {
    /// Normalized phrase naming the step
    #[must_use]
    pub const fn phrase(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Launch => "launch",
            Self::Login(_) => "login",
            Self::EnterCourse(_) => "enter_course",
            Self::EnterSite(_) => "enter_site",
            Self::Press(_) => "press",
            Self::PressStandard(_) => "press_standard",
            Self::ShouldFind(_) => "should_find",
            Self::ShouldNotFind(_) => "should_not_find",
            Self::ShouldFindInside { .. } => "should_find_inside",
            Self::ShouldNotFindInside { .. } => "should_not_find_inside",
            Self::ScrollTo(_) => "scroll_to",
            Self::LoadMoreItems => "load_more_items",
            Self::ShouldNotBeAbleToLoadMoreItems => "should_not_be_able_to_load_more_items",
            Self::Swipe(_) => "swipe",
            Self::Select(_) => "select",
            Self::Unselect(_) => "unselect",
            Self::ShouldBeSelected(_) => "should_be_selected",
            Self::ShouldNotBeSelected(_) => "should_not_be_selected",
            Self::SetField { .. } => "set_field",
            Self::HeaderShouldBe(_) => "header_should_be",
            Self::ClosePopup => "close_popup",
            Self::RunCronTasks => "run_cron_tasks",
            Self::WaitLoadingToFinish => "wait_loading_to_finish",
            Self::SwitchOfflineMode(_) => "switch_offline_mode",
            Self::WaitAppRestart => "wait_app_restart",
        }
    }

    /// Whether the step talks to a running app
    #[must_use]
    pub const fn needs_app(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Launch)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = self.phrase();
        match self {
            Self::Config(values) => {
                let keys: Vec<&str> = values.keys().map(String::as_str).collect();
                write!(f, "{phrase} {}", keys.join(", "))
            }
            Self::Login(text) | Self::EnterCourse(text) | Self::EnterSite(text) => {
                write!(f, "{phrase} {text}")
            }
            Self::HeaderShouldBe(text) => write!(f, "{phrase} \"{text}\""),
            Self::Press(loc)
            | Self::ShouldFind(loc)
            | Self::ShouldNotFind(loc)
            | Self::ScrollTo(loc)
            | Self::Select(loc)
            | Self::Unselect(loc)
            | Self::ShouldBeSelected(loc)
            | Self::ShouldNotBeSelected(loc) => write!(f, "{phrase} {loc}"),
            Self::ShouldFindInside { locator, inside }
            | Self::ShouldNotFindInside { locator, inside } => {
                write!(f, "{phrase} {locator} inside the {inside}")
            }
            Self::PressStandard(button) => write!(f, "{phrase} {button}"),
            Self::Swipe(direction) => write!(f, "{phrase} {direction}"),
            Self::SetField { field, value } => write!(f, "{phrase} \"{field}\" to \"{value}\""),
            Self::SwitchOfflineMode(offline) => write!(f, "{phrase} {offline}"),
            Self::Launch
            | Self::LoadMoreItems
            | Self::ShouldNotBeAbleToLoadMoreItems
            | Self::ClosePopup
            | Self::RunCronTasks
            | Self::WaitLoadingToFinish
            | Self::WaitAppRestart => f.write_str(phrase),
        }
    }
}

/// A step that failed while running a scenario
#[derive(Debug, Error)]
#[error("{scenario}: step {index} `{step}` failed: {source}")]
pub struct StepFailure {
    /// Scenario name
    pub scenario: String,
    /// 1-based step index
    pub index: usize,
    /// The step, rendered
    pub step: String,
    /// Underlying error
    pub source: SondaError,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps executed
    pub steps: usize,
    /// Wall time
    pub elapsed: Duration,
}

/// A named list of steps
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Steps, run in order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse and validate a scenario
    pub fn from_yaml(yaml: &str) -> SondaResult<Self> {
        let scenario: Self = serde_yaml_ng::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario file
    pub fn from_path(path: impl AsRef<Path>) -> SondaResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Check step ordering
    ///
    /// Config steps only take effect before `launch`, and app steps need a
    /// launched app.
    pub fn validate(&self) -> SondaResult<()> {
        if self.name.trim().is_empty() {
            return Err(SondaError::invalid_scenario("scenario name is empty"));
        }
        if self.steps.is_empty() {
            return Err(SondaError::invalid_scenario(format!(
                "scenario {:?} has no steps",
                self.name
            )));
        }

        let mut launched = false;
        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            match step {
                Step::Config(_) if launched => {
                    return Err(SondaError::invalid_scenario(format!(
                        "step {index}: config after launch has no effect"
                    )));
                }
                Step::Launch if launched => {
                    return Err(SondaError::invalid_scenario(format!(
                        "step {index}: the app is already launched"
                    )));
                }
                Step::Launch => launched = true,
                step if step.needs_app() && !launched => {
                    return Err(SondaError::invalid_scenario(format!(
                        "step {index} `{}` runs before launch",
                        step.phrase()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Config overrides the scenario launches with
    #[must_use]
    pub fn overrides(&self) -> AppConfigOverrides {
        let mut overrides = AppConfigOverrides::new();
        for step in &self.steps {
            if let Step::Config(values) = step {
                for (key, value) in values {
                    overrides.set(key.clone(), value.clone());
                }
            }
        }
        overrides
    }

    /// Run every step in order against `session`, stopping at the first failure
    pub async fn run<D: ScriptDriver>(
        &self,
        session: &AppSession<D>,
    ) -> Result<RunSummary, StepFailure> {
        self.run_with(session, AppConfigOverrides::new()).await
    }

    /// Like [`Scenario::run`], starting from `base` overrides.
    ///
    /// `config` steps are applied on top, so a scenario value wins over a
    /// base value with the same key.
    pub async fn run_with<D: ScriptDriver>(
        &self,
        session: &AppSession<D>,
        base: AppConfigOverrides,
    ) -> Result<RunSummary, StepFailure> {
        let start = Instant::now();
        let mut overrides = base;

        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            let span = info_span!("step", scenario = %self.name, index, step = step.phrase());
            if let Err(source) = run_step(session, step, &mut overrides)
                .instrument(span)
                .await
            {
                warn!(scenario = %self.name, index, step = %step, error = %source, "step failed");
                return Err(StepFailure {
                    scenario: self.name.clone(),
                    index,
                    step: step.to_string(),
                    source,
                });
            }
        }

        let summary = RunSummary {
            steps: self.steps.len(),
            elapsed: start.elapsed(),
        };
        info!(
            scenario = %self.name,
            steps = summary.steps,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "scenario passed"
        );
        Ok(summary)
    }
}

async fn run_step<D: ScriptDriver>(
    session: &AppSession<D>,
    step: &Step,
    overrides: &mut AppConfigOverrides,
) -> SondaResult<()> {
    match step {
        Step::Config(values) => {
            for (key, value) in values {
                overrides.set(key.clone(), value.clone());
            }
            Ok(())
        }
        Step::Launch => session.launch(overrides).await,
        Step::Login(username) => session.login(username).await,
        Step::EnterCourse(course) => session.enter_course(course).await,
        Step::EnterSite(site_url) => session.enter_site(site_url).await,
        Step::Press(loc) => session.press(loc).await,
        Step::PressStandard(button) => session.press_standard(*button).await,
        Step::ShouldFind(loc) => session.find(loc, true, None).await,
        Step::ShouldNotFind(loc) => session.find(loc, false, None).await,
        Step::ShouldFindInside { locator, inside } => {
            session.find(locator, true, Some(inside)).await
        }
        Step::ShouldNotFindInside { locator, inside } => {
            session.find(locator, false, Some(inside)).await
        }
        Step::ScrollTo(loc) => session.scroll_to(loc).await,
        Step::LoadMoreItems => session.load_more_items(true).await,
        Step::ShouldNotBeAbleToLoadMoreItems => session.load_more_items(false).await,
        Step::Swipe(direction) => session.swipe(*direction).await,
        Step::Select(loc) => session.select(loc).await,
        Step::Unselect(loc) => session.unselect(loc).await,
        Step::ShouldBeSelected(loc) => session.assert_selected(loc, true).await,
        Step::ShouldNotBeSelected(loc) => session.assert_selected(loc, false).await,
        Step::SetField { field, value } => session.set_field(field, value).await,
        Step::HeaderShouldBe(text) => session.header_should_be(text).await,
        Step::ClosePopup => session.close_popup().await,
        Step::RunCronTasks => session.run_cron_tasks().await,
        Step::WaitLoadingToFinish => session.wait_loading_to_finish().await,
        Step::SwitchOfflineMode(offline) => session.switch_offline_mode(*offline).await,
        Step::WaitAppRestart => session.wait_app_restart().await,
    }
}
