//! AppSession - user-facing actions against the running app.
//!
//! Every action is one [`RetryLoop`] around a bridge round trip and its
//! interpretation, followed by the settle barrier:
//!
//! ```text
//! RetryLoop( CommandBridge::send(cmd) -> interpret() ) -> SettleWait::await_idle()
//! ```
//!
//! Failures reported by the app (`ERROR: ..`) are treated as "not ready yet"
//! and polled again. Answers outside the vocabulary and observed values that
//! contradict an assertion stop the action right away.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::command::{escape_js_string, Command, CommandBridge, StandardButton};
use crate::config::{AppConfigOverrides, HarnessConfig};
use crate::driver::ScriptDriver;
use crate::locator::ElementLocator;
use crate::outcome::{interpret, Outcome, Shape};
use crate::result::{SondaError, SondaResult};
use crate::retry::{Attempt, Deadline, RetryLoop};
use crate::settle::SettleWait;

/// Failure the app reports when an infinite list has nothing more to load
pub const ALL_ITEMS_LOADED: &str = "All items are already loaded.";

const CRON_SYNC_SCRIPT: &str = "cronProvider.forceSyncExecution()";
const FORCE_OFFLINE_SCRIPT: &str = "appProvider.setForceOffline";
const SKIP_ONBOARDING_SCRIPT: &str = "window.localStorage.setItem(\"CoreOnboardingDone\", \"1\");";
const MAIN_MENU_SELECTOR: &str = "page-core-mainmenu";
const SITE_URL_INPUT_SELECTOR: &str = "page-core-login-site input[name=\"url\"]";

/// Direction of a swipe gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    /// Next page
    Left,
    /// Previous page
    Right,
}

impl SwipeDirection {
    const fn method_name(self) -> &'static str {
        match self {
            Self::Left => "swipeLeft",
            Self::Right => "swipeRight",
        }
    }
}

impl fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

impl FromStr for SwipeDirection {
    type Err = SondaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(SondaError::invalid_scenario(format!(
                "unknown swipe direction {other:?} (expected left or right)"
            ))),
        }
    }
}

/// A test session against one running app
#[derive(Debug)]
pub struct AppSession<D> {
    bridge: CommandBridge<D>,
    settle: SettleWait,
    config: HarnessConfig,
}

impl<D: ScriptDriver> AppSession<D> {
    /// Create a session over a driver
    pub fn new(driver: D, config: HarnessConfig) -> Self {
        let bridge = CommandBridge::new(driver, config.hook_object.clone());
        let settle = SettleWait::new(config.settle.clone(), config.timeouts);
        Self {
            bridge,
            settle,
            config,
        }
    }

    /// The underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        self.bridge.driver()
    }

    /// End the session, returning the driver
    pub fn into_driver(self) -> D {
        self.bridge.into_driver()
    }

    /// Harness configuration
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Settle barrier
    #[must_use]
    pub const fn settle(&self) -> &SettleWait {
        &self.settle
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the app with `overrides` applied at startup
    ///
    /// Waits for the test hook to appear and the app to go idle.
    pub async fn launch(&self, overrides: &AppConfigOverrides) -> SondaResult<()> {
        let url = self.config.launch.url.clone().ok_or_else(|| {
            SondaError::config("no app URL configured (set launch.url or SONDA_APP_URL)")
        })?;

        async {
            self.driver()
                .add_init_script(&overrides.to_init_script())
                .await?;
            if self.config.launch.skip_onboarding {
                self.driver().add_init_script(SKIP_ONBOARDING_SCRIPT).await?;
            }
            self.driver().navigate(&url).await?;
            self.wait_for_hook().await?;
            info!(overrides = overrides.len(), "app launched");
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "launch", %url))
        .await
    }

    /// Whether the test hook object is currently installed
    pub async fn hook_present(&self) -> SondaResult<bool> {
        let hook = escape_js_string(self.bridge.hook());
        let script = format!("typeof window[{hook}] === \"object\" && window[{hook}] !== null");
        let value = self.driver().evaluate(&script).await?;
        value
            .as_bool()
            .ok_or_else(|| SondaError::protocol("hook check", value.to_string()))
    }

    async fn wait_for_hook(&self) -> SondaResult<()> {
        self.wait_for_hook_state(true, self.config.timeouts.long())
            .await
    }

    async fn wait_for_hook_state(&self, present: bool, deadline: Deadline) -> SondaResult<()> {
        let action = if present {
            "wait for test hook"
        } else {
            "wait for app reload"
        };
        RetryLoop::new(action, deadline)
            .run(move || async move {
                match self.hook_present().await {
                    Ok(state) if state == present => Attempt::Done(()),
                    Ok(_) if present => Attempt::retry("test hook not installed yet"),
                    Ok(_) => Attempt::retry("window is not reloading"),
                    // The page is being replaced under the script
                    Err(SondaError::Script { message }) => Attempt::Retry(message),
                    Err(err) => Attempt::Fatal(err),
                }
            })
            .await
    }

    /// Wait for the app to reload itself, then prepare it again
    pub async fn wait_app_restart(&self) -> SondaResult<()> {
        async {
            self.wait_for_hook_state(false, self.config.timeouts.short())
                .await?;
            self.wait_for_hook().await?;
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "wait_app_restart"))
        .await
    }

    /// Connect to `site_url` when the app shows the site form
    ///
    /// Does nothing when the app has already moved past it.
    pub async fn enter_site(&self, site_url: &str) -> SondaResult<()> {
        async {
            if !self.element_exists(SITE_URL_INPUT_SELECTOR).await? {
                debug!("already in the site");
                return Ok(());
            }
            self.set_field("Your site", site_url).await?;
            self.press(&ElementLocator::text("Connect to your site"))
                .await?;
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "enter_site", site_url))
        .await
    }

    /// Log in from the login form and wait for the main menu
    ///
    /// The password is the username, as in generated test sites.
    pub async fn login(&self, username: &str) -> SondaResult<()> {
        async {
            self.set_field("Username", username).await?;
            self.set_field("Password", username).await?;
            self.press(&ElementLocator::text("Log in").near("Forgotten"))
                .await?;

            let deadline = self
                .config
                .timeouts
                .long()
                .with_timeout_error(SondaError::expectation(
                    "App main page not loaded after login",
                ));
            RetryLoop::new("wait for main menu", deadline)
                .run(move || async move {
                    match self.element_exists(MAIN_MENU_SELECTOR).await {
                        Ok(true) => Attempt::Done(()),
                        Ok(false) => Attempt::retry("main menu not rendered"),
                        Err(err) => Attempt::Fatal(err),
                    }
                })
                .await?;
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "login", username))
        .await
    }

    /// Open a course from the "My courses" tab, or from the dashboard when the tab is absent
    pub async fn enter_course(&self, course: &str) -> SondaResult<()> {
        async {
            let tab = ElementLocator::text("My courses").with_selector("ion-tab-button");
            let found = self
                .request("find My courses tab", &Command::find(&tab, None), Shape::Unit)
                .await?;

            if found.is_success() {
                self.press(&tab).await?;
                self.press(&ElementLocator::text(course)).await?;
            } else {
                debug!("no My courses tab, entering from the dashboard");
                self.press(&ElementLocator::text("Home").with_selector("ion-tab-button"))
                    .await?;
                self.press(&ElementLocator::text("Dashboard")).await?;
                self.press(&ElementLocator::text(course).near("Course overview"))
                    .await?;
            }
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "enter_course", course))
        .await
    }

    // ========================================================================
    // Bridge actions
    // ========================================================================

    /// Assert that an element is (or is not) present, optionally inside a named container
    pub async fn find(
        &self,
        locator: &ElementLocator,
        expect_present: bool,
        container: Option<&str>,
    ) -> SondaResult<()> {
        let verb = if expect_present { "find" } else { "not find" };
        let action = match container {
            Some(name) => format!("{verb} {locator} inside the {name}"),
            None => format!("{verb} {locator}"),
        };
        let command = Command::find(locator, container);

        async {
            let (action, command) = (action.as_str(), &command);
            RetryLoop::new(action, self.config.timeouts.short())
                .run(move || async move {
                    match self.request(action, command, Shape::Unit).await {
                        Ok(Outcome::Success) if expect_present => Attempt::Done(()),
                        Ok(Outcome::Success) => {
                            Attempt::retry("found an item that should not be found")
                        }
                        Ok(Outcome::Failure(_)) if !expect_present => Attempt::Done(()),
                        Ok(Outcome::Failure(reason)) => Attempt::Retry(reason),
                        Ok(other) => Attempt::Fatal(unexpected(action, &other)),
                        Err(err) => Attempt::Fatal(err),
                    }
                })
                .await?;
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "find", %locator, expect_present))
        .await
    }

    /// Scroll an element into view and wait for the animation
    pub async fn scroll_to(&self, locator: &ElementLocator) -> SondaResult<()> {
        self.act(&format!("scroll to {locator}"), &Command::scroll_to(locator))
            .instrument(info_span!("action", name = "scroll_to", %locator))
            .await?;
        self.settle.animation_pause().await;
        Ok(())
    }

    /// Trigger the infinite loader of the current list
    ///
    /// With `expect_possible == false` the action succeeds only when the app
    /// says everything is already loaded.
    pub async fn load_more_items(&self, expect_possible: bool) -> SondaResult<()> {
        let command = Command::load_more_items();

        async {
            let (action, command) = ("load more items", &command);
            RetryLoop::new(action, self.config.timeouts.short())
                .run(move || async move {
                    match self.request(action, command, Shape::Unit).await {
                        Ok(Outcome::Success) if expect_possible => Attempt::Done(()),
                        Ok(Outcome::Success) => Attempt::Fatal(SondaError::expectation(
                            "It should not have been possible to load more items",
                        )),
                        Ok(outcome)
                            if !expect_possible && outcome.is_failure_with(ALL_ITEMS_LOADED) =>
                        {
                            Attempt::Done(())
                        }
                        Ok(Outcome::Failure(reason)) => Attempt::Retry(reason),
                        Ok(other) => Attempt::Fatal(unexpected(action, &other)),
                        Err(err) => Attempt::Fatal(err),
                    }
                })
                .await?;
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "load_more_items", expect_possible))
        .await
    }

    /// Swipe the current page and wait for the animation
    pub async fn swipe(&self, direction: SwipeDirection) -> SondaResult<()> {
        let script = format!(
            "window[{}].getAngularInstance(\"ion-content\", \"CoreSwipeNavigationDirective\").{}()",
            escape_js_string(self.bridge.hook()),
            direction.method_name()
        );

        async {
            self.driver().execute(&script).await?;
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "swipe", %direction))
        .await?;
        self.settle.animation_pause().await;
        Ok(())
    }

    /// Assert the selection state of an element
    pub async fn assert_selected(
        &self,
        locator: &ElementLocator,
        expected: bool,
    ) -> SondaResult<()> {
        let action = format!("check selection of {locator}");
        let command = Command::is_selected(locator);

        async {
            let (action, command) = (action.as_str(), &command);
            RetryLoop::new(action, self.config.timeouts.short())
                .run(move || async move {
                    match self.request(action, command, Shape::Boolean).await {
                        Ok(Outcome::Bool(state)) if state == expected => Attempt::Done(()),
                        Ok(Outcome::Bool(_)) => Attempt::Fatal(SondaError::expectation(
                            if expected {
                                "Item wasn't selected and should have"
                            } else {
                                "Item was selected and shouldn't have"
                            },
                        )),
                        Ok(Outcome::Failure(reason)) => Attempt::Retry(reason),
                        Ok(other) => Attempt::Fatal(unexpected(action, &other)),
                        Err(err) => Attempt::Fatal(err),
                    }
                })
                .await?;
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "assert_selected", %locator, expected))
        .await
    }

    /// Make sure an element is selected, pressing it only if it is not
    pub async fn select(&self, locator: &ElementLocator) -> SondaResult<()> {
        self.toggle(locator, true)
            .instrument(info_span!("action", name = "select", %locator))
            .await
    }

    /// Make sure an element is not selected, pressing it only if it is
    pub async fn unselect(&self, locator: &ElementLocator) -> SondaResult<()> {
        self.toggle(locator, false)
            .instrument(info_span!("action", name = "unselect", %locator))
            .await
    }

    async fn toggle(&self, locator: &ElementLocator, selected: bool) -> SondaResult<()> {
        let verb = if selected { "select" } else { "unselect" };
        let action = format!("{verb} {locator}");
        let (check, press) = (Command::is_selected(locator), Command::press(locator));

        let (action, check, press) = (action.as_str(), &check, &press);
        RetryLoop::new(action, self.config.timeouts.short())
            .run(move || async move {
                Attempt::flatten(self.toggle_attempt(action, check, press, selected).await)
            })
            .await?;
        self.settle.await_idle(self.driver()).await
    }

    async fn toggle_attempt(
        &self,
        action: &str,
        check: &Command,
        press: &Command,
        selected: bool,
    ) -> SondaResult<Attempt<()>> {
        match self.request(action, check, Shape::Boolean).await? {
            Outcome::Bool(state) if state == selected => {
                debug!(action, "already in the requested state");
                return Ok(Attempt::Done(()));
            }
            Outcome::Bool(_) => {}
            Outcome::Failure(reason) => return Ok(Attempt::Retry(reason)),
            other => return Err(unexpected(action, &other)),
        }

        match self.request(action, press, Shape::Unit).await? {
            Outcome::Success => {}
            Outcome::Failure(reason) => return Ok(Attempt::Retry(reason)),
            other => return Err(unexpected(action, &other)),
        }

        self.settle.await_idle(self.driver()).await?;

        match self.request(action, check, Shape::Boolean).await? {
            Outcome::Bool(state) if state == selected => Ok(Attempt::Done(())),
            Outcome::Bool(_) => Err(SondaError::expectation(format!(
                "Item wasn't {}ed after pressing it",
                if selected { "select" } else { "unselect" }
            ))),
            Outcome::Failure(reason) => Ok(Attempt::Retry(reason)),
            other => Err(unexpected(action, &other)),
        }
    }

    /// Set an input field identified by its label or placeholder
    pub async fn set_field(&self, field: &str, value: &str) -> SondaResult<()> {
        self.act(
            &format!("set field \"{field}\""),
            &Command::set_field(field, value),
        )
        .instrument(info_span!("action", name = "set_field", field))
        .await
    }

    /// Press a visible element
    pub async fn press(&self, locator: &ElementLocator) -> SondaResult<()> {
        self.act(&format!("press {locator}"), &Command::press(locator))
            .instrument(info_span!("action", name = "press", %locator))
            .await
    }

    /// Press one of the standard navigation buttons
    pub async fn press_standard(&self, button: StandardButton) -> SondaResult<()> {
        self.act(
            &format!("press the {button} button"),
            &Command::press_standard(button),
        )
        .instrument(info_span!("action", name = "press_standard", %button))
        .await
    }

    /// Close the popup on top
    pub async fn close_popup(&self) -> SondaResult<()> {
        self.act("close popup", &Command::close_popup())
            .instrument(info_span!("action", name = "close_popup"))
            .await
    }

    /// Current page header, exactly as the app reports it
    pub async fn header(&self) -> SondaResult<String> {
        let command = Command::get_header();
        let (action, command) = ("get header", &command);
        RetryLoop::new(action, self.config.timeouts.short())
            .run(move || async move {
                match self.request(action, command, Shape::Payload).await {
                    Ok(Outcome::Payload(header)) => Attempt::Done(header),
                    Ok(Outcome::Failure(reason)) => Attempt::Retry(reason),
                    Ok(other) => Attempt::Fatal(unexpected(action, &other)),
                    Err(err) => Attempt::Fatal(err),
                }
            })
            .await
    }

    /// Assert the page header, ignoring surrounding whitespace
    pub async fn header_should_be(&self, expected: &str) -> SondaResult<()> {
        async {
            let header = self.header().await?;
            if header.trim() != expected.trim() {
                return Err(SondaError::expectation(format!(
                    "The header text was not as expected: '{header}'"
                )));
            }
            self.settle.await_idle(self.driver()).await
        }
        .instrument(info_span!("action", name = "header_should_be", expected))
        .await
    }

    // ========================================================================
    // Background work
    // ========================================================================

    /// Force the app's background tasks to run and wait until they finish
    pub async fn run_cron_tasks(&self) -> SondaResult<()> {
        let flag = escape_js_string(&format!("sonda_{}_completed", Uuid::new_v4().simple()));

        async {
            self.driver()
                .execute(&format!(
                    "{CRON_SYNC_SCRIPT}.then(() => {{ window[{flag}] = true; }});"
                ))
                .await?;

            let probe = format!("window[{flag}] === true");
            let deadline = self
                .config
                .timeouts
                .long()
                .with_timeout_error(SondaError::expectation(
                    "Forced cron tasks in the app took too long to complete",
                ));
            let probe = probe.as_str();
            RetryLoop::new("run cron tasks", deadline)
                .run(move || async move {
                    match self.driver().evaluate(probe).await {
                        Ok(Value::Bool(true)) => Attempt::Done(()),
                        Ok(_) => Attempt::retry("cron tasks still running"),
                        Err(err) => Attempt::Fatal(err),
                    }
                })
                .await?;

            self.driver()
                .execute(&format!("delete window[{flag}];"))
                .await?;
            self.settle.force_change_detection(self.driver()).await
        }
        .instrument(info_span!("action", name = "run_cron_tasks"))
        .await
    }

    /// Wait until no loading indicator is visible
    pub async fn wait_loading_to_finish(&self) -> SondaResult<()> {
        self.settle
            .await_loading_finished(self.driver())
            .instrument(info_span!("action", name = "wait_loading_to_finish"))
            .await
    }

    /// Force the app offline (or back online)
    pub async fn switch_offline_mode(&self, offline: bool) -> SondaResult<()> {
        async {
            self.driver()
                .execute(&format!("{FORCE_OFFLINE_SCRIPT}({offline});"))
                .await?;
            self.settle.force_change_detection(self.driver()).await
        }
        .instrument(info_span!("action", name = "switch_offline_mode", offline))
        .await
    }

    /// Whether an element matching a CSS selector is in the DOM
    pub async fn element_exists(&self, selector: &str) -> SondaResult<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            escape_js_string(selector)
        );
        let value = self.driver().evaluate(&script).await?;
        value
            .as_bool()
            .ok_or_else(|| SondaError::protocol("element check", value.to_string()))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// One round trip; protocol violations become errors here
    async fn request(&self, action: &str, command: &Command, shape: Shape) -> SondaResult<Outcome> {
        let raw = self.bridge.send(command).await?;
        match interpret(&raw, shape) {
            Outcome::ProtocolViolation(raw) => Err(SondaError::protocol(action, raw)),
            outcome => Ok(outcome),
        }
    }

    /// Retry a unit command until the app accepts it, then settle
    async fn act(&self, action: &str, command: &Command) -> SondaResult<()> {
        RetryLoop::new(action, self.config.timeouts.short())
            .run(move || async move {
                match self.request(action, command, Shape::Unit).await {
                    Ok(Outcome::Success) => Attempt::Done(()),
                    Ok(Outcome::Failure(reason)) => Attempt::Retry(reason),
                    Ok(other) => Attempt::Fatal(unexpected(action, &other)),
                    Err(err) => Attempt::Fatal(err),
                }
            })
            .await?;
        self.settle.await_idle(self.driver()).await
    }
}

fn unexpected(action: &str, outcome: &Outcome) -> SondaError {
    SondaError::protocol(action, format!("{outcome:?}"))
}
