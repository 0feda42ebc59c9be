//! CommandBridge - one round trip into the app's test hook.
//!
//! A [`Command`] names a capability exposed on the app's global hook object
//! (`window.behat` by default) and carries JSON arguments. The bridge turns
//! it into a single self-contained expression, runs it through the
//! [`ScriptDriver`], and returns whatever primitive came back. It never
//! retries and never interprets; that is the job of [`crate::retry`] and
//! [`crate::outcome`].

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, trace};

use crate::driver::ScriptDriver;
use crate::locator::ElementLocator;
use crate::result::{SondaError, SondaResult};

/// Marker returned by the generated script when the hook object is missing
const HOOK_MISSING_MARKER: &str = "__sondaHookMissing";

/// How a command's result becomes available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecMode {
    /// Result is returned directly by the call
    Sync,
    /// Call returns a promise; the result is its resolved value
    Async,
}

/// Capabilities exposed by the app's test hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Presence check
    Find,
    /// Scroll an element into view
    ScrollTo,
    /// Trigger an infinite loader
    LoadMoreItems,
    /// Press an element
    Press,
    /// Selection state
    IsSelected,
    /// Set an input field
    SetField,
    /// Current page header
    GetHeader,
    /// Press a standard navigation button
    PressStandard,
    /// Close the top popup
    ClosePopup,
}

impl Capability {
    /// Method name on the hook object
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::ScrollTo => "scrollTo",
            Self::LoadMoreItems => "loadMoreItems",
            Self::Press => "press",
            Self::IsSelected => "isSelected",
            Self::SetField => "setField",
            Self::GetHeader => "getHeader",
            Self::PressStandard => "pressStandard",
            Self::ClosePopup => "closePopup",
        }
    }

    /// Execution mode the capability needs
    #[must_use]
    pub const fn mode(&self) -> ExecMode {
        match self {
            Self::LoadMoreItems => ExecMode::Async,
            _ => ExecMode::Sync,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Standard navigation buttons the app knows how to press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardButton {
    /// Back arrow
    Back,
    /// "More" menu
    MoreMenu,
    /// Page context menu
    PageMenu,
    /// User menu
    UserMenu,
    /// Main menu
    MainMenu,
}

impl StandardButton {
    /// Wire name of the button
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Back => "back",
            Self::MoreMenu => "more menu",
            Self::PageMenu => "page menu",
            Self::UserMenu => "user menu",
            Self::MainMenu => "main menu",
        }
    }

    const fn all() -> [Self; 5] {
        [
            Self::Back,
            Self::MoreMenu,
            Self::PageMenu,
            Self::UserMenu,
            Self::MainMenu,
        ]
    }
}

impl fmt::Display for StandardButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardButton {
    type Err = SondaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        Self::all()
            .into_iter()
            .find(|b| b.as_str() == normalized)
            .ok_or_else(|| {
                SondaError::invalid_scenario(format!(
                    "unknown standard button {s:?} (expected back, more menu, page menu, user menu or main menu)"
                ))
            })
    }
}

/// A capability invocation with its arguments
///
/// Immutable once built; arguments are JSON values and only become text when
/// the script is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    capability: Capability,
    args: Vec<Value>,
}

impl Command {
    /// Build a command from raw parts
    #[must_use]
    pub fn new(capability: Capability, args: Vec<Value>) -> Self {
        Self { capability, args }
    }

    /// Presence check, optionally inside a named container
    #[must_use]
    pub fn find(locator: &ElementLocator, container: Option<&str>) -> Self {
        Self::new(
            Capability::Find,
            vec![locator.to_json(), Value::from(container.unwrap_or(""))],
        )
    }

    /// Scroll to an element
    #[must_use]
    pub fn scroll_to(locator: &ElementLocator) -> Self {
        Self::new(Capability::ScrollTo, vec![locator.to_json()])
    }

    /// Load more items in the current list
    #[must_use]
    pub fn load_more_items() -> Self {
        Self::new(Capability::LoadMoreItems, Vec::new())
    }

    /// Press an element
    #[must_use]
    pub fn press(locator: &ElementLocator) -> Self {
        Self::new(Capability::Press, vec![locator.to_json()])
    }

    /// Query selection state
    #[must_use]
    pub fn is_selected(locator: &ElementLocator) -> Self {
        Self::new(Capability::IsSelected, vec![locator.to_json()])
    }

    /// Set a field identified by its label or placeholder
    #[must_use]
    pub fn set_field(field: &str, value: &str) -> Self {
        Self::new(
            Capability::SetField,
            vec![Value::from(field), Value::from(value)],
        )
    }

    /// Read the current header
    #[must_use]
    pub fn get_header() -> Self {
        Self::new(Capability::GetHeader, Vec::new())
    }

    /// Press a standard button
    #[must_use]
    pub fn press_standard(button: StandardButton) -> Self {
        Self::new(Capability::PressStandard, vec![Value::from(button.as_str())])
    }

    /// Close the top popup
    #[must_use]
    pub fn close_popup() -> Self {
        Self::new(Capability::ClosePopup, Vec::new())
    }

    /// Capability invoked
    #[must_use]
    pub const fn capability(&self) -> Capability {
        self.capability
    }

    /// Arguments passed
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Render as a single expression against the hook object named `hook`
    #[must_use]
    pub fn to_script(&self, hook: &str) -> String {
        let args = self
            .args
            .iter()
            .map(embed_value)
            .collect::<Vec<_>>()
            .join(", ");
        let method = self.capability.method_name();
        let hook = embed_value(&Value::from(hook));
        let guard = format!(
            "const hook = window[{hook}]; \
             if (hook === undefined || hook === null) {{ return {{ \"{HOOK_MISSING_MARKER}\": true }}; }}"
        );

        match self.capability.mode() {
            ExecMode::Sync => format!("(() => {{ {guard} return hook.{method}({args}); }})()"),
            ExecMode::Async => {
                format!("(async () => {{ {guard} return await hook.{method}({args}); }})()")
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({args})", self.capability)
    }
}

/// Render a JSON value as a script literal that cannot break out of its slot
///
/// JSON escaping handles quotes, backslashes and control characters; the two
/// line separators JSON allows raw are escaped as well.
#[must_use]
pub fn embed_value(value: &Value) -> String {
    value
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Quote a string as a script string literal
#[must_use]
pub fn escape_js_string(s: &str) -> String {
    embed_value(&Value::from(s))
}

/// Raw value returned by the app, before interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult(Value);

impl RawResult {
    /// Wrap a raw value
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// String form, if the app returned a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Underlying value
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.0
    }
}

impl From<&str> for RawResult {
    fn from(s: &str) -> Self {
        Self(Value::from(s))
    }
}

impl fmt::Display for RawResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// Sends commands to the app's test hook
#[derive(Debug)]
pub struct CommandBridge<D> {
    driver: D,
    hook: String,
}

impl<D: ScriptDriver> CommandBridge<D> {
    /// Create a bridge talking to `window[hook]`
    pub fn new(driver: D, hook: impl Into<String>) -> Self {
        Self {
            driver,
            hook: hook.into(),
        }
    }

    /// Name of the hook object
    #[must_use]
    pub fn hook(&self) -> &str {
        &self.hook
    }

    /// The underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Give the driver back
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// One round trip: run the command and return the raw result
    ///
    /// Fails with [`SondaError::HookUnavailable`] when the hook object is
    /// missing and propagates driver failures unchanged.
    pub async fn send(&self, command: &Command) -> SondaResult<RawResult> {
        let script = command.to_script(&self.hook);
        trace!(%script, "bridge script");

        let value = match command.capability().mode() {
            ExecMode::Sync => self.driver.evaluate(&script).await?,
            ExecMode::Async => self.driver.evaluate_async(&script).await?,
        };

        if is_hook_missing(&value) {
            return Err(SondaError::HookUnavailable {
                hook: self.hook.clone(),
            });
        }

        let raw = RawResult::new(value);
        debug!(command = %command, result = %raw, "bridge round trip");
        Ok(raw)
    }
}

fn is_hook_missing(value: &Value) -> bool {
    value
        .get(HOOK_MISSING_MARKER)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use serde_json::json;

    mod command_tests {
        use super::*;

        #[test]
        fn test_press_script_shape() {
            let cmd = Command::press(&ElementLocator::text("Submit"));
            let script = cmd.to_script("behat");
            assert!(script.starts_with("(() => {"));
            assert!(script.contains(r#"const hook = window["behat"];"#));
            assert!(script.contains(r#"return hook.press({"text":"Submit"});"#));
        }

        #[test]
        fn test_load_more_is_async() {
            let cmd = Command::load_more_items();
            assert_eq!(cmd.capability().mode(), ExecMode::Async);
            let script = cmd.to_script("behat");
            assert!(script.starts_with("(async () => {"));
            assert!(script.contains("return await hook.loadMoreItems();"));
        }

        #[test]
        fn test_find_passes_container() {
            let cmd = Command::find(&ElementLocator::text("Grades"), Some("main menu"));
            let script = cmd.to_script("behat");
            assert!(script.contains(r#"hook.find({"text":"Grades"}, "main menu")"#));

            let cmd = Command::find(&ElementLocator::text("Grades"), None);
            assert!(cmd.to_script("behat").contains(r#", "")"#));
        }

        #[test]
        fn test_set_field_escapes_quotes_and_backslashes() {
            let cmd = Command::set_field(r#"Your "site""#, r"C:\path");
            let script = cmd.to_script("behat");
            assert!(script.contains(r#"hook.setField("Your \"site\"", "C:\\path")"#));
        }

        #[test]
        fn test_line_separators_escaped() {
            let literal = escape_js_string("a\u{2028}b\u{2029}c");
            assert_eq!(literal, "\"a\\u2028b\\u2029c\"");
        }

        #[test]
        fn test_press_standard_wire_name() {
            let cmd = Command::press_standard(StandardButton::MainMenu);
            assert!(cmd
                .to_script("behat")
                .contains(r#"hook.pressStandard("main menu")"#));
        }

        #[test]
        fn test_display() {
            let cmd = Command::set_field("Username", "student1");
            assert_eq!(cmd.to_string(), r#"setField("Username", "student1")"#);
        }
    }

    mod standard_button_tests {
        use super::*;

        #[test]
        fn test_parse_variants() {
            assert_eq!(
                "back".parse::<StandardButton>().unwrap(),
                StandardButton::Back
            );
            assert_eq!(
                "More menu".parse::<StandardButton>().unwrap(),
                StandardButton::MoreMenu
            );
            assert_eq!(
                "user_menu".parse::<StandardButton>().unwrap(),
                StandardButton::UserMenu
            );
            assert!("side menu".parse::<StandardButton>().is_err());
        }
    }

    mod bridge_tests {
        use super::*;

        #[tokio::test]
        async fn test_send_returns_raw_string() {
            let driver = MockDriver::with_responder(|_| Ok(json!("OK")));
            let bridge = CommandBridge::new(driver, "behat");
            let raw = bridge
                .send(&Command::press(&ElementLocator::text("Submit")))
                .await
                .unwrap();
            assert_eq!(raw.as_str(), Some("OK"));
        }

        #[tokio::test]
        async fn test_missing_hook_is_distinguishable() {
            let driver =
                MockDriver::with_responder(|_| Ok(json!({ "__sondaHookMissing": true })));
            let bridge = CommandBridge::new(driver, "behat");
            let err = bridge.send(&Command::get_header()).await.unwrap_err();
            assert!(matches!(err, SondaError::HookUnavailable { ref hook } if hook == "behat"));
        }

        #[tokio::test]
        async fn test_driver_failure_propagates() {
            let driver =
                MockDriver::with_responder(|_| Err(SondaError::script("Execution context destroyed")));
            let bridge = CommandBridge::new(driver, "behat");
            let err = bridge.send(&Command::close_popup()).await.unwrap_err();
            assert!(matches!(err, SondaError::Script { .. }));
        }

        #[tokio::test]
        async fn test_custom_hook_name() {
            let driver = MockDriver::with_responder(|_| Ok(json!("OK")));
            let bridge = CommandBridge::new(driver, "testHooks");
            bridge.send(&Command::close_popup()).await.unwrap();
            assert_eq!(bridge.driver().count_matching(r#"window["testHooks"]"#), 1);
        }
    }
}
