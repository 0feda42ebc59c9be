//! Harness configuration and launch-time app config overrides.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{embed_value, escape_js_string};
use crate::result::{SondaError, SondaResult};
use crate::retry::{
    Deadline, DEFAULT_LONG_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SHORT_TIMEOUT_MS,
};

/// Default name of the app's global test-hook object
pub const DEFAULT_HOOK_OBJECT: &str = "behat";

/// Default expression reporting the number of pending async tasks
pub const DEFAULT_PENDING_PROBE: &str = "(() => { \
    const util = window.M && window.M.util; \
    const pending = util && util.pending_js; \
    return Array.isArray(pending) ? pending.length : 0; })()";

/// Default script forcing Angular change detection
pub const DEFAULT_CHANGE_DETECTION: &str = "ngZone.run(() => {})";

/// Default CSS selector for loading indicators
pub const DEFAULT_LOADING_INDICATOR: &str = "core-loading ion-spinner";

/// Timeout categories
///
/// Only the distinction between "short" and "long" is meaningful; the
/// numbers are defaults, not contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    /// Interval between polls
    pub poll_interval_ms: u64,
    /// UI visibility checks and presses
    pub short_ms: u64,
    /// Background tasks, network-bound operations, loading indicators
    pub long_ms: u64,
    /// Waiting for pending async work to drain
    pub settle_ms: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            short_ms: DEFAULT_SHORT_TIMEOUT_MS,
            long_ms: DEFAULT_LONG_TIMEOUT_MS,
            settle_ms: DEFAULT_SHORT_TIMEOUT_MS,
        }
    }
}

impl TimeoutPolicy {
    /// Set poll interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the short timeout in milliseconds
    #[must_use]
    pub const fn with_short(mut self, ms: u64) -> Self {
        self.short_ms = ms;
        self
    }

    /// Set the long timeout in milliseconds
    #[must_use]
    pub const fn with_long(mut self, ms: u64) -> Self {
        self.long_ms = ms;
        self
    }

    /// Set the settle timeout in milliseconds
    #[must_use]
    pub const fn with_settle(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Deadline for UI actions
    #[must_use]
    pub const fn short(&self) -> Deadline {
        Deadline::new(Duration::from_millis(self.short_ms), self.poll_interval())
    }

    /// Deadline for network-bound operations
    #[must_use]
    pub const fn long(&self) -> Deadline {
        Deadline::new(Duration::from_millis(self.long_ms), self.poll_interval())
    }

    /// Deadline for settling
    #[must_use]
    pub const fn settle(&self) -> Deadline {
        Deadline::new(Duration::from_millis(self.settle_ms), self.poll_interval())
    }
}

/// Scripts and pauses used by the settle barrier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Expression returning the count of pending async tasks
    pub pending_probe: String,
    /// Script forcing the reactive layer to reconcile its view
    pub change_detection: String,
    /// CSS selector matching loading indicators
    pub loading_indicator: String,
    /// Pause after scrolling or swiping, for the animation to finish
    pub animation_pause_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            pending_probe: DEFAULT_PENDING_PROBE.to_string(),
            change_detection: DEFAULT_CHANGE_DETECTION.to_string(),
            loading_indicator: DEFAULT_LOADING_INDICATOR.to_string(),
            animation_pause_ms: 300,
        }
    }
}

impl SettleConfig {
    /// Animation pause as Duration
    #[must_use]
    pub const fn animation_pause(&self) -> Duration {
        Duration::from_millis(self.animation_pause_ms)
    }
}

/// How the app is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// App URL
    pub url: Option<String>,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Skip the onboarding screens on first launch
    pub skip_onboarding: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            url: None,
            viewport_width: 360,
            viewport_height: 720,
            headless: true,
            chromium_path: None,
            sandbox: true,
            skip_onboarding: true,
        }
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Name of the global test-hook object (`window[hook_object]`)
    pub hook_object: String,
    /// Timeout categories
    pub timeouts: TimeoutPolicy,
    /// Settle barrier scripts
    pub settle: SettleConfig,
    /// Launch settings
    pub launch: LaunchConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            hook_object: DEFAULT_HOOK_OBJECT.to_string(),
            timeouts: TimeoutPolicy::default(),
            settle: SettleConfig::default(),
            launch: LaunchConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> SondaResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> SondaResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> SondaResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Set the hook object name
    #[must_use]
    pub fn with_hook_object(mut self, hook: impl Into<String>) -> Self {
        self.hook_object = hook.into();
        self
    }

    /// Set timeouts
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the app URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.launch.url = Some(url.into());
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.launch.headless = headless;
        self
    }

    /// Check values that would make every action fail
    pub fn validate(&self) -> SondaResult<()> {
        if self.hook_object.trim().is_empty() {
            return Err(SondaError::config("hook_object must not be empty"));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(SondaError::config("poll_interval_ms must be positive"));
        }
        if self.timeouts.long_ms < self.timeouts.short_ms {
            return Err(SondaError::config(format!(
                "long timeout ({}ms) is shorter than short timeout ({}ms)",
                self.timeouts.long_ms, self.timeouts.short_ms
            )));
        }
        Ok(())
    }
}

/// Global the app reads its config overrides from at startup
pub const CONFIG_OVERRIDES_GLOBAL: &str = "behatConfigOverrides";

/// Config overrides applied once when the app launches
///
/// Owned by a scenario: values accumulate while the scenario is set up and
/// [`AppConfigOverrides::reset`] restores the defaults before the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfigOverrides {
    values: BTreeMap<String, Value>,
}

impl Default for AppConfigOverrides {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert("disableUserTours".to_string(), Value::Bool(true));
        Self { values }
    }
}

impl AppConfigOverrides {
    /// Overrides with the harness defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key to a value
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Set a key to a JSON-encoded value
    pub fn set_json(&mut self, key: impl Into<String>, raw: &str) -> SondaResult<&mut Self> {
        let key = key.into();
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            SondaError::config(format!("config value for {key:?} is not valid JSON: {e}"))
        })?;
        Ok(self.set(key, value))
    }

    /// Get the value for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no keys are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Restore defaults
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// As a JSON object
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Script installing the overrides before the app boots
    #[must_use]
    pub fn to_init_script(&self) -> String {
        format!(
            "window[{}] = {};",
            escape_js_string(CONFIG_OVERRIDES_GLOBAL),
            embed_value(&self.to_json())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod harness_config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = HarnessConfig::default();
            assert_eq!(config.hook_object, "behat");
            assert_eq!(config.timeouts.poll_interval_ms, 500);
            assert!(config.timeouts.long_ms > config.timeouts.short_ms);
            assert_eq!(config.settle.loading_indicator, "core-loading ion-spinner");
            assert!(config.launch.headless);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = HarnessConfig::from_yaml(
                "hook_object: testHooks\ntimeouts:\n  short_ms: 3000\nlaunch:\n  url: http://localhost:8100\n",
            )
            .unwrap();
            assert_eq!(config.hook_object, "testHooks");
            assert_eq!(config.timeouts.short_ms, 3000);
            assert_eq!(config.timeouts.long_ms, DEFAULT_LONG_TIMEOUT_MS);
            assert_eq!(config.launch.url.as_deref(), Some("http://localhost:8100"));
            assert_eq!(config.settle, SettleConfig::default());
        }

        #[test]
        fn test_yaml_round_trip_through_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("harness.yaml");
            let config = HarnessConfig::new()
                .with_url("http://app.test")
                .with_headless(false);
            std::fs::write(&path, config.to_yaml().unwrap()).unwrap();
            assert_eq!(HarnessConfig::from_path(&path).unwrap(), config);
        }

        #[test]
        fn test_validation() {
            assert!(HarnessConfig::from_yaml("hook_object: ''").is_err());
            assert!(HarnessConfig::from_yaml("timeouts:\n  poll_interval_ms: 0").is_err());
            assert!(HarnessConfig::from_yaml("timeouts:\n  short_ms: 90000").is_err());
        }

        #[test]
        fn test_deadlines_follow_policy() {
            let policy = TimeoutPolicy::default()
                .with_short(2000)
                .with_long(30_000)
                .with_poll_interval(100);
            assert_eq!(policy.short().timeout(), Duration::from_millis(2000));
            assert_eq!(policy.long().timeout(), Duration::from_millis(30_000));
            assert_eq!(policy.long().poll_interval(), Duration::from_millis(100));
        }
    }

    mod overrides_tests {
        use super::*;

        #[test]
        fn test_default_disables_user_tours() {
            let overrides = AppConfigOverrides::new();
            assert_eq!(overrides.get("disableUserTours"), Some(&json!(true)));
            assert_eq!(overrides.len(), 1);
        }

        #[test]
        fn test_set_json_decodes_values() {
            let mut overrides = AppConfigOverrides::new();
            overrides
                .set_json("disabledFeatures", r#""CoreMainMenuDelegate_AddonBlog""#)
                .unwrap()
                .set_json("siteurl", r#"{"url": "http://x"}"#)
                .unwrap();
            assert_eq!(
                overrides.get("disabledFeatures"),
                Some(&json!("CoreMainMenuDelegate_AddonBlog"))
            );
            assert_eq!(overrides.get("siteurl"), Some(&json!({"url": "http://x"})));
        }

        #[test]
        fn test_set_json_rejects_invalid_json() {
            let mut overrides = AppConfigOverrides::new();
            let err = overrides.set_json("k", "not json").unwrap_err();
            assert!(matches!(err, SondaError::Config { .. }));
            assert_eq!(overrides.len(), 1);
        }

        #[test]
        fn test_reset() {
            let mut overrides = AppConfigOverrides::new();
            overrides.set("disableUserTours", json!(false));
            overrides.set("k", json!(1));
            overrides.reset();
            assert_eq!(overrides, AppConfigOverrides::default());
        }

        #[test]
        fn test_init_script() {
            let mut overrides = AppConfigOverrides::new();
            overrides.set("quote", json!("a\"b"));
            assert_eq!(
                overrides.to_init_script(),
                r#"window["behatConfigOverrides"] = {"disableUserTours":true,"quote":"a\"b"};"#
            );
        }
    }
}
