//! Element locators in the app's surface syntax.
//!
//! Steps describe targets the way a person reads the screen:
//!
//! ```text
//! "Submit"                      text only
//! "My courses" "ion-tab-button" text inside a selector
//! "Log in" near "Forgotten"     text disambiguated by nearby text
//! ```
//!
//! A locator is parsed once and embedded into a command as a JSON object
//! (`{"text": .., "selector": .., "near": {"text": ..}}`), with absent parts
//! left out entirely.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::result::{SondaError, SondaResult};

static LOCATOR_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"((?:[^"\\]|\\.)*)"(?: "([^"]+)")?(?: near "((?:[^"\\]|\\.)*)")?$"#)
        .expect("locator regex is valid")
});

/// Nearby text used to disambiguate a locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Near {
    /// Text that must appear close to the target
    pub text: String,
}

/// A UI target described by text, an optional selector and optional nearby text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementLocator {
    /// Text to match
    pub text: String,
    /// Structural selector (tag or role class) the text must be inside
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Nearby text for disambiguation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub near: Option<Near>,
}

impl ElementLocator {
    /// Locate by text alone
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            selector: None,
            near: None,
        }
    }

    /// Restrict to elements matching a selector
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Disambiguate by nearby text
    #[must_use]
    pub fn near(mut self, text: impl Into<String>) -> Self {
        self.near = Some(Near { text: text.into() });
        self
    }

    /// Nearby text, if any
    #[must_use]
    pub fn near_text(&self) -> Option<&str> {
        self.near.as_ref().map(|n| n.text.as_str())
    }

    /// Parse the surface syntax
    pub fn parse(input: &str) -> SondaResult<Self> {
        let input = input.trim();
        let caps = LOCATOR_SYNTAX
            .captures(input)
            .ok_or_else(|| SondaError::InvalidLocator {
                input: input.to_string(),
                reason: r#"expected "text", "text" "selector" or "text" near "other text""#
                    .to_string(),
            })?;

        let text = unescape_quotes(&caps[1]);
        if text.is_empty() {
            return Err(SondaError::InvalidLocator {
                input: input.to_string(),
                reason: "locator text is empty".to_string(),
            });
        }

        Ok(Self {
            text,
            selector: caps.get(2).map(|m| m.as_str().to_string()),
            near: caps.get(3).map(|m| Near {
                text: unescape_quotes(m.as_str()),
            }),
        })
    }

    /// JSON form embedded into bridge commands
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("text".into(), self.text.clone().into());
        if let Some(selector) = &self.selector {
            obj.insert("selector".into(), selector.clone().into());
        }
        if let Some(near) = &self.near {
            obj.insert("near".into(), serde_json::json!({ "text": near.text }));
        }
        serde_json::Value::Object(obj)
    }
}

fn unescape_quotes(s: &str) -> String {
    s.replace("\\\"", "\"")
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

impl FromStr for ElementLocator {
    type Err = SondaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ElementLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", escape_quotes(&self.text))?;
        if let Some(selector) = &self.selector {
            write!(f, " \"{selector}\"")?;
        }
        if let Some(near) = self.near_text() {
            write!(f, " near \"{}\"", escape_quotes(near))?;
        }
        Ok(())
    }
}
