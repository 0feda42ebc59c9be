//! Sonda: synchronization and command bridge for SPA end-to-end tests
//!
//! Sonda drives a single-page application from outside the browser. It sends
//! commands into the app's global test hook, reads back the small string
//! vocabulary the hook answers with, and polls until the app catches up,
//! so tests do not flake on rendering, animation or network timing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         one user action                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────────────────────────┐  ┌──────────┐  │
//! │  │ RetryLoop                                     │  │ Settle   │  │
//! │  │  ┌───────────────┐      ┌─────────────────┐  │─►│ Wait     │  │
//! │  │  │ CommandBridge │─────►│ interpret()     │  │  │          │  │
//! │  │  └───────┬───────┘      └─────────────────┘  │  └──────────┘  │
//! │  └──────────┼───────────────────────────────────┘                │
//! │             ▼                                                     │
//! │      ScriptDriver (CdpDriver | MockDriver)                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sonda::{AppConfigOverrides, AppSession, ElementLocator, HarnessConfig, MockDriver};
//!
//! # async fn demo() -> sonda::SondaResult<()> {
//! let config = HarnessConfig::new().with_url("http://localhost:8100");
//! let session = AppSession::new(MockDriver::new(), config);
//!
//! session.launch(&AppConfigOverrides::new()).await?;
//! session.press(&"\"Log in\" near \"Forgotten\"".parse::<ElementLocator>()?).await?;
//! session.header_should_be("Dashboard").await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

#[cfg(feature = "browser")]
mod cdp;
mod command;
mod config;
mod driver;
mod locator;
mod outcome;
mod result;
mod retry;
mod scenario;
mod session;
mod settle;

#[cfg(feature = "browser")]
pub use cdp::CdpDriver;
pub use command::{
    embed_value, escape_js_string, Capability, Command, CommandBridge, ExecMode, RawResult,
    StandardButton,
};
pub use config::{
    AppConfigOverrides, HarnessConfig, LaunchConfig, SettleConfig, TimeoutPolicy,
    CONFIG_OVERRIDES_GLOBAL, DEFAULT_CHANGE_DETECTION, DEFAULT_HOOK_OBJECT,
    DEFAULT_LOADING_INDICATOR, DEFAULT_PENDING_PROBE,
};
pub use driver::{MockDriver, ScriptDriver};
pub use locator::{ElementLocator, Near};
pub use outcome::{interpret, Outcome, Shape};
pub use result::{ErrorKind, SondaError, SondaResult};
pub use retry::{
    Attempt, Deadline, RetryLoop, RetryStats, DEFAULT_LONG_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SHORT_TIMEOUT_MS,
};
pub use scenario::{RunSummary, Scenario, Step, StepFailure};
pub use session::{AppSession, SwipeDirection, ALL_ITEMS_LOADED};
pub use settle::{LoadingIndicators, SettleWait};
