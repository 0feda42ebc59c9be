//! SettleWait - barriers that let the app's async work drain.
//!
//! ## Barriers
//!
//! - [`SettleWait::await_idle`]: polls the app's pending-task count until it
//!   reaches zero. Called after every mutating action.
//! - [`SettleWait::force_change_detection`]: makes the reactive layer
//!   reconcile its view right away. Does not wait for anything; follow it
//!   with a fresh check.
//! - [`SettleWait::await_loading_finished`]: polls until no loading
//!   indicator is both rendered and visible, on the long timeout.

use serde_json::Value;
use tracing::debug;

use crate::command::escape_js_string;
use crate::config::{SettleConfig, TimeoutPolicy};
use crate::driver::ScriptDriver;
use crate::result::{SondaError, SondaResult};
use crate::retry::{Attempt, RetryLoop};

/// Visibility of every rendered loading indicator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadingIndicators {
    visibility: Vec<bool>,
}

impl LoadingIndicators {
    /// Build from one visibility flag per rendered indicator
    #[must_use]
    pub fn new(visibility: Vec<bool>) -> Self {
        Self { visibility }
    }

    /// Indicators currently rendered
    #[must_use]
    pub fn rendered(&self) -> usize {
        self.visibility.len()
    }

    /// Indicators rendered and visible
    #[must_use]
    pub fn visible(&self) -> usize {
        self.visibility.iter().filter(|v| **v).count()
    }

    /// No indicator is both rendered and visible
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.visible() == 0
    }

    fn from_value(value: Value) -> SondaResult<Self> {
        let visibility: Vec<bool> = serde_json::from_value(value.clone())
            .map_err(|_| SondaError::protocol("loading indicator query", value.to_string()))?;
        Ok(Self::new(visibility))
    }
}

/// Post-action settle barrier
#[derive(Debug, Clone)]
pub struct SettleWait {
    config: SettleConfig,
    timeouts: TimeoutPolicy,
}

impl SettleWait {
    /// Create a settle barrier
    #[must_use]
    pub const fn new(config: SettleConfig, timeouts: TimeoutPolicy) -> Self {
        Self { config, timeouts }
    }

    /// Settle configuration
    #[must_use]
    pub const fn config(&self) -> &SettleConfig {
        &self.config
    }

    /// Number of pending async tasks the app reports
    pub async fn pending_tasks<D: ScriptDriver + ?Sized>(&self, driver: &D) -> SondaResult<u64> {
        let value = driver.evaluate(&self.config.pending_probe).await?;
        match value {
            Value::Number(ref n) => n
                .as_u64()
                .ok_or_else(|| SondaError::protocol("pending task probe", value.to_string())),
            Value::Null => Ok(0),
            other => Err(SondaError::protocol("pending task probe", other.to_string())),
        }
    }

    /// Block until the app has no pending async work
    ///
    /// Returns immediately when nothing is pending.
    pub async fn await_idle<D: ScriptDriver + ?Sized>(&self, driver: &D) -> SondaResult<()> {
        RetryLoop::new("wait for pending tasks", self.timeouts.settle())
            .run(move || async move {
                match self.pending_tasks(driver).await {
                    Ok(0) => Attempt::Done(()),
                    Ok(n) => Attempt::retry(format!("{n} pending task(s)")),
                    Err(err) => Attempt::Fatal(err),
                }
            })
            .await
    }

    /// Force the reactive layer to reconcile its view with current state
    pub async fn force_change_detection<D: ScriptDriver + ?Sized>(
        &self,
        driver: &D,
    ) -> SondaResult<()> {
        debug!("forcing change detection");
        driver.execute(&self.config.change_detection).await
    }

    /// Query rendered loading indicators
    pub async fn loading_indicators<D: ScriptDriver + ?Sized>(
        &self,
        driver: &D,
    ) -> SondaResult<LoadingIndicators> {
        let script = format!(
            "(() => Array.from(document.querySelectorAll({})).map(el => {{ \
                const rect = el.getBoundingClientRect(); \
                const style = window.getComputedStyle(el); \
                return rect.width > 0 && rect.height > 0 \
                    && style.visibility !== 'hidden' && style.display !== 'none'; \
            }}))()",
            escape_js_string(&self.config.loading_indicator)
        );
        LoadingIndicators::from_value(driver.evaluate(&script).await?)
    }

    /// Block until no loading indicator is visible
    pub async fn await_loading_finished<D: ScriptDriver + ?Sized>(
        &self,
        driver: &D,
    ) -> SondaResult<()> {
        let deadline = self
            .timeouts
            .long()
            .with_timeout_error(SondaError::expectation(
                "Loading took too long to complete",
            ));

        RetryLoop::new("wait loading to finish", deadline)
            .run(move || async move { Attempt::flatten(self.loading_attempt(driver).await) })
            .await
    }

    async fn loading_attempt<D: ScriptDriver + ?Sized>(
        &self,
        driver: &D,
    ) -> SondaResult<Attempt<()>> {
        self.force_change_detection(driver).await?;
        let indicators = self.loading_indicators(driver).await?;
        Ok(if indicators.is_idle() {
            Attempt::Done(())
        } else {
            Attempt::retry(format!(
                "{} of {} loading indicator(s) visible",
                indicators.visible(),
                indicators.rendered()
            ))
        })
    }

    /// Wait for a scroll or swipe animation to finish
    pub async fn animation_pause(&self) {
        tokio::time::sleep(self.config.animation_pause()).await;
    }
}
