//! ScriptDriver - the seam between Sonda and whatever runs the app.
//!
//! Everything Sonda does to the app goes through a single primitive: run a
//! script expression in the page and hand back its JSON value. `CdpDriver`
//! (feature `browser`) does that over the Chrome DevTools Protocol;
//! [`MockDriver`] answers from a closure so the synchronization layer can be
//! tested without a browser.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::result::SondaResult;

/// Abstract script execution against the app's page
#[async_trait]
pub trait ScriptDriver: Send + Sync {
    /// Evaluate an expression and return its value
    async fn evaluate(&self, script: &str) -> SondaResult<Value>;

    /// Evaluate an expression that yields a promise, awaiting its settlement
    async fn evaluate_async(&self, script: &str) -> SondaResult<Value>;

    /// Evaluate an expression for its side effects only
    async fn execute(&self, script: &str) -> SondaResult<()> {
        self.evaluate(script).await.map(|_| ())
    }

    /// Register a script that runs before any page script on every navigation
    async fn add_init_script(&self, script: &str) -> SondaResult<()>;

    /// Navigate the page to a URL
    async fn navigate(&self, url: &str) -> SondaResult<()>;
}

#[async_trait]
impl<D: ScriptDriver + ?Sized> ScriptDriver for Arc<D> {
    async fn evaluate(&self, script: &str) -> SondaResult<Value> {
        (**self).evaluate(script).await
    }

    async fn evaluate_async(&self, script: &str) -> SondaResult<Value> {
        (**self).evaluate_async(script).await
    }

    async fn execute(&self, script: &str) -> SondaResult<()> {
        (**self).execute(script).await
    }

    async fn add_init_script(&self, script: &str) -> SondaResult<()> {
        (**self).add_init_script(script).await
    }

    async fn navigate(&self, url: &str) -> SondaResult<()> {
        (**self).navigate(url).await
    }
}

type Responder = dyn Fn(&str) -> SondaResult<Value> + Send + Sync;

/// Mock driver for unit testing
///
/// Every evaluated script is recorded and answered by the responder.
pub struct MockDriver {
    responder: Box<Responder>,
    history: Mutex<Vec<String>>,
    init_scripts: Mutex<Vec<String>>,
    current_url: Mutex<Option<String>>,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("history", &self.history())
            .field("current_url", &self.current_url())
            .finish_non_exhaustive()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create a mock that answers `null` to everything
    #[must_use]
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(Value::Null))
    }

    /// Create a mock answering scripts with `responder`
    #[must_use]
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str) -> SondaResult<Value> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            history: Mutex::new(Vec::new()),
            init_scripts: Mutex::new(Vec::new()),
            current_url: Mutex::new(None),
        }
    }

    /// Scripts evaluated so far, in order
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of evaluated scripts containing `needle`
    #[must_use]
    pub fn count_matching(&self, needle: &str) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.contains(needle))
            .count()
    }

    /// Init scripts registered so far
    #[must_use]
    pub fn init_scripts(&self) -> Vec<String> {
        self.init_scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last URL navigated to
    #[must_use]
    pub fn current_url(&self) -> Option<String> {
        self.current_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn answer(&self, script: &str) -> SondaResult<Value> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(script.to_string());
        (self.responder)(script)
    }
}

#[async_trait]
impl ScriptDriver for MockDriver {
    async fn evaluate(&self, script: &str) -> SondaResult<Value> {
        self.answer(script)
    }

    async fn evaluate_async(&self, script: &str) -> SondaResult<Value> {
        self.answer(script)
    }

    async fn add_init_script(&self, script: &str) -> SondaResult<()> {
        self.init_scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(script.to_string());
        Ok(())
    }

    async fn navigate(&self, url: &str) -> SondaResult<()> {
        *self
            .current_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
        Ok(())
    }
}
