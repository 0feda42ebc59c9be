//! CdpDriver - [`ScriptDriver`] over the Chrome DevTools Protocol.
//!
//! Launches Chromium with chromiumoxide, opens one page and evaluates every
//! script in it by value. Promise-returning scripts are awaited by the
//! browser before the result comes back.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::LaunchConfig;
use crate::driver::ScriptDriver;
use crate::result::{SondaError, SondaResult};

/// Chromium page driven over CDP
#[derive(Debug)]
pub struct CdpDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

fn launch_error(err: impl std::fmt::Display) -> SondaError {
    SondaError::BrowserLaunch {
        message: err.to_string(),
    }
}

impl CdpDriver {
    /// Launch Chromium and open a blank page
    pub async fn launch(config: &LaunchConfig) -> SondaResult<Self> {
        let mut builder =
            BrowserConfig::builder().window_size(config.viewport_width, config.viewport_height);

        if !config.headless {
            builder = builder.with_head();
        }

        if !config.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder.build().map_err(launch_error)?;
        let (browser, mut handler) = Browser::launch(cdp_config).await.map_err(launch_error)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(error = %err, "CDP handler stopped");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(launch_error)?;

        info!(
            headless = config.headless,
            width = config.viewport_width,
            height = config.viewport_height,
            "browser launched"
        );

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Close the browser
    pub async fn close(self) -> SondaResult<()> {
        let Self {
            mut browser,
            handler,
            ..
        } = self;
        browser.close().await.map_err(launch_error)?;
        if let Err(err) = browser.wait().await {
            debug!(error = %err, "browser did not exit cleanly");
        }
        handler.abort();
        Ok(())
    }

    async fn eval(&self, script: &str, await_promise: bool) -> SondaResult<Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(await_promise)
            .return_by_value(true)
            .build()
            .map_err(SondaError::script)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| SondaError::script(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ScriptDriver for CdpDriver {
    async fn evaluate(&self, script: &str) -> SondaResult<Value> {
        self.eval(script, false).await
    }

    async fn evaluate_async(&self, script: &str) -> SondaResult<Value> {
        self.eval(script, true).await
    }

    async fn add_init_script(&self, script: &str) -> SondaResult<()> {
        let params = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(script)
            .build()
            .map_err(SondaError::script)?;
        self.page
            .evaluate_on_new_document(params)
            .await
            .map_err(|e| SondaError::script(e.to_string()))?;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> SondaResult<()> {
        debug!(%url, "navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| SondaError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}
