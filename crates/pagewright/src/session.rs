//! Chromium-backed `Driver`.
//!
//! A `ChromeSession` wraps one chromiumoxide tab. Element primitives run as
//! injected page scripts (see [`crate::scripts`]); navigation and screenshots
//! go through CDP directly. A background task copies `Runtime.consoleAPICalled`
//! events into the session's console buffer for its whole lifetime.

use crate::console::{parse_console_event, ConsoleCapture};
use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::locator::Locator;
use crate::scripts;
use crate::wait::{wait_for_result, ElementState, WaitConfig};
use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::{Page as ChromePage, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TextReply {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionReply {
    status: String,
}

/// One browser tab driven over the Chrome DevTools Protocol.
#[derive(Debug)]
pub struct ChromeSession {
    inner: ChromePage,
    console: ConsoleCapture,
    console_task: JoinHandle<()>,
    closed: AtomicBool,
}

impl ChromeSession {
    /// Wraps a chromiumoxide page and starts console capture.
    ///
    /// Called by [`crate::TestBrowser::new_session`].
    pub(crate) fn new(page: ChromePage) -> Self {
        let console = ConsoleCapture::new();
        let writer = console.clone();
        let listener_page = page.clone();

        let console_task = tokio::spawn(async move {
            if let Ok(mut events) = listener_page
                .event_listener::<EventConsoleApiCalled>()
                .await
            {
                while let Some(event) = events.next().await {
                    writer.push(parse_console_event(&event));
                }
            }
        });

        Self {
            inner: page,
            console,
            console_task,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    /// Executes JavaScript in the page and deserializes the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed, the script throws, or the
    /// result does not deserialize into `T`.
    pub async fn evaluate<T>(&self, script: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.ensure_open()?;
        let result = self
            .inner
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    /// Waits until `document.readyState` is `complete`.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the document never finishes loading.
    pub async fn wait_for_load(&self, config: WaitConfig) -> Result<()> {
        wait_for_result(
            || async move {
                let state: String = self.evaluate("document.readyState").await?;
                Ok(state == "complete")
            },
            config,
            "document ready",
        )
        .await
    }

    async fn run_action(&self, target: &Locator, script: String) -> Result<()> {
        let reply: ActionReply = self.evaluate(&script).await?;
        if reply.status == "ok" {
            Ok(())
        } else {
            Err(BrowserError::NotActionable {
                target: target.to_string(),
                reason: reply.status,
            })
        }
    }
}

#[async_trait]
impl Driver for ChromeSession {
    async fn goto(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        debug!(url, "navigating");
        self.inner
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.wait_for_load(WaitConfig::default()).await
    }

    async fn probe(&self, target: &Locator) -> Result<ElementState> {
        self.evaluate(&scripts::probe(target.selector())?).await
    }

    async fn text_content(&self, target: &Locator) -> Result<Option<String>> {
        let reply: TextReply = self
            .evaluate(&scripts::text_content(target.selector())?)
            .await?;
        Ok(reply.text)
    }

    async fn click(&self, target: &Locator) -> Result<()> {
        self.run_action(target, scripts::click(target.selector())?)
            .await
    }

    async fn hover(&self, target: &Locator) -> Result<()> {
        self.run_action(target, scripts::hover(target.selector())?)
            .await
    }

    async fn fill(&self, target: &Locator, text: &str) -> Result<()> {
        self.run_action(target, scripts::fill(target.selector(), text)?)
            .await
    }

    async fn url(&self) -> Result<String> {
        self.evaluate("window.location.href").await
    }

    async fn title(&self) -> Result<String> {
        self.evaluate("document.title").await
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let params = ScreenshotParams::builder().full_page(full_page).build();
        self.inner
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.console_task.abort();
        self.inner.clone().close().await?;
        Ok(())
    }

    fn console(&self) -> &ConsoleCapture {
        &self.console
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // The tab itself goes away with the browser.
        self.console_task.abort();
    }
}
