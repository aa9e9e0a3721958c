//! The Chrome process behind a test worker.
//!
//! `TestBrowser` owns one Chrome process. Each test gets its own tab through
//! [`TestBrowser::new_session`], wrapped as a [`ChromeSession`] driver.
//!
//! Dropping a `TestBrowser` without calling `close()` still takes the
//! Chrome process down, so a panicking test does not leak it.

use crate::error::{BrowserError, Result};
use crate::page::Page;
use crate::session::ChromeSession;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How to start Chrome. Usually built from [`crate::RunnerConfig::browser`].
#[derive(Debug, Clone)]
pub struct TestBrowserConfig {
    /// No visible window. On by default.
    pub headless: bool,

    /// Width and height in pixels, 1920x1080 unless overridden.
    pub window_size: (u32, u32),

    /// Extra command-line switches passed to Chrome.
    pub args: Vec<String>,

    /// Explicit binary; `None` lets chromiumoxide find one.
    pub chrome_path: Option<String>,
}

impl TestBrowserConfig {
    /// Headless defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows the browser window, for watching a test run.
    #[must_use]
    pub fn visible(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Overrides the window dimensions.
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    /// Appends command-line switches.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Uses a specific Chrome binary.
    #[must_use]
    pub fn with_chrome_path(mut self, path: impl Into<String>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    #[allow(clippy::result_large_err)]
    fn build(&self) -> Result<BrowserConfig> {
        let (width, height) = self.window_size;
        let mut builder = BrowserConfig::builder().window_size(width, height);
        if !self.headless {
            builder = builder.with_head();
        }

        // A private profile per process, so parallel workers don't fight over
        // Chrome's ProcessSingleton lock.
        let user_data_dir = std::env::temp_dir().join(format!("pagewright-{}", uuid::Uuid::new_v4()));
        builder = builder.user_data_dir(user_data_dir).args(self.args.iter().cloned());
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(|e| BrowserError::LaunchFailed {
            reason: format!("invalid browser configuration: {e}"),
            source: None,
        })
    }
}

impl Default for TestBrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            args: vec![
                // Needed where user namespaces are unavailable (CI containers).
                // Only ever point the test browser at sites you control.
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
            chrome_path: None,
        }
    }
}

/// A managed Chrome process shared by the tests of one worker.
///
/// ```ignore
/// let browser = TestBrowser::launch(TestBrowserConfig::default()).await?;
/// let page = browser.new_page().await?;
/// page.open("https://example.com").await?;
/// page.close().await?;
/// browser.close().await?;
/// ```
pub struct TestBrowser {
    inner: Arc<Mutex<Option<Browser>>>,
    handler: JoinHandle<()>,
}

impl std::fmt::Debug for TestBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestBrowser").finish_non_exhaustive()
    }
}

impl TestBrowser {
    /// Launches Chrome and connects to it over CDP.
    ///
    /// # Errors
    ///
    /// Returns `LaunchFailed` if Chrome is not installed, not executable,
    /// or fails to start.
    pub async fn launch(config: TestBrowserConfig) -> Result<Self> {
        debug!(?config, "launching browser");

        let (browser, mut handler) = Browser::launch(config.build()?)
            .await
            .map_err(|e| BrowserError::LaunchFailed {
                reason: "Chrome did not start".to_string(),
                source: Some(Box::new(e)),
            })?;

        // chromiumoxide only processes CDP traffic while the handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(error = %e, "browser handler error");
                }
            }
        });

        Ok(Self {
            inner: Arc::new(Mutex::new(Some(browser))),
            handler,
        })
    }

    /// Opens a fresh tab with its own console capture.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` if the browser has been closed.
    pub async fn new_session(&self) -> Result<ChromeSession> {
        let guard = self.inner.lock().await;
        let tab = guard
            .as_ref()
            .ok_or(BrowserError::AlreadyClosed)?
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;
        Ok(ChromeSession::new(tab))
    }

    /// Opens a fresh tab wrapped in a [`Page`].
    ///
    /// # Errors
    ///
    /// See [`TestBrowser::new_session`].
    pub async fn new_page(&self) -> Result<Page> {
        Ok(Page::chrome(self.new_session().await?))
    }

    /// Closes the browser and waits for the Chrome process to exit.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` when Chrome rejects the close command.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;

        if let Some(mut browser) = guard.take() {
            debug!("closing browser");
            browser
                .close()
                .await
                .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "browser process did not exit cleanly");
            }
        }
        self.handler.abort();

        Ok(())
    }

    /// Whether [`TestBrowser::close`] already ran.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

impl Drop for TestBrowser {
    fn drop(&mut self) {
        self.handler.abort();
        // chromiumoxide's Browser::drop kills the process if close() was skipped.
        if let Ok(guard) = self.inner.try_lock() {
            if guard.is_some() {
                warn!("TestBrowser dropped without close(), forcing shutdown");
            }
        }
    }
}
