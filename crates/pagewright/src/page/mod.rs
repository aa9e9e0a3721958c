//! The page-interaction layer.
//!
//! `Page` wraps one [`Driver`] and builds the blocking vocabulary page
//! objects are written in: actions, waits, boolean queries and assertions.
//! Each family lives in its own submodule as an `impl` block on `Page`.
//!
//! Page objects compose a `Page` instead of extending it:
//!
//! ```ignore
//! struct LoginPage<'a> {
//!     page: &'a Page,
//! }
//!
//! impl LoginPage<'_> {
//!     const USER: &'static str = "input[name='usuario']";
//!     const PASSWORD: &'static str = "input[name='senha']";
//!     const SUBMIT: &'static str = "button[type='submit']";
//!
//!     async fn log_in(&self, user: &str, password: &str) -> pagewright::Result<()> {
//!         self.page.fill(Self::USER, user).await?;
//!         self.page.fill(Self::PASSWORD, password).await?;
//!         self.page.click(Self::SUBMIT).await
//!     }
//! }
//! ```

mod actions;
mod assertions;
mod queries;
mod waits;

pub use actions::ClickOptions;

use crate::console::ConsoleCapture;
use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::evidence::EvidenceService;
use crate::locator::{self, Locatable, Locator, Selector, SessionId};
use crate::session::ChromeSession;
use crate::trace::TraceRecorder;
use crate::wait::{WaitConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A browsing session plus the wait/assert contract built on top of it.
#[derive(Debug)]
pub struct Page<D: Driver = ChromeSession> {
    driver: D,
    session: SessionId,
    closed: AtomicBool,
    evidence: Option<Arc<EvidenceService>>,
    trace: TraceRecorder,
    default_timeout: Duration,
    poll_interval: Duration,
}

impl<D: Driver> Page<D> {
    /// Wraps a driver. Tracing starts immediately.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            session: SessionId::next(),
            closed: AtomicBool::new(false),
            evidence: None,
            trace: TraceRecorder::start(),
            default_timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Attaches the evidence service used by `should_see_text`.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Arc<EvidenceService>) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Timeout applied when an operation is called with `None`.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Interval between condition checks.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Identifies this page; every locator it produces carries it.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Console messages captured for this page.
    pub fn console(&self) -> &ConsoleCapture {
        self.driver.console()
    }

    /// Recorded operations for this page.
    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    /// Evidence service, when one was attached.
    pub fn evidence(&self) -> Option<&EvidenceService> {
        self.evidence.as_deref()
    }

    /// Normalizes a selector or handle into a handle. Never blocks.
    pub fn resolve(&self, target: impl Into<Locatable>) -> Locator {
        locator::resolve(self.session, target.into())
    }

    /// Builds a handle for a CSS or XPath selector.
    pub fn locator(&self, selector: &str) -> Locator {
        Locator::new(self.session, Selector::parse(selector))
    }

    /// Handle to the smallest element containing `text`.
    pub fn get_by_text(&self, text: &str) -> Locator {
        Locator::new(
            self.session,
            Selector::Text {
                text: text.to_string(),
                exact: false,
            },
        )
    }

    /// Handle to the smallest element whose whole text is `text`.
    pub fn get_by_exact_text(&self, text: &str) -> Locator {
        Locator::new(
            self.session,
            Selector::Text {
                text: text.to_string(),
                exact: true,
            },
        )
    }

    /// Current page URL.
    ///
    /// # Errors
    ///
    /// Fails if the page is closed or the driver cannot read it.
    pub async fn url(&self) -> Result<String> {
        self.ensure_open()?;
        self.driver.url().await
    }

    /// Current document title.
    ///
    /// # Errors
    ///
    /// Fails if the page is closed or the driver cannot read it.
    pub async fn title(&self) -> Result<String> {
        self.ensure_open()?;
        self.driver.title().await
    }

    /// Closes the page. Handles it produced become stale.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if closing the tab fails.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(session = %self.session, "closing page");
        self.driver.close().await
    }

    /// Returns true once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(BrowserError::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    /// Resolves `target` and checks the handle may be used on this page.
    pub(crate) fn bind(&self, target: impl Into<Locatable>) -> Result<Locator> {
        let locator = self.resolve(target);
        if self.is_closed() {
            return Err(BrowserError::StaleHandle {
                target: locator.to_string(),
                reason: format!("{} is closed", self.session),
            });
        }
        if locator.session() != self.session {
            return Err(BrowserError::StaleHandle {
                target: locator.to_string(),
                reason: format!(
                    "handle belongs to {}, not {}",
                    locator.session(),
                    self.session
                ),
            });
        }
        Ok(locator)
    }

    pub(crate) fn wait_config(&self, timeout: Option<Duration>) -> WaitConfig {
        WaitConfig::new(timeout.unwrap_or(self.default_timeout), self.poll_interval)
    }

    /// Runs `operation` and records it in the trace.
    pub(crate) async fn traced<T, F>(&self, action: &str, target: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let began = Instant::now();
        let result = operation.await;
        let error = result.as_ref().err().map(ToString::to_string);
        self.trace.record(action, target, began, error);
        result
    }
}

impl Page<ChromeSession> {
    /// Wraps a Chromium session.
    pub fn chrome(session: ChromeSession) -> Self {
        Self::new(session)
    }
}
