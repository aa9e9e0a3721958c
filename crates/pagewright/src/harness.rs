//! Test harness: one browser per worker, one fresh page per test.
//!
//! ```ignore
//! let harness = Harness::launch(RunnerConfig::load(None)?).await?;
//!
//! let outcome = harness
//!     .run("login::valid_user", |ctx| async move {
//!         ctx.open("/login").await?;
//!         ctx.page().fill("#user", "ana").await?;
//!         ctx.page().click("#go").await?;
//!         ctx.page().expect_url_contains("dashboard", None).await?;
//!         Ok(())
//!     })
//!     .await;
//!
//! assert!(outcome.passed(), "{outcome:?}");
//! harness.close().await?;
//! ```
//!
//! When a test fails (an error or a panic), the failure hook saves a
//! screenshot, the console log and the trace under the prefix
//! `{test name}_{worker id}` and lists them as attachments on the outcome.
//! The page is closed whatever the result.

use crate::browser::TestBrowser;
use crate::config::{BaseUrl, ConfigError, RunnerConfig};
use crate::driver::Driver;
use crate::error::BrowserError;
use crate::evidence::EvidenceService;
use crate::page::Page;
use crate::session::ChromeSession;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// What a test body returns. Any error type converts with `?`.
pub type TestResult = std::result::Result<(), Box<dyn Error + Send + Sync>>;

/// Errors that stop a harness from starting.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration was rejected before the browser started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The browser could not be launched or a tab could not be opened.
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Per-test state handed to every test body.
#[derive(Debug)]
pub struct TestContext<D: Driver = ChromeSession> {
    page: Page<D>,
    base_url: BaseUrl,
    evidence: Arc<EvidenceService>,
}

impl<D: Driver> TestContext<D> {
    /// Bundles a page with the run's base URL and evidence service.
    pub fn new(page: Page<D>, base_url: BaseUrl, evidence: Arc<EvidenceService>) -> Self {
        Self {
            page,
            base_url,
            evidence,
        }
    }

    /// The page under test.
    pub fn page(&self) -> &Page<D> {
        &self.page
    }

    /// Root URL of the site under test.
    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Where failure artifacts go.
    pub fn evidence(&self) -> &EvidenceService {
        &self.evidence
    }

    /// Opens `path` relative to the base URL.
    ///
    /// # Errors
    ///
    /// See [`Page::open`].
    pub async fn open(&self, path: &str) -> crate::Result<()> {
        self.page.open(&self.base_url.join(path)).await
    }
}

/// Pass or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The body returned `Ok`
    Passed,
    /// The body returned an error or panicked
    Failed,
}

/// A report attachment produced by the failure hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attachment {
    /// An inline image
    Image {
        /// Where the image was written
        path: String,
        /// Always `image/png` for screenshots
        mime_type: String,
    },
    /// A link to a file
    Link {
        /// Link text
        label: String,
        /// `file://` URL
        href: String,
    },
}

impl Attachment {
    fn screenshot(path: &Path) -> Self {
        Attachment::Image {
            path: path.display().to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    fn file_link(label: &str, path: &Path) -> Self {
        Attachment::Link {
            label: label.to_string(),
            href: format!("file://{}", path.display()),
        }
    }
}

/// Result of one test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Test name as given to `run`
    pub name: String,
    /// Pass or fail
    pub status: TestStatus,
    /// Wall-clock duration of the body
    pub duration_ms: u64,
    /// Error or panic message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Evidence written by the failure hook
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl TestOutcome {
    /// True when the body returned `Ok`.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Owns the browser and the resolved run settings.
#[derive(Debug)]
pub struct Harness {
    config: RunnerConfig,
    base_url: BaseUrl,
    evidence: Arc<EvidenceService>,
    browser: TestBrowser,
}

impl Harness {
    /// Resolves the base URL, then launches Chrome.
    ///
    /// # Errors
    ///
    /// `HarnessError::Config` for a bad environment (no browser is started),
    /// `HarnessError::Browser` if Chrome does not launch.
    pub async fn launch(config: RunnerConfig) -> Result<Self, HarnessError> {
        crate::logger::init_logger(&config.log_level, false);
        let base_url = config.resolve_base_url()?;
        info!(env = %config.env, %base_url, worker = config.worker_id(), "starting test run");

        let browser = TestBrowser::launch(config.browser()).await?;
        Ok(Self {
            evidence: Arc::new(config.evidence()),
            base_url,
            config,
            browser,
        })
    }

    /// Loads configuration from `pagewright.toml` and the environment, then
    /// launches.
    ///
    /// # Errors
    ///
    /// See [`Harness::launch`].
    pub async fn from_env() -> Result<Self, HarnessError> {
        Self::launch(RunnerConfig::load(None)?).await
    }

    /// Settings the harness was launched with.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Resolved root URL of the site under test.
    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Opens a fresh tab configured with the run's timeouts and evidence.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` after [`Harness::close`].
    pub async fn new_context(&self) -> Result<TestContext, HarnessError> {
        let page = Page::chrome(self.browser.new_session().await?)
            .with_default_timeout(self.config.default_timeout())
            .with_poll_interval(self.config.poll_interval())
            .with_evidence(Arc::clone(&self.evidence));
        Ok(TestContext::new(page, self.base_url.clone(), Arc::clone(&self.evidence)))
    }

    /// Runs one test in a fresh tab.
    ///
    /// Never returns an error: setup failures are reported as a failed
    /// outcome so a suite keeps going.
    pub async fn run<F, Fut>(&self, name: &str, test: F) -> TestOutcome
    where
        F: FnOnce(Arc<TestContext>) -> Fut,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        match self.new_context().await {
            Ok(ctx) => run_test(name, Arc::new(ctx), self.config.worker_id(), test).await,
            Err(e) => {
                warn!(test = name, error = %e, "could not open a page for the test");
                TestOutcome {
                    name: name.to_string(),
                    status: TestStatus::Failed,
                    duration_ms: 0,
                    failure: Some(e.to_string()),
                    attachments: Vec::new(),
                }
            }
        }
    }

    /// Closes the browser.
    ///
    /// # Errors
    ///
    /// Returns the browser's error if it does not shut down cleanly.
    pub async fn close(&self) -> crate::Result<()> {
        self.browser.close().await
    }
}

/// Runs `test` against `ctx`, then collects evidence on failure and closes
/// the page.
///
/// The body runs on its own task so a panicking assertion is reported like
/// any other failure.
pub async fn run_test<D, F, Fut>(name: &str, ctx: Arc<TestContext<D>>, worker_id: &str, test: F) -> TestOutcome
where
    D: Driver + 'static,
    F: FnOnce(Arc<TestContext<D>>) -> Fut,
    Fut: Future<Output = TestResult> + Send + 'static,
{
    let started = Instant::now();
    let body = tokio::spawn(test(Arc::clone(&ctx)));

    let failure = match body.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(join_error) => Some(panic_message(join_error)),
    };
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let attachments = match &failure {
        None => {
            info!(test = name, duration_ms, "test passed");
            Vec::new()
        }
        Some(reason) => {
            warn!(test = name, duration_ms, %reason, "test failed");
            capture_failure(&ctx, &evidence_prefix(name, worker_id)).await
        }
    };

    if let Err(e) = ctx.page().close().await {
        warn!(test = name, error = %e, "failed to close page");
    }

    TestOutcome {
        name: name.to_string(),
        status: if failure.is_none() {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        },
        duration_ms,
        failure,
        attachments,
    }
}

/// Saves screenshot, console log and trace for a failed test.
pub async fn capture_failure<D: Driver>(ctx: &TestContext<D>, prefix: &str) -> Vec<Attachment> {
    let page = ctx.page();
    let evidence = ctx.evidence();
    let mut attachments = Vec::new();

    if let Some(path) = evidence.save(page.driver(), prefix).await {
        attachments.push(Attachment::screenshot(&path));
    }
    if let Some(path) = evidence.save_console_logs(&page.console().lines(), prefix) {
        attachments.push(Attachment::file_link("Console logs", &path));
    }
    if let Some(path) = evidence.export_trace(page.trace(), prefix) {
        attachments.push(Attachment::file_link("Trace", &path));
    }
    attachments
}

/// `tests/login.rs::valid_user` on worker `gw1` becomes
/// `tests_login.rs_valid_user_gw1`.
#[must_use]
pub fn evidence_prefix(test_name: &str, worker_id: &str) -> String {
    let safe_name = test_name.replace("::", "_").replace('/', "_");
    format!("{safe_name}_{worker_id}")
}

fn panic_message(error: tokio::task::JoinError) -> String {
    if error.is_cancelled() {
        return "test task was cancelled".to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
