//! Error types for page automation.
//!
//! Failures fall into a few families: launching and talking to the browser,
//! waits that ran out of time, explicit expectation mismatches, and handles
//! that outlived their page. The wait and assertion layers only ever surface
//! `WaitTimeout` and `AssertionFailed` for "condition not met"; everything
//! else describes a broken session or a broken script.

use std::time::Duration;
use thiserror::Error;

/// The main error type for all page and browser operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to launch the browser process.
    ///
    /// Usually Chrome/Chromium is not installed or not executable.
    #[error("failed to launch browser: {reason}")]
    LaunchFailed {
        /// Human-readable reason for the launch failure
        reason: String,
        /// Optional underlying error that caused the failure
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Chrome DevTools Protocol connection failed or was lost.
    #[error("CDP connection failed: {0}")]
    ConnectionFailed(String),

    /// Navigation to a URL failed before it committed.
    #[error("navigation to '{url}' failed: {reason}")]
    NavigationFailed {
        /// The URL that failed to load
        url: String,
        /// Reason for the navigation failure
        reason: String,
    },

    /// A wait condition was not satisfied within the timeout.
    #[error("wait condition '{condition}' timed out after {timeout:?}")]
    WaitTimeout {
        /// Description of the condition that timed out
        condition: String,
        /// How long we waited before timing out
        timeout: Duration,
    },

    /// The element exists but cannot receive the action right now.
    ///
    /// Raised by a single driver attempt; the action layer retries it until
    /// its own deadline.
    #[error("element '{target}' is not actionable: {reason}")]
    NotActionable {
        /// Description of the target element
        target: String,
        /// Why the action was refused (hidden, disabled, obscured...)
        reason: String,
    },

    /// An expectation on text, visibility, URL or title was not met in time.
    #[error("expected {target} {expected}, got {actual} (after {timeout:?})")]
    AssertionFailed {
        /// What was inspected (a selector, "page url", "page title")
        target: String,
        /// The expected condition, e.g. `to have text "Welcome"`
        expected: String,
        /// Last observed value
        actual: String,
        /// How long the assertion polled
        timeout: Duration,
    },

    /// A locator was used after its page closed, or on another page.
    #[error("stale handle '{target}': {reason}")]
    StaleHandle {
        /// Description of the handle
        target: String,
        /// Why it is no longer valid
        reason: String,
    },

    /// JavaScript execution in the page context failed.
    #[error("JavaScript execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// An operation was attempted on a closed browser or page.
    #[error("browser instance is already closed")]
    AlreadyClosed,

    /// Wraps errors from the chromiumoxide library.
    #[error("chromiumoxide error: {0}")]
    ChromiumOxide(#[from] chromiumoxide::error::CdpError),

    /// Generic I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    /// Returns true for "condition not met in time" failures.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BrowserError::WaitTimeout { .. } | BrowserError::AssertionFailed { .. }
        )
    }

    /// Returns true when retrying cannot help: the session is gone.
    ///
    /// Polling loops stop early on these instead of burning the full timeout.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrowserError::AlreadyClosed
                | BrowserError::ConnectionFailed(_)
                | BrowserError::StaleHandle { .. }
        )
    }
}

/// A specialized Result type for browser operations.
pub type Result<T> = std::result::Result<T, BrowserError>;
