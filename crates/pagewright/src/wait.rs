//! Wait conditions and the polling loop behind every blocking operation.
//!
//! Waits, actions and assertions all reduce to "observe, check, sleep" until
//! a deadline. The loop lives here once. The last sleep is clamped to the
//! time left, so a condition that never holds fails no earlier than the
//! timeout and no later than one poll interval past it.

use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};

/// Default timeout for wait operations (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default poll interval for checking conditions (100ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for wait operations.
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Maximum time to wait for the condition.
    pub timeout: Duration,

    /// How often to check if the condition is satisfied.
    pub poll_interval: Duration,
}

impl WaitConfig {
    /// Creates a new wait configuration.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Creates a config with custom timeout and default poll interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// The DOM or visual condition a wait targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    /// Present in the DOM, visible or not
    Attached,
    /// Not present in the DOM
    Detached,
    /// Present and rendered with a non-empty box
    #[default]
    Visible,
    /// Not visible, including not present at all
    Hidden,
}

impl WaitState {
    /// Whether an observed element state satisfies this wait.
    #[must_use]
    pub fn is_satisfied_by(self, state: &ElementState) -> bool {
        match self {
            WaitState::Attached => state.attached,
            WaitState::Detached => !state.attached,
            WaitState::Visible => state.attached && state.visible,
            WaitState::Hidden => !state.attached || !state.visible,
        }
    }
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
        };
        f.write_str(name)
    }
}

/// Point-in-time snapshot of an element, as reported by a driver probe.
///
/// An element that does not exist probes as all `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Present in the DOM
    pub attached: bool,
    /// Rendered, not `display:none`/`visibility:hidden`, non-empty box
    pub visible: bool,
    /// Not disabled (directly, via fieldset, or `aria-disabled`)
    pub enabled: bool,
    /// Enabled, not read-only, and an input, textarea, select or contenteditable
    pub editable: bool,
    /// Checked checkbox/radio or `aria-checked="true"`
    pub checked: bool,
}

impl ElementState {
    /// State of an element that is not in the DOM.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }
}

/// How a bounded poll ended.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// The accepted observation
    Satisfied(T),
    /// Deadline passed; carries the last successful observation, if any
    TimedOut(Option<T>),
    /// A fatal driver error stopped polling early
    Aborted(BrowserError),
}

/// Observes a value until `accept` holds or the deadline passes.
///
/// Transient observation errors count as "not yet"; fatal ones (see
/// [`BrowserError::is_fatal`]) abort immediately. A single observation is
/// cut off at the deadline, so a stalled driver call cannot stretch the wait.
pub async fn poll_until<T, F, Fut, A>(observe: F, accept: A, config: WaitConfig) -> PollOutcome<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
    A: Fn(&T) -> bool,
{
    let deadline = Instant::now() + config.timeout;
    let mut last = None;

    loop {
        let Ok(observed) = timeout_at(deadline, observe()).await else {
            return PollOutcome::TimedOut(last);
        };
        match observed {
            Ok(value) if accept(&value) => return PollOutcome::Satisfied(value),
            Ok(value) => last = Some(value),
            Err(e) if e.is_fatal() => return PollOutcome::Aborted(e),
            Err(_) => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut(last);
        }

        sleep(config.poll_interval.min(deadline - now)).await;
    }
}

/// Waits for a condition that returns a `Result<bool>`.
///
/// Errors are treated as transient and polling continues, unless they are
/// fatal for the session.
pub async fn wait_for_result<F, Fut>(condition: F, config: WaitConfig, description: &str) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    match poll_until(condition, |ready| *ready, config).await {
        PollOutcome::Satisfied(_) => Ok(()),
        PollOutcome::Aborted(e) => Err(e),
        PollOutcome::TimedOut(_) => Err(BrowserError::WaitTimeout {
            condition: description.to_string(),
            timeout: config.timeout,
        }),
    }
}
