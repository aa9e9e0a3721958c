//! Boolean queries for optional UI branches.
//!
//! None of these return errors. Timeouts, stale handles and driver failures
//! all read as `false`, so callers can branch with a plain `if`.

use super::actions::Gesture;
use super::Page;
use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::locator::{Locatable, Locator};
use crate::wait::{ElementState, WaitConfig, WaitState};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

impl<D: Driver> Page<D> {
    /// True if the element is in the DOM within `timeout`.
    pub async fn exists(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> bool {
        self.settles_into("exists", target, WaitState::Attached, timeout, |_| true)
            .await
    }

    /// True if the element becomes visible within `timeout`.
    pub async fn is_visible(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> bool {
        self.settles_into("is_visible", target, WaitState::Visible, timeout, |_| true)
            .await
    }

    /// True if the element is hidden or absent within `timeout`.
    ///
    /// Not the negation of [`Page::exists`]: a hidden element still exists.
    pub async fn is_hidden(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> bool {
        self.settles_into("is_hidden", target, WaitState::Hidden, timeout, |_| true)
            .await
    }

    /// True if the element is attached within `timeout` and enabled right
    /// after.
    pub async fn is_enabled(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> bool {
        self.settles_into("is_enabled", target, WaitState::Attached, timeout, |state| state.enabled)
            .await
    }

    /// Exactly `!is_enabled`, including for elements that never show up.
    pub async fn is_disabled(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> bool {
        let Ok(locator) = self.bind(target) else {
            return true;
        };
        let verdict = async {
            let settled = self
                .wait_state(&locator, WaitState::Attached, self.wait_config(timeout))
                .await;
            Ok::<_, BrowserError>(!settled.is_ok_and(|state| state.enabled))
        };
        self.answered("is_disabled", &locator, verdict).await
    }

    /// True if the element is attached within `timeout` and accepts typing.
    pub async fn is_editable(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> bool {
        self.settles_into("is_editable", target, WaitState::Attached, timeout, |state| state.editable)
            .await
    }

    /// True if the element is attached within `timeout` and checked.
    pub async fn is_checked(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> bool {
        self.settles_into("is_checked", target, WaitState::Attached, timeout, |state| state.checked)
            .await
    }

    /// True if the element is visible, enabled and would receive a pointer
    /// event at its center. Probes with a hover, so mouse-over handlers fire.
    ///
    /// The hover is retried until an overlay clears, within whatever is left
    /// of `timeout` after the visibility wait.
    pub async fn is_clickable(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> bool {
        let Ok(locator) = self.bind(target) else {
            return false;
        };
        let config = self.wait_config(timeout);
        let began = Instant::now();

        let verdict = async {
            let state = self.wait_state(&locator, WaitState::Visible, config).await?;
            if !state.enabled {
                return Ok(false);
            }
            let left = WaitConfig::new(config.timeout.saturating_sub(began.elapsed()), config.poll_interval);
            self.perform(&locator, Gesture::Hover, left).await?;
            Ok::<_, BrowserError>(true)
        };
        self.answered("is_clickable", &locator, verdict).await
    }

    async fn settles_into(
        &self,
        action: &str,
        target: impl Into<Locatable>,
        state: WaitState,
        timeout: Option<Duration>,
        accept: impl Fn(&ElementState) -> bool,
    ) -> bool {
        let Ok(locator) = self.bind(target) else {
            return false;
        };
        let verdict = async {
            let seen = self
                .wait_state(&locator, state, self.wait_config(timeout))
                .await?;
            Ok::<_, BrowserError>(accept(&seen))
        };
        self.answered(action, &locator, verdict).await
    }

    /// Runs a query and records its answer in the trace. A `false` answer is
    /// recorded with the reason, errors included.
    async fn answered<F>(&self, action: &str, locator: &Locator, verdict: F) -> bool
    where
        F: Future<Output = Result<bool>>,
    {
        let began = std::time::Instant::now();
        let (answer, reason) = match verdict.await {
            Ok(true) => (true, None),
            Ok(false) => (false, Some("answered false".to_string())),
            Err(e) => {
                debug!(target = %locator, action, error = %e, "query answered false");
                (false, Some(format!("answered false: {e}")))
            }
        };
        self.trace().record(action, &locator.to_string(), began, reason);
        answer
    }
}
