//! Explicit waits for element states.

use super::Page;
use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::locator::{Locatable, Locator};
use crate::wait::{poll_until, ElementState, PollOutcome, WaitConfig, WaitState};
use std::time::Duration;
use tracing::debug;

impl<D: Driver> Page<D> {
    /// Blocks until `target` reaches `state` and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` when the state is not reached in time and
    /// `StaleHandle` for handles from a closed or foreign page.
    pub async fn wait_for(
        &self,
        target: impl Into<Locatable>,
        state: WaitState,
        timeout: Option<Duration>,
    ) -> Result<Locator> {
        let locator = self.bind(target)?;
        let config = self.wait_config(timeout);
        self.traced("wait_for", &locator.to_string(), async {
            self.wait_state(&locator, state, config).await?;
            Ok(locator.clone())
        })
        .await
    }

    /// Waits until the element is visible.
    ///
    /// # Errors
    ///
    /// See [`Page::wait_for`].
    pub async fn get_visible(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> Result<Locator> {
        self.wait_for(target, WaitState::Visible, timeout).await
    }

    /// Waits until the element is hidden or gone.
    ///
    /// # Errors
    ///
    /// See [`Page::wait_for`].
    pub async fn get_hidden(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> Result<Locator> {
        self.wait_for(target, WaitState::Hidden, timeout).await
    }

    /// Waits until the element is in the DOM.
    ///
    /// # Errors
    ///
    /// See [`Page::wait_for`].
    pub async fn get_attached(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> Result<Locator> {
        self.wait_for(target, WaitState::Attached, timeout).await
    }

    /// Waits until the element has left the DOM.
    ///
    /// # Errors
    ///
    /// See [`Page::wait_for`].
    pub async fn get_detached(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> Result<Locator> {
        self.wait_for(target, WaitState::Detached, timeout).await
    }

    /// Polls the driver until `state` holds and returns the satisfying probe.
    pub(crate) async fn wait_state(
        &self,
        locator: &Locator,
        state: WaitState,
        config: WaitConfig,
    ) -> Result<ElementState> {
        debug!(target = %locator, %state, timeout = ?config.timeout, "waiting");
        let probe = || async move { self.driver.probe(locator).await };

        match poll_until(probe, |seen| state.is_satisfied_by(seen), config).await {
            PollOutcome::Satisfied(seen) => Ok(seen),
            PollOutcome::Aborted(e) => Err(e),
            PollOutcome::TimedOut(_) => Err(BrowserError::WaitTimeout {
                condition: format!("{locator} to be {state}"),
                timeout: config.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Effect, FakeDriver, FakeElement};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn visible_element_returns_at_once() {
        let page = Page::new(FakeDriver::new().with_element("#banner", FakeElement::visible()));

        let start = Instant::now();
        let handle = page.get_visible("#banner", None).await.unwrap();

        assert_eq!(handle.selector().source(), "#banner");
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_driver_cannot_stretch_the_timeout() {
        let page = Page::new(
            FakeDriver::new()
                .with_element("#banner", FakeElement::visible())
                .with_slow_driver(Duration::from_secs(10)),
        );

        let start = Instant::now();
        let err = page
            .get_visible("#banner", Some(Duration::from_secs(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, BrowserError::WaitTimeout { timeout, .. } if timeout == Duration::from_secs(1)));
        assert!(start.elapsed() <= Duration::from_millis(1_100), "{:?}", start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_no_longer_than_needed() {
        let page = Page::new(
            FakeDriver::new().with_element("#toast", FakeElement::appearing_after(Duration::from_millis(750))),
        );

        let start = Instant::now();
        page.get_visible("#toast", Some(Duration::from_secs(5))).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(750));
        assert!(elapsed <= Duration::from_millis(850));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_names_the_target_and_state() {
        let page = Page::new(FakeDriver::new());

        let start = Instant::now();
        let err = page
            .get_attached("#never", Some(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(start.elapsed() >= Duration::from_secs(2));
        match err {
            BrowserError::WaitTimeout { condition, timeout } => {
                assert!(condition.contains("#never"));
                assert!(condition.contains("attached"));
                assert_eq!(timeout, Duration::from_secs(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_counts_as_hidden_and_detached() {
        let page = Page::new(FakeDriver::new());

        page.get_hidden("#spinner", None).await.unwrap();
        page.get_detached("#spinner", None).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_but_attached_is_not_detached() {
        let page = Page::new(FakeDriver::new().with_element("#modal", FakeElement::hidden()));

        page.get_hidden("#modal", None).await.unwrap();
        page.get_attached("#modal", None).await.unwrap();
        assert!(page
            .get_detached("#modal", Some(Duration::from_millis(300)))
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn returned_handle_is_reusable() {
        let driver = FakeDriver::new().with_element(
            "#open",
            FakeElement::visible().on_click(Effect::Hide("#open".into())),
        );
        let page = Page::new(driver);

        let handle = page.get_visible("#open", None).await.unwrap();
        page.click(&handle).await.unwrap();

        let same = page.get_hidden(&handle, None).await.unwrap();
        assert!(same.same_handle(&handle));
    }

    #[tokio::test(start_paused = true)]
    async fn text_selectors_wait_like_any_other() {
        let page = Page::new(
            FakeDriver::new().with_element(
                "#greeting",
                FakeElement::appearing_after(Duration::from_millis(200)).with_text("Olá, Ana"),
            ),
        );

        let handle = page.get_by_text("Ana");
        page.get_visible(&handle, None).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn loose_text_ignores_case_but_exact_text_does_not() {
        let page = Page::new(
            FakeDriver::new().with_element("#greeting", FakeElement::visible().with_text("Olá, Ana")),
        );
        let short = Some(Duration::from_millis(300));

        page.get_visible(page.get_by_text("olá, ANA"), short).await.unwrap();
        page.get_visible(page.get_by_exact_text("Olá, Ana"), short).await.unwrap();
        assert!(page
            .get_visible(page.get_by_exact_text("olá, ana"), short)
            .await
            .unwrap_err()
            .is_timeout());
    }
}
