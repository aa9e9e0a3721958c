//! Navigation and element actions.

use super::Page;
use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::locator::{Locatable, Locator};
use crate::wait::{poll_until, PollOutcome, WaitConfig, WaitState};
use std::time::Duration;
use tracing::debug;

/// Tuning for [`Page::click_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickOptions {
    /// Bound for both the visibility wait and the actionability retries.
    /// `None` uses the page default.
    pub timeout: Option<Duration>,
    /// Extra pause between "visible" and the click, for widgets that need a
    /// moment to settle after appearing.
    pub wait_before: Duration,
}

impl ClickOptions {
    /// Options with a custom timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    /// Adds a settle delay before clicking.
    #[must_use]
    pub fn wait_before(mut self, delay: Duration) -> Self {
        self.wait_before = delay;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Gesture<'a> {
    Click,
    Hover,
    Fill(&'a str),
}

impl Gesture<'_> {
    fn readiness(&self) -> &'static str {
        match self {
            Gesture::Click => "clickable",
            Gesture::Hover => "hoverable",
            Gesture::Fill(_) => "editable",
        }
    }
}

impl<D: Driver> Page<D> {
    /// Navigates to an absolute URL and waits for the navigation to commit.
    ///
    /// # Errors
    ///
    /// Returns `NavigationFailed` if the page does not load.
    pub async fn open(&self, url: &str) -> Result<()> {
        self.traced("open", url, async {
            self.ensure_open()?;
            self.driver.goto(url).await
        })
        .await
    }

    /// Clicks an element with the default timeout and no settle delay.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the element never becomes visible or never
    /// accepts the click.
    pub async fn click(&self, target: impl Into<Locatable>) -> Result<()> {
        self.click_with(target, ClickOptions::default()).await
    }

    /// Clicks an element: wait until visible, optionally pause, then click as
    /// soon as the element is actionable.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if either wait runs out.
    pub async fn click_with(&self, target: impl Into<Locatable>, options: ClickOptions) -> Result<()> {
        let locator = self.bind(target)?;
        self.traced("click", &locator.to_string(), self.click_inner(&locator, options))
            .await
    }

    /// Opens a custom dropdown and picks an option from it.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the box cannot be clicked or the option never
    /// shows up.
    pub async fn click_and_select(
        &self,
        box_target: impl Into<Locatable>,
        option_target: impl Into<Locatable>,
    ) -> Result<()> {
        let dropdown = self.bind(box_target)?;
        let option = self.bind(option_target)?;
        let label = format!("{dropdown} -> {option}");

        self.traced("click_and_select", &label, async {
            self.click_inner(&dropdown, ClickOptions::default()).await?;
            self.wait_state(&option, WaitState::Visible, self.wait_config(None))
                .await?;
            self.click_inner(&option, ClickOptions::default()).await
        })
        .await
    }

    /// Replaces the value of a text field.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the target is not an editable field within
    /// the default timeout.
    pub async fn fill(&self, target: impl Into<Locatable>, text: &str) -> Result<()> {
        let locator = self.bind(target)?;
        self.traced("fill", &locator.to_string(), async {
            debug!(target = %locator, "filling");
            self.perform(&locator, Gesture::Fill(text), self.wait_config(None))
                .await
        })
        .await
    }

    /// Moves the pointer over an element once it is actionable.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the element stays hidden, disabled or covered.
    pub async fn hover(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> Result<()> {
        let locator = self.bind(target)?;
        self.traced("hover", &locator.to_string(), async {
            self.perform(&locator, Gesture::Hover, self.wait_config(timeout))
                .await
        })
        .await
    }

    async fn click_inner(&self, locator: &Locator, options: ClickOptions) -> Result<()> {
        let config = self.wait_config(options.timeout);
        debug!(target = %locator, timeout = ?config.timeout, "clicking");

        self.wait_state(locator, WaitState::Visible, config).await?;
        if !options.wait_before.is_zero() {
            tokio::time::sleep(options.wait_before).await;
        }
        self.perform(locator, Gesture::Click, config).await
    }

    /// Retries a gesture until the driver accepts it or the deadline passes.
    ///
    /// `NotActionable` refusals are expected while the page settles and are
    /// retried; the last refusal reason ends up in the timeout message.
    pub(super) async fn perform(
        &self,
        locator: &Locator,
        gesture: Gesture<'_>,
        config: WaitConfig,
    ) -> Result<()> {
        let attempt = || async move {
            let outcome = match gesture {
                Gesture::Click => self.driver.click(locator).await,
                Gesture::Hover => self.driver.hover(locator).await,
                Gesture::Fill(text) => self.driver.fill(locator, text).await,
            };
            match outcome {
                Ok(()) => Ok(None),
                Err(BrowserError::NotActionable { reason, .. }) => Ok(Some(reason)),
                Err(e) => Err(e),
            }
        };

        match poll_until(attempt, Option::is_none, config).await {
            PollOutcome::Satisfied(_) => Ok(()),
            PollOutcome::Aborted(e) => Err(e),
            PollOutcome::TimedOut(last) => {
                let reason = last.flatten().map(|r| format!(" (last seen: {r})")).unwrap_or_default();
                Err(BrowserError::WaitTimeout {
                    condition: format!("{locator} to be {}{reason}", gesture.readiness()),
                    timeout: config.timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Effect, FakeDriver, FakeElement};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn click_waits_for_the_element_to_appear() {
        let driver = FakeDriver::new()
            .with_element("#late", FakeElement::appearing_after(Duration::from_secs(2)));
        let page = Page::new(driver);

        let start = Instant::now();
        page.click("#late").await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(page.driver().actions(), vec!["click #late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn click_honors_wait_before() {
        let page = Page::new(FakeDriver::new().with_element("#menu", FakeElement::visible()));

        let start = Instant::now();
        page.click_with("#menu", ClickOptions::default().wait_before(Duration::from_millis(500)))
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn hover_needs_an_unobscured_target() {
        let page = Page::new(FakeDriver::new().with_element("#menu", FakeElement::visible()));
        page.hover("#menu", None).await.unwrap();
        assert_eq!(page.driver().actions(), vec!["hover #menu"]);

        let covered = Page::new(FakeDriver::new().with_element("#tip", FakeElement::visible().obscured()));
        let err = covered
            .hover("#tip", Some(Duration::from_millis(500)))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::WaitTimeout { ref condition, .. } if condition.contains("hoverable")));
    }

    #[tokio::test(start_paused = true)]
    async fn click_times_out_on_hidden_element() {
        let page = Page::new(FakeDriver::new().with_element("#ghost", FakeElement::hidden()));

        let err = page
            .click_with("#ghost", ClickOptions::with_timeout(Duration::from_secs(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, BrowserError::WaitTimeout { ref condition, .. } if condition.contains("visible")));
        assert!(page.driver().actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn click_reports_why_it_never_landed() {
        let page = Page::new(
            FakeDriver::new().with_element("#under-overlay", FakeElement::visible().obscured()),
        );

        let err = page
            .click_with("#under-overlay", ClickOptions::with_timeout(Duration::from_secs(1)))
            .await
            .unwrap_err();

        match err {
            BrowserError::WaitTimeout { condition, timeout } => {
                assert!(condition.contains("clickable"));
                assert!(condition.contains("obscured"));
                assert_eq!(timeout, Duration::from_secs(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn click_and_select_picks_the_second_option() {
        let driver = FakeDriver::new()
            .with_element(
                "#month",
                FakeElement::visible()
                    .with_text("Mês")
                    .on_click(Effect::Show("#options".into()))
                    .on_click(Effect::Show("//li[1]".into()))
                    .on_click(Effect::Show("//li[2]".into()))
                    .on_click(Effect::Show("//li[3]".into())),
            )
            .with_element("#options", FakeElement::hidden())
            .with_element("//li[1]", FakeElement::hidden().with_text("Julho"))
            .with_element(
                "//li[2]",
                FakeElement::hidden()
                    .with_text("Agosto")
                    .on_click(Effect::SetText("#month".into(), "Agosto".into()))
                    .on_click(Effect::Hide("#options".into()))
                    .on_click(Effect::Hide("//li[1]".into()))
                    .on_click(Effect::Hide("//li[2]".into()))
                    .on_click(Effect::Hide("//li[3]".into())),
            )
            .with_element("//li[3]", FakeElement::hidden().with_text("Setembro"));
        let page = Page::new(driver);

        page.click_and_select("#month", "//li[2]").await.unwrap();

        assert_eq!(page.driver().text_of("#month"), "Agosto");
        assert!(!page.driver().state_of("#options").visible);
        assert_eq!(page.driver().actions(), vec!["click #month", "click //li[2]"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fill_replaces_the_value() {
        let page = Page::new(FakeDriver::new().with_element("#name", FakeElement::input()));

        page.fill("#name", "Bruno").await.unwrap();
        page.fill("#name", "Teste").await.unwrap();

        assert_eq!(page.driver().value_of("#name"), "Teste");
    }

    #[tokio::test(start_paused = true)]
    async fn fill_rejects_non_editable_targets() {
        let page = Page::new(FakeDriver::new().with_element("#label", FakeElement::visible()))
            .with_default_timeout(Duration::from_millis(500));

        let err = page.fill("#label", "x").await.unwrap_err();

        assert!(matches!(err, BrowserError::WaitTimeout { ref condition, .. } if condition.contains("editable")));
    }

    #[tokio::test(start_paused = true)]
    async fn fill_waits_for_a_hidden_field_to_show() {
        let mut collapsed = FakeElement::input();
        collapsed.state.visible = false;
        let page = Page::new(
            FakeDriver::new()
                .with_element("#toggle", FakeElement::visible().on_click(Effect::Show("#cpf".into())))
                .with_element("#cpf", collapsed),
        )
        .with_default_timeout(Duration::from_millis(500));

        let err = page.fill("#cpf", "123").await.unwrap_err();
        assert!(matches!(err, BrowserError::WaitTimeout { ref condition, .. } if condition.contains("hidden")));
        assert_eq!(page.driver().value_of("#cpf"), "");

        page.click("#toggle").await.unwrap();
        page.fill("#cpf", "123").await.unwrap();
        assert_eq!(page.driver().value_of("#cpf"), "123");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_session_fails_fast() {
        let page = Page::new(FakeDriver::new().with_element("#go", FakeElement::visible()));
        page.driver().close_now();

        let start = Instant::now();
        let err = page.click("#go").await.unwrap_err();

        assert!(matches!(err, BrowserError::AlreadyClosed));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
