//! Polling assertions.
//!
//! Each assertion re-reads its subject until the expectation holds or the
//! timeout passes, then fails with `AssertionFailed` carrying the last value
//! it saw.

use super::Page;
use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::locator::Locatable;
use crate::wait::{poll_until, ElementState, PollOutcome, WaitState};
use regex::Regex;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

enum Expectation<'a> {
    /// Equal after collapsing whitespace runs and trimming the ends
    Text(String),
    Exact(&'a str),
    Contains(&'a str),
    Matches(&'a Regex),
}

impl Expectation<'_> {
    fn holds(&self, actual: &str) -> bool {
        match self {
            Expectation::Text(expected) => normalize_whitespace(actual) == *expected,
            Expectation::Exact(expected) => actual == *expected,
            Expectation::Contains(fragment) => actual.contains(fragment),
            Expectation::Matches(pattern) => pattern.is_match(actual),
        }
    }

    fn describe(&self) -> String {
        match self {
            Expectation::Text(expected) => format!("to be {expected:?}"),
            Expectation::Exact(expected) => format!("to be {expected:?}"),
            Expectation::Contains(fragment) => format!("to contain {fragment:?}"),
            Expectation::Matches(pattern) => format!("to match /{pattern}/"),
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn describe_state(state: &ElementState) -> &'static str {
    match (state.attached, state.visible) {
        (false, _) => "not in the page",
        (true, false) => "hidden",
        (true, true) => "visible",
    }
}

impl<D: Driver> Page<D> {
    /// Asserts the element becomes visible.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` if it is still hidden or missing at the deadline.
    pub async fn expect_visible(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> Result<()> {
        self.expect_state(target, WaitState::Visible, timeout).await
    }

    /// Asserts the element becomes hidden or leaves the page.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` if it is still visible at the deadline.
    pub async fn expect_hidden(&self, target: impl Into<Locatable>, timeout: Option<Duration>) -> Result<()> {
        self.expect_state(target, WaitState::Hidden, timeout).await
    }

    /// Asserts the element's text equals `text`, ignoring differences in
    /// whitespace.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` with the last text read.
    pub async fn expect_text(&self, target: impl Into<Locatable>, text: &str, timeout: Option<Duration>) -> Result<()> {
        self.expect_element_text(target, Expectation::Text(normalize_whitespace(text)), timeout)
            .await
    }

    /// Asserts the element's text contains `text`.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` with the last text read.
    pub async fn expect_text_contains(
        &self,
        target: impl Into<Locatable>,
        text: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.expect_element_text(target, Expectation::Contains(text), timeout)
            .await
    }

    /// Asserts the current URL is exactly `url`.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` with the last URL read.
    pub async fn expect_url_is(&self, url: &str, timeout: Option<Duration>) -> Result<()> {
        self.expect_page_url(Expectation::Exact(url), timeout).await
    }

    /// Asserts the current URL contains `fragment` literally.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` with the last URL read.
    pub async fn expect_url_contains(&self, fragment: &str, timeout: Option<Duration>) -> Result<()> {
        self.expect_page_url(Expectation::Contains(fragment), timeout)
            .await
    }

    /// Asserts the current URL matches `pattern`.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` with the last URL read.
    pub async fn expect_url_matches(&self, pattern: &Regex, timeout: Option<Duration>) -> Result<()> {
        self.expect_page_url(Expectation::Matches(pattern), timeout)
            .await
    }

    /// Asserts the document title is exactly `title`.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` with the last title read.
    pub async fn expect_title_is(&self, title: &str, timeout: Option<Duration>) -> Result<()> {
        self.expect_page_title(Expectation::Exact(title), timeout)
            .await
    }

    /// Asserts the document title contains `fragment`.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` with the last title read.
    pub async fn expect_title_contains(&self, fragment: &str, timeout: Option<Duration>) -> Result<()> {
        self.expect_page_title(Expectation::Contains(fragment), timeout)
            .await
    }

    /// Asserts the document title matches `pattern`.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` with the last title read.
    pub async fn expect_title_matches(&self, pattern: &Regex, timeout: Option<Duration>) -> Result<()> {
        self.expect_page_title(Expectation::Matches(pattern), timeout)
            .await
    }

    /// Asserts some element showing `text` is visible anywhere on the page.
    ///
    /// When `screenshot_on_fail` is set and an evidence service is attached,
    /// a screenshot prefixed `erro_should_see_<text>` is saved before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// `AssertionFailed` if no visible element shows the text in time.
    pub async fn should_see_text(&self, text: &str, screenshot_on_fail: bool, timeout: Option<Duration>) -> Result<()> {
        info!(text, "validating text visibility");
        let result = self.expect_visible(self.get_by_text(text), timeout).await;

        if let Err(BrowserError::AssertionFailed { .. }) = &result {
            if screenshot_on_fail {
                match &self.evidence {
                    Some(evidence) => {
                        evidence
                            .save(&self.driver, &format!("erro_should_see_{text}"))
                            .await;
                    }
                    None => warn!(text, "no evidence service attached, screenshot skipped"),
                }
            }
        }
        result
    }

    async fn expect_state(&self, target: impl Into<Locatable>, state: WaitState, timeout: Option<Duration>) -> Result<()> {
        let locator = self.bind(target)?;
        let config = self.wait_config(timeout);
        let label = locator.to_string();
        let handle = &locator;

        self.traced(&format!("expect_{state}"), &label, async {
            let probe = || async move { self.driver.probe(handle).await };
            match poll_until(probe, |seen| state.is_satisfied_by(seen), config).await {
                PollOutcome::Satisfied(_) => Ok(()),
                PollOutcome::Aborted(e) => Err(e),
                PollOutcome::TimedOut(last) => Err(BrowserError::AssertionFailed {
                    target: label.clone(),
                    expected: format!("to be {state}"),
                    actual: last
                        .as_ref()
                        .map_or("no answer from the page", describe_state)
                        .to_string(),
                    timeout: config.timeout,
                }),
            }
        })
        .await
    }

    async fn expect_element_text(
        &self,
        target: impl Into<Locatable>,
        expectation: Expectation<'_>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let locator = self.bind(target)?;
        let handle = &locator;
        self.expect_value(
            "expect_text",
            locator.to_string(),
            expectation,
            timeout,
            || async move { self.driver.text_content(handle).await },
        )
        .await
    }

    async fn expect_page_url(&self, expectation: Expectation<'_>, timeout: Option<Duration>) -> Result<()> {
        self.expect_value("expect_url", "page url".to_string(), expectation, timeout, || async move {
            self.url().await.map(Some)
        })
        .await
    }

    async fn expect_page_title(&self, expectation: Expectation<'_>, timeout: Option<Duration>) -> Result<()> {
        self.expect_value("expect_title", "page title".to_string(), expectation, timeout, || async move {
            self.title().await.map(Some)
        })
        .await
    }

    async fn expect_value<F, Fut>(
        &self,
        action: &str,
        target: String,
        expectation: Expectation<'_>,
        timeout: Option<Duration>,
        observe: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        let config = self.wait_config(timeout);
        self.traced(action, &target, async {
            let accept = |seen: &Option<String>| seen.as_deref().is_some_and(|v| expectation.holds(v));
            match poll_until(observe, accept, config).await {
                PollOutcome::Satisfied(_) => Ok(()),
                PollOutcome::Aborted(e) => Err(e),
                PollOutcome::TimedOut(last) => Err(BrowserError::AssertionFailed {
                    target: target.clone(),
                    expected: expectation.describe(),
                    actual: match last.flatten() {
                        Some(value) => format!("{value:?}"),
                        None => "nothing".to_string(),
                    },
                    timeout: config.timeout,
                }),
            }
        })
        .await
    }
}
