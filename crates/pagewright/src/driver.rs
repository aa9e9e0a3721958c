//! The capability seam between page logic and a concrete browser backend.
//!
//! A `Driver` offers point-in-time primitives only: probe an element once,
//! attempt one click, read the URL once. Waiting, retrying and asserting are
//! layered on top in [`crate::page::Page`], written once for every backend.

use crate::console::ConsoleCapture;
use crate::error::Result;
use crate::locator::Locator;
use crate::wait::ElementState;
use async_trait::async_trait;

/// Browser primitives for one page/session.
///
/// Implementations must be safe to share between the test body and the
/// failure hook, hence `Send + Sync`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigates to an absolute URL and returns once the navigation commits.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Snapshots the element's state. A missing element is not an error; it
    /// probes as [`ElementState::detached`].
    async fn probe(&self, target: &Locator) -> Result<ElementState>;

    /// Text content of the element, or `None` when it is not in the DOM.
    async fn text_content(&self, target: &Locator) -> Result<Option<String>>;

    /// One click attempt.
    ///
    /// Fails with `NotActionable` when the element is hidden, disabled or
    /// covered by another element at its center point.
    async fn click(&self, target: &Locator) -> Result<()>;

    /// One hover attempt, with the same actionability checks as `click`.
    async fn hover(&self, target: &Locator) -> Result<()>;

    /// Replaces the element's value with `text`.
    ///
    /// Fails with `NotActionable` when the element is not editable.
    async fn fill(&self, target: &Locator, text: &str) -> Result<()>;

    /// Current page URL.
    async fn url(&self) -> Result<String>;

    /// Current document title.
    async fn title(&self) -> Result<String>;

    /// PNG screenshot of the page; the whole scrollable page when `full_page`.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>>;

    /// Closes the page. Later calls fail with `AlreadyClosed`.
    async fn close(&self) -> Result<()>;

    /// Console messages captured since the session started.
    fn console(&self) -> &ConsoleCapture;
}
