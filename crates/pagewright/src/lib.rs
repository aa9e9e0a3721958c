//! # pagewright
//!
//! A page-interaction layer for browser UI tests, built on chromiumoxide.
//!
//! Tests talk to a [`Page`] in a small blocking vocabulary: open a URL, click,
//! fill, wait for an element state, ask a yes/no question, assert on text,
//! URL or title. Every call waits up to a bounded timeout for the UI to settle
//! instead of failing on the first miss. When a test fails, the
//! [`EvidenceService`] writes a screenshot, the captured console log and an
//! action trace into a dated directory.
//!
//! ## Architecture
//!
//! - **Driver**: point-in-time browser primitives (probe, click, read URL).
//!   [`ChromeSession`] implements it over CDP.
//! - **Page**: waits, actions, queries and assertions written once on top of
//!   any driver.
//! - **Locator**: element handle scoped to the page that made it.
//! - **EvidenceService**: failure artifacts that never fail the test.
//! - **Harness**: one browser per worker, a fresh page per test, a failure
//!   hook that collects evidence.
//! - **RunnerConfig**: figment-layered settings (`pagewright.toml`,
//!   `PAGEWRIGHT_*`).
//!
//! ## Example
//!
//! ```ignore
//! use pagewright::{Harness, RunnerConfig};
//!
//! #[tokio::test]
//! async fn search() {
//!     let harness = Harness::launch(RunnerConfig::load(None).unwrap()).await.unwrap();
//!
//!     let outcome = harness
//!         .run("search::finds_results", |ctx| async move {
//!             ctx.open("/").await?;
//!             ctx.page().fill("textarea[name='q']", "rust").await?;
//!             ctx.page().click("input[name='btnK']").await?;
//!             ctx.page().expect_title_contains("rust", None).await?;
//!             Ok(())
//!         })
//!         .await;
//!
//!     harness.close().await.unwrap();
//!     assert!(outcome.passed(), "{outcome:?}");
//! }
//! ```
//!
//! Run with `cargo test` (unit tests, no browser needed) or
//! `cargo test -- --ignored` (integration tests, Chrome required).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod harness;
pub mod locator;
pub mod logger;
pub mod page;
mod scripts;
pub mod session;
pub mod trace;
pub mod wait;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use browser::{TestBrowser, TestBrowserConfig};
pub use config::{BaseUrl, ConfigError, RunnerConfig};
pub use console::{ConsoleCapture, ConsoleLevel, ConsoleMessage};
pub use driver::Driver;
pub use error::{BrowserError, Result};
pub use evidence::EvidenceService;
pub use harness::{Attachment, Harness, HarnessError, TestContext, TestOutcome, TestResult, TestStatus};
pub use locator::{Locatable, Locator, Selector};
pub use page::{ClickOptions, Page};
pub use session::ChromeSession;
pub use trace::{TraceEvent, TraceRecorder};
pub use wait::{ElementState, WaitConfig, WaitState, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
