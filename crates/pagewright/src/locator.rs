//! Element selectors and handles.
//!
//! A `Locator` is the single handle type every page operation works on. It is
//! produced by a page, remembers which page produced it, and is cheap to
//! clone. Operations accept anything convertible into a `Locatable` so that
//! page objects can pass either a raw selector or a handle they built once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies the page (session) a locator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// How an element is looked up in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector, e.g. `button[type="submit"]`
    Css(String),
    /// XPath expression, e.g. `//li[.//span[normalize-space()='Agosto']]`
    XPath(String),
    /// Smallest element whose text matches
    Text {
        /// Text to look for
        text: String,
        /// Whole (trimmed) text must match instead of containing it
        exact: bool,
    },
}

impl Selector {
    /// Detects the selector syntax of a raw string.
    ///
    /// Explicit engine prefixes (`css=`, `xpath=`, `text=`) win. Otherwise
    /// strings starting like an XPath location path are XPath and anything
    /// else is CSS.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        if let Some(rest) = trimmed.strip_prefix("css=") {
            return Selector::Css(rest.to_string());
        }
        if let Some(rest) = trimmed.strip_prefix("xpath=") {
            return Selector::XPath(rest.to_string());
        }
        if let Some(rest) = trimmed.strip_prefix("text=") {
            return Selector::Text {
                text: rest.to_string(),
                exact: false,
            };
        }
        if trimmed.starts_with('/') || trimmed.starts_with("./") || trimmed.starts_with("..") {
            return Selector::XPath(trimmed.to_string());
        }
        // `(//a)[2]` is XPath; `(` never starts a valid CSS selector
        if trimmed.starts_with('(') {
            return Selector::XPath(trimmed.to_string());
        }
        Selector::Css(raw.to_string())
    }

    /// The selector source text without the engine.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Selector::Css(s) | Selector::XPath(s) => s,
            Selector::Text { text, .. } => text,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "{s}"),
            Selector::XPath(s) => write!(f, "xpath={s}"),
            Selector::Text { text, exact: false } => write!(f, "text={text}"),
            Selector::Text { text, exact: true } => write!(f, "text=\"{text}\""),
        }
    }
}

/// A resolved element handle scoped to one page.
///
/// Locators are not serializable and are only valid while the page that
/// produced them is open.
#[derive(Debug, Clone)]
pub struct Locator {
    inner: Arc<LocatorInner>,
}

#[derive(Debug)]
struct LocatorInner {
    id: u64,
    session: SessionId,
    selector: Selector,
}

impl Locator {
    pub(crate) fn new(session: SessionId, selector: Selector) -> Self {
        Self {
            inner: Arc::new(LocatorInner {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
                session,
                selector,
            }),
        }
    }

    /// Unique id of this handle. Clones share it; fresh lookups never do.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The page this handle belongs to.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.inner.session
    }

    /// How the element is looked up.
    #[must_use]
    pub fn selector(&self) -> &Selector {
        &self.inner.selector
    }

    /// True when both values are the same handle (not merely equal selectors).
    #[must_use]
    pub fn same_handle(&self, other: &Locator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.selector)
    }
}

/// Either a raw selector or an already-resolved handle.
#[derive(Debug, Clone)]
pub enum Locatable {
    /// Raw selector string, looked up on the current page
    Selector(String),
    /// Handle resolved earlier; used as is
    Handle(Locator),
}

impl From<&str> for Locatable {
    fn from(selector: &str) -> Self {
        Locatable::Selector(selector.to_string())
    }
}

impl From<String> for Locatable {
    fn from(selector: String) -> Self {
        Locatable::Selector(selector)
    }
}

impl From<&String> for Locatable {
    fn from(selector: &String) -> Self {
        Locatable::Selector(selector.clone())
    }
}

impl From<Locator> for Locatable {
    fn from(locator: Locator) -> Self {
        Locatable::Handle(locator)
    }
}

impl From<&Locator> for Locatable {
    fn from(locator: &Locator) -> Self {
        Locatable::Handle(locator.clone())
    }
}

/// Normalizes a locatable into a handle owned by `session`.
///
/// Raw selectors get a fresh handle; handles pass through untouched.
#[must_use]
pub fn resolve(session: SessionId, target: Locatable) -> Locator {
    match target {
        Locatable::Selector(raw) => Locator::new(session, Selector::parse(&raw)),
        Locatable::Handle(locator) => locator,
    }
}
