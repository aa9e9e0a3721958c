//! Scripted in-memory `Driver` for unit tests.
//!
//! Models just enough of a page: elements keyed by selector source with a
//! state snapshot, text and value, optional delayed reveal, occlusion, and
//! click side effects. Time-based behavior uses tokio's clock so tests can
//! run with `start_paused = true`.

use crate::console::ConsoleCapture;
use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::locator::{Locator, Selector};
use crate::wait::ElementState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// What clicking an element does to the fake page.
#[derive(Debug, Clone)]
pub(crate) enum Effect {
    Show(String),
    Hide(String),
    SetText(String, String),
    Navigate { url: String, title: String },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeElement {
    pub state: ElementState,
    pub text: String,
    pub value: String,
    pub obscured: bool,
    pub uncovered_at: Option<Instant>,
    pub reveal_at: Option<Instant>,
    pub on_click: Vec<Effect>,
}

impl FakeElement {
    pub fn visible() -> Self {
        Self {
            state: ElementState {
                attached: true,
                visible: true,
                enabled: true,
                editable: false,
                checked: false,
            },
            ..Self::default()
        }
    }

    pub fn hidden() -> Self {
        Self {
            state: ElementState {
                attached: true,
                enabled: true,
                ..ElementState::default()
            },
            ..Self::default()
        }
    }

    pub fn input() -> Self {
        let mut element = Self::visible();
        element.state.editable = true;
        element
    }

    /// Not in the DOM until `delay` has passed, then visible.
    pub fn appearing_after(delay: Duration) -> Self {
        Self {
            reveal_at: Some(Instant::now() + delay),
            ..Self::visible()
        }
    }

    pub fn disabled(mut self) -> Self {
        self.state.enabled = false;
        self.state.editable = false;
        self
    }

    pub fn checked(mut self) -> Self {
        self.state.checked = true;
        self
    }

    pub fn obscured(mut self) -> Self {
        self.obscured = true;
        self
    }

    /// Covered by an overlay until `delay` has passed.
    pub fn obscured_for(mut self, delay: Duration) -> Self {
        self.uncovered_at = Some(Instant::now() + delay);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }

    fn current_state(&self) -> ElementState {
        match self.reveal_at {
            Some(at) if Instant::now() < at => ElementState::detached(),
            _ => ElementState {
                editable: self.state.editable && self.state.visible,
                ..self.state
            },
        }
    }

    fn is_covered(&self) -> bool {
        self.obscured || self.uncovered_at.is_some_and(|at| Instant::now() < at)
    }
}

#[derive(Debug, Default)]
struct FakeDom {
    elements: HashMap<String, FakeElement>,
    url: String,
    title: String,
    actions: Vec<String>,
}

impl FakeDom {
    /// Looks an element up the way the real backend would, roughly.
    fn find(&self, selector: &Selector) -> Option<(&String, &FakeElement)> {
        match selector {
            Selector::Css(s) | Selector::XPath(s) => self.elements.get_key_value(s),
            Selector::Text { text, exact } => self.elements.iter().find(|(_, el)| {
                el.current_state().attached
                    && if *exact {
                        el.text.trim() == text.trim()
                    } else {
                        el.text.to_lowercase().contains(&text.to_lowercase())
                    }
            }),
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Show(sel) => {
                if let Some(el) = self.elements.get_mut(&sel) {
                    el.state.attached = true;
                    el.state.visible = true;
                }
            }
            Effect::Hide(sel) => {
                if let Some(el) = self.elements.get_mut(&sel) {
                    el.state.visible = false;
                }
            }
            Effect::SetText(sel, text) => {
                if let Some(el) = self.elements.get_mut(&sel) {
                    el.text = text;
                }
            }
            Effect::Navigate { url, title } => {
                self.url = url;
                self.title = title;
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeDriver {
    dom: Mutex<FakeDom>,
    console: ConsoleCapture,
    closed: AtomicBool,
    probe_delay: Option<Duration>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            dom: Mutex::new(FakeDom {
                url: "about:blank".into(),
                ..FakeDom::default()
            }),
            ..Self::default()
        }
    }

    pub fn with_element(self, selector: &str, element: FakeElement) -> Self {
        self.dom
            .lock()
            .unwrap()
            .elements
            .insert(selector.to_string(), element);
        self
    }

    pub fn with_page(self, url: &str, title: &str) -> Self {
        {
            let mut dom = self.dom.lock().unwrap();
            dom.url = url.to_string();
            dom.title = title.to_string();
        }
        self
    }

    /// Every probe takes `delay` to answer, like a renderer stuck on a dialog.
    pub fn with_slow_driver(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.dom.lock().unwrap().actions.clone()
    }

    pub fn value_of(&self, selector: &str) -> String {
        self.dom.lock().unwrap().elements[selector].value.clone()
    }

    pub fn text_of(&self, selector: &str) -> String {
        self.dom.lock().unwrap().elements[selector].text.clone()
    }

    pub fn state_of(&self, selector: &str) -> ElementState {
        self.dom.lock().unwrap().elements[selector].current_state()
    }

    pub fn screenshot_bytes(&self) -> Vec<u8> {
        PNG.to_vec()
    }

    pub fn close_now(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    /// Runs the same checks as the backend's actionability gate.
    fn actionable(&self, target: &Locator) -> Result<(String, Vec<Effect>)> {
        let dom = self.dom.lock().unwrap();
        let refuse = |reason: &str| BrowserError::NotActionable {
            target: target.to_string(),
            reason: reason.to_string(),
        };
        let (key, element) = dom.find(target.selector()).ok_or_else(|| refuse("missing"))?;
        let state = element.current_state();
        if !state.attached {
            return Err(refuse("missing"));
        }
        if !state.visible {
            return Err(refuse("hidden"));
        }
        if !state.enabled {
            return Err(refuse("disabled"));
        }
        if element.is_covered() {
            return Err(refuse("obscured"));
        }
        Ok((key.clone(), element.on_click.clone()))
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        let mut dom = self.dom.lock().unwrap();
        dom.url = url.to_string();
        dom.actions.push(format!("goto {url}"));
        Ok(())
    }

    async fn probe(&self, target: &Locator) -> Result<ElementState> {
        self.ensure_open()?;
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        let dom = self.dom.lock().unwrap();
        Ok(dom
            .find(target.selector())
            .map_or_else(ElementState::detached, |(_, el)| el.current_state()))
    }

    async fn text_content(&self, target: &Locator) -> Result<Option<String>> {
        self.ensure_open()?;
        let dom = self.dom.lock().unwrap();
        Ok(dom
            .find(target.selector())
            .filter(|(_, el)| el.current_state().attached)
            .map(|(_, el)| el.text.clone()))
    }

    async fn click(&self, target: &Locator) -> Result<()> {
        self.ensure_open()?;
        let (key, effects) = self.actionable(target)?;
        let mut dom = self.dom.lock().unwrap();
        dom.actions.push(format!("click {key}"));
        for effect in effects {
            dom.apply(effect);
        }
        Ok(())
    }

    async fn hover(&self, target: &Locator) -> Result<()> {
        self.ensure_open()?;
        let (key, _) = self.actionable(target)?;
        self.dom.lock().unwrap().actions.push(format!("hover {key}"));
        Ok(())
    }

    async fn fill(&self, target: &Locator, text: &str) -> Result<()> {
        self.ensure_open()?;
        let mut dom = self.dom.lock().unwrap();
        let source = target.selector().source().to_string();
        let element = dom
            .elements
            .get_mut(&source)
            .ok_or_else(|| BrowserError::NotActionable {
                target: target.to_string(),
                reason: "missing".into(),
            })?;
        let state = element.current_state();
        let refusal = if !state.visible {
            Some("hidden")
        } else if !state.editable {
            Some("not editable")
        } else {
            None
        };
        if let Some(reason) = refusal {
            return Err(BrowserError::NotActionable {
                target: target.to_string(),
                reason: reason.into(),
            });
        }
        element.value = text.to_string();
        dom.actions.push(format!("fill {source}={text}"));
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.dom.lock().unwrap().url.clone())
    }

    async fn title(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.dom.lock().unwrap().title.clone())
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>> {
        self.ensure_open()?;
        Ok(PNG.to_vec())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn console(&self) -> &ConsoleCapture {
        &self.console
    }
}
