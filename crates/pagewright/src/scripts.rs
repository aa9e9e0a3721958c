//! Page-context scripts used by the Chromium backend.
//!
//! Every user-supplied string (selectors, fill text) is embedded through
//! `serde_json::to_string`, which yields a valid JavaScript string literal, so
//! quotes, backticks and newlines in selectors cannot break out of the script.
//! Scripts always return an object so `null` never has to round-trip through
//! CDP's by-value serialization.

use crate::error::{BrowserError, Result};
use crate::locator::Selector;

fn js_string(value: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
}

/// Expression evaluating to the first matching element or `null`.
pub(crate) fn element_query(selector: &Selector) -> Result<String> {
    let query = match selector {
        Selector::Css(css) => format!("document.querySelector({})", js_string(css)?),
        Selector::XPath(xpath) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            js_string(xpath)?
        ),
        Selector::Text { text, exact } => format!(
            r"(() => {{
                const wanted = {text};
                const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
                const fold = (s) => norm(s).toLowerCase();
                const matches = (el) => {exact} ? norm(el.textContent) === norm(wanted) : fold(el.textContent).includes(fold(wanted));
                let best = null;
                for (const el of document.querySelectorAll('body, body *')) {{
                    if (el.tagName === 'SCRIPT' || el.tagName === 'STYLE') continue;
                    if (!matches(el)) continue;
                    if (best === null || best.contains(el)) best = el;
                }}
                return best;
            }})()",
            text = js_string(text)?,
            exact = exact,
        ),
    };
    Ok(query)
}

fn with_element(selector: &Selector, missing: &str, body: &str) -> Result<String> {
    Ok(format!(
        "(() => {{ const el = {query}; if (!el) return {missing}; {body} }})()",
        query = element_query(selector)?,
    ))
}

/// Snapshot of the element as an `ElementState` object.
pub(crate) fn probe(selector: &Selector) -> Result<String> {
    with_element(
        selector,
        "{ attached: false, visible: false, enabled: false, editable: false, checked: false }",
        r"
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        const visible = style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
        const enabled = !el.disabled && !el.closest('fieldset[disabled]') && el.getAttribute('aria-disabled') !== 'true';
        const field = ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName) || el.isContentEditable;
        const editable = visible && enabled && field && !el.readOnly;
        const checked = el.checked === true || el.getAttribute('aria-checked') === 'true';
        return { attached: true, visible, enabled, editable, checked };
        ",
    )
}

/// `{ text }` with the element's text content, `null` when missing.
pub(crate) fn text_content(selector: &Selector) -> Result<String> {
    with_element(selector, "{ text: null }", "return { text: el.textContent };")
}

/// Bails out with `{ status: 'hidden' }` unless the element is rendered.
const RENDERED_GATE: &str = r"
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || rect.width === 0 || rect.height === 0) {
        return { status: 'hidden' };
    }
";

/// Pointer actionability: scrolled into view, rendered, enabled, and the
/// element (or a descendant) is what sits under its center point.
fn actionable_gate() -> String {
    format!(
        r"
    el.scrollIntoView({{ block: 'center', inline: 'center' }});
    {RENDERED_GATE}{POINTER_GATE}"
    )
}

/// Enabled, and hit-testing at the center lands on the element. Expects
/// `rect` from the rendered gate.
const POINTER_GATE: &str = r"
    if (el.disabled || el.closest('fieldset[disabled]')) return { status: 'disabled' };
    const x = rect.left + rect.width / 2;
    const y = rect.top + rect.height / 2;
    const hit = document.elementFromPoint(x, y);
    if (!hit || !(hit === el || el.contains(hit))) return { status: 'obscured' };
";

/// Click after the actionability gate. Returns `{ status }`.
pub(crate) fn click(selector: &Selector) -> Result<String> {
    let body = format!("{} el.click(); return {{ status: 'ok' }};", actionable_gate());
    with_element(selector, "{ status: 'missing' }", &body)
}

/// Hover after the actionability gate. Returns `{ status }`.
pub(crate) fn hover(selector: &Selector) -> Result<String> {
    let body = format!(
        r"{gate}
        for (const type of ['mouseover', 'mouseenter', 'mousemove']) {{
            el.dispatchEvent(new MouseEvent(type, {{ bubbles: type !== 'mouseenter', clientX: x, clientY: y }}));
        }}
        return {{ status: 'ok' }};",
        gate = actionable_gate(),
    );
    with_element(selector, "{ status: 'missing' }", &body)
}

/// Replace the value of a rendered, enabled field and fire `input`/`change`.
/// Returns `{ status }`.
///
/// Uses the prototype's native value setter so frameworks that track the
/// value property (React) still see the change.
pub(crate) fn fill(selector: &Selector, text: &str) -> Result<String> {
    let body = format!(
        r"
        const value = {value};
        {RENDERED_GATE}
        const enabled = !el.disabled && !el.closest('fieldset[disabled]');
        if (!enabled || el.readOnly) return {{ status: 'not editable' }};
        el.focus();
        if (el.isContentEditable) {{
            el.textContent = value;
        }} else if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA' || el.tagName === 'SELECT') {{
            const proto = Object.getPrototypeOf(el);
            const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
            setter.call(el, value);
        }} else {{
            return {{ status: 'not an input' }};
        }}
        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
        return {{ status: 'ok' }};",
        value = js_string(text)?,
    );
    with_element(selector, "{ status: 'missing' }", &body)
}
