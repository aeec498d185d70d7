//! In-page JavaScript helpers.
//!
//! Elements handed out to callers are identified by a numeric ref stamped
//! onto the node as `data-chatwatch-ref`. Every helper takes its arguments
//! as JSON literals so selectors never need manual escaping.

use {
    chatwatch_capture::{ElementSnapshot, Locator, Probe},
    chromiumoxide::Page,
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    tracing::debug,
};

use crate::error::BrowserError;

/// Name of the CDP binding the mutation observer reports through.
pub const CHANGE_BINDING: &str = "__chatwatchChanged";

/// Stamp the first match of a selector with a ref, reusing an existing one.
/// Returns 0 when nothing matches.
const LOCATE_JS: &str = r#"
((selector, candidate) => {
    const el = document.querySelector(selector);
    if (!el) return 0;
    const existing = el.getAttribute('data-chatwatch-ref');
    if (existing) return Number(existing);
    el.setAttribute('data-chatwatch-ref', String(candidate));
    return candidate;
})
"#;

const COUNT_JS: &str = r#"
((selector) => document.querySelectorAll(selector).length)
"#;

/// Center of a ref'd element in viewport coordinates.
const CENTER_JS: &str = r#"
((ref) => {
    const el = document.querySelector(`[data-chatwatch-ref="${ref}"]`);
    if (!el) return { found: false };
    el.scrollIntoView({ behavior: 'instant', block: 'center' });
    const rect = el.getBoundingClientRect();
    return {
        found: true,
        x: rect.x + rect.width / 2,
        y: rect.y + rect.height / 2,
    };
})
"#;

/// Focus a ref'd input and clear its value so typing replaces it.
const FOCUS_CLEAR_JS: &str = r#"
((ref) => {
    const el = document.querySelector(`[data-chatwatch-ref="${ref}"]`);
    if (!el) return false;
    el.focus();
    if ('value' in el) {
        el.value = '';
        el.dispatchEvent(new Event('input', { bubbles: true }));
    }
    return true;
})
"#;

/// 1 = enabled, 0 = disabled, -1 = gone.
const ENABLED_JS: &str = r#"
((ref) => {
    const el = document.querySelector(`[data-chatwatch-ref="${ref}"]`);
    if (!el) return -1;
    const disabled = el.disabled === true
        || el.classList.contains('disabled')
        || el.getAttribute('aria-disabled') === 'true';
    return disabled ? 0 : 1;
})
"#;

/// Snapshot every message node under the container (or the whole body).
const SCAN_JS: &str = r#"
((container, messages, probes) => {
    const root = document.querySelector(container) || document.body;
    if (!root) return [];
    const clean = (el) => {
        const text = (el.innerText || el.textContent || '').trim();
        return text.length ? text : null;
    };
    return Array.from(root.querySelectorAll(messages)).map((node) => {
        const attributes = {};
        for (const attr of Array.from(node.attributes)) {
            attributes[attr.name] = attr.value;
        }
        const fields = {};
        for (const probe of probes) {
            const start = probe.within ? node.closest(probe.within) : node;
            if (!start) continue;
            const found = start.matches(probe.selector)
                ? start
                : start.querySelector(probe.selector);
            const text = found ? clean(found) : null;
            if (text !== null) fields[probe.name] = text;
        }
        return { text: clean(node), attributes, fields };
    });
})
"#;

/// Install (or replace) the page's mutation observer. It watches the whole
/// body and reports only mutations inside the container as it exists at
/// callback time, so a re-rendered container keeps notifying.
const OBSERVE_JS: &str = r#"
((container, binding) => {
    if (window.__chatwatchObserver) {
        window.__chatwatchObserver.disconnect();
    }
    const touches = (mutation, root) => {
        if (root.contains(mutation.target)) return true;
        return Array.from(mutation.addedNodes).some(
            (node) => node === root || (node.contains && node.contains(root)),
        );
    };
    const observer = new MutationObserver((mutations) => {
        const root = document.querySelector(container);
        const relevant = root
            ? mutations.filter((m) => touches(m, root)).length
            : mutations.length;
        if (relevant > 0 && typeof window[binding] === 'function') {
            window[binding](String(relevant));
        }
    });
    observer.observe(document.body, { childList: true, subtree: true, characterData: true });
    window.__chatwatchObserver = observer;
    return document.querySelector(container) ? 'container' : 'body';
})
"#;

#[derive(Debug, Deserialize)]
struct Center {
    found: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

/// Render `function(args...)` with every argument JSON-encoded.
fn call<A: Serialize>(function: &str, args: &A) -> Result<String, BrowserError> {
    let encoded = serde_json::to_string(args)
        .map_err(|e| BrowserError::JsEvalFailed(format!("failed to encode arguments: {e}")))?;
    // Arguments are encoded as a JSON array and spread into the call.
    Ok(format!("({}).apply(null, {encoded})", function.trim()))
}

async fn eval<T: DeserializeOwned>(page: &Page, js: String) -> Result<T, BrowserError> {
    page.evaluate(js.as_str())
        .await
        .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?
        .into_value()
        .map_err(|e| BrowserError::JsEvalFailed(format!("failed to get result: {e:?}")))
}

/// Locate the first element matching `locator`, stamping it with `candidate`
/// if it has no ref yet.
pub async fn locate(
    page: &Page,
    locator: &Locator,
    candidate: u32,
) -> Result<Option<u32>, BrowserError> {
    let js = call(LOCATE_JS, &(locator.as_str(), candidate))?;
    let ref_: u32 = eval(page, js).await?;
    Ok((ref_ != 0).then_some(ref_))
}

pub async fn count(page: &Page, locator: &Locator) -> Result<usize, BrowserError> {
    let js = call(COUNT_JS, &(locator.as_str(),))?;
    eval(page, js).await
}

/// Scroll a ref'd element into view and return its center.
pub async fn element_center(page: &Page, ref_: u32) -> Result<(f64, f64), BrowserError> {
    let js = call(CENTER_JS, &(ref_,))?;
    let center: Center = eval(page, js).await?;
    if !center.found {
        return Err(BrowserError::ElementNotFound(ref_));
    }
    Ok((center.x, center.y))
}

pub async fn focus_and_clear(page: &Page, ref_: u32) -> Result<(), BrowserError> {
    let js = call(FOCUS_CLEAR_JS, &(ref_,))?;
    let focused: bool = eval(page, js).await?;
    if !focused {
        return Err(BrowserError::ElementNotFound(ref_));
    }
    Ok(())
}

pub async fn is_enabled(page: &Page, ref_: u32) -> Result<bool, BrowserError> {
    let js = call(ENABLED_JS, &(ref_,))?;
    match eval::<i8>(page, js).await? {
        -1 => Err(BrowserError::ElementNotFound(ref_)),
        state => Ok(state == 1),
    }
}

pub async fn scan(
    page: &Page,
    container: &Locator,
    messages: &Locator,
    probes: &[Probe],
) -> Result<Vec<ElementSnapshot>, BrowserError> {
    let js = call(SCAN_JS, &(container.as_str(), messages.as_str(), probes))?;
    eval(page, js).await
}

/// Attach the mutation observer. Returns whether the container was present
/// when it attached.
pub async fn observe(page: &Page, container: &Locator) -> Result<bool, BrowserError> {
    let js = call(OBSERVE_JS, &(container.as_str(), CHANGE_BINDING))?;
    let attached: String = eval(page, js).await?;
    debug!(container = %container, attached = %attached, "mutation observer installed");
    Ok(attached == "container")
}

/// Decode a binding payload into a mutation count. Unparseable payloads
/// still count as one change.
pub fn parse_change_payload(payload: &str) -> usize {
    payload.trim().parse().unwrap_or(1)
}
