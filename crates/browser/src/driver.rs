//! Chromium-backed [`AutomationDriver`].

use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use {
    async_trait::async_trait,
    chatwatch_capture::{
        AutomationDriver, ChangeBatch, ChangeStream, ElementSnapshot, Locator, Probe,
        Result as CaptureResult,
    },
    chromiumoxide::{
        Browser, Page,
        cdp::{
            browser_protocol::input::{
                DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
                DispatchMouseEventType, MouseButton,
            },
            js_protocol::runtime::{AddBindingParams, EventBindingCalled},
        },
    },
    futures::{StreamExt, future},
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

use crate::{
    config::BrowserConfig,
    dom::{self, CHANGE_BINDING},
    error::BrowserError,
    launch,
};

/// A single Chromium page driven over CDP.
pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    next_ref: AtomicU32,
}

impl ChromeDriver {
    /// Launch a browser according to `config` and wrap its page.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let launched = launch::launch(config).await?;
        Ok(Self {
            browser: launched.browser,
            page: launched.page,
            handler: launched.handler,
            next_ref: AtomicU32::new(1),
        })
    }

    /// Close the browser and stop the CDP event pump.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "browser process wait failed");
        }
        self.handler.abort();
        info!("browser shut down");
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
    ) -> Result<(), BrowserError> {
        let cmd = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(BrowserError::Cdp)?;
        self.page.execute(cmd).await?;
        Ok(())
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, c: char) -> Result<(), BrowserError> {
        let cmd = DispatchKeyEventParams::builder()
            .r#type(kind)
            .text(c.to_string())
            .build()
            .map_err(BrowserError::Cdp)?;
        self.page.execute(cmd).await?;
        Ok(())
    }
}

#[async_trait]
impl AutomationDriver for ChromeDriver {
    type Element = u32;

    async fn navigate(&self, url: &str) -> CaptureResult<()> {
        validate_url(url)?;

        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        // Single-page apps often never fire a second load event.
        let _ = self.page.wait_for_navigation().await;

        let current_url = self.page.url().await.ok().flatten().unwrap_or_default();
        info!(url = %current_url, "navigated");
        Ok(())
    }

    async fn locate(&self, locator: &Locator) -> CaptureResult<Option<u32>> {
        let candidate = self.next_ref.fetch_add(1, Ordering::Relaxed);
        Ok(dom::locate(&self.page, locator, candidate).await?)
    }

    async fn count(&self, locator: &Locator) -> CaptureResult<usize> {
        Ok(dom::count(&self.page, locator).await?)
    }

    async fn click(&self, element: &u32) -> CaptureResult<()> {
        let ref_ = *element;
        let (x, y) = dom::element_center(&self.page, ref_).await?;

        // Let the scroll settle before reading the final position.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let (x, y) = dom::element_center(&self.page, ref_)
            .await
            .unwrap_or((x, y));

        self.dispatch_mouse(DispatchMouseEventType::MousePressed, x, y)
            .await?;
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, x, y)
            .await?;

        debug!(ref_, x, y, "clicked element");
        Ok(())
    }

    async fn fill(&self, element: &u32, text: &str) -> CaptureResult<()> {
        dom::focus_and_clear(&self.page, *element).await?;

        for c in text.chars() {
            self.dispatch_key(DispatchKeyEventType::KeyDown, c).await?;
            self.dispatch_key(DispatchKeyEventType::KeyUp, c).await?;
        }

        debug!(ref_ = *element, chars = text.chars().count(), "typed text");
        Ok(())
    }

    async fn is_enabled(&self, element: &u32) -> CaptureResult<bool> {
        Ok(dom::is_enabled(&self.page, *element).await?)
    }

    async fn scan(
        &self,
        container: &Locator,
        messages: &Locator,
        probes: &[Probe],
    ) -> CaptureResult<Vec<ElementSnapshot>> {
        Ok(dom::scan(&self.page, container, messages, probes).await?)
    }

    async fn subscribe(&self, container: &Locator) -> CaptureResult<ChangeStream> {
        // Listen before installing the observer so no early batch is lost.
        let events = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(BrowserError::from)?;
        self.page
            .execute(AddBindingParams::new(CHANGE_BINDING))
            .await
            .map_err(BrowserError::from)?;
        let on_container = dom::observe(&self.page, container).await?;
        if !on_container {
            warn!(container = %container, "container missing, reporting whole-page changes until it renders");
        }

        let changes = events
            .filter(|event| future::ready(event.name == CHANGE_BINDING))
            .map(|event| ChangeBatch {
                mutations: dom::parse_change_payload(&event.payload),
            });
        Ok(changes.boxed())
    }
}

/// Validate a URL before attempting navigation.
fn validate_url(url: &str) -> Result<(), BrowserError> {
    if url.is_empty() {
        return Err(BrowserError::InvalidUrl("URL cannot be empty".to_string()));
    }

    let parsed = url::Url::parse(url)
        .map_err(|e| BrowserError::InvalidUrl(format!("invalid URL '{}': {e}", truncate_url(url))))?;

    match parsed.scheme() {
        "http" | "https" => {},
        scheme => {
            return Err(BrowserError::InvalidUrl(format!(
                "unsupported URL scheme '{scheme}', only http/https allowed"
            )));
        },
    }

    Ok(())
}

/// Truncate a URL for error messages.
fn truncate_url(url: &str) -> String {
    match url.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_url_accepts_web_urls() {
        assert!(validate_url("https://zoom.us/wc/join/123456789?pwd=abc").is_ok());
        assert!(validate_url("http://localhost:8080/wc/join/1").is_ok());
    }

    #[test]
    fn validate_url_rejects_empty() {
        assert!(matches!(validate_url(""), Err(BrowserError::InvalidUrl(_))));
    }

    #[test]
    fn validate_url_rejects_other_schemes() {
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn validate_url_rejects_malformed() {
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("://missing.scheme").is_err());
    }

    #[test]
    fn truncate_url_caps_long_input() {
        let long = format!("https://zoom.us/{}", "a".repeat(200));
        let truncated = truncate_url(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 103);
        assert_eq!(truncate_url("https://zoom.us"), "https://zoom.us");
    }
}
