//! The automation-driver seam: everything the join flow and the capture
//! engine need from a browser, and nothing more.

use std::{borrow::Cow, collections::BTreeMap, fmt, time::Duration};

use {
    async_trait::async_trait,
    futures::stream::BoxStream,
    serde::{Deserialize, Serialize},
    tokio::time::Instant,
};

use crate::error::{Error, Result};

/// Interval between condition checks in the default wait implementations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A CSS selector used to find elements. Selector lists (`a, b`) are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Locator(Cow<'static, str>);

impl Locator {
    pub const fn css(selector: &'static str) -> Self {
        Self(Cow::Borrowed(selector))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Locator {
    fn from(selector: String) -> Self {
        Self(Cow::Owned(selector))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sub-element lookup resolved by the driver for every scanned node.
///
/// The lookup starts at the node itself, or at its closest ancestor matching
/// `within` when set, and records the trimmed text of the first element
/// matching `selector` (the start element included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub name: &'static str,
    pub selector: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within: Option<&'static str>,
}

impl Probe {
    pub const fn new(name: &'static str, selector: &'static str) -> Self {
        Self {
            name,
            selector,
            within: None,
        }
    }

    pub const fn within(mut self, ancestor: &'static str) -> Self {
        self.within = Some(ancestor);
        self
    }
}

/// Plain-data view of one matched DOM node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementSnapshot {
    /// Trimmed text content of the node.
    #[serde(default)]
    pub text: Option<String>,
    /// The node's own attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Probe name to resolved text; probes that found nothing are absent.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ElementSnapshot {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// One structural-change notification. Delivery may coalesce several
/// underlying DOM mutations into a single batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub mutations: usize,
}

/// Stream of change notifications for a subscribed container.
pub type ChangeStream = BoxStream<'static, ChangeBatch>;

/// Capabilities the core consumes from a UI automation backend.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Handle to a located element.
    type Element: Send + Sync;

    /// Load `url` in the controlled page.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// First element matching `locator`, if any is rendered right now.
    async fn locate(&self, locator: &Locator) -> Result<Option<Self::Element>>;

    /// Number of elements matching `locator` right now.
    async fn count(&self, locator: &Locator) -> Result<usize>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Replace the element's value with `text`.
    async fn fill(&self, element: &Self::Element, text: &str) -> Result<()>;

    /// Whether the element accepts interaction (no `disabled` property or class).
    async fn is_enabled(&self, element: &Self::Element) -> Result<bool>;

    /// Snapshot every element matching `messages` inside `container`,
    /// resolving `probes` for each, in document order.
    async fn scan(
        &self,
        container: &Locator,
        messages: &Locator,
        probes: &[Probe],
    ) -> Result<Vec<ElementSnapshot>>;

    /// Subscribe to structural changes below `container`.
    async fn subscribe(&self, container: &Locator) -> Result<ChangeStream>;

    /// Wait up to `timeout` for `locator` to match. `Ok(None)` on timeout.
    async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<Self::Element>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.locate(locator).await? {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep_until((Instant::now() + POLL_INTERVAL).min(deadline)).await;
        }
    }

    /// Wait up to `timeout` for `element` to become enabled.
    async fn wait_until_enabled(&self, element: &Self::Element, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_enabled(element).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout("element to become enabled", timeout));
            }
            tokio::time::sleep_until((Instant::now() + POLL_INTERVAL).min(deadline)).await;
        }
    }
}
