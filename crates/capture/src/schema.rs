//! Versioned element-locating and extraction rules for the meeting web
//! client's chat markup.
//!
//! The interface has shipped several incompatible chat layouts. Each one is
//! a [`SchemaVariant`]; the [`SchemaRegistry`] keeps them newest-first and
//! selects by first match, falling back to older shapes and finally to the
//! whole page.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    driver::{AutomationDriver, ElementSnapshot, Locator, Probe},
    error::Result,
    types::{ChatMessageCandidate, DedupKey},
};

/// Sender name used when a variant renders no name for a message.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Container used when no variant's container is rendered.
pub const PAGE_FALLBACK: Locator = Locator::css("body");

/// One generation of the chat interface.
pub trait SchemaVariant: Send + Sync {
    fn version(&self) -> &'static str;

    /// Scrollable element holding the chat list.
    fn container_locator(&self) -> &Locator;

    /// One element per rendered message.
    fn message_locator(&self) -> &Locator;

    /// Control that opens the chat panel, if this generation has one.
    fn open_chat_locator(&self) -> Option<&Locator>;

    /// Sub-element lookups [`SchemaVariant::extract`] reads from
    /// [`ElementSnapshot::fields`].
    fn probes(&self) -> &[Probe];

    /// Turn a scanned node into a candidate. Partially rendered or malformed
    /// nodes yield `None`.
    fn extract(&self, node: &ElementSnapshot) -> Option<ChatMessageCandidate>;
}

/// The container capture attaches to.
#[derive(Clone)]
pub struct ActiveContainer {
    pub locator: Locator,
    /// Variant whose container matched; `None` for the whole-page fallback.
    pub variant: Option<Arc<dyn SchemaVariant>>,
}

impl ActiveContainer {
    pub fn version(&self) -> &'static str {
        self.variant
            .as_ref()
            .map_or("page-fallback", |variant| variant.version())
    }
}

impl std::fmt::Debug for ActiveContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveContainer")
            .field("locator", &self.locator)
            .field("variant", &self.version())
            .finish()
    }
}

/// Ordered, newest-first set of schema variants.
#[derive(Clone)]
pub struct SchemaRegistry {
    variants: Vec<Arc<dyn SchemaVariant>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaRegistry {
    /// Registry over `variants`, which must already be ordered newest-first.
    pub fn new(variants: Vec<Arc<dyn SchemaVariant>>) -> Self {
        Self { variants }
    }

    /// The known chat layouts, newest first.
    pub fn builtin() -> Self {
        Self::new(vec![
            Arc::new(ChatListVariant::new()),
            Arc::new(ChatItemVariant::new()),
            Arc::new(LegacyVariant::new()),
        ])
    }

    pub fn variants(&self) -> &[Arc<dyn SchemaVariant>] {
        &self.variants
    }

    pub fn versions(&self) -> Vec<&'static str> {
        self.variants.iter().map(|v| v.version()).collect()
    }

    /// Chat-open controls in priority order.
    pub fn open_chat_locators(&self) -> Vec<Locator> {
        self.variants
            .iter()
            .filter_map(|v| v.open_chat_locator().cloned())
            .collect()
    }

    /// Probe each variant's container in order and return the first that is
    /// rendered, or the whole page when none is.
    pub async fn active_container<D>(&self, driver: &D) -> Result<ActiveContainer>
    where
        D: AutomationDriver + ?Sized,
    {
        for variant in &self.variants {
            let locator = variant.container_locator();
            if driver.count(locator).await? > 0 {
                info!(
                    version = variant.version(),
                    container = %locator,
                    "chat container resolved"
                );
                return Ok(ActiveContainer {
                    locator: locator.clone(),
                    variant: Some(Arc::clone(variant)),
                });
            }
            debug!(version = variant.version(), "chat container not rendered");
        }

        info!("no known chat container rendered, watching the whole page");
        Ok(ActiveContainer {
            locator: PAGE_FALLBACK,
            variant: None,
        })
    }
}

// ── Built-in variants ───────────────────────────────────────────────────────

const CHAT_LIST_PROBES: &[Probe] = &[
    Probe::new("sender", ".chat-item__sender").within(".chat-item-container"),
    Probe::new("text", ".new-chat-message__content, .chat-rtf-box__display"),
];

/// Virtualized chat list with per-message ids.
pub struct ChatListVariant {
    container: Locator,
    message: Locator,
    open_chat: Locator,
}

impl ChatListVariant {
    pub fn new() -> Self {
        Self {
            container: Locator::css(
                r#"div[aria-label="Chat Message List"], .chat-container__chat-list"#,
            ),
            message: Locator::css(".new-chat-message__container"),
            open_chat: Locator::css(r#"button[aria-label="open the chat panel"]"#),
        }
    }

    fn message_id(node: &ElementSnapshot) -> Option<&str> {
        node.attribute("data-message-id").or_else(|| {
            node.attribute("id")
                .and_then(|id| id.strip_prefix("chat-message-"))
                .filter(|id| !id.is_empty())
        })
    }
}

impl Default for ChatListVariant {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaVariant for ChatListVariant {
    fn version(&self) -> &'static str {
        "chat-list"
    }

    fn container_locator(&self) -> &Locator {
        &self.container
    }

    fn message_locator(&self) -> &Locator {
        &self.message
    }

    fn open_chat_locator(&self) -> Option<&Locator> {
        Some(&self.open_chat)
    }

    fn probes(&self) -> &[Probe] {
        CHAT_LIST_PROBES
    }

    fn extract(&self, node: &ElementSnapshot) -> Option<ChatMessageCandidate> {
        let text = node.field("text")?;
        let sender = node.field("sender").unwrap_or(UNKNOWN_SENDER);
        let dedup_key = match Self::message_id(node) {
            Some(id) => DedupKey::stable(id),
            None => DedupKey::content(sender, text),
        };
        Some(ChatMessageCandidate {
            sender_name: sender.to_string(),
            sender_id: None,
            text: text.to_string(),
            dedup_key,
        })
    }
}

const CHAT_ITEM_PROBES: &[Probe] = &[
    Probe::new("sender", ".chat-item__sender, .chat-message__sender")
        .within(".chat-item__chat-info, .chat-message"),
    Probe::new("text", ".chat-message__text"),
];

/// Chat items without message ids; deduplicated by content.
pub struct ChatItemVariant {
    container: Locator,
    message: Locator,
    open_chat: Locator,
}

impl ChatItemVariant {
    pub fn new() -> Self {
        Self {
            container: Locator::css(".chat-container, .chat-list__chat-virtualized"),
            message: Locator::css(".chat-item__chat-info"),
            open_chat: Locator::css(r#"button[aria-label="Open Chat"]"#),
        }
    }
}

impl Default for ChatItemVariant {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaVariant for ChatItemVariant {
    fn version(&self) -> &'static str {
        "chat-item"
    }

    fn container_locator(&self) -> &Locator {
        &self.container
    }

    fn message_locator(&self) -> &Locator {
        &self.message
    }

    fn open_chat_locator(&self) -> Option<&Locator> {
        Some(&self.open_chat)
    }

    fn probes(&self) -> &[Probe] {
        CHAT_ITEM_PROBES
    }

    fn extract(&self, node: &ElementSnapshot) -> Option<ChatMessageCandidate> {
        // Older builds render the message straight into the chat-info node.
        let text = node.field("text").or_else(|| node_text(node))?;
        let sender = node.field("sender").unwrap_or(UNKNOWN_SENDER);
        Some(ChatMessageCandidate {
            sender_name: sender.to_string(),
            sender_id: None,
            text: text.to_string(),
            dedup_key: DedupKey::content(sender, text),
        })
    }
}

const LEGACY_PROBES: &[Probe] = &[
    Probe::new("sender", ".chat-message__sender"),
    Probe::new("text", ".chat-message__text"),
];

/// Oldest layout. Messages usually carry the sender's numeric user id.
pub struct LegacyVariant {
    container: Locator,
    message: Locator,
    open_chat: Locator,
}

impl LegacyVariant {
    pub fn new() -> Self {
        Self {
            container: Locator::css("#chat-list-content"),
            message: Locator::css(".chat-message"),
            open_chat: Locator::css(".footer-button__chat-icon"),
        }
    }
}

impl Default for LegacyVariant {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaVariant for LegacyVariant {
    fn version(&self) -> &'static str {
        "legacy"
    }

    fn container_locator(&self) -> &Locator {
        &self.container
    }

    fn message_locator(&self) -> &Locator {
        &self.message
    }

    fn open_chat_locator(&self) -> Option<&Locator> {
        Some(&self.open_chat)
    }

    fn probes(&self) -> &[Probe] {
        LEGACY_PROBES
    }

    fn extract(&self, node: &ElementSnapshot) -> Option<ChatMessageCandidate> {
        let user_id = node.attribute("data-userid");
        let text = node.field("text")?;
        let sender = node.field("sender").unwrap_or(UNKNOWN_SENDER);
        let dedup_key = match (node.attribute("data-msgid"), user_id) {
            (Some(id), _) => DedupKey::stable(id),
            (None, Some(user_id)) => DedupKey::content(&format!("user:{user_id}"), text),
            (None, None) => DedupKey::content(sender, text),
        };
        Some(ChatMessageCandidate {
            sender_name: sender.to_string(),
            sender_id: user_id.map(str::to_string),
            text: text.to_string(),
            dedup_key,
        })
    }
}

/// The node's own trimmed text, if any.
fn node_text(node: &ElementSnapshot) -> Option<&str> {
    node.text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{FakeDriver, node},
    };

    #[test]
    fn builtin_is_newest_first() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.versions(), vec!["chat-list", "chat-item", "legacy"]);
        assert_eq!(
            registry.open_chat_locators()[0].as_str(),
            r#"button[aria-label="open the chat panel"]"#
        );
    }

    #[tokio::test]
    async fn newest_container_wins_when_several_render() {
        let registry = SchemaRegistry::builtin();
        let driver = FakeDriver::new();
        driver.show(ChatItemVariant::new().container_locator().as_str());
        driver.show(ChatListVariant::new().container_locator().as_str());

        let active = registry.active_container(&driver).await.unwrap();
        assert_eq!(active.version(), "chat-list");
    }

    #[tokio::test]
    async fn falls_back_to_older_container() {
        let registry = SchemaRegistry::builtin();
        let driver = FakeDriver::new();
        driver.show("#chat-list-content");

        let active = registry.active_container(&driver).await.unwrap();
        assert_eq!(active.version(), "legacy");
        assert_eq!(active.locator.as_str(), "#chat-list-content");
    }

    #[tokio::test]
    async fn falls_back_to_whole_page() {
        let registry = SchemaRegistry::builtin();
        let driver = FakeDriver::new();

        let active = registry.active_container(&driver).await.unwrap();
        assert!(active.variant.is_none());
        assert_eq!(active.locator, PAGE_FALLBACK);
        assert_eq!(active.version(), "page-fallback");
    }

    #[test]
    fn chat_list_prefers_message_id() {
        let variant = ChatListVariant::new();
        let candidate = variant
            .extract(&node(
                &[("id", "chat-message-abc")],
                &[("sender", "Alice"), ("text", "hello")],
            ))
            .unwrap();
        assert_eq!(candidate.dedup_key, DedupKey::stable("abc"));
        assert_eq!(candidate.sender_name, "Alice");
        assert_eq!(candidate.text, "hello");

        let candidate = variant
            .extract(&node(
                &[("data-message-id", "m1"), ("id", "chat-message-abc")],
                &[("text", "hello")],
            ))
            .unwrap();
        assert_eq!(candidate.dedup_key, DedupKey::stable("m1"));
        assert_eq!(candidate.sender_name, UNKNOWN_SENDER);
    }

    #[test]
    fn chat_list_without_id_uses_content_key() {
        let candidate = ChatListVariant::new()
            .extract(&node(&[], &[("sender", "Bob"), ("text", "hi")]))
            .unwrap();
        assert_eq!(candidate.dedup_key, DedupKey::content("Bob", "hi"));
    }

    #[test]
    fn partial_render_yields_nothing() {
        let partial = node(&[("data-message-id", "m9")], &[("sender", "Alice")]);
        assert!(ChatListVariant::new().extract(&partial).is_none());
        assert!(ChatItemVariant::new().extract(&partial).is_none());

        let blank_text = node(&[], &[("sender", "Alice"), ("text", "   ")]);
        assert!(ChatItemVariant::new().extract(&blank_text).is_none());
    }

    #[test]
    fn chat_item_defaults_unknown_sender() {
        let candidate = ChatItemVariant::new()
            .extract(&node(&[], &[("text", "anyone here?")]))
            .unwrap();
        assert_eq!(candidate.sender_name, UNKNOWN_SENDER);
        assert_eq!(
            candidate.dedup_key,
            DedupKey::content(UNKNOWN_SENDER, "anyone here?")
        );
    }

    #[test]
    fn chat_item_reads_node_text_without_text_child() {
        let snapshot = ElementSnapshot {
            text: Some("  Alice hello everyone ".into()),
            ..node(&[], &[("sender", "Alice")])
        };
        let candidate = ChatItemVariant::new().extract(&snapshot).unwrap();
        assert_eq!(candidate.text, "Alice hello everyone");
        assert_eq!(candidate.sender_name, "Alice");
        assert_eq!(
            candidate.dedup_key,
            DedupKey::content("Alice", "Alice hello everyone")
        );
    }

    #[test]
    fn chat_item_prefers_text_child_over_node_text() {
        let snapshot = ElementSnapshot {
            text: Some("Alice hello".into()),
            ..node(&[], &[("sender", "Alice"), ("text", "hello")])
        };
        let candidate = ChatItemVariant::new().extract(&snapshot).unwrap();
        assert_eq!(candidate.text, "hello");
    }

    #[test]
    fn legacy_without_user_id_prints_sender_name() {
        let candidate = LegacyVariant::new()
            .extract(&node(&[], &[("sender", "Bob"), ("text", "hi")]))
            .unwrap();
        assert!(candidate.sender_id.is_none());
        assert_eq!(candidate.dedup_key, DedupKey::content("Bob", "hi"));
        assert_eq!(candidate.into_message().to_string(), "Bob: hi");
    }

    #[test]
    fn legacy_with_user_id_prints_user_id() {
        let variant = LegacyVariant::new();
        assert!(variant.extract(&node(&[], &[("sender", "Bob")])).is_none());

        let candidate = variant
            .extract(&node(&[("data-userid", "16778240")], &[("text", "hi")]))
            .unwrap();
        assert_eq!(candidate.sender_id.as_deref(), Some("16778240"));
        assert_eq!(candidate.into_message().to_string(), "UserID 16778240: hi");
    }

    #[test]
    fn legacy_uses_message_id_when_present() {
        let candidate = LegacyVariant::new()
            .extract(&node(
                &[("data-userid", "7"), ("data-msgid", "x-1")],
                &[("text", "hi")],
            ))
            .unwrap();
        assert_eq!(candidate.dedup_key, DedupKey::stable("x-1"));
    }
}
