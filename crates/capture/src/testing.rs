//! In-memory driver and sink used by the unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use {
    async_trait::async_trait, futures::StreamExt, tokio::sync::mpsc,
    tokio_stream::wrappers::UnboundedReceiverStream,
};

use crate::{
    driver::{AutomationDriver, ChangeBatch, ChangeStream, ElementSnapshot, Locator, Probe},
    error::{Error, Result},
    sink::EventSink,
    types::ChatMessage,
};

/// Build a snapshot from attribute and probe-field pairs.
pub fn node(attributes: &[(&str, &str)], fields: &[(&str, &str)]) -> ElementSnapshot {
    ElementSnapshot {
        text: None,
        attributes: attributes
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        fields: fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate(String),
    Click(String),
    Fill(String, String),
}

#[derive(Default)]
struct FakeElement {
    /// Instances left; each click consumes one.
    remaining: u32,
    /// Enabled-state checks that report `false` before the element enables.
    disabled_checks: u32,
    /// `locate` calls that miss before the element renders.
    appears_after: u32,
}

/// Scriptable [`AutomationDriver`]. Elements are keyed by their selector
/// string and the element handle is that selector.
#[derive(Default)]
pub struct FakeDriver {
    elements: Mutex<HashMap<String, FakeElement>>,
    scans: Mutex<HashMap<String, Vec<ElementSnapshot>>>,
    actions: Mutex<Vec<Action>>,
    subscribed: Mutex<Vec<String>>,
    scanned_in: Mutex<HashSet<String>>,
    changes: Mutex<Option<mpsc::UnboundedReceiver<ChangeBatch>>>,
    fail_navigation: bool,
    hang_navigation: bool,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_navigation() -> Self {
        Self {
            fail_navigation: true,
            ..Self::default()
        }
    }

    /// Navigation that never finishes loading.
    pub fn hanging_navigation() -> Self {
        Self {
            hang_navigation: true,
            ..Self::default()
        }
    }

    /// Render `selector` once.
    pub fn show(&self, selector: &str) {
        self.show_times(selector, 1);
    }

    /// Render `selector` for `times` clicks.
    pub fn show_times(&self, selector: &str, times: u32) {
        self.elements
            .lock()
            .unwrap()
            .entry(selector.to_string())
            .or_default()
            .remaining = times;
    }

    /// Render `selector` only after `misses` unsuccessful lookups.
    pub fn show_after(&self, selector: &str, misses: u32) {
        let mut elements = self.elements.lock().unwrap();
        let element = elements.entry(selector.to_string()).or_default();
        element.remaining = 1;
        element.appears_after = misses;
    }

    /// Report `selector` disabled for the next `checks` enabled-state checks.
    pub fn disable_for(&self, selector: &str, checks: u32) {
        self.elements
            .lock()
            .unwrap()
            .entry(selector.to_string())
            .or_default()
            .disabled_checks = checks;
    }

    /// Nodes returned when scanning for `messages`.
    pub fn set_scan(&self, messages: &Locator, nodes: Vec<ElementSnapshot>) {
        self.scans
            .lock()
            .unwrap()
            .insert(messages.as_str().to_string(), nodes);
    }

    /// Sender used to deliver change batches to the next subscriber.
    pub fn change_feed(&self) -> mpsc::UnboundedSender<ChangeBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.changes.lock().unwrap() = Some(rx);
        tx
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Click(sel) => Some(sel),
                _ => None,
            })
            .collect()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }

    pub fn scanned_in(&self, container: &str) -> bool {
        self.scanned_in.lock().unwrap().contains(container)
    }

    fn present(&self, selector: &str) -> bool {
        let mut elements = self.elements.lock().unwrap();
        match elements.get_mut(selector) {
            Some(element) if element.appears_after > 0 => {
                element.appears_after -= 1;
                false
            },
            Some(element) => element.remaining > 0,
            None => false,
        }
    }
}

#[async_trait]
impl AutomationDriver for FakeDriver {
    type Element = String;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.actions
            .lock()
            .unwrap()
            .push(Action::Navigate(url.to_string()));
        if self.hang_navigation {
            std::future::pending::<()>().await;
        }
        if self.fail_navigation {
            return Err(Error::driver(
                "navigate",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "net::ERR_FAILED"),
            ));
        }
        Ok(())
    }

    async fn locate(&self, locator: &Locator) -> Result<Option<String>> {
        Ok(self
            .present(locator.as_str())
            .then(|| locator.as_str().to_string()))
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        Ok(usize::from(self.present(locator.as_str())))
    }

    async fn click(&self, element: &String) -> Result<()> {
        if let Some(el) = self.elements.lock().unwrap().get_mut(element) {
            el.remaining = el.remaining.saturating_sub(1);
        }
        self.actions
            .lock()
            .unwrap()
            .push(Action::Click(element.clone()));
        Ok(())
    }

    async fn fill(&self, element: &String, text: &str) -> Result<()> {
        self.actions
            .lock()
            .unwrap()
            .push(Action::Fill(element.clone(), text.to_string()));
        Ok(())
    }

    async fn is_enabled(&self, element: &String) -> Result<bool> {
        let mut elements = self.elements.lock().unwrap();
        let Some(el) = elements.get_mut(element) else {
            return Ok(false);
        };
        if el.disabled_checks > 0 {
            el.disabled_checks -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn scan(
        &self,
        container: &Locator,
        messages: &Locator,
        _probes: &[Probe],
    ) -> Result<Vec<ElementSnapshot>> {
        self.scanned_in
            .lock()
            .unwrap()
            .insert(container.as_str().to_string());
        Ok(self
            .scans
            .lock()
            .unwrap()
            .get(messages.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe(&self, container: &Locator) -> Result<ChangeStream> {
        self.subscribed
            .lock()
            .unwrap()
            .push(container.as_str().to_string());
        let rx = self
            .changes
            .lock()
            .unwrap()
            .take()
            .expect("change_feed() must be called before subscribe");
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Sink that records every accepted message.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<ChatMessage>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn accept(&self, message: ChatMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}
