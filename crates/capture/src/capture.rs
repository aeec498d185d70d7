//! Mutation-driven chat capture.
//!
//! The engine resolves the chat container once, subscribes to structural
//! changes below it and, for every delivered batch, re-scans the container
//! with each schema variant that currently matches. Re-scanning is
//! idempotent: everything already emitted is filtered by the [`SeenSet`].

use std::{collections::HashSet, sync::Arc};

use {
    futures::StreamExt,
    tracing::{debug, info, trace},
};

use crate::{
    driver::{AutomationDriver, ChangeBatch},
    error::Result,
    schema::{ActiveContainer, SchemaRegistry, SchemaVariant},
    sink::EventSink,
    types::DedupKey,
};

/// Keys already emitted in this capture session. Grows monotonically and is
/// dropped with the engine.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: HashSet<DedupKey>,
}

impl SeenSet {
    /// Record `key`; returns `true` when it was not seen before.
    pub fn insert(&mut self, key: DedupKey) -> bool {
        self.keys.insert(key)
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub struct ChatCaptureEngine {
    registry: SchemaRegistry,
    sink: Arc<dyn EventSink>,
    seen: SeenSet,
    container: Option<ActiveContainer>,
}

impl ChatCaptureEngine {
    pub fn new(registry: SchemaRegistry, sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry,
            sink,
            seen: SeenSet::default(),
            container: None,
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn container(&self) -> Option<&ActiveContainer> {
        self.container.as_ref()
    }

    /// Attach to the active chat container and process change batches until
    /// the driver's stream ends.
    pub async fn start<D>(&mut self, driver: &D) -> Result<()>
    where
        D: AutomationDriver + ?Sized,
    {
        let container = self.registry.active_container(driver).await?;
        let mut changes = driver.subscribe(&container.locator).await?;
        info!(
            version = container.version(),
            container = %container.locator,
            "listening for new chat messages"
        );
        self.container = Some(container);

        while let Some(batch) = changes.next().await {
            self.process_batch(driver, batch).await?;
        }

        info!(seen = self.seen.len(), "change stream closed, capture stopped");
        Ok(())
    }

    /// Re-scan the container and forward every message not seen before.
    /// Returns the number of messages emitted.
    pub async fn process_batch<D>(&mut self, driver: &D, batch: ChangeBatch) -> Result<usize>
    where
        D: AutomationDriver + ?Sized,
    {
        let Some(ref container) = self.container else {
            return Ok(0);
        };
        let locator = container.locator.clone();
        let variants = scan_order(&self.registry, container);
        let mut emitted = 0;

        for variant in variants {
            let nodes = driver
                .scan(&locator, variant.message_locator(), variant.probes())
                .await?;
            if nodes.is_empty() {
                continue;
            }
            trace!(version = variant.version(), nodes = nodes.len(), "scanned messages");

            for node in &nodes {
                let Some(candidate) = variant.extract(node) else {
                    continue;
                };
                if !self.seen.insert(candidate.dedup_key.clone()) {
                    continue;
                }
                self.sink.accept(candidate.into_message()).await?;
                emitted += 1;
            }
        }

        debug!(
            mutations = batch.mutations,
            emitted,
            seen = self.seen.len(),
            "processed change batch"
        );
        Ok(emitted)
    }
}

/// The variant whose container matched first, then the rest in registry
/// order, so that old and new markup coexisting in one container are both
/// read.
fn scan_order(
    registry: &SchemaRegistry,
    container: &ActiveContainer,
) -> Vec<Arc<dyn SchemaVariant>> {
    let mut order: Vec<Arc<dyn SchemaVariant>> = Vec::with_capacity(registry.variants().len());
    if let Some(ref active) = container.variant {
        order.push(Arc::clone(active));
    }
    for variant in registry.variants() {
        if !order.iter().any(|v| v.version() == variant.version()) {
            order.push(Arc::clone(variant));
        }
    }
    order
}
