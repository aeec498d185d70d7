//! Destination for captured chat messages.

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::{
    error::{Error, Result},
    types::ChatMessage,
};

/// Accepts structured chat messages; the binary provides the concrete
/// implementation.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn accept(&self, message: ChatMessage) -> Result<()>;
}

/// Forwards messages into an mpsc channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ChatMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChatMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn accept(&self, message: ChatMessage) -> Result<()> {
        self.tx.send(message).map_err(Error::sink)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> ChatMessage {
        ChatMessage {
            sender_name: "Alice".into(),
            sender_id: None,
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.accept(message("one")).await.unwrap();
        sink.accept(message("two")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().text, "one");
        assert_eq!(rx.recv().await.unwrap().text, "two");
    }

    #[tokio::test]
    async fn channel_sink_errors_when_receiver_dropped() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let err = sink.accept(message("lost")).await.unwrap_err();
        assert!(matches!(err, Error::Sink { .. }));
    }
}
